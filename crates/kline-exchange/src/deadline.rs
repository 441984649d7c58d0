//! 기한이 있는 원격 호출과 재시도.
//!
//! 원격 호출은 `with_deadline`으로 고정 기한과 경쟁시킵니다. 기한이 지나면 호출
//! future는 drop되어 취소되고 `ExchangeError::Timeout`이 반환됩니다.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::{ExchangeError, ExchangeResult};

/// `fut`를 `limit` 안에 끝내지 못하면 `Timeout`을 반환합니다.
pub async fn with_deadline<T, F>(limit: Duration, fut: F) -> ExchangeResult<T>
where
    F: Future<Output = ExchangeResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ExchangeError::Timeout(format!(
            "{}ms 안에 응답 없음",
            limit.as_millis()
        ))),
    }
}

/// 재시도 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 총 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    /// 시도당 기한
    pub deadline: Duration,
    /// 첫 재시도 대기 시간. 시도마다 두 배가 됩니다.
    pub base_delay: Duration,
    /// 대기 시간 상한
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            deadline: Duration::from_secs(50),
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(16),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, deadline: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            deadline,
            ..Default::default()
        }
    }

    /// `attempt`번째 실패 뒤 대기 시간.
    ///
    /// 에러의 권장 대기 시간(없으면 `base_delay`)에서 시작해 시도마다 두 배, `max_delay`에서 멈춥니다.
    pub fn delay_for(&self, attempt: u32, err: &ExchangeError) -> Duration {
        let hinted = err
            .retry_delay_ms()
            .map(Duration::from_millis)
            .unwrap_or(self.base_delay);
        let scaled = hinted.max(self.base_delay) * 2u32.saturating_pow(attempt.saturating_sub(1));
        scaled.min(self.max_delay)
    }
}

/// `op`를 기한과 함께 실행하고, 재시도 가능한 에러면 정책에 따라 다시 실행합니다.
///
/// 재시도 불가능한 에러나 마지막 시도의 에러는 그대로 반환합니다.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> ExchangeResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ExchangeResult<T>>,
{
    let mut attempt = 1;
    loop {
        match with_deadline(policy.deadline, op()).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt, &e);
                warn!(
                    label,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "원격 호출 재시도"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
