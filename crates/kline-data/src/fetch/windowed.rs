//! 구간 분할 병렬 수집기.
//!
//! 큰 구간은 하위 구간으로 나눠 작업마다 병렬로 페이지를 가져옵니다. 결과는 잠금으로
//! 보호된 공유 버퍼에 모은 뒤 정렬, 중복 제거, 미마감 캔들 제거, 연속성 검증을
//! 거칩니다.
//!
//! 원격 호출 하나하나는 기한과 경쟁합니다. 기한 초과나 재시도 가능한 오류가 나면
//! 해당 하위 구간 전체를 처음부터 다시 가져옵니다. 복구할 수 없는 오류는 기록만 하고
//! 빈 결과를 돌려줍니다.

use super::plan::{FetchPlan, FetchPolicy, FetchWindow};
use chrono::{DateTime, Utc};
use kline_core::{series_span, validate, Candle, Interval, Validated};
use kline_exchange::{with_deadline, ExchangeError, ExchangeResult, MarketDataSource};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn, Instrument};

type SharedBuffer = Arc<Mutex<Vec<Candle>>>;

/// 구간 분할 병렬 수집기.
#[derive(Clone)]
pub struct WindowedFetcher {
    source: Arc<dyn MarketDataSource>,
    policy: FetchPolicy,
}

impl WindowedFetcher {
    pub fn new(source: Arc<dyn MarketDataSource>, policy: FetchPolicy) -> Self {
        Self { source, policy }
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    pub fn source(&self) -> &Arc<dyn MarketDataSource> {
        &self.source
    }

    /// `[start, end]` 구간에서 `as_of`까지 마감된 캔들을 가져옵니다.
    ///
    /// 결과는 정렬, 중복 제거, 검증된 시계열입니다. 실패하면 빈 시계열입니다.
    pub async fn fetch(
        &self,
        symbol: &str,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        as_of: DateTime<Utc>,
    ) -> Validated<Candle> {
        let plan = FetchPlan::new(symbol, interval, start, end, as_of, &self.policy);
        let started = Instant::now();

        match self.run(&plan).await {
            Ok(candles) => {
                let validated = finish(candles, interval, as_of);
                info!(
                    symbol,
                    interval = %interval,
                    windows = plan.task_count(),
                    records = validated.len(),
                    gaps = validated.gaps.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "캔들 수집 완료"
                );
                validated
            }
            Err(e) => {
                error!(
                    symbol,
                    interval = %interval,
                    start = %plan.start,
                    end = %plan.end,
                    error = %e,
                    "캔들 수집 실패, 빈 결과 반환"
                );
                validate(Vec::new(), interval)
            }
        }
    }

    async fn run(&self, plan: &FetchPlan) -> ExchangeResult<Vec<Candle>> {
        let windows = plan.windows();
        if windows.is_empty() {
            return Ok(Vec::new());
        }

        let buffer: SharedBuffer = Arc::new(Mutex::new(Vec::new()));
        let mut set = JoinSet::new();

        for window in windows {
            let task = WindowTask {
                source: Arc::clone(&self.source),
                policy: self.policy,
                symbol: plan.symbol.clone(),
                interval: plan.interval,
                as_of: plan.as_of,
                window,
                buffer: Arc::clone(&buffer),
            };
            let span = series_span!("fetch_window", plan.symbol, plan.interval);
            set.spawn(task.run_with_retry().instrument(span));
        }

        let mut first_error: Option<ExchangeError> = None;
        while let Some(joined) = set.join_next().await {
            let result = joined.unwrap_or_else(|e| Err(ExchangeError::Unknown(e.to_string())));
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let mut guard = buffer.lock().await;
        Ok(std::mem::take(&mut *guard))
    }
}

/// 정렬, 중복 제거 후 `as_of`까지 마감되지 않은 캔들을 버리고 검증합니다.
fn finish(candles: Vec<Candle>, interval: Interval, as_of: DateTime<Utc>) -> Validated<Candle> {
    let closed: Vec<Candle> = candles
        .into_iter()
        .filter(|c| c.is_closed(interval, as_of))
        .collect();
    validate(closed, interval)
}

/// 하위 구간 하나를 맡는 작업.
struct WindowTask {
    source: Arc<dyn MarketDataSource>,
    policy: FetchPolicy,
    symbol: String,
    interval: Interval,
    as_of: DateTime<Utc>,
    window: FetchWindow,
    buffer: SharedBuffer,
}

impl WindowTask {
    async fn run_with_retry(self) -> ExchangeResult<()> {
        let retry = self.policy.retry;
        let mut attempt = 1;

        loop {
            match self.page_through().await {
                Ok(records) => {
                    debug!(
                        symbol = %self.symbol,
                        window = self.window.index,
                        records,
                        "하위 구간 수집 완료"
                    );
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                    let delay = retry.delay_for(attempt, &e);
                    warn!(
                        symbol = %self.symbol,
                        interval = %self.interval,
                        window = self.window.index,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "하위 구간 재수집"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 하위 구간을 시작점부터 앞으로 페이지 단위로 가져옵니다.
    ///
    /// 다음 중 하나면 멈춥니다:
    /// - 커서가 구간 끝이나 기준 시각을 넘음
    /// - 페이지 첫 캔들이 기준 시각 이후
    /// - 구간 시작보다 이른 캔들이 나옴 (앞 작업과 겹침)
    /// - 캔들 하나짜리 페이지가 직전 마지막 캔들을 반복
    async fn page_through(&self) -> ExchangeResult<usize> {
        let interval = self.interval;
        let limit = self.policy.page_limit.max(1);
        let stop_at = self.window.end.min(self.as_of);
        let mut cursor = self.window.start;
        let mut last_seen: Option<DateTime<Utc>> = None;
        let mut records = 0;

        while cursor <= stop_at {
            let page_end = interval.advance(cursor, limit - 1).min(stop_at);
            let page = with_deadline(
                self.policy.retry.deadline,
                self.source
                    .get_candles(&self.symbol, interval, cursor, page_end, limit),
            )
            .await?;

            let (Some(first), Some(last)) = (page.first(), page.last()) else {
                cursor = interval.next_open(page_end);
                continue;
            };
            let (first, last) = (first.open_time, last.open_time);

            if first > self.as_of {
                break;
            }
            if page.len() == 1 && last_seen == Some(first) {
                break;
            }
            let overlaps_sibling = first < self.window.start;

            let accepted: Vec<Candle> = page
                .into_iter()
                .filter(|c| c.open_time >= self.window.start && c.open_time <= self.window.end)
                .collect();
            records += accepted.len();
            self.buffer.lock().await.extend(accepted);

            if overlaps_sibling {
                break;
            }
            last_seen = Some(last);
            cursor = interval.next_open(last.max(page_end));
        }

        Ok(records)
    }
}
