//! 코어 크레이트의 에러 타입.

use thiserror::Error;

/// 코어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 로깅 초기화 에러
    #[error("로깅 에러: {0}")]
    Logging(String),

    /// 지표 파라미터 에러
    #[error("지표 에러: {0}")]
    Indicator(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),
}

/// 코어 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;
