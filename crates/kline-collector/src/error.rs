//! 에러 타입 정의.

use kline_core::CoreError;
use kline_data::DataError;
use kline_exchange::ExchangeError;
use thiserror::Error;

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 저장소 (DB 연결 포함) / 수집 에러
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// 거래소 에러
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    /// 로깅 / 지표 엔진 초기화 에러
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failure_surfaces_as_data_error() {
        let err: CollectorError = DataError::ConnectionError("connection refused".into()).into();
        assert!(matches!(
            err,
            CollectorError::Data(DataError::ConnectionError(_))
        ));
        assert!(err.to_string().contains("connection refused"));
    }
}
