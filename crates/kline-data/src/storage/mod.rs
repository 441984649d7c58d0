//! 시계열 저장소.
//!
//! 심볼마다 테이블 하나에 모든 간격을 담고, `(open_time, duration)`을 기본 키로
//! 씁니다. 기본 키 충돌은 `DataError::DuplicateError`로 구분해서 보고해야 합니다.

pub mod memory;
pub mod timescale;

use crate::error::{DataError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kline_core::{AnnotatedCandle, Interval};

/// 시계열 저장소.
#[async_trait]
pub trait SeriesStore: Send + Sync {
    /// 심볼 테이블이 있는지 확인.
    async fn table_exists(&self, symbol: &str) -> Result<bool>;

    /// 심볼 테이블 생성. 이미 있으면 아무 일도 하지 않습니다.
    async fn create_table(&self, symbol: &str) -> Result<()>;

    /// 쓰기 세션 시작. 세션 하나가 저장소 연결 하나를 점유합니다.
    async fn open_session(&self) -> Result<Box<dyn SeriesSession>>;

    /// 가장 최근 저장된 캔들의 시작 시간.
    async fn latest_open_time(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<Option<DateTime<Utc>>>;

    /// 간격의 전체 시계열 (시작 시간 오름차순).
    async fn load_series(&self, symbol: &str, interval: Interval) -> Result<Vec<AnnotatedCandle>>;

    /// `[from, to]` 구간 (시작 시간 오름차순).
    async fn load_range(
        &self,
        symbol: &str,
        interval: Interval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AnnotatedCandle>>;

    /// 간격의 저장된 행 수.
    async fn count(&self, symbol: &str, interval: Interval) -> Result<i64>;
}

/// 행 단위 쓰기 세션.
#[async_trait]
pub trait SeriesSession: Send {
    /// 한 행을 삽입합니다. 같은 `(open_time, duration)`이 있으면 `DuplicateError`.
    async fn insert(
        &mut self,
        symbol: &str,
        interval: Interval,
        candle: &AnnotatedCandle,
    ) -> Result<()>;
}

/// 심볼을 따옴표로 감싼 테이블 식별자로 변환합니다.
///
/// 영숫자, `_`, `-`만 허용합니다 (최대 63바이트).
pub fn table_ident(symbol: &str) -> Result<String> {
    let valid = !symbol.is_empty()
        && symbol.len() <= 63
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(format!("\"{}\"", symbol))
    } else {
        Err(DataError::InvalidTableName(symbol.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ident() {
        assert_eq!(table_ident("BTCUSDT").unwrap(), "\"BTCUSDT\"");
        assert_eq!(table_ident("1000PEPEUSDT").unwrap(), "\"1000PEPEUSDT\"");
        assert_eq!(table_ident("BTC-27DEC24").unwrap(), "\"BTC-27DEC24\"");
        assert!(table_ident("").is_err());
        assert!(table_ident("x\"; DROP TABLE y; --").is_err());
        assert!(table_ident(&"A".repeat(64)).is_err());
    }
}
