//! 원격 시장 데이터 소스 trait 정의.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use kline_core::{Candle, Interval};

use crate::ExchangeError;

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 심볼 목록 한 페이지.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolPage {
    /// 거래 중인 심볼
    pub symbols: Vec<String>,
    /// 다음 페이지 커서 (마지막 페이지면 `None`)
    pub next_cursor: Option<String>,
}

/// 상장 정보.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentInfo {
    pub symbol: String,
    pub status: String,
    /// 거래소가 보고한 상장 시각
    pub launch_time: DateTime<Utc>,
}

impl InstrumentInfo {
    /// 전체 이력 백필의 시작점. 첫 캔들이 잘리지 않도록 상장 하루 전입니다.
    pub fn listing_date(&self) -> DateTime<Utc> {
        self.launch_time - Duration::days(1)
    }

    pub fn is_trading(&self) -> bool {
        self.status.eq_ignore_ascii_case("Trading")
    }
}

/// 원격 시장 데이터 소스.
///
/// 구현체는 명시적으로 생성해서 `Arc<dyn MarketDataSource>`로 주입합니다.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// 소스 이름 반환.
    fn name(&self) -> &str;

    /// 거래 중인 심볼 한 페이지 조회.
    async fn list_symbols(&self, cursor: Option<&str>) -> ExchangeResult<SymbolPage>;

    /// `[start, end]` 구간의 캔들을 최대 `limit`개 조회.
    ///
    /// 결과는 시작 시간 오름차순입니다. 구간 안에 `limit`보다 많은 캔들이 있을 때
    /// 어느 쪽이 잘리는지는 소스마다 다르므로, 호출자가 페이지 구간을 `limit` 이내로
    /// 맞춰야 합니다.
    async fn get_candles(
        &self,
        symbol: &str,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> ExchangeResult<Vec<Candle>>;

    /// 상장 정보 조회.
    async fn instrument_info(&self, symbol: &str) -> ExchangeResult<InstrumentInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_listing_date_is_day_before_launch() {
        let info = InstrumentInfo {
            symbol: "BTCUSDT".into(),
            status: "Trading".into(),
            launch_time: Utc.with_ymd_and_hms(2020, 3, 15, 8, 0, 0).unwrap(),
        };
        assert_eq!(
            info.listing_date(),
            Utc.with_ymd_and_hms(2020, 3, 14, 8, 0, 0).unwrap()
        );
        assert!(info.is_trading());
    }
}
