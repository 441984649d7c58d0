//! 저장된 시계열 조회 (갭 보고, 상태).

use crate::Result;
use chrono::{DateTime, Utc};
use kline_core::{validate, Candle, Gap, Interval};
use kline_data::SeriesStore;
use kline_exchange::{current_candle, latest_closed_candle, MarketDataSource};

/// 저장된 시계열의 갭. 보충하지 않습니다.
pub async fn stored_gaps(
    store: &dyn SeriesStore,
    symbol: &str,
    interval: Interval,
) -> Result<Vec<Gap>> {
    let stored = store.load_series(symbol, interval).await?;
    Ok(validate(stored, interval).gaps)
}

/// 저장소와 원격의 최신 캔들 비교.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStatus {
    pub symbol: String,
    pub interval: Interval,
    pub stored_rows: i64,
    pub latest_stored: Option<DateTime<Utc>>,
    /// 원격의 가장 최근 마감 캔들
    pub latest_closed: Option<Candle>,
    /// 원격에서 형성 중인 캔들
    pub forming: Option<Candle>,
}

impl SeriesStatus {
    /// 저장소가 원격 마감 캔들까지 따라잡았는지.
    pub fn is_caught_up(&self) -> bool {
        match (&self.latest_closed, self.latest_stored) {
            (Some(remote), Some(stored)) => stored >= remote.open_time,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

pub async fn series_status(
    source: &dyn MarketDataSource,
    store: &dyn SeriesStore,
    symbol: &str,
    interval: Interval,
    as_of: DateTime<Utc>,
) -> Result<SeriesStatus> {
    let (stored_rows, latest_stored) = if store.table_exists(symbol).await? {
        (
            store.count(symbol, interval).await?,
            store.latest_open_time(symbol, interval).await?,
        )
    } else {
        (0, None)
    };

    Ok(SeriesStatus {
        symbol: symbol.to_string(),
        interval,
        stored_rows,
        latest_stored,
        latest_closed: latest_closed_candle(source, symbol, interval, as_of).await?,
        forming: current_candle(source, symbol, interval, as_of).await?,
    })
}
