//! 단건 캔들 조회.
//!
//! - `latest_closed_candle`: `as_of` 시점에 마감된 가장 최근 캔들
//! - `current_candle`: 아직 형성 중인 캔들 (저장하지 않음)

use chrono::{DateTime, Utc};
use kline_core::{Candle, Interval};

use crate::{ExchangeResult, MarketDataSource};

/// `as_of` 시점에 이미 마감된 가장 최근 캔들.
pub async fn latest_closed_candle<S>(
    source: &S,
    symbol: &str,
    interval: Interval,
    as_of: DateTime<Utc>,
) -> ExchangeResult<Option<Candle>>
where
    S: MarketDataSource + ?Sized,
{
    let start = interval.prev_open(interval.prev_open(as_of));
    let candles = source.get_candles(symbol, interval, start, as_of, 3).await?;

    Ok(candles
        .into_iter()
        .filter(|c| c.is_closed(interval, as_of))
        .max_by_key(|c| c.open_time))
}

/// `as_of` 시점에 형성 중인 캔들.
pub async fn current_candle<S>(
    source: &S,
    symbol: &str,
    interval: Interval,
    as_of: DateTime<Utc>,
) -> ExchangeResult<Option<Candle>>
where
    S: MarketDataSource + ?Sized,
{
    let start = interval.prev_open(as_of);
    let candles = source.get_candles(symbol, interval, start, as_of, 2).await?;

    Ok(candles
        .into_iter()
        .filter(|c| c.open_time <= as_of && !c.is_closed(interval, as_of))
        .max_by_key(|c| c.open_time))
}
