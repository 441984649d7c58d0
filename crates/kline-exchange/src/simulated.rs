//! 시뮬레이션 시장 데이터 소스.
//!
//! 네트워크 없이 수집 파이프라인을 돌리기 위한 결정적 캔들 생성기입니다.
//! - 상장 시각부터 `now`까지 간격에 정렬된 캔들을 만듭니다 (형성 중인 캔들 포함)
//! - 구간에 `limit`보다 많은 캔들이 있으면 Bybit처럼 최신 `limit`개만 돌려줍니다
//! - 원격 누락(hole), 오류, 지연을 주입할 수 있습니다

use crate::traits::{ExchangeResult, InstrumentInfo, MarketDataSource, SymbolPage};
use crate::ExchangeError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kline_core::{Candle, Interval};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// 다음 `get_candles` 호출에 주입할 이상 동작.
#[derive(Debug)]
pub enum Fault {
    /// 오류 반환
    Fail(ExchangeError),
    /// 응답 전 대기 (기한 초과 재현용)
    Stall(Duration),
}

#[derive(Debug, Clone)]
struct SimInstrument {
    launch_time: DateTime<Utc>,
    status: String,
}

/// 시뮬레이션 소스.
pub struct SimulatedSource {
    instruments: BTreeMap<String, SimInstrument>,
    symbols_per_page: usize,
    now: Mutex<DateTime<Utc>>,
    holes: Mutex<HashSet<(String, Interval, DateTime<Utc>)>>,
    faults: Mutex<VecDeque<Fault>>,
    candle_calls: AtomicUsize,
}

impl SimulatedSource {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            instruments: BTreeMap::new(),
            symbols_per_page: 500,
            now: Mutex::new(now),
            holes: Mutex::new(HashSet::new()),
            faults: Mutex::new(VecDeque::new()),
            candle_calls: AtomicUsize::new(0),
        }
    }

    /// 거래 중인 심볼 추가.
    pub fn with_instrument(self, symbol: &str, launch_time: DateTime<Utc>) -> Self {
        self.with_instrument_status(symbol, launch_time, "Trading")
    }

    pub fn with_instrument_status(
        mut self,
        symbol: &str,
        launch_time: DateTime<Utc>,
        status: &str,
    ) -> Self {
        self.instruments.insert(
            symbol.to_string(),
            SimInstrument {
                launch_time,
                status: status.to_string(),
            },
        );
        self
    }

    pub fn with_symbols_per_page(mut self, n: usize) -> Self {
        self.symbols_per_page = n.max(1);
        self
    }

    pub async fn set_now(&self, now: DateTime<Utc>) {
        *self.now.lock().await = now;
    }

    /// 원격에도 없는 캔들을 만듭니다.
    pub async fn add_hole(&self, symbol: &str, interval: Interval, open_time: DateTime<Utc>) {
        self.holes
            .lock()
            .await
            .insert((symbol.to_string(), interval, open_time));
    }

    pub async fn clear_holes(&self) {
        self.holes.lock().await.clear();
    }

    /// 다음 `get_candles` 호출에 이상 동작을 주입합니다 (선입선출).
    pub async fn push_fault(&self, fault: Fault) {
        self.faults.lock().await.push_back(fault);
    }

    /// 지금까지의 `get_candles` 호출 수.
    pub fn candle_calls(&self) -> usize {
        self.candle_calls.load(Ordering::SeqCst)
    }

    /// 결정적 가격 생성.
    pub fn synthetic_candle(open_time: DateTime<Utc>) -> Candle {
        let k = open_time.timestamp() / 60;
        let open = Decimal::from(100 + k.rem_euclid(13));
        let close = open + Decimal::from(k.rem_euclid(5) - 2);
        let high = open.max(close) + Decimal::ONE;
        let low = open.min(close) - Decimal::ONE;
        let volume = Decimal::from(1 + k.rem_euclid(7));

        Candle::new(open_time, open, high, low, close, volume, volume * close)
    }

    fn instrument(&self, symbol: &str) -> ExchangeResult<&SimInstrument> {
        self.instruments
            .get(symbol)
            .ok_or_else(|| ExchangeError::InvalidRequest(format!("Not supported symbols: {}", symbol)))
    }
}

#[async_trait]
impl MarketDataSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn list_symbols(&self, cursor: Option<&str>) -> ExchangeResult<SymbolPage> {
        let offset: usize = match cursor {
            Some(c) => c
                .parse()
                .map_err(|_| ExchangeError::InvalidRequest(format!("bad cursor: {}", c)))?,
            None => 0,
        };

        let names: Vec<&String> = self.instruments.keys().collect();
        let end = (offset + self.symbols_per_page).min(names.len());
        let symbols = names
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .filter(|name| {
                self.instruments
                    .get(name.as_str())
                    .is_some_and(|i| i.status.eq_ignore_ascii_case("Trading"))
            })
            .map(|name| name.to_string())
            .collect();

        Ok(SymbolPage {
            symbols,
            next_cursor: (end < names.len()).then(|| end.to_string()),
        })
    }

    async fn get_candles(
        &self,
        symbol: &str,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> ExchangeResult<Vec<Candle>> {
        self.candle_calls.fetch_add(1, Ordering::SeqCst);

        let fault = self.faults.lock().await.pop_front();
        match fault {
            Some(Fault::Fail(e)) => return Err(e),
            Some(Fault::Stall(d)) => tokio::time::sleep(d).await,
            None => {}
        }

        let launch = interval.floor(self.instrument(symbol)?.launch_time);
        let now = *self.now.lock().await;
        let holes = self.holes.lock().await;

        let mut t = interval.ceil(start.max(launch));
        let last = end.min(now);
        let mut candles = Vec::new();
        while t <= last {
            if !holes.contains(&(symbol.to_string(), interval, t)) {
                candles.push(Self::synthetic_candle(t));
            }
            t = interval.next_open(t);
        }

        let keep = limit as usize;
        if candles.len() > keep {
            candles.drain(..candles.len() - keep);
        }
        Ok(candles)
    }

    async fn instrument_info(&self, symbol: &str) -> ExchangeResult<InstrumentInfo> {
        let instrument = self
            .instruments
            .get(symbol)
            .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))?;

        Ok(InstrumentInfo {
            symbol: symbol.to_string(),
            status: instrument.status.clone(),
            launch_time: instrument.launch_time,
        })
    }
}
