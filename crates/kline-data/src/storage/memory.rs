//! 메모리 시계열 저장소.
//!
//! PostgreSQL 저장소와 같은 의미(테이블 존재 여부, 복합 키 충돌)를 흉내 냅니다.
//! 데이터베이스 없이 수집 파이프라인을 돌릴 때 사용합니다.

use super::{table_ident, SeriesSession, SeriesStore};
use crate::error::{DataError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kline_core::{AnnotatedCandle, Interval};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

type Series = BTreeMap<(Interval, DateTime<Utc>), AnnotatedCandle>;

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Series>,
    failing: HashSet<DateTime<Utc>>,
}

/// 메모리 시계열 저장소.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 한 행을 삭제합니다. 삭제했으면 `true`.
    pub async fn remove(&self, symbol: &str, interval: Interval, open_time: DateTime<Utc>) -> bool {
        let mut inner = self.inner.write().await;
        inner
            .tables
            .get_mut(symbol)
            .map(|series| series.remove(&(interval, open_time)).is_some())
            .unwrap_or(false)
    }

    /// 해당 시작 시간의 삽입이 중복이 아닌 오류로 실패하게 합니다.
    pub async fn fail_inserts_at(&self, open_time: DateTime<Utc>) {
        self.inner.write().await.failing.insert(open_time);
    }

    pub async fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().await.tables.keys().cloned().collect();
        names.sort();
        names
    }

    async fn with_series<T>(
        &self,
        symbol: &str,
        interval: Interval,
        f: impl FnOnce(&mut dyn Iterator<Item = &AnnotatedCandle>) -> T,
    ) -> Result<T> {
        let inner = self.inner.read().await;
        let series = inner
            .tables
            .get(symbol)
            .ok_or_else(|| DataError::NotFound(format!("relation \"{}\" does not exist", symbol)))?;

        let mut iter = series
            .range((interval, DateTime::<Utc>::MIN_UTC)..=(interval, DateTime::<Utc>::MAX_UTC))
            .map(|(_, candle)| candle);
        Ok(f(&mut iter))
    }
}

#[async_trait]
impl SeriesStore for MemoryStore {
    async fn table_exists(&self, symbol: &str) -> Result<bool> {
        table_ident(symbol)?;
        Ok(self.inner.read().await.tables.contains_key(symbol))
    }

    async fn create_table(&self, symbol: &str) -> Result<()> {
        table_ident(symbol)?;
        self.inner
            .write()
            .await
            .tables
            .entry(symbol.to_string())
            .or_default();
        Ok(())
    }

    async fn open_session(&self) -> Result<Box<dyn SeriesSession>> {
        Ok(Box::new(MemorySession {
            inner: Arc::clone(&self.inner),
        }))
    }

    async fn latest_open_time(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<Option<DateTime<Utc>>> {
        self.with_series(symbol, interval, |it| it.last().map(|c| c.candle.open_time))
            .await
    }

    async fn load_series(&self, symbol: &str, interval: Interval) -> Result<Vec<AnnotatedCandle>> {
        self.with_series(symbol, interval, |it| it.cloned().collect())
            .await
    }

    async fn load_range(
        &self,
        symbol: &str,
        interval: Interval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AnnotatedCandle>> {
        self.with_series(symbol, interval, |it| {
            it.filter(|c| c.candle.open_time >= from && c.candle.open_time <= to)
                .cloned()
                .collect()
        })
        .await
    }

    async fn count(&self, symbol: &str, interval: Interval) -> Result<i64> {
        self.with_series(symbol, interval, |it| it.count() as i64)
            .await
    }
}

struct MemorySession {
    inner: Arc<RwLock<Inner>>,
}

#[async_trait]
impl SeriesSession for MemorySession {
    async fn insert(
        &mut self,
        symbol: &str,
        interval: Interval,
        candle: &AnnotatedCandle,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let open_time = candle.candle.open_time;

        if inner.failing.contains(&open_time) {
            return Err(DataError::QueryError(format!(
                "injected failure at {}",
                open_time
            )));
        }

        let series = inner
            .tables
            .get_mut(symbol)
            .ok_or_else(|| DataError::NotFound(format!("relation \"{}\" does not exist", symbol)))?;

        if series.contains_key(&(interval, open_time)) {
            return Err(DataError::DuplicateError(format!(
                "duplicate key (open_time, duration)=({}, {})",
                open_time,
                interval.tag()
            )));
        }
        series.insert((interval, open_time), candle.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use kline_core::Candle;
    use rust_decimal::Decimal;

    fn candle(day: u32) -> AnnotatedCandle {
        let t = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
        let p = Decimal::from(100 + day);
        Candle::new(t, p, p, p, p, Decimal::ONE, p).annotate()
    }

    #[tokio::test]
    async fn test_duplicate_is_reported() {
        let store = MemoryStore::new();
        store.create_table("BTCUSDT").await.unwrap();
        let mut session = store.open_session().await.unwrap();

        session.insert("BTCUSDT", Interval::D1, &candle(1)).await.unwrap();
        let err = session
            .insert("BTCUSDT", Interval::D1, &candle(1))
            .await
            .unwrap_err();
        assert!(err.is_duplicate());

        // 같은 시작 시간이라도 간격이 다르면 다른 키
        session.insert("BTCUSDT", Interval::H4, &candle(1)).await.unwrap();
        assert_eq!(store.count("BTCUSDT", Interval::D1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_table_is_not_found() {
        let store = MemoryStore::new();
        assert!(!store.table_exists("ETHUSDT").await.unwrap());
        assert!(matches!(
            store.latest_open_time("ETHUSDT", Interval::D1).await,
            Err(DataError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reads_are_ordered_by_interval() {
        let store = MemoryStore::new();
        store.create_table("BTCUSDT").await.unwrap();
        let mut session = store.open_session().await.unwrap();
        for day in [3, 1, 2] {
            session.insert("BTCUSDT", Interval::D1, &candle(day)).await.unwrap();
        }
        session.insert("BTCUSDT", Interval::W1, &candle(9)).await.unwrap();

        let series = store.load_series("BTCUSDT", Interval::D1).await.unwrap();
        let days: Vec<u32> = series
            .iter()
            .map(|c| chrono::Datelike::day(&c.candle.open_time))
            .collect();
        assert_eq!(days, vec![1, 2, 3]);
        assert_eq!(
            store.latest_open_time("BTCUSDT", Interval::D1).await.unwrap(),
            Some(candle(3).candle.open_time)
        );

        let range = store
            .load_range(
                "BTCUSDT",
                Interval::D1,
                candle(2).candle.open_time,
                candle(3).candle.open_time,
            )
            .await
            .unwrap();
        assert_eq!(range.len(), 2);
        assert!(store.remove("BTCUSDT", Interval::D1, candle(2).candle.open_time).await);
        assert_eq!(store.count("BTCUSDT", Interval::D1).await.unwrap(), 2);
    }
}
