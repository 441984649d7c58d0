//! 심볼 단위 정합(reconciliation).
//!
//! 심볼마다 `Uninitialized → Backfilling(interval) → CaughtUp → Idle` 순서로
//! 진행하고, 유지보수 주기마다 다시 들어옵니다.
//!
//! 한 패스는 추적 간격마다 다음을 수행합니다:
//! 1. 최신 저장 캔들 이후 마감된 구간을 가져와 저장 (저장된 행이 없으면 상장일부터 백필)
//! 2. 저장된 전체 시계열의 갭을 찾아 갭 안쪽 구간만 다시 가져와 저장
//!
//! 새로 채운 행도 갭도 없는 패스가 나오면 수렴한 것으로 봅니다.

use crate::config::CollectorConfig;
use crate::Result;
use chrono::{DateTime, Utc};
use kline_core::{
    validate, AnnotatedCandle, Candle, IndicatorEngine, IndicatorParams, Interval,
    TaIndicatorEngine, Validated,
};
use kline_data::{BulkWriter, SchemaManager, SeriesStore, WindowedFetcher};
use kline_exchange::{with_retry, MarketDataSource};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// 심볼 정합 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesState {
    /// 테이블 없음
    Uninitialized,
    /// 해당 간격을 가져오는 중
    Backfilling(Interval),
    /// 마지막 패스에서 채울 것도 갭도 없었음
    CaughtUp,
    /// 다음 주기 대기
    Idle,
}

impl fmt::Display for SeriesState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesState::Uninitialized => write!(f, "uninitialized"),
            SeriesState::Backfilling(interval) => write!(f, "backfilling({})", interval),
            SeriesState::CaughtUp => write!(f, "caught_up"),
            SeriesState::Idle => write!(f, "idle"),
        }
    }
}

/// 정합 설정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// 추적 간격
    pub intervals: Vec<Interval>,
    /// 심볼당 주기별 최대 패스 수
    pub max_passes: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            intervals: crate::config::DEFAULT_INTERVALS.to_vec(),
            max_passes: 5,
        }
    }
}

/// 심볼 하나의 정합 결과.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolReport {
    /// 이번에 테이블을 새로 만들었는지
    pub created: bool,
    /// 새로 저장된 행 수 (백필 + 추격 + 갭 보충)
    pub inserted: usize,
    /// 패스마다 발견한 갭 수의 합
    pub gaps_found: usize,
    /// 행이 하나 이상 채워진 갭 수
    pub gaps_repaired: usize,
    /// 실행한 패스 수
    pub passes: usize,
    /// 채울 것도 갭도 없는 패스로 끝났는지
    pub converged: bool,
}

#[derive(Debug, Default)]
struct PassOutcome {
    filled: usize,
    gaps_found: usize,
    gaps_repaired: usize,
}

/// 정합 실행기.
#[derive(Clone)]
pub struct Reconciler {
    fetcher: WindowedFetcher,
    store: Arc<dyn SeriesStore>,
    schema: SchemaManager,
    writer: BulkWriter,
    indicators: Arc<dyn IndicatorEngine>,
    options: ReconcileOptions,
    states: Arc<RwLock<HashMap<String, SeriesState>>>,
}

impl Reconciler {
    pub fn new(
        fetcher: WindowedFetcher,
        store: Arc<dyn SeriesStore>,
        writer: BulkWriter,
        indicators: Arc<dyn IndicatorEngine>,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            fetcher,
            schema: SchemaManager::new(Arc::clone(&store)),
            store,
            writer,
            indicators,
            options,
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 설정에서 수집기, 저장기, 기본 지표 엔진을 조립합니다.
    pub fn from_config(
        config: &CollectorConfig,
        source: Arc<dyn MarketDataSource>,
        store: Arc<dyn SeriesStore>,
    ) -> Result<Self> {
        let fetcher = WindowedFetcher::new(source, config.fetch);
        let writer = BulkWriter::new(
            Arc::clone(&store),
            BulkWriter::shared_permits(config.store.writer_permits),
            config.insert,
        );
        let indicators = Arc::new(TaIndicatorEngine::new(IndicatorParams::default())?);

        Ok(Self::new(
            fetcher,
            store,
            writer,
            indicators,
            config.reconcile.clone(),
        ))
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    pub fn source(&self) -> &Arc<dyn MarketDataSource> {
        self.fetcher.source()
    }

    pub fn store(&self) -> &Arc<dyn SeriesStore> {
        &self.store
    }

    /// 심볼의 현재 상태. 한 번도 다루지 않은 심볼은 `None`.
    pub async fn state(&self, symbol: &str) -> Option<SeriesState> {
        self.states.read().await.get(symbol).copied()
    }

    /// 모든 심볼을 `Idle`로 돌립니다 (주기 종료).
    pub async fn park_all(&self) {
        let mut states = self.states.write().await;
        for state in states.values_mut() {
            *state = SeriesState::Idle;
        }
    }

    async fn set_state(&self, symbol: &str, state: SeriesState) {
        debug!(symbol, state = %state, "상태 전이");
        self.states.write().await.insert(symbol.to_string(), state);
    }

    /// 백필 시작 시각 (상장 시각 하루 전).
    pub async fn listing_date(&self, symbol: &str) -> Result<DateTime<Utc>> {
        let source: &dyn MarketDataSource = self.fetcher.source().as_ref();
        let info = with_retry(&self.fetcher.policy().retry, "instrument_info", move || {
            source.instrument_info(symbol)
        })
        .await?;
        Ok(info.listing_date())
    }

    /// 테이블이 없으면 만들고 모든 추적 간격을 상장일부터 백필합니다.
    ///
    /// 테이블이 이미 있으면 아무것도 하지 않습니다 (`created == false`).
    #[instrument(skip(self))]
    pub async fn initialize(&self, symbol: &str, as_of: DateTime<Utc>) -> Result<SymbolReport> {
        let mut report = SymbolReport::default();
        if !self.schema.ensure_table(symbol).await? {
            return Ok(report);
        }

        report.created = true;
        self.set_state(symbol, SeriesState::Uninitialized).await;

        let listing = self.listing_date(symbol).await?;
        for &interval in &self.options.intervals {
            report.inserted += self.backfill(symbol, interval, listing, as_of).await?;
        }

        info!(symbol, inserted = report.inserted, "초기 백필 완료");
        Ok(report)
    }

    /// 초기화, 추격, 갭 보충을 수렴할 때까지 반복합니다.
    ///
    /// 한 패스가 아무것도 채우지 못했는데 갭이 남아 있으면 원격에도 없는 구간으로
    /// 보고 멈춥니다. 어떤 경우에도 `max_passes`를 넘지 않습니다.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, symbol: &str, as_of: DateTime<Utc>) -> Result<SymbolReport> {
        let mut report = self.initialize(symbol, as_of).await?;
        let max_passes = self.options.max_passes.max(1);

        for pass in 1..=max_passes {
            let outcome = self.run_pass(symbol, as_of).await?;
            report.passes = pass;
            report.inserted += outcome.filled;
            report.gaps_found += outcome.gaps_found;
            report.gaps_repaired += outcome.gaps_repaired;

            if outcome.filled == 0 && outcome.gaps_found == 0 {
                report.converged = true;
                break;
            }
            if outcome.filled == 0 {
                warn!(
                    symbol,
                    gaps = outcome.gaps_found,
                    "원격에서도 채울 수 없는 갭, 다음 주기에 재시도"
                );
                break;
            }
        }

        if report.converged {
            self.set_state(symbol, SeriesState::CaughtUp).await;
        } else if report.passes == max_passes {
            warn!(symbol, passes = max_passes, "최대 패스 도달, 다음 주기에 계속");
        }

        info!(
            symbol,
            inserted = report.inserted,
            gaps_found = report.gaps_found,
            gaps_repaired = report.gaps_repaired,
            passes = report.passes,
            converged = report.converged,
            "정합 완료"
        );
        Ok(report)
    }

    async fn run_pass(&self, symbol: &str, as_of: DateTime<Utc>) -> Result<PassOutcome> {
        let mut outcome = PassOutcome::default();

        for &interval in &self.options.intervals {
            outcome.filled += self.catch_up(symbol, interval, as_of).await?;

            let swept = self.sweep_gaps(symbol, interval, as_of).await?;
            outcome.filled += swept.filled;
            outcome.gaps_found += swept.gaps_found;
            outcome.gaps_repaired += swept.gaps_repaired;
        }

        Ok(outcome)
    }

    /// 상장일부터 `as_of`까지 전체 이력. 가져온 것이 없으면 건너뜁니다.
    async fn backfill(
        &self,
        symbol: &str,
        interval: Interval,
        listing: DateTime<Utc>,
        as_of: DateTime<Utc>,
    ) -> Result<usize> {
        self.set_state(symbol, SeriesState::Backfilling(interval)).await;

        let fetched = self.fetcher.fetch(symbol, interval, listing, as_of, as_of).await;
        if fetched.is_empty() {
            info!(symbol, interval = %interval, "가져온 이력 없음, 건너뜀");
            return Ok(0);
        }

        self.store_series(symbol, interval, fetched).await
    }

    /// 최신 저장 캔들 이후의 마감 구간.
    async fn catch_up(&self, symbol: &str, interval: Interval, as_of: DateTime<Utc>) -> Result<usize> {
        let Some(latest) = self.store.latest_open_time(symbol, interval).await? else {
            let listing = self.listing_date(symbol).await?;
            return self.backfill(symbol, interval, listing, as_of).await;
        };

        let from = interval.next_open(latest);
        // 다음 캔들이 아직 마감되지 않았으면 가져올 것이 없다
        if interval.next_open(from) > as_of {
            return Ok(0);
        }

        self.set_state(symbol, SeriesState::Backfilling(interval)).await;
        let fetched = self.fetcher.fetch(symbol, interval, from, as_of, as_of).await;
        self.store_series(symbol, interval, fetched).await
    }

    /// 저장된 전체 시계열의 갭을 찾아 안쪽 구간만 다시 가져옵니다.
    async fn sweep_gaps(
        &self,
        symbol: &str,
        interval: Interval,
        as_of: DateTime<Utc>,
    ) -> Result<PassOutcome> {
        let stored = self.store.load_series(symbol, interval).await?;
        let validated = validate(stored, interval);

        let mut outcome = PassOutcome {
            gaps_found: validated.gaps.len(),
            ..Default::default()
        };

        for gap in &validated.gaps {
            let (from, to) = gap.missing_range();
            let fetched = self.fetcher.fetch(symbol, interval, from, to, as_of).await;
            let inserted = self.store_series(symbol, interval, fetched).await?;

            if inserted > 0 {
                outcome.filled += inserted;
                outcome.gaps_repaired += 1;
            } else {
                debug!(symbol, interval = %interval, gap = %gap, "갭 보충 실패");
            }
        }

        Ok(outcome)
    }

    /// 연속 구간마다 주석과 지표를 붙여 저장합니다.
    async fn store_series(
        &self,
        symbol: &str,
        interval: Interval,
        fetched: Validated<Candle>,
    ) -> Result<usize> {
        let mut inserted = 0;
        for run in fetched.contiguous_runs() {
            let rows = self.with_indicators(symbol, interval, run).await?;
            inserted += self.writer.insert(symbol, interval, rows).await?.inserted;
        }
        Ok(inserted)
    }

    /// 저장된 직전 캔들을 워밍업 구간으로 앞에 붙여 지표를 계산하고 다시 떼어냅니다.
    async fn with_indicators(
        &self,
        symbol: &str,
        interval: Interval,
        run: Vec<Candle>,
    ) -> Result<Vec<AnnotatedCandle>> {
        let Some(first) = run.first().map(|c| c.open_time) else {
            return Ok(Vec::new());
        };

        let warm_up = self.indicators.warm_up();
        let context = if warm_up == 0 {
            Vec::new()
        } else {
            let to = interval.prev_open(first);
            let from = (1..warm_up).fold(to, |t, _| interval.prev_open(t));
            let stored = self.store.load_range(symbol, interval, from, to).await?;
            leading_context(stored, interval, first)
        };

        let skip = context.len();
        let mut rows = context;
        rows.extend(run.into_iter().map(Candle::annotate));

        let mut annotated = self.indicators.annotate(rows);
        Ok(annotated.split_off(skip.min(annotated.len())))
    }
}

/// `first` 바로 앞에서 끝나는 연속 꼬리만 남깁니다.
fn leading_context(
    mut stored: Vec<AnnotatedCandle>,
    interval: Interval,
    first: DateTime<Utc>,
) -> Vec<AnnotatedCandle> {
    let mut expected = interval.prev_open(first);
    let mut keep = 0;

    for candle in stored.iter().rev() {
        if candle.candle.open_time != expected {
            break;
        }
        keep += 1;
        expected = interval.prev_open(expected);
    }

    stored.split_off(stored.len() - keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;

    fn annotated(t: DateTime<Utc>) -> AnnotatedCandle {
        let p = Decimal::ONE_HUNDRED;
        Candle::new(t, p, p, p, p, Decimal::ONE, p).annotate()
    }

    #[test]
    fn test_leading_context_keeps_adjacent_tail() {
        let first = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let day = |n: i64| first - Duration::days(n);

        // day(4)와 day(2) 사이가 끊겨 있다
        let stored = vec![annotated(day(5)), annotated(day(4)), annotated(day(2)), annotated(day(1))];
        let context = leading_context(stored, Interval::D1, first);

        let opens: Vec<_> = context.iter().map(|c| c.candle.open_time).collect();
        assert_eq!(opens, vec![day(2), day(1)]);
    }

    #[test]
    fn test_leading_context_requires_adjacency() {
        let first = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let stored = vec![annotated(first - Duration::days(3))];
        assert!(leading_context(stored, Interval::D1, first).is_empty());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SeriesState::Backfilling(Interval::H4).to_string(), "backfilling(4h)");
        assert_eq!(SeriesState::CaughtUp.to_string(), "caught_up");
    }
}
