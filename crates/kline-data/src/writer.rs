//! 동시성 제한 일괄 저장기.
//!
//! # 동작 방식
//!
//! 1. 배치를 연속된 하위 구간으로 나눕니다 (작업당 최소 `rows_per_task`행,
//!    작업 수는 `max_tasks` 이하).
//! 2. 하위 구간마다 작업 하나가 공유 세마포어의 permit을 잡고 세션을 엽니다.
//!    permit은 작업이 끝날 때까지 유지됩니다.
//! 3. 행 단위로 삽입합니다. 첫 키 충돌에서 멈추고 나머지 행은 이미 저장된 것으로
//!    간주합니다. 그 밖의 오류는 작업 실패로 전파됩니다.
//! 4. 모든 행이 "처리됨"(삽입 또는 충돌)으로 표시되지 않으면 실패합니다.

use crate::error::{DataError, Result};
use crate::storage::SeriesStore;
use kline_core::{AnnotatedCandle, Interval};
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument};

/// 기본 쓰기 permit 수 (최대 DB 연결 수 - 1).
pub const DEFAULT_WRITER_PERMITS: usize = 12;

/// 삽입 작업 분할 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertPolicy {
    /// 작업당 최소 행 수
    pub rows_per_task: usize,
    /// 최대 작업 수
    pub max_tasks: usize,
}

impl Default for InsertPolicy {
    fn default() -> Self {
        Self {
            rows_per_task: 2000,
            max_tasks: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

impl InsertPolicy {
    /// `rows`행 배치의 작업 수. 빈 배치는 0.
    pub fn task_count(&self, rows: usize) -> usize {
        if rows == 0 {
            return 0;
        }
        (rows / self.rows_per_task.max(1)).clamp(1, self.max_tasks.max(1))
    }

    /// 겹치지 않는 연속 하위 구간으로 나눕니다.
    pub fn split(&self, rows: usize) -> Vec<Range<usize>> {
        let tasks = self.task_count(rows);
        if tasks == 0 {
            return Vec::new();
        }

        let chunk = rows.div_ceil(tasks);
        (0..rows)
            .step_by(chunk)
            .map(|start| start..(start + chunk).min(rows))
            .collect()
    }
}

/// 삽입 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertReport {
    /// 새로 삽입된 행
    pub inserted: usize,
    /// 충돌로 이미 있다고 판단한 행
    pub already_present: usize,
    /// 작업 수
    pub tasks: usize,
}

struct TaskOutcome {
    range: Range<usize>,
    inserted: usize,
}

/// 동시성 제한 일괄 저장기.
///
/// 세마포어는 모든 심볼이 공유합니다. 저장소 연결을 잡는 쓰기는 반드시 permit을
/// 가진 상태에서 일어납니다.
#[derive(Clone)]
pub struct BulkWriter {
    store: Arc<dyn SeriesStore>,
    permits: Arc<Semaphore>,
    policy: InsertPolicy,
}

impl BulkWriter {
    pub fn new(store: Arc<dyn SeriesStore>, permits: Arc<Semaphore>, policy: InsertPolicy) -> Self {
        Self {
            store,
            permits,
            policy,
        }
    }

    /// 공유 세마포어 생성.
    pub fn shared_permits(permits: usize) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(permits.max(1)))
    }

    pub fn policy(&self) -> &InsertPolicy {
        &self.policy
    }

    /// 배치를 저장하고 새로 삽입된 행 수를 보고합니다.
    ///
    /// 같은 배치를 여러 번 넣어도 결과 행 수는 같습니다.
    #[instrument(skip(self, candles), fields(rows = candles.len()))]
    pub async fn insert(
        &self,
        symbol: &str,
        interval: Interval,
        candles: Vec<AnnotatedCandle>,
    ) -> Result<InsertReport> {
        let total = candles.len();
        if total == 0 {
            return Ok(InsertReport::default());
        }

        let started = Instant::now();
        let candles = Arc::new(candles);
        let ranges = self.policy.split(total);
        let tasks = ranges.len();

        let mut set = JoinSet::new();
        for range in ranges {
            let store = Arc::clone(&self.store);
            let permits = Arc::clone(&self.permits);
            let candles = Arc::clone(&candles);
            let symbol = symbol.to_string();

            set.spawn(async move {
                // permit은 작업이 끝날 때(성공, 충돌, 오류) drop된다
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| DataError::InsertError(format!("세마포어 닫힘: {}", e)))?;
                write_range(store.as_ref(), &symbol, interval, &candles[range.clone()])
                    .await
                    .map(|inserted| TaskOutcome { range, inserted })
            });
        }

        let mut handled = vec![false; total];
        let mut inserted = 0;
        let mut first_error: Option<DataError> = None;

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(outcome)) => {
                    inserted += outcome.inserted;
                    handled[outcome.range].fill(true);
                }
                Ok(Err(e)) => {
                    error!(symbol, interval = %interval, error = %e, "삽입 작업 실패");
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    error!(symbol, interval = %interval, error = %e, "삽입 작업 중단");
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        let unhandled = handled.iter().filter(|h| !**h).count();
        if unhandled > 0 {
            return Err(DataError::IncompleteInsert { unhandled, total });
        }

        let report = InsertReport {
            inserted,
            already_present: total - inserted,
            tasks,
        };

        info!(
            symbol,
            interval = %interval,
            inserted = report.inserted,
            already_present = report.already_present,
            tasks,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "캔들 저장 완료"
        );

        Ok(report)
    }
}

/// 하위 구간 하나를 삽입합니다. 첫 충돌에서 멈춥니다.
async fn write_range(
    store: &dyn SeriesStore,
    symbol: &str,
    interval: Interval,
    rows: &[AnnotatedCandle],
) -> Result<usize> {
    let mut session = store.open_session().await?;
    let mut inserted = 0;

    for candle in rows {
        match session.insert(symbol, interval, candle).await {
            Ok(()) => inserted += 1,
            Err(e) if e.is_duplicate() => {
                debug!(
                    symbol,
                    open_time = %candle.candle.open_time,
                    remaining = rows.len() - inserted,
                    "기존 행과 충돌, 나머지 구간은 저장된 것으로 간주"
                );
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_batch_is_single_task() {
        let policy = InsertPolicy {
            rows_per_task: 2000,
            max_tasks: 8,
        };
        assert_eq!(policy.split(0), Vec::<Range<usize>>::new());
        assert_eq!(policy.split(10), vec![0..10]);
        assert_eq!(policy.split(3999), vec![0..3999]);
    }

    #[test]
    fn test_split_is_contiguous_and_bounded() {
        let policy = InsertPolicy {
            rows_per_task: 2000,
            max_tasks: 4,
        };

        let ranges = policy.split(9_000);
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges.first().map(|r| r.start), Some(0));
        assert_eq!(ranges.last().map(|r| r.end), Some(9_000));
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert!(ranges.iter().all(|r| r.len() >= 2000));

        let capped = policy.split(100_000);
        assert_eq!(capped.len(), 4);
    }
}
