//! 수집 계획: 구간을 병렬 하위 구간으로 나눕니다.

use chrono::{DateTime, Utc};
use kline_core::Interval;
use kline_exchange::RetryPolicy;
use std::time::Duration;

/// 수집 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// 요청당 최대 캔들 수
    pub page_limit: u32,
    /// 작업당 캔들 수 (작업 수 계산용)
    pub records_per_task: i64,
    /// 최대 동시 작업 수
    pub max_tasks: usize,
    /// 원격 호출 기한과 하위 구간 재시도
    pub retry: RetryPolicy,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            page_limit: 1000,
            records_per_task: 1000,
            max_tasks: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            retry: RetryPolicy::new(3, Duration::from_secs(50)),
        }
    }
}

impl FetchPolicy {
    /// 예상 레코드 수에 대한 작업 수.
    ///
    /// 불규칙 간격이거나 작은 구간은 단일 작업입니다.
    pub fn task_count(&self, interval: Interval, estimated: i64) -> usize {
        if interval.is_irregular() || estimated <= self.records_per_task {
            return 1;
        }
        let per_task = self.records_per_task.max(1);
        let needed = (estimated + per_task - 1) / per_task;
        usize::try_from(needed)
            .unwrap_or(usize::MAX)
            .clamp(1, self.max_tasks.max(1))
    }
}

/// 하위 구간 `[start, end]` (양 끝 포함).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub index: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// 한 번의 수집 호출에 대한 불변 계획.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub symbol: String,
    pub interval: Interval,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// 기준 시각. 이 시각까지 마감되지 않은 캔들은 버립니다.
    pub as_of: DateTime<Utc>,
    pub estimated_records: i64,
    /// 하위 구간 시작점 (오름차순)
    pub starts: Vec<DateTime<Utc>>,
}

impl FetchPlan {
    pub fn new(
        symbol: impl Into<String>,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        as_of: DateTime<Utc>,
        policy: &FetchPolicy,
    ) -> Self {
        // 격자 밖 시작점은 첫 경계로 올려 하위 구간 경계가 캔들 시작과 맞게 한다
        let start = interval.ceil(start);
        let end = end.min(as_of);
        let estimated_records = interval.estimate_records(start, end);
        let tasks = policy.task_count(interval, estimated_records) as i64;

        // i번째 작업은 floor(records * i / tasks) 스텝 지점에서 시작한다
        let starts = (0..tasks)
            .map(|i| {
                let offset = estimated_records * i / tasks;
                interval.advance(start, u32::try_from(offset).unwrap_or(u32::MAX))
            })
            .collect();

        Self {
            symbol: symbol.into(),
            interval,
            start,
            end,
            as_of,
            estimated_records,
            starts,
        }
    }

    pub fn task_count(&self) -> usize {
        self.starts.len()
    }

    /// 비어 있는 구간 (`start > end`) 인지 확인.
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// 하위 구간 목록. 인접 구간은 겹치지 않습니다.
    pub fn windows(&self) -> Vec<FetchWindow> {
        if self.is_empty() {
            return Vec::new();
        }

        self.starts
            .iter()
            .enumerate()
            .map(|(index, &start)| {
                let end = match self.starts.get(index + 1) {
                    Some(&next) => self.interval.prev_open(next),
                    None => self.end,
                };
                FetchWindow { index, start, end }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn policy(max_tasks: usize) -> FetchPolicy {
        FetchPolicy {
            max_tasks,
            ..Default::default()
        }
    }

    #[test]
    fn test_small_range_is_single_window() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = start + ChronoDuration::minutes(500);
        let plan = FetchPlan::new("BTCUSDT", Interval::M1, start, end, end, &policy(8));

        assert_eq!(plan.task_count(), 1);
        assert_eq!(
            plan.windows(),
            vec![FetchWindow {
                index: 0,
                start,
                end
            }]
        );
    }

    #[test]
    fn test_irregular_interval_is_single_window() {
        let start = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let plan = FetchPlan::new("BTCUSDT", Interval::W1, start, end, end, &policy(8));
        assert_eq!(plan.task_count(), 1);
    }

    #[test]
    fn test_large_range_is_split_on_step_boundaries() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = start + ChronoDuration::minutes(10_000);
        let plan = FetchPlan::new("BTCUSDT", Interval::M1, start, end, end, &policy(4));

        assert_eq!(plan.estimated_records, 10_000);
        assert_eq!(plan.task_count(), 4);

        let windows = plan.windows();
        assert_eq!(windows[0].start, start);
        assert_eq!(windows[1].start, start + ChronoDuration::minutes(2_500));
        assert_eq!(windows[0].end, start + ChronoDuration::minutes(2_499));
        assert_eq!(windows[3].end, end);
    }

    #[test]
    fn test_unaligned_start_keeps_windows_on_grid() {
        let start = Utc.with_ymd_and_hms(2023, 12, 31, 8, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 31, 1, 0, 0).unwrap();
        let plan = FetchPlan::new(
            "BTCUSDT",
            Interval::D1,
            start,
            end,
            end,
            &FetchPolicy {
                records_per_task: 5,
                ..policy(4)
            },
        );

        let windows = plan.windows();
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0].start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        for w in &windows {
            assert_eq!(Interval::D1.floor(w.start), w.start);
        }
        for pair in windows.windows(2) {
            assert_eq!(Interval::D1.next_open(pair[0].end), pair[1].start);
        }
    }

    #[test]
    fn test_end_is_clamped_to_as_of() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let as_of = start + ChronoDuration::hours(1);
        let plan = FetchPlan::new(
            "BTCUSDT",
            Interval::M1,
            start,
            as_of + ChronoDuration::days(1),
            as_of,
            &policy(4),
        );
        assert_eq!(plan.end, as_of);
        assert_eq!(plan.task_count(), 1);
    }

    #[test]
    fn test_inverted_range_has_no_windows() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let plan = FetchPlan::new("BTCUSDT", Interval::D1, start, end, start, &policy(4));
        assert!(plan.is_empty());
        assert!(plan.windows().is_empty());
    }
}
