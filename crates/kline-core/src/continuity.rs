//! 연속성 검증기.
//!
//! 시계열을 시작 시간 기준으로 정렬하고 중복을 제거한 뒤, 인접한 두 캔들이
//! 정확히 한 스텝 떨어져 있는지 확인합니다. 갭을 만나도 검사를 멈추지 않고
//! 모든 갭을 보고합니다.

use crate::domain::{Gap, OpenTime};
use crate::types::Interval;
use tracing::{info, warn};

/// 검증된 시계열.
///
/// `candles`는 시작 시간 오름차순이며 중복이 없습니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T> {
    pub candles: Vec<T>,
    pub gaps: Vec<Gap>,
    pub interval: Interval,
}

impl<T: OpenTime> Validated<T> {
    /// 갭이 없는지 확인합니다.
    pub fn is_continuous(&self) -> bool {
        self.gaps.is_empty()
    }

    /// 갭 경계에서 잘라낸 연속 구간들.
    ///
    /// 지표는 구간마다 따로 계산해야 갭을 가로지르는 값이 생기지 않습니다.
    pub fn contiguous_runs(self) -> Vec<Vec<T>> {
        let interval = self.interval;
        let mut runs: Vec<Vec<T>> = Vec::new();
        let mut current: Vec<T> = Vec::new();

        for candle in self.candles {
            if let Some(last) = current.last() {
                if interval.next_open(last.open_time()) != candle.open_time() {
                    runs.push(std::mem::take(&mut current));
                }
            }
            current.push(candle);
        }
        if !current.is_empty() {
            runs.push(current);
        }
        runs
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

/// 정렬, 중복 제거 후 갭을 탐지합니다.
///
/// 같은 시작 시간이 여러 번 나오면 먼저 나온 것을 남깁니다.
pub fn validate<T: OpenTime>(mut candles: Vec<T>, interval: Interval) -> Validated<T> {
    candles.sort_by_key(|c| c.open_time());
    candles.dedup_by_key(|c| c.open_time());

    let gaps = scan(&candles, interval);

    if gaps.is_empty() {
        info!(
            interval = %interval,
            count = candles.len(),
            "data is full"
        );
    } else {
        for gap in &gaps {
            warn!(
                interval = %interval,
                previous = %gap.previous,
                next = %gap.next,
                "시계열 갭 발견"
            );
        }
    }

    Validated {
        candles,
        gaps,
        interval,
    }
}

/// 이미 정렬된 시계열의 갭만 계산합니다. 로그를 남기지 않습니다.
pub fn find_gaps<T: OpenTime>(candles: &[T], interval: Interval) -> Vec<Gap> {
    scan(candles, interval)
}

fn scan<T: OpenTime>(candles: &[T], interval: Interval) -> Vec<Gap> {
    candles
        .windows(2)
        .filter_map(|pair| {
            let previous = pair[0].open_time();
            let next = pair[1].open_time();
            (interval.next_open(previous) != next).then(|| Gap::new(previous, next, interval))
        })
        .collect()
}
