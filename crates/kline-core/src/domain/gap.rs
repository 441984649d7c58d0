//! 연속성 검증기가 보고하는 갭.

use crate::types::Interval;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 인접해야 하지만 인접하지 않은 두 캔들 사이의 불연속 구간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gap {
    /// 갭 직전 캔들의 시작 시간
    pub previous: DateTime<Utc>,
    /// 갭 직후 캔들의 시작 시간
    pub next: DateTime<Utc>,
    /// 시계열 간격
    pub interval: Interval,
}

impl Gap {
    /// 새 갭을 생성합니다.
    pub fn new(previous: DateTime<Utc>, next: DateTime<Utc>, interval: Interval) -> Self {
        Self {
            previous,
            next,
            interval,
        }
    }

    /// 다시 가져와야 할 구간 `[previous + 1스텝, next - 1스텝]`.
    ///
    /// 양 끝 캔들은 이미 존재하므로 제외합니다.
    pub fn missing_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.interval.next_open(self.previous),
            self.interval.prev_open(self.next),
        )
    }
}

impl fmt::Display for Gap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.previous, self.next, self.interval)
    }
}
