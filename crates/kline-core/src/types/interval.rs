//! 캔들 시계열의 간격(스텝) 정의.
//!
//! 고정 길이 간격(분/시간/일)과 두 개의 불규칙 간격을 다룹니다:
//! - 주봉: 달력 기준 +7일
//! - 월봉: 달력 기준 +1개월

use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 캔들 간격.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    /// 1분봉
    M1,
    /// 3분봉
    M3,
    /// 5분봉
    M5,
    /// 15분봉
    M15,
    /// 30분봉
    M30,
    /// 1시간봉
    H1,
    /// 2시간봉
    H2,
    /// 4시간봉
    H4,
    /// 6시간봉
    H6,
    /// 12시간봉
    H12,
    /// 일봉
    D1,
    /// 주봉
    W1,
    /// 월봉
    MN1,
}

impl Interval {
    /// 지원하는 모든 간격.
    pub const ALL: [Interval; 13] = [
        Interval::M1,
        Interval::M3,
        Interval::M5,
        Interval::M15,
        Interval::M30,
        Interval::H1,
        Interval::H2,
        Interval::H4,
        Interval::H6,
        Interval::H12,
        Interval::D1,
        Interval::W1,
        Interval::MN1,
    ];

    /// 고정 길이 간격의 분 단위 길이. 주봉/월봉은 `None`.
    pub fn fixed_minutes(&self) -> Option<i64> {
        match self {
            Interval::M1 => Some(1),
            Interval::M3 => Some(3),
            Interval::M5 => Some(5),
            Interval::M15 => Some(15),
            Interval::M30 => Some(30),
            Interval::H1 => Some(60),
            Interval::H2 => Some(2 * 60),
            Interval::H4 => Some(4 * 60),
            Interval::H6 => Some(6 * 60),
            Interval::H12 => Some(12 * 60),
            Interval::D1 => Some(24 * 60),
            Interval::W1 | Interval::MN1 => None,
        }
    }

    /// 달력 연산이 필요한 불규칙 간격인지 확인합니다.
    pub fn is_irregular(&self) -> bool {
        self.fixed_minutes().is_none()
    }

    /// 다음 캔들의 시작 시간.
    pub fn next_open(&self, open_time: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Interval::W1 => open_time + Duration::days(7),
            Interval::MN1 => open_time
                .checked_add_months(Months::new(1))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            fixed => open_time + Duration::minutes(fixed.fixed_minutes().unwrap_or(1)),
        }
    }

    /// 이전 캔들의 시작 시간.
    pub fn prev_open(&self, open_time: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Interval::W1 => open_time - Duration::days(7),
            Interval::MN1 => open_time
                .checked_sub_months(Months::new(1))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            fixed => open_time - Duration::minutes(fixed.fixed_minutes().unwrap_or(1)),
        }
    }

    /// `t`가 속한 캔들의 시작 시간 (간격 경계로 내림).
    ///
    /// 주봉은 월요일 00:00, 월봉은 매월 1일 00:00에 시작합니다.
    pub fn floor(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let secs = t.timestamp();
        let floored = match self {
            Interval::MN1 => {
                return Utc
                    .with_ymd_and_hms(t.year(), t.month(), 1, 0, 0, 0)
                    .single()
                    .unwrap_or(t);
            }
            // 1970-01-05가 월요일
            Interval::W1 => secs - (secs - 4 * 86_400).rem_euclid(7 * 86_400),
            fixed => {
                let step = fixed.fixed_minutes().unwrap_or(1) * 60;
                secs - secs.rem_euclid(step)
            }
        };
        DateTime::from_timestamp(floored, 0).unwrap_or(t)
    }

    /// 간격 경계로 올림. 이미 경계면 그대로입니다.
    pub fn ceil(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let floored = self.floor(t);
        if floored < t {
            self.next_open(floored)
        } else {
            floored
        }
    }

    /// `steps`번 다음 캔들로 이동한 시작 시간.
    pub fn advance(&self, open_time: DateTime<Utc>, steps: u32) -> DateTime<Utc> {
        match self.fixed_minutes() {
            Some(minutes) => open_time + Duration::minutes(minutes * i64::from(steps)),
            None => (0..steps).fold(open_time, |t, _| self.next_open(t)),
        }
    }

    /// 레코드 수 추정용 근사 길이 (월봉은 30일).
    pub fn approx_duration(&self) -> Duration {
        match self {
            Interval::W1 => Duration::days(7),
            Interval::MN1 => Duration::days(30),
            fixed => Duration::minutes(fixed.fixed_minutes().unwrap_or(1)),
        }
    }

    /// `[start, end)` 구간에 들어가는 캔들 수 추정치.
    pub fn estimate_records(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        let span = (end - start).num_seconds();
        if span <= 0 {
            return 0;
        }
        span / self.approx_duration().num_seconds().max(1)
    }

    /// 저장소에서 `interval` 타입으로 캐스팅되는 구분 태그.
    pub fn tag(&self) -> &'static str {
        match self {
            Interval::M1 => "1M",
            Interval::M3 => "3M",
            Interval::M5 => "5M",
            Interval::M15 => "15M",
            Interval::M30 => "30M",
            Interval::H1 => "1H",
            Interval::H2 => "2H",
            Interval::H4 => "4H",
            Interval::H6 => "6H",
            Interval::H12 => "12H",
            Interval::D1 => "1D",
            Interval::W1 => "1W",
            Interval::MN1 => "1MON",
        }
    }

    /// 태그에서 간격을 찾습니다.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.tag() == tag)
    }

    /// Bybit v5 kline 간격 문자열로 변환합니다.
    pub fn to_bybit_interval(&self) -> &'static str {
        match self {
            Interval::M1 => "1",
            Interval::M3 => "3",
            Interval::M5 => "5",
            Interval::M15 => "15",
            Interval::M30 => "30",
            Interval::H1 => "60",
            Interval::H2 => "120",
            Interval::H4 => "240",
            Interval::H6 => "360",
            Interval::H12 => "720",
            Interval::D1 => "D",
            Interval::W1 => "W",
            Interval::MN1 => "M",
        }
    }

    /// 짧은 표기 문자열 ("1m", "4h", "1d", "1w", "1M").
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M3 => "3m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::H2 => "2h",
            Interval::H4 => "4h",
            Interval::H6 => "6h",
            Interval::H12 => "12h",
            Interval::D1 => "1d",
            Interval::W1 => "1w",
            Interval::MN1 => "1M",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|i| i.as_str() == s)
            .ok_or_else(|| format!("Invalid interval: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fixed_step() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            Interval::M15.next_open(t),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 15, 0).unwrap()
        );
        assert_eq!(
            Interval::D1.prev_open(t),
            Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_calendar_month_step() {
        let jan = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let feb = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let mar = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(Interval::MN1.next_open(jan), feb);
        assert_eq!(Interval::MN1.next_open(feb), mar);
        assert_eq!(Interval::MN1.prev_open(mar), feb);
    }

    #[test]
    fn test_floor_and_ceil() {
        let at = |d, h, m| Utc.with_ymd_and_hms(2024, 1, d, h, m, 0).unwrap();
        assert_eq!(Interval::H4.floor(at(3, 5, 59)), at(3, 4, 0));
        assert_eq!(Interval::D1.floor(at(3, 8, 0)), at(3, 0, 0));
        // 2024-01-03은 수요일
        assert_eq!(Interval::W1.floor(at(3, 5, 0)), at(1, 0, 0));
        assert_eq!(Interval::MN1.floor(at(17, 5, 0)), at(1, 0, 0));

        assert_eq!(Interval::D1.ceil(at(3, 8, 0)), at(4, 0, 0));
        assert_eq!(Interval::D1.ceil(at(3, 0, 0)), at(3, 0, 0));
    }

    #[test]
    fn test_week_step() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            Interval::W1.next_open(t),
            Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap()
        );
        assert!(Interval::W1.is_irregular());
        assert_eq!(Interval::W1.advance(t, 2), Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        assert_eq!(Interval::H4.advance(t, 6), Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        assert!(!Interval::D1.is_irregular());
    }

    #[test]
    fn test_parse_and_tags() {
        assert_eq!("1m".parse::<Interval>().unwrap(), Interval::M1);
        assert_eq!("1M".parse::<Interval>().unwrap(), Interval::MN1);
        assert_eq!(" 4h".parse::<Interval>().unwrap(), Interval::H4);
        assert!("7x".parse::<Interval>().is_err());
        assert_eq!(Interval::from_tag("15M"), Some(Interval::M15));
        assert_eq!(Interval::D1.to_bybit_interval(), "D");
    }

    #[test]
    fn test_estimate_records() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(Interval::M1.estimate_records(start, end), 1440);
        assert_eq!(Interval::H1.estimate_records(start, end), 24);
        assert_eq!(Interval::H1.estimate_records(end, start), 0);
    }
}
