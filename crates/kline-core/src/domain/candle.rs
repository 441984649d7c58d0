//! 캔들 값 타입.
//!
//! - `Candle` - 원시 OHLCV 관측값
//! - `AnnotatedCandle` - 변동률, 분류, 꼬리 크기, 지표가 붙은 캔들
//!
//! 두 타입 모두 값 객체입니다. 주석이나 지표를 붙이면 새 값이 만들어집니다.

use crate::types::Interval;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 시작 시간을 가진 시계열 원소.
pub trait OpenTime {
    /// 캔들 시작 시간.
    fn open_time(&self) -> DateTime<Utc>;
}

/// OHLCV 캔들.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// 캔들 시작 시간
    pub open_time: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량 (기준 자산 단위)
    pub volume: Decimal,
    /// 거래대금 (호가 자산 단위)
    pub quote_volume: Decimal,
}

impl Candle {
    /// 새 캔들을 생성합니다.
    pub fn new(
        open_time: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
        quote_volume: Decimal,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
            quote_volume,
        }
    }

    /// 캔들이 닫히는 시간 (다음 캔들의 시작 시간).
    pub fn close_time(&self, interval: Interval) -> DateTime<Utc> {
        interval.next_open(self.open_time)
    }

    /// `as_of` 시점에 이미 닫힌 캔들인지 확인합니다.
    pub fn is_closed(&self, interval: Interval, as_of: DateTime<Utc>) -> bool {
        self.close_time(interval) <= as_of
    }

    /// 변동률, 분류, 꼬리 크기를 계산해 주석 캔들을 만듭니다.
    ///
    /// 꼬리 크기의 기준 가격은 방향에 따라 다릅니다.
    /// - 양봉: 윗꼬리 = |종가 - 고가| / 종가%, 아랫꼬리 = (시가 - 저가) / 시가%
    /// - 음봉: 윗꼬리 = |시가 - 고가| / 시가%, 아랫꼬리 = (종가 - 저가) / 종가%
    /// - 보합: 두 꼬리 모두 0
    pub fn annotate(self) -> AnnotatedCandle {
        let change_percent = percent_of(self.close - self.open, self.open);
        let kind = CandleKind::from_change(change_percent);

        let (upper_tail, lower_tail) = match kind {
            CandleKind::Bull => (
                percent_of((self.close - self.high).abs(), self.close),
                percent_of(self.open - self.low, self.open),
            ),
            CandleKind::Bear => (
                percent_of((self.open - self.high).abs(), self.open),
                percent_of(self.close - self.low, self.close),
            ),
            CandleKind::Zero => (Decimal::ZERO, Decimal::ZERO),
        };

        AnnotatedCandle {
            candle: self,
            change_percent,
            kind,
            upper_tail,
            lower_tail,
            indicators: IndicatorValues::default(),
        }
    }
}

impl OpenTime for Candle {
    fn open_time(&self) -> DateTime<Utc> {
        self.open_time
    }
}

/// `value`를 `anchor`의 백분율로 환산합니다. 기준 가격이 0이면 0.
fn percent_of(value: Decimal, anchor: Decimal) -> Decimal {
    let unit = anchor / Decimal::ONE_HUNDRED;
    value.checked_div(unit).unwrap_or(Decimal::ZERO)
}

/// 캔들 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandleKind {
    /// 양봉
    Bull,
    /// 음봉
    Bear,
    /// 보합
    Zero,
}

impl CandleKind {
    /// 변동률 부호로 분류합니다.
    pub fn from_change(change_percent: Decimal) -> Self {
        if change_percent.is_zero() {
            CandleKind::Zero
        } else if change_percent.is_sign_negative() {
            CandleKind::Bear
        } else {
            CandleKind::Bull
        }
    }
}

impl fmt::Display for CandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandleKind::Bull => write!(f, "bull"),
            CandleKind::Bear => write!(f, "bear"),
            CandleKind::Zero => write!(f, "zero"),
        }
    }
}

/// MACD 값 (MACD 선, 시그널 선, 히스토그램).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macd {
    /// 단기 EMA - 장기 EMA
    pub macd: Decimal,
    /// MACD 선의 EMA
    pub signal: Decimal,
    /// MACD - 시그널
    pub histogram: Decimal,
}

/// 볼린저 밴드 값.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bollinger {
    /// 상단 밴드
    pub upper: Decimal,
    /// 중심선 (SMA)
    pub middle: Decimal,
    /// 하단 밴드
    pub lower: Decimal,
}

/// 지표 엔진이 채우는 선택 필드.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorValues {
    pub rsi: Option<Decimal>,
    pub macd: Option<Macd>,
    pub sma: Option<Decimal>,
    pub bollinger: Option<Bollinger>,
}

/// 주석이 붙은 캔들.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedCandle {
    /// 원시 캔들
    pub candle: Candle,
    /// (종가 - 시가) / 시가%
    pub change_percent: Decimal,
    /// 분류
    pub kind: CandleKind,
    /// 윗꼬리 크기 (%)
    pub upper_tail: Decimal,
    /// 아랫꼬리 크기 (%)
    pub lower_tail: Decimal,
    /// 지표 값
    pub indicators: IndicatorValues,
}

impl AnnotatedCandle {
    /// 지표 값을 붙인 새 캔들을 반환합니다.
    pub fn with_indicators(self, indicators: IndicatorValues) -> Self {
        Self { indicators, ..self }
    }
}

impl OpenTime for AnnotatedCandle {
    fn open_time(&self) -> DateTime<Utc> {
        self.candle.open_time
    }
}

impl From<Candle> for AnnotatedCandle {
    fn from(candle: Candle) -> Self {
        candle.annotate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn candle(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Candle::new(t, open, high, low, close, dec!(1), dec!(1))
    }

    #[test]
    fn test_bull_annotation() {
        let a = candle(dec!(100), dec!(115), dec!(95), dec!(110)).annotate();
        assert_eq!(a.change_percent, dec!(10));
        assert_eq!(a.kind, CandleKind::Bull);
        assert_eq!(a.upper_tail.round_dp(3), dec!(4.545));
        assert_eq!(a.lower_tail, dec!(5));
    }

    #[test]
    fn test_bear_annotation() {
        let a = candle(dec!(100), dec!(104), dec!(80), dec!(90)).annotate();
        assert_eq!(a.change_percent, dec!(-10));
        assert_eq!(a.kind, CandleKind::Bear);
        assert_eq!(a.upper_tail, dec!(4));
        assert_eq!(a.lower_tail.round_dp(3), dec!(11.111));
    }

    #[test]
    fn test_zero_annotation() {
        let a = candle(dec!(100), dec!(120), dec!(70), dec!(100)).annotate();
        assert_eq!(a.kind, CandleKind::Zero);
        assert_eq!(a.upper_tail, Decimal::ZERO);
        assert_eq!(a.lower_tail, Decimal::ZERO);
    }

    #[test]
    fn test_zero_open_does_not_panic() {
        let a = candle(dec!(0), dec!(1), dec!(0), dec!(1)).annotate();
        assert_eq!(a.change_percent, Decimal::ZERO);
        assert_eq!(a.kind, CandleKind::Zero);
    }

    #[test]
    fn test_closed_check() {
        let c = candle(dec!(1), dec!(1), dec!(1), dec!(1));
        let as_of = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 59).unwrap();
        assert!(!c.is_closed(Interval::M1, as_of));
        assert!(c.is_closed(Interval::M1, as_of + chrono::Duration::seconds(1)));
    }
}
