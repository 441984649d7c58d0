//! 기술적 지표 경계.
//!
//! 수집기는 `IndicatorEngine` 트레이트만 알고 있습니다. 기본 구현인
//! `TaIndicatorEngine`은 ta-rs로 다음 지표를 계산합니다:
//! - **RSI** (기본 14)
//! - **MACD** (기본 12/26/9): MACD 선, 시그널, 히스토그램
//! - **SMA** (기본 50)
//! - **볼린저 밴드** (기본 20, 2σ)
//!
//! 워밍업 구간에서는 값이 `None`으로 남습니다. 엔진에는 연속 구간 하나씩만
//! 넘겨야 합니다.

use crate::domain::{AnnotatedCandle, Bollinger, IndicatorValues, Macd};
use crate::error::{CoreError, CoreResult};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use ta::indicators::{
    BollingerBands, MovingAverageConvergenceDivergence, RelativeStrengthIndex, SimpleMovingAverage,
};
use ta::Next;

/// 주석 캔들 묶음에 지표를 채우는 엔진.
pub trait IndicatorEngine: Send + Sync {
    /// 시작 시간 오름차순의 연속 구간을 받아 지표가 채워진 구간을 돌려줍니다.
    fn annotate(&self, run: Vec<AnnotatedCandle>) -> Vec<AnnotatedCandle>;

    /// 모든 지표가 채워지기까지 필요한 앞선 캔들 수.
    fn warm_up(&self) -> usize {
        0
    }
}

/// 지표 파라미터.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub sma_period: usize,
    pub bollinger_period: usize,
    pub bollinger_multiplier: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            sma_period: 50,
            bollinger_period: 20,
            bollinger_multiplier: 2.0,
        }
    }
}

/// ta-rs 기반 기본 지표 엔진.
///
/// 파라미터 검증은 생성 시점에 한 번만 하고, 호출마다 원형을 복제해 씁니다.
#[derive(Debug, Clone)]
pub struct TaIndicatorEngine {
    params: IndicatorParams,
    rsi: RelativeStrengthIndex,
    macd: MovingAverageConvergenceDivergence,
    sma: SimpleMovingAverage,
    bollinger: BollingerBands,
}

impl TaIndicatorEngine {
    pub fn new(params: IndicatorParams) -> CoreResult<Self> {
        let invalid = |name: &str, e: ta::errors::TaError| {
            CoreError::Indicator(format!("{} 파라미터 오류: {:?}", name, e))
        };

        Ok(Self {
            rsi: RelativeStrengthIndex::new(params.rsi_period).map_err(|e| invalid("RSI", e))?,
            macd: MovingAverageConvergenceDivergence::new(
                params.macd_fast,
                params.macd_slow,
                params.macd_signal,
            )
            .map_err(|e| invalid("MACD", e))?,
            sma: SimpleMovingAverage::new(params.sma_period).map_err(|e| invalid("SMA", e))?,
            bollinger: BollingerBands::new(params.bollinger_period, params.bollinger_multiplier)
                .map_err(|e| invalid("Bollinger", e))?,
            params,
        })
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    // 첫 값이 의미를 갖는 인덱스
    fn rsi_ready(&self, index: usize) -> bool {
        index >= self.params.rsi_period
    }

    fn macd_ready(&self, index: usize) -> bool {
        index + 2 >= self.params.macd_slow + self.params.macd_signal
    }

    fn sma_ready(&self, index: usize) -> bool {
        index + 1 >= self.params.sma_period
    }

    fn bollinger_ready(&self, index: usize) -> bool {
        index + 1 >= self.params.bollinger_period
    }
}

impl IndicatorEngine for TaIndicatorEngine {
    fn warm_up(&self) -> usize {
        let p = &self.params;
        (p.rsi_period + 1)
            .max(p.macd_slow + p.macd_signal - 1)
            .max(p.sma_period)
            .max(p.bollinger_period)
    }

    fn annotate(&self, run: Vec<AnnotatedCandle>) -> Vec<AnnotatedCandle> {
        let mut rsi = self.rsi.clone();
        let mut macd = self.macd.clone();
        let mut sma = self.sma.clone();
        let mut bollinger = self.bollinger.clone();

        run.into_iter()
            .enumerate()
            .map(|(i, candle)| {
                let Some(close) = candle.candle.close.to_f64() else {
                    return candle;
                };

                let rsi_value = rsi.next(close);
                let macd_value = macd.next(close);
                let sma_value = sma.next(close);
                let bb_value = bollinger.next(close);

                let mut values = IndicatorValues::default();
                if self.rsi_ready(i) {
                    values.rsi = to_decimal(rsi_value);
                }
                if self.macd_ready(i) {
                    values.macd = match (
                        to_decimal(macd_value.macd),
                        to_decimal(macd_value.signal),
                        to_decimal(macd_value.histogram),
                    ) {
                        (Some(macd), Some(signal), Some(histogram)) => Some(Macd {
                            macd,
                            signal,
                            histogram,
                        }),
                        _ => None,
                    };
                }
                if self.sma_ready(i) {
                    values.sma = to_decimal(sma_value);
                }
                if self.bollinger_ready(i) {
                    values.bollinger = match (
                        to_decimal(bb_value.upper),
                        to_decimal(bb_value.average),
                        to_decimal(bb_value.lower),
                    ) {
                        (Some(upper), Some(middle), Some(lower)) => Some(Bollinger {
                            upper,
                            middle,
                            lower,
                        }),
                        _ => None,
                    };
                }

                candle.with_indicators(values)
            })
            .collect()
    }
}

/// 지표 계산을 건너뛰는 엔진. 값은 모두 비어 있습니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughIndicators;

impl IndicatorEngine for PassThroughIndicators {
    fn annotate(&self, run: Vec<AnnotatedCandle>) -> Vec<AnnotatedCandle> {
        run
    }
}

fn to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value).map(|d| d.round_dp(8))
}
