//! # Kline Core
//!
//! 캔들 시계열 수집 파이프라인의 핵심 도메인 모델을 제공합니다.
//!
//! 이 크레이트는 I/O 없이 다음을 제공합니다:
//! - 캔들 간격(`Interval`)과 간격별 시간 스텝 규칙
//! - OHLCV 캔들(`Candle`)과 주석이 붙은 캔들(`AnnotatedCandle`)
//! - 연속성 검증기: 정렬, 중복 제거, 갭(`Gap`) 탐지
//! - 기술적 지표 엔진 경계(`IndicatorEngine`)
//! - 로깅 인프라

pub mod continuity;
pub mod domain;
pub mod error;
pub mod indicators;
pub mod logging;
pub mod types;

pub use continuity::{find_gaps, validate, Validated};
pub use domain::*;
pub use error::*;
pub use indicators::{IndicatorEngine, IndicatorParams, PassThroughIndicators, TaIndicatorEngine};
pub use logging::*;
pub use types::*;
