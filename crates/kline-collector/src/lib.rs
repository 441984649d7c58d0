//! 캔들 시계열 정합 수집기.
//!
//! 이 crate는 저장소를 원격 거래소와 맞추는 바이너리를 제공합니다:
//! - 신규 심볼 테이블 생성과 상장일부터의 백필
//! - 최신 저장 캔들 이후 구간 추격
//! - 저장된 시계열의 갭 탐지와 보충
//! - 주기 실행 데몬

pub mod config;
pub mod error;
pub mod modules;
pub mod reconcile;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use reconcile::{ReconcileOptions, Reconciler, SeriesState, SymbolReport};
pub use stats::CollectionStats;
