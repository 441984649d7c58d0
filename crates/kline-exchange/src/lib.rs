//! 원격 시장 데이터 소스 연결.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - `MarketDataSource` trait: 심볼 목록, 캔들 페이지, 상장 정보 조회 경계
//! - Bybit v5 REST 커넥터
//! - 심볼 페이지 스트림
//! - 기한(deadline) 및 재시도 프리미티브
//! - 최근 마감 캔들 / 진행 중 캔들 조회
//! - 네트워크 없는 시뮬레이션 소스

pub mod connector;
pub mod deadline;
pub mod error;
pub mod probes;
pub mod simulated;
pub mod symbols;
pub mod traits;

pub use connector::{BybitClient, BybitConfig};
pub use deadline::{with_deadline, with_retry, RetryPolicy};
pub use error::*;
pub use probes::{current_candle, latest_closed_candle};
pub use simulated::{Fault, SimulatedSource};
pub use symbols::{list_trading_symbols, symbol_pages};
pub use traits::*;
