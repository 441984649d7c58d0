//! 캔들 시계열 도메인 모델.

mod candle;
mod gap;

pub use candle::*;
pub use gap::*;
