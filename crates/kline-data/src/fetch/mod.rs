//! 원격 캔들 수집.

mod plan;
mod windowed;

pub use plan::{FetchPlan, FetchPolicy, FetchWindow};
pub use windowed::WindowedFetcher;
