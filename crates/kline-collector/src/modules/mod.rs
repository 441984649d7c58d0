//! 명령별 수집 모듈.

pub mod inspect;
pub mod series_init;
pub mod series_sync;

pub use inspect::{series_status, stored_gaps, SeriesStatus};
pub use series_init::initialize_symbols;
pub use series_sync::{resolve_symbols, sync_symbols};
