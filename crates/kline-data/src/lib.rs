//! 캔들 시계열 수집과 저장.
//!
//! 이 crate는 다음을 제공합니다:
//! - 구간 분할 병렬 수집기 (`WindowedFetcher`)
//! - 시계열 저장소 경계 (`SeriesStore`)와 PostgreSQL/TimescaleDB, 메모리 구현
//! - 테이블 관리자 (`SchemaManager`)
//! - 동시성 제한 일괄 저장기 (`BulkWriter`)

pub mod error;
pub mod fetch;
pub mod schema;
pub mod storage;
pub mod writer;

pub use error::{DataError, Result};
pub use fetch::{FetchPlan, FetchPolicy, FetchWindow, WindowedFetcher};
pub use schema::SchemaManager;
pub use storage::memory::MemoryStore;
pub use storage::timescale::{Database, DatabaseConfig, PgSeriesStore};
pub use storage::{table_ident, SeriesSession, SeriesStore};
pub use writer::{BulkWriter, InsertPolicy, InsertReport, DEFAULT_WRITER_PERMITS};
