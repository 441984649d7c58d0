//! 심볼 테이블 관리.

use crate::error::Result;
use crate::storage::SeriesStore;
use std::sync::Arc;
use tracing::info;

/// 쓰기 전에 심볼 테이블이 있는지 보장합니다.
#[derive(Clone)]
pub struct SchemaManager {
    store: Arc<dyn SeriesStore>,
}

impl SchemaManager {
    pub fn new(store: Arc<dyn SeriesStore>) -> Self {
        Self { store }
    }

    /// 테이블이 없을 때만 만듭니다. 새로 만들었으면 `true`.
    pub async fn ensure_table(&self, symbol: &str) -> Result<bool> {
        if self.store.table_exists(symbol).await? {
            return Ok(false);
        }

        self.store.create_table(symbol).await?;
        info!(symbol, "새 심볼 테이블 준비 완료");
        Ok(true)
    }
}
