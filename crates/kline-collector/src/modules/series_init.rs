//! 초기 백필 모듈.

use crate::{CollectionStats, Reconciler};
use chrono::{DateTime, Utc};
use std::time::Instant;

/// 테이블이 없는 심볼만 만들고 상장일부터 백필합니다.
///
/// 이미 테이블이 있는 심볼은 건너뜁니다. 한 심볼의 실패는 다른 심볼을 막지 않습니다.
pub async fn initialize_symbols(
    reconciler: &Reconciler,
    symbols: &[String],
    as_of: DateTime<Utc>,
) -> CollectionStats {
    let start = Instant::now();
    let mut stats = CollectionStats::new();

    tracing::info!(symbols = symbols.len(), "초기 백필 시작");

    for (idx, symbol) in symbols.iter().enumerate() {
        stats.total += 1;

        tracing::debug!(
            symbol = symbol,
            progress = format!("{}/{}", idx + 1, symbols.len()),
            "초기화 시작"
        );

        match reconciler.initialize(symbol, as_of).await {
            Ok(report) if report.created => {
                stats.success += 1;
                stats.candles_inserted += report.inserted;
            }
            Ok(_) => {
                stats.skipped += 1;
                tracing::debug!(symbol = symbol, "테이블이 이미 있음, 건너뜀");
            }
            Err(e) => {
                stats.errors += 1;
                tracing::error!(symbol = symbol, error = %e, "초기화 실패");
            }
        }
    }

    reconciler.park_all().await;
    stats.elapsed = start.elapsed();
    stats
}
