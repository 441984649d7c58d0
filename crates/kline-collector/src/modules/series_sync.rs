//! 정합 주기 모듈.

use crate::{CollectionStats, Reconciler, Result};
use chrono::{DateTime, Utc};
use kline_exchange::{list_trading_symbols, MarketDataSource};
use std::time::Instant;

/// 대상 심볼 결정. 지정하지 않으면 거래 중인 전체 심볼.
pub async fn resolve_symbols(
    source: &dyn MarketDataSource,
    requested: Option<Vec<String>>,
) -> Result<Vec<String>> {
    match requested {
        Some(symbols) if !symbols.is_empty() => {
            tracing::info!(count = symbols.len(), "지정 심볼 정합");
            Ok(symbols)
        }
        _ => {
            let symbols = list_trading_symbols(source).await?;
            tracing::info!(count = symbols.len(), source = source.name(), "거래 중인 심볼 조회 완료");
            Ok(symbols)
        }
    }
}

/// 모든 대상 심볼에 대해 정합을 한 번 실행합니다.
///
/// 실패한 심볼은 기록만 하고 다음 주기에 다시 시도합니다.
pub async fn sync_symbols(
    reconciler: &Reconciler,
    symbols: &[String],
    as_of: DateTime<Utc>,
) -> CollectionStats {
    let start = Instant::now();
    let mut stats = CollectionStats::new();

    if symbols.is_empty() {
        tracing::warn!("정합할 심볼이 없습니다");
        return stats;
    }

    for (idx, symbol) in symbols.iter().enumerate() {
        stats.total += 1;

        tracing::debug!(
            symbol = symbol,
            progress = format!("{}/{}", idx + 1, symbols.len()),
            "정합 시작"
        );

        match reconciler.reconcile(symbol, as_of).await {
            Ok(report) => {
                stats.success += 1;
                stats.candles_inserted += report.inserted;
                stats.gaps_found += report.gaps_found;
                stats.gaps_repaired += report.gaps_repaired;
            }
            Err(e) => {
                stats.errors += 1;
                tracing::error!(
                    symbol = symbol,
                    error = %e,
                    "정합 실패, 다음 주기에 재시도"
                );
            }
        }
    }

    reconciler.park_all().await;
    stats.elapsed = start.elapsed();
    stats
}
