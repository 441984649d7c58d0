//! Candle series collector CLI.

use chrono::Utc;
use clap::{Parser, Subcommand};
use kline_collector::config::parse_symbols;
use kline_collector::{modules, CollectorConfig, Reconciler};
use kline_core::{init_logging, Interval, LogConfig, LogFormat};
use kline_data::{Database, DatabaseConfig, PgSeriesStore, SeriesStore};
use kline_exchange::{BybitClient, MarketDataSource};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "kline-collector")]
#[command(about = "Candle series collector for Bybit", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 테이블이 없는 심볼을 만들고 상장일부터 백필
    Init {
        /// 특정 심볼만 (쉼표로 구분, 예: "BTCUSDT,ETHUSDT")
        #[arg(long)]
        symbols: Option<String>,
    },

    /// 정합 한 주기 실행 (추격 + 갭 보충)
    Sync {
        /// 특정 심볼만 (쉼표로 구분)
        #[arg(long)]
        symbols: Option<String>,
    },

    /// 저장된 시계열의 갭 보고
    Gaps {
        #[arg(long)]
        symbol: String,
        /// 간격 (1m, 5m, 1h, 4h, 1d, 1w, 1M ...)
        #[arg(long)]
        interval: Interval,
    },

    /// 저장된 최신 캔들과 원격 최신 마감 캔들 비교
    Status {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        interval: Interval,
    },

    /// 데몬 모드: 주기적으로 정합 실행
    Daemon,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    // 로깅 초기화 (RUST_LOG가 --log-level보다 우선)
    let log_format: LogFormat = std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default();
    init_logging(LogConfig::new(cli.log_level.as_str()).with_format(log_format))?;

    tracing::info!("Kline Collector 시작");

    // 설정 로드
    let config = CollectorConfig::from_env()?;
    tracing::debug!(
        intervals = ?config.reconcile.intervals,
        writer_permits = config.store.writer_permits,
        "설정 로드 완료"
    );

    // DB 연결
    let db = Database::connect(
        &DatabaseConfig::new(config.database_url.as_str())
            .with_max_connections(config.store.max_connections),
    )
    .await?;
    let pool = db.pool().clone();
    let store: Arc<dyn SeriesStore> = Arc::new(PgSeriesStore::new(db));

    let source: Arc<dyn MarketDataSource> = Arc::new(BybitClient::new(config.exchange.clone())?);
    let reconciler = Reconciler::from_config(&config, Arc::clone(&source), Arc::clone(&store))?;

    // 명령 실행
    match cli.command {
        Commands::Init { symbols } => {
            let requested = symbols.map(|s| parse_symbols(&s)).or(config.symbols.clone());
            let targets = modules::resolve_symbols(source.as_ref(), requested).await?;
            let stats = modules::initialize_symbols(&reconciler, &targets, Utc::now()).await;
            stats.log_summary("초기 백필");
        }
        Commands::Sync { symbols } => {
            let requested = symbols.map(|s| parse_symbols(&s)).or(config.symbols.clone());
            let targets = modules::resolve_symbols(source.as_ref(), requested).await?;
            let stats = modules::sync_symbols(&reconciler, &targets, Utc::now()).await;
            stats.log_summary("정합");
        }
        Commands::Gaps { symbol, interval } => {
            let gaps = modules::stored_gaps(store.as_ref(), &symbol, interval).await?;
            for gap in &gaps {
                let (from, to) = gap.missing_range();
                tracing::info!(symbol = %symbol, gap = %gap, from = %from, to = %to, "갭");
            }
            tracing::info!(symbol = %symbol, interval = %interval, gaps = gaps.len(), "갭 조회 완료");
        }
        Commands::Status { symbol, interval } => {
            let status = modules::series_status(
                source.as_ref(),
                store.as_ref(),
                &symbol,
                interval,
                Utc::now(),
            )
            .await?;
            tracing::info!(
                symbol = %status.symbol,
                interval = %status.interval,
                stored_rows = status.stored_rows,
                latest_stored = ?status.latest_stored,
                latest_closed = ?status.latest_closed.as_ref().map(|c| c.open_time),
                forming = ?status.forming.as_ref().map(|c| c.open_time),
                caught_up = status.is_caught_up(),
                "시계열 상태"
            );
        }
        Commands::Daemon => {
            tracing::info!(
                "=== 데몬 모드 시작 (주기: {}분) ===",
                config.daemon.interval_minutes
            );

            let mut interval = tokio::time::interval(config.daemon.interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("종료 신호 수신, 데몬 종료 중...");
                        break;
                    }
                    _ = interval.tick() => {
                        tracing::info!("=== 정합 주기 시작 ===");

                        match modules::resolve_symbols(source.as_ref(), config.symbols.clone()).await {
                            Ok(targets) => {
                                let stats = modules::sync_symbols(&reconciler, &targets, Utc::now()).await;
                                stats.log_summary("정합");
                            }
                            Err(e) => {
                                tracing::error!("심볼 목록 조회 실패: {}", e);
                            }
                        }

                        tracing::info!(
                            "=== 정합 주기 완료, 다음 실행: {}분 후 ===",
                            config.daemon.interval_minutes
                        );
                    }
                }
            }
        }
    }

    pool.close().await;
    tracing::info!("Kline Collector 종료");

    Ok(())
}
