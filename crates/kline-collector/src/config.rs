//! 환경변수 기반 설정 모듈.

use crate::error::CollectorError;
use crate::reconcile::ReconcileOptions;
use crate::Result;
use kline_core::Interval;
use kline_data::{FetchPolicy, InsertPolicy, DEFAULT_WRITER_PERMITS};
use kline_exchange::{BybitConfig, RetryPolicy};
use std::time::Duration;

/// 기본 추적 간격 (1d, 4h, 2h, 15m, 5m, 1m)
pub const DEFAULT_INTERVALS: [Interval; 6] = [
    Interval::D1,
    Interval::H4,
    Interval::H2,
    Interval::M15,
    Interval::M5,
    Interval::M1,
];

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL
    pub database_url: String,
    /// 저장소 연결 설정
    pub store: StoreConfig,
    /// 거래소 설정
    pub exchange: BybitConfig,
    /// 수집 정책
    pub fetch: FetchPolicy,
    /// 저장 정책
    pub insert: InsertPolicy,
    /// 정합 설정
    pub reconcile: ReconcileOptions,
    /// 대상 심볼 (`None`이면 거래 중인 전체 심볼)
    pub symbols: Option<Vec<String>>,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
}

/// 저장소 연결 설정
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// 연결 풀 크기
    pub max_connections: u32,
    /// 공유 쓰기 세마포어 크기
    pub writer_permits: usize,
}

/// 데몬 모드 설정
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 정합 주기 (분 단위)
    pub interval_minutes: u64,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            CollectorError::Config("DATABASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })?;

        let intervals = match std::env::var("COLLECT_INTERVALS") {
            Ok(raw) => parse_intervals(&raw)?,
            Err(_) => DEFAULT_INTERVALS.to_vec(),
        };

        let fetch_defaults = FetchPolicy::default();
        let insert_defaults = InsertPolicy::default();

        Ok(Self {
            database_url,
            store: StoreConfig {
                max_connections: env_var_parse("DB_MAX_CONNECTIONS", 13),
                writer_permits: env_var_parse("WRITER_PERMITS", DEFAULT_WRITER_PERMITS),
            },
            exchange: BybitConfig::from_env(),
            fetch: FetchPolicy {
                page_limit: env_var_parse("FETCH_PAGE_LIMIT", fetch_defaults.page_limit),
                records_per_task: env_var_parse(
                    "FETCH_RECORDS_PER_TASK",
                    fetch_defaults.records_per_task,
                ),
                retry: RetryPolicy::new(
                    env_var_parse("FETCH_MAX_ATTEMPTS", 3),
                    Duration::from_secs(env_var_parse("FETCH_TIMEOUT_SECS", 50)),
                ),
                ..fetch_defaults
            },
            insert: InsertPolicy {
                rows_per_task: env_var_parse("INSERT_ROWS_PER_TASK", insert_defaults.rows_per_task),
                ..insert_defaults
            },
            reconcile: ReconcileOptions {
                intervals,
                max_passes: env_var_parse("RECONCILE_MAX_PASSES", 5),
            },
            symbols: std::env::var("COLLECT_SYMBOLS")
                .ok()
                .map(|raw| parse_symbols(&raw))
                .filter(|s| !s.is_empty()),
            daemon: DaemonConfig {
                interval_minutes: env_var_parse("DAEMON_INTERVAL_MINUTES", 15),
            },
        })
    }
}

impl DaemonConfig {
    /// 정합 주기를 Duration으로 반환
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.max(1) * 60)
    }
}

/// 쉼표로 구분된 간격 목록 파싱 (예: "1d,4h,1m").
pub fn parse_intervals(raw: &str) -> Result<Vec<Interval>> {
    let mut intervals = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let interval: Interval = part.parse().map_err(CollectorError::Config)?;
        if !intervals.contains(&interval) {
            intervals.push(interval);
        }
    }

    if intervals.is_empty() {
        return Err(CollectorError::Config(
            "추적할 간격이 비어 있습니다".to_string(),
        ));
    }
    Ok(intervals)
}

/// 쉼표로 구분된 심볼 목록 파싱 (대문자 변환, 빈 항목 제거).
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_intervals() {
        assert_eq!(
            parse_intervals("1d, 4h,1m,1d").unwrap(),
            vec![Interval::D1, Interval::H4, Interval::M1]
        );
        assert_eq!(parse_intervals("1M").unwrap(), vec![Interval::MN1]);
        assert!(parse_intervals("1d,7x").is_err());
        assert!(parse_intervals(" , ").is_err());
    }

    #[test]
    fn test_parse_symbols() {
        assert_eq!(
            parse_symbols("btcusdt, ETHUSDT,,"),
            vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]
        );
        assert!(parse_symbols("").is_empty());
    }

    #[test]
    fn test_daemon_interval_floor() {
        let daemon = DaemonConfig { interval_minutes: 0 };
        assert_eq!(daemon.interval(), Duration::from_secs(60));
    }
}
