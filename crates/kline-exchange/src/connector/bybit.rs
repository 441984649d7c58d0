//! Bybit v5 시장 데이터 커넥터.
//!
//! 공개 REST 엔드포인트만 사용하므로 API 키가 필요 없습니다.
//! - `/v5/market/kline`: 캔들 (응답은 최신순)
//! - `/v5/market/instruments-info`: 심볼 목록과 상장 시각 (커서 페이지네이션)

use crate::traits::{ExchangeResult, InstrumentInfo, MarketDataSource, SymbolPage};
use crate::ExchangeError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kline_core::{Candle, Interval};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, instrument};

const MAINNET_URL: &str = "https://api.bybit.com";
const TESTNET_URL: &str = "https://api-testnet.bybit.com";

/// 심볼 목록 한 페이지의 최대 크기.
const INSTRUMENTS_PAGE_LIMIT: u32 = 1000;

// ============================================================================
// 설정
// ============================================================================

/// Bybit 클라이언트 설정.
#[derive(Debug, Clone)]
pub struct BybitConfig {
    /// 테스트넷 사용
    pub testnet: bool,
    /// REST 기본 URL 재정의 (테스트/프록시용)
    pub base_url: Option<String>,
    /// 시장 카테고리 (linear, inverse, spot)
    pub category: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for BybitConfig {
    fn default() -> Self {
        Self {
            testnet: false,
            base_url: None,
            category: "linear".to_string(),
            timeout_secs: 30,
        }
    }
}

impl BybitConfig {
    pub fn with_testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// 환경 변수에서 생성.
    ///
    /// `BYBIT_TESTNET`, `BYBIT_BASE_URL`, `BYBIT_CATEGORY`, `HTTP_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            testnet: std::env::var("BYBIT_TESTNET")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            base_url: std::env::var("BYBIT_BASE_URL")
                .ok()
                .filter(|v| !v.is_empty()),
            category: std::env::var("BYBIT_CATEGORY").unwrap_or(defaults.category),
            timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }

    /// REST API 기본 URL 반환.
    pub fn rest_base_url(&self) -> &str {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/'),
            None if self.testnet => TESTNET_URL,
            None => MAINNET_URL,
        }
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitEnvelope {
    ret_code: i32,
    ret_msg: String,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct BybitKlineResult {
    #[serde(default)]
    list: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitInstrumentsResult {
    #[serde(default)]
    list: Vec<BybitInstrument>,
    #[serde(default)]
    next_page_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitInstrument {
    symbol: String,
    status: String,
    #[serde(default)]
    launch_time: String,
}

// ============================================================================
// Bybit 클라이언트
// ============================================================================

/// Bybit 시장 데이터 클라이언트.
#[derive(Debug, Clone)]
pub struct BybitClient {
    config: BybitConfig,
    client: Client,
}

impl BybitClient {
    /// 새 Bybit 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: BybitConfig) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ExchangeError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e))
            })?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &BybitConfig {
        &self.config
    }

    /// 공개 API 요청.
    async fn public_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let url = format!("{}{}", self.config.rest_base_url(), endpoint);
        debug!(endpoint, ?params, "GET");

        let response = self.client.get(&url).query(params).send().await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ExchangeError::RateLimited);
        }
        if status.is_server_error() {
            return Err(ExchangeError::NetworkError(format!("HTTP {}: {}", status, body)));
        }
        if !status.is_success() {
            return Err(ExchangeError::ApiError {
                code: status.as_u16() as i32,
                message: body,
            });
        }

        let envelope: BybitEnvelope = serde_json::from_str(&body).map_err(|e| {
            error!("응답 파싱 실패: {} - Body: {}", e, body);
            ExchangeError::ParseError(e.to_string())
        })?;

        if envelope.ret_code != 0 {
            return Err(Self::map_error_code(envelope.ret_code, &envelope.ret_msg));
        }

        Ok(serde_json::from_value(envelope.result)?)
    }

    /// Bybit retCode를 ExchangeError로 매핑.
    fn map_error_code(code: i32, msg: &str) -> ExchangeError {
        match code {
            10006 | 10018 => ExchangeError::RateLimited,
            10000 | 10016 => ExchangeError::NetworkError(msg.to_string()),
            10001 => ExchangeError::InvalidRequest(msg.to_string()),
            _ => ExchangeError::ApiError {
                code,
                message: msg.to_string(),
            },
        }
    }

    fn parse_decimal(field: &str, raw: Option<&String>) -> ExchangeResult<Decimal> {
        raw.ok_or_else(|| ExchangeError::ParseError(format!("{} 필드 없음", field)))?
            .parse()
            .map_err(|e| ExchangeError::ParseError(format!("{}: {}", field, e)))
    }

    fn parse_millis(raw: &str) -> ExchangeResult<DateTime<Utc>> {
        raw.parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| ExchangeError::ParseError(format!("잘못된 타임스탬프: {}", raw)))
    }

    /// `[startTime, open, high, low, close, volume, turnover]` 행을 캔들로 변환.
    fn parse_kline_row(row: &[String]) -> ExchangeResult<Candle> {
        let open_time = row
            .first()
            .ok_or_else(|| ExchangeError::ParseError("빈 kline 행".to_string()))
            .and_then(|raw| Self::parse_millis(raw))?;

        Ok(Candle::new(
            open_time,
            Self::parse_decimal("open", row.get(1))?,
            Self::parse_decimal("high", row.get(2))?,
            Self::parse_decimal("low", row.get(3))?,
            Self::parse_decimal("close", row.get(4))?,
            Self::parse_decimal("volume", row.get(5))?,
            Self::parse_decimal("turnover", row.get(6))?,
        ))
    }
}

#[async_trait]
impl MarketDataSource for BybitClient {
    fn name(&self) -> &str {
        "bybit"
    }

    #[instrument(skip(self), fields(category = %self.config.category))]
    async fn list_symbols(&self, cursor: Option<&str>) -> ExchangeResult<SymbolPage> {
        let mut params = vec![
            ("category", self.config.category.clone()),
            ("limit", INSTRUMENTS_PAGE_LIMIT.to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }

        let resp: BybitInstrumentsResult = self
            .public_get("/v5/market/instruments-info", &params)
            .await?;

        Ok(SymbolPage {
            symbols: resp
                .list
                .into_iter()
                .filter(|i| i.status.eq_ignore_ascii_case("Trading"))
                .map(|i| i.symbol)
                .collect(),
            next_cursor: resp.next_page_cursor.filter(|c| !c.is_empty()),
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_candles(
        &self,
        symbol: &str,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> ExchangeResult<Vec<Candle>> {
        let resp: BybitKlineResult = self
            .public_get(
                "/v5/market/kline",
                &[
                    ("category", self.config.category.clone()),
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_bybit_interval().to_string()),
                    ("start", start.timestamp_millis().to_string()),
                    ("end", end.timestamp_millis().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        let mut candles = resp
            .list
            .iter()
            .map(|row| Self::parse_kline_row(row))
            .collect::<ExchangeResult<Vec<_>>>()?;
        candles.sort_by_key(|c| c.open_time);

        Ok(candles)
    }

    #[instrument(skip(self))]
    async fn instrument_info(&self, symbol: &str) -> ExchangeResult<InstrumentInfo> {
        let resp: BybitInstrumentsResult = self
            .public_get(
                "/v5/market/instruments-info",
                &[
                    ("category", self.config.category.clone()),
                    ("symbol", symbol.to_string()),
                ],
            )
            .await?;

        let instrument = resp
            .list
            .into_iter()
            .find(|i| i.symbol == symbol)
            .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))?;

        Ok(InstrumentInfo {
            launch_time: Self::parse_millis(&instrument.launch_time)?,
            symbol: instrument.symbol,
            status: instrument.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_kline_row() {
        let candle = BybitClient::parse_kline_row(&row(&[
            "1704067200000",
            "42000.5",
            "42100",
            "41900",
            "42050",
            "12.5",
            "525000",
        ]))
        .unwrap();

        assert_eq!(
            candle.open_time,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(candle.open, dec!(42000.5));
        assert_eq!(candle.quote_volume, dec!(525000));
    }

    #[test]
    fn test_short_row_is_parse_error() {
        let result = BybitClient::parse_kline_row(&row(&["1704067200000", "1", "2"]));
        assert!(matches!(result, Err(ExchangeError::ParseError(_))));
    }

    #[test]
    fn test_error_code_mapping() {
        assert!(matches!(
            BybitClient::map_error_code(10006, "Too many visits"),
            ExchangeError::RateLimited
        ));
        assert!(matches!(
            BybitClient::map_error_code(10001, "params error"),
            ExchangeError::InvalidRequest(_)
        ));
        assert!(matches!(
            BybitClient::map_error_code(110001, "other"),
            ExchangeError::ApiError { code: 110001, .. }
        ));
    }

    #[test]
    fn test_base_url_selection() {
        assert_eq!(BybitConfig::default().rest_base_url(), MAINNET_URL);
        assert_eq!(
            BybitConfig::default().with_testnet(true).rest_base_url(),
            TESTNET_URL
        );
        assert_eq!(
            BybitConfig::default()
                .with_base_url("http://127.0.0.1:1234/")
                .rest_base_url(),
            "http://127.0.0.1:1234"
        );
    }
}
