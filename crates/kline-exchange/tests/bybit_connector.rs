//! Bybit 커넥터 HTTP 통합 테스트 (mockito).

use chrono::{TimeZone, Utc};
use kline_core::Interval;
use kline_exchange::{
    list_trading_symbols, BybitClient, BybitConfig, ExchangeError, MarketDataSource,
};
use mockito::Matcher;
use rust_decimal_macros::dec;

fn client(server: &mockito::ServerGuard) -> BybitClient {
    BybitClient::new(BybitConfig::default().with_base_url(server.url())).unwrap()
}

#[tokio::test]
async fn kline_page_is_returned_ascending() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v5/market/kline")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("category".into(), "linear".into()),
            Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()),
            Matcher::UrlEncoded("interval".into(), "D".into()),
            Matcher::UrlEncoded("limit".into(), "1000".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"retCode":0,"retMsg":"OK","result":{"category":"linear","symbol":"BTCUSDT","list":[
                ["1704153600000","105","110","100","108","3","320"],
                ["1704067200000","100","106","99","105","2","205"]
            ]},"retExtInfo":{},"time":1704240000000}"#,
        )
        .create_async()
        .await;

    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let candles = client(&server)
        .get_candles("BTCUSDT", Interval::D1, start, end, 1000)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(candles.len(), 2);
    assert_eq!(candles[0].open_time, start);
    assert_eq!(candles[1].open_time, end);
    assert_eq!(candles[1].close, dec!(108));
}

#[tokio::test]
async fn non_zero_ret_code_is_mapped() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v5/market/kline")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"retCode":10001,"retMsg":"params error: symbol invalid","result":{}}"#)
        .create_async()
        .await;

    let now = Utc::now();
    let err = client(&server)
        .get_candles("NOPE", Interval::M1, now, now, 10)
        .await
        .unwrap_err();

    assert!(matches!(err, ExchangeError::InvalidRequest(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn http_429_is_retryable_rate_limit() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v5/market/kline")
        .match_query(Matcher::Any)
        .with_status(429)
        .create_async()
        .await;

    let now = Utc::now();
    let err = client(&server)
        .get_candles("BTCUSDT", Interval::M1, now, now, 10)
        .await
        .unwrap_err();

    assert!(matches!(err, ExchangeError::RateLimited));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn symbol_listing_follows_cursor_and_keeps_trading_only() {
    let mut server = mockito::Server::new_async().await;
    let first = server
        .mock("GET", "/v5/market/instruments-info")
        .match_query(Matcher::Regex("^category=linear&limit=1000$".into()))
        .with_status(200)
        .with_body(
            r#"{"retCode":0,"retMsg":"OK","result":{"category":"linear","list":[
                {"symbol":"ETHUSDT","status":"Trading","launchTime":"1585526400000"},
                {"symbol":"OLDUSDT","status":"Closed","launchTime":"1585526400000"}
            ],"nextPageCursor":"page2"}}"#,
        )
        .create_async()
        .await;
    let second = server
        .mock("GET", "/v5/market/instruments-info")
        .match_query(Matcher::UrlEncoded("cursor".into(), "page2".into()))
        .with_status(200)
        .with_body(
            r#"{"retCode":0,"retMsg":"OK","result":{"category":"linear","list":[
                {"symbol":"BTCUSDT","status":"Trading","launchTime":"1584230400000"}
            ],"nextPageCursor":""}}"#,
        )
        .create_async()
        .await;

    let symbols = list_trading_symbols(&client(&server)).await.unwrap();

    first.assert_async().await;
    second.assert_async().await;
    assert_eq!(symbols, vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]);
}

#[tokio::test]
async fn instrument_info_reads_launch_time() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v5/market/instruments-info")
        .match_query(Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()))
        .with_status(200)
        .with_body(
            r#"{"retCode":0,"retMsg":"OK","result":{"category":"linear","list":[
                {"symbol":"BTCUSDT","status":"Trading","launchTime":"1584230400000"}
            ],"nextPageCursor":""}}"#,
        )
        .create_async()
        .await;

    let info = client(&server).instrument_info("BTCUSDT").await.unwrap();
    let launch = Utc.with_ymd_and_hms(2020, 3, 15, 0, 0, 0).unwrap();
    assert_eq!(info.launch_time, launch);
    assert_eq!(info.listing_date(), launch - chrono::Duration::days(1));
}

#[tokio::test]
async fn unknown_instrument_is_symbol_not_found() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v5/market/instruments-info")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"retCode":0,"retMsg":"OK","result":{"category":"linear","list":[]}}"#)
        .create_async()
        .await;

    let err = client(&server).instrument_info("NOPEUSDT").await.unwrap_err();
    assert!(matches!(err, ExchangeError::SymbolNotFound(s) if s == "NOPEUSDT"));
}
