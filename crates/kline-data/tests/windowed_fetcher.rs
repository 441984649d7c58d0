//! 구간 분할 수집기 통합 테스트 (시뮬레이션 소스).

use chrono::{DateTime, Duration, TimeZone, Utc};
use kline_core::{Gap, Interval};
use kline_data::{FetchPolicy, WindowedFetcher};
use kline_exchange::{ExchangeError, Fault, RetryPolicy, SimulatedSource};
use std::sync::Arc;
use std::time::Duration as StdDuration;

fn listing() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn policy() -> FetchPolicy {
    FetchPolicy {
        page_limit: 200,
        records_per_task: 1000,
        max_tasks: 4,
        retry: RetryPolicy {
            max_attempts: 3,
            deadline: StdDuration::from_secs(1),
            base_delay: StdDuration::from_millis(10),
            max_delay: StdDuration::from_millis(100),
        },
    }
}

fn fetcher(source: &Arc<SimulatedSource>) -> WindowedFetcher {
    WindowedFetcher::new(source.clone(), policy())
}

#[tokio::test]
async fn split_range_is_fetched_completely() {
    let now = listing() + Duration::days(3) + Duration::seconds(30);
    let source = Arc::new(SimulatedSource::new(now).with_instrument("BTCUSDT", listing()));

    let result = fetcher(&source)
        .fetch("BTCUSDT", Interval::M1, listing(), now, now)
        .await;

    assert_eq!(result.len(), 3 * 1440);
    assert!(result.is_continuous());
    assert_eq!(result.candles.first().unwrap().open_time, listing());
    assert_eq!(
        result.candles.last().unwrap().open_time,
        listing() + Duration::days(3) - Duration::minutes(1)
    );
    // 4개 하위 구간, 구간마다 여러 페이지
    assert!(source.candle_calls() >= 4 * 5);
}

#[tokio::test]
async fn forming_minute_is_excluded() {
    let last_open = listing() + Duration::minutes(9);
    let as_of = last_open + Duration::seconds(30);
    let source = Arc::new(SimulatedSource::new(as_of).with_instrument("BTCUSDT", listing()));

    let result = fetcher(&source)
        .fetch("BTCUSDT", Interval::M1, listing(), as_of, as_of)
        .await;

    assert_eq!(result.len(), 9);
    assert!(result.candles.iter().all(|c| c.open_time < last_open));
}

#[tokio::test(start_paused = true)]
async fn timed_out_window_is_retried() {
    let now = listing() + Duration::days(10);
    let source = Arc::new(SimulatedSource::new(now).with_instrument("BTCUSDT", listing()));
    source.push_fault(Fault::Stall(StdDuration::from_secs(5))).await;

    let result = fetcher(&source)
        .fetch("BTCUSDT", Interval::D1, listing(), now, now)
        .await;

    assert_eq!(result.len(), 10);
    assert!(result.is_continuous());
    assert_eq!(source.candle_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_yield_empty_result() {
    let now = listing() + Duration::days(10);
    let source = Arc::new(SimulatedSource::new(now).with_instrument("BTCUSDT", listing()));
    for _ in 0..3 {
        source
            .push_fault(Fault::Fail(ExchangeError::NetworkError("connection reset".into())))
            .await;
    }

    let result = fetcher(&source)
        .fetch("BTCUSDT", Interval::D1, listing(), now, now)
        .await;

    assert!(result.is_empty());
    assert_eq!(source.candle_calls(), 3);
}

#[tokio::test]
async fn unrecoverable_error_yields_empty_result() {
    let now = listing() + Duration::days(10);
    let source = Arc::new(SimulatedSource::new(now).with_instrument("BTCUSDT", listing()));
    source
        .push_fault(Fault::Fail(ExchangeError::ApiError {
            code: 10001,
            message: "params error".into(),
        }))
        .await;

    let result = fetcher(&source)
        .fetch("BTCUSDT", Interval::D1, listing(), now, now)
        .await;

    assert!(result.is_empty());
    assert_eq!(source.candle_calls(), 1);
}

#[tokio::test]
async fn remote_hole_is_reported_as_gap() {
    let now = listing() + Duration::days(10);
    let source = Arc::new(SimulatedSource::new(now).with_instrument("BTCUSDT", listing()));
    let day = |n: i64| listing() + Duration::days(n);
    source.add_hole("BTCUSDT", Interval::D1, day(5)).await;

    let result = fetcher(&source)
        .fetch("BTCUSDT", Interval::D1, listing(), now, now)
        .await;

    assert_eq!(result.len(), 9);
    assert_eq!(result.gaps, vec![Gap::new(day(4), day(6), Interval::D1)]);
}

#[tokio::test]
async fn range_before_listing_is_empty() {
    let now = listing() + Duration::days(10);
    let source = Arc::new(SimulatedSource::new(now).with_instrument("BTCUSDT", listing()));

    let result = fetcher(&source)
        .fetch(
            "BTCUSDT",
            Interval::H1,
            listing() - Duration::days(2),
            listing() - Duration::hours(1),
            now,
        )
        .await;

    assert!(result.is_empty());
    assert!(result.gaps.is_empty());
}

#[tokio::test]
async fn unaligned_listing_date_splits_without_losing_candles() {
    // 08:00 상장, 백필은 하루 전 08:00부터
    let launch = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 1, 31, 1, 0, 0).unwrap();
    let source = Arc::new(SimulatedSource::new(now).with_instrument("BTCUSDT", launch));
    let fetcher = WindowedFetcher::new(
        source.clone(),
        FetchPolicy {
            records_per_task: 5,
            ..policy()
        },
    );

    let result = fetcher
        .fetch("BTCUSDT", Interval::D1, launch - Duration::days(1), now, now)
        .await;

    assert_eq!(result.len(), 30);
    assert!(result.gaps.is_empty());
    assert_eq!(result.candles.first().unwrap().open_time, listing());
}

#[tokio::test(start_paused = true)]
async fn rate_limited_window_waits_for_hint() {
    let now = listing() + Duration::days(10);
    let source = Arc::new(SimulatedSource::new(now).with_instrument("BTCUSDT", listing()));
    source.push_fault(Fault::Fail(ExchangeError::RateLimited)).await;
    let fetcher = WindowedFetcher::new(
        source.clone(),
        FetchPolicy {
            retry: RetryPolicy::new(3, StdDuration::from_secs(1)),
            ..policy()
        },
    );

    let started = tokio::time::Instant::now();
    let result = fetcher
        .fetch("BTCUSDT", Interval::D1, listing(), now, now)
        .await;

    assert_eq!(result.len(), 10);
    assert_eq!(source.candle_calls(), 2);
    assert!(started.elapsed() >= StdDuration::from_secs(5));
}
