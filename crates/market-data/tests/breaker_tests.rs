mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use finsource_core::models::PriceQuery;
use finsource_core::MergeCache;
use finsource_market_data::{CircuitState, ProviderError};

#[tokio::test]
async fn test_breaker_opens_then_recovers_after_probe() {
    let cache = Arc::new(MergeCache::in_memory());
    let client = MockClient::new("quote", Reply::Fail(rate_limited("quote")));
    let limiter = limiter(5, Duration::from_millis(300));
    let source = adapter(client.clone(), &cache, &limiter);
    let query = PriceQuery::new("AAPL", day(1), day(5)).unwrap();

    for _ in 0..5 {
        let err = source.get_prices(&query, false).await.unwrap_err();
        assert!(matches!(err, ProviderError::RetriesExhausted { .. }));
    }
    assert_eq!(client.call_count(), 5);
    assert_eq!(limiter.snapshot("quote").unwrap().state, CircuitState::Open);

    let err = source.get_prices(&query, false).await.unwrap_err();
    assert!(matches!(err, ProviderError::CircuitOpen { .. }));
    assert!(err.is_transient());
    assert_eq!(client.call_count(), 5);

    tokio::time::sleep(Duration::from_millis(350)).await;
    client.set_reply(Reply::Prices(vec![price("2024-01-02", 1.0)]));

    let prices = source.get_prices(&query, false).await.unwrap();
    assert_eq!(prices.len(), 1);
    assert_eq!(client.call_count(), 6);

    let snapshot = limiter.snapshot("quote").unwrap();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.consecutive_errors, 0);
}

#[tokio::test]
async fn test_non_rate_limit_errors_do_not_trip_breaker() {
    let cache = Arc::new(MergeCache::in_memory());
    let client = MockClient::new("quote", Reply::Fail(network_error("quote")));
    let limiter = limiter(2, Duration::from_secs(300));
    let source = adapter(client.clone(), &cache, &limiter);
    let query = PriceQuery::new("AAPL", day(1), day(5)).unwrap();

    for _ in 0..4 {
        let err = source.get_prices(&query, false).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network { .. }));
    }
    assert_eq!(client.call_count(), 4);
    assert_eq!(limiter.snapshot("quote").unwrap().state, CircuitState::Closed);
}
