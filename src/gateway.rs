//! Gateway abstraction over the upstream market data API

use crate::{
    error::GatewayError,
    types::{GlobalSummary, MarketEntry, RequestDescriptor},
};
use async_trait::async_trait;

/// Trait for market data gateways
///
/// Implementations wrap one upstream HTTP contract and translate transport
/// and validation failures into [`GatewayError`]. Gateways never retry;
/// retry policy belongs to the tracker that drives them.
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Fetches one page of market entries
    ///
    /// # Arguments
    /// * `descriptor` - Currency, sort order, page and page size of the request
    ///
    /// # Returns
    /// Entries in upstream order, or an error if the fetch fails
    async fn fetch_listing(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<Vec<MarketEntry>, GatewayError>;

    /// Fetches the global market summary
    async fn fetch_global_summary(&self) -> Result<GlobalSummary, GatewayError>;

    /// Returns the name of this gateway
    fn gateway_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type ListingResult = Result<Vec<MarketEntry>, GatewayError>;

    /// Mock gateway for testing
    ///
    /// Serves scripted results per descriptor; unscripted descriptors return
    /// an empty page. An optional delay keeps requests in flight, which is
    /// useful under tokio's paused clock.
    #[derive(Clone)]
    pub struct MockGateway {
        listings: Arc<Mutex<HashMap<RequestDescriptor, ListingResult>>>,
        summary: Arc<Mutex<Result<GlobalSummary, GatewayError>>>,
        delay: Arc<Mutex<Duration>>,
        listing_calls: Arc<Mutex<Vec<RequestDescriptor>>>,
        summary_calls: Arc<Mutex<usize>>,
    }

    impl Default for MockGateway {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockGateway {
        pub fn new() -> Self {
            Self {
                listings: Arc::new(Mutex::new(HashMap::new())),
                summary: Arc::new(Mutex::new(Ok(sample_summary()))),
                delay: Arc::new(Mutex::new(Duration::ZERO)),
                listing_calls: Arc::new(Mutex::new(Vec::new())),
                summary_calls: Arc::new(Mutex::new(0)),
            }
        }

        pub fn set_listing(&self, descriptor: RequestDescriptor, result: ListingResult) {
            self.listings.lock().unwrap().insert(descriptor, result);
        }

        pub fn set_summary(&self, result: Result<GlobalSummary, GatewayError>) {
            *self.summary.lock().unwrap() = result;
        }

        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock().unwrap() = delay;
        }

        pub fn listing_calls(&self) -> usize {
            self.listing_calls.lock().unwrap().len()
        }

        pub fn listing_calls_for(&self, descriptor: &RequestDescriptor) -> usize {
            self.listing_calls
                .lock()
                .unwrap()
                .iter()
                .filter(|d| *d == descriptor)
                .count()
        }

        pub fn summary_calls(&self) -> usize {
            *self.summary_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl MarketDataGateway for MockGateway {
        async fn fetch_listing(
            &self,
            descriptor: &RequestDescriptor,
        ) -> Result<Vec<MarketEntry>, GatewayError> {
            self.listing_calls.lock().unwrap().push(descriptor.clone());
            let delay = *self.delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.listings
                .lock()
                .unwrap()
                .get(descriptor)
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn fetch_global_summary(&self) -> Result<GlobalSummary, GatewayError> {
            *self.summary_calls.lock().unwrap() += 1;
            let delay = *self.delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.summary.lock().unwrap().clone()
        }

        fn gateway_name(&self) -> &'static str {
            "mock"
        }
    }

    /// `count` entries named coin-0, coin-1, ... with distinct symbols
    pub fn entries(count: usize) -> Vec<MarketEntry> {
        (0..count)
            .map(|i| {
                let mut entry =
                    MarketEntry::new(format!("coin-{}", i), format!("c{}", i), format!("Coin {}", i));
                entry.market_cap_rank = Some(i as u32 + 1);
                entry.current_price = Some(100.0 + i as f64);
                entry
            })
            .collect()
    }

    pub fn sample_summary() -> GlobalSummary {
        GlobalSummary {
            total_market_cap: BTreeMap::from([("usd".to_string(), 2.4e12)]),
            total_volume: BTreeMap::from([("usd".to_string(), 9.1e10)]),
            market_cap_percentage: BTreeMap::from([
                ("btc".to_string(), 52.3),
                ("eth".to_string(), 17.1),
            ]),
            market_cap_change_percentage_24h_usd: Some(1.8),
            active_cryptocurrencies: 12_000,
            markets: Some(1_100),
            updated_at: Some(1_700_000_000),
        }
    }
}
