//! Keyed in-memory cache for listing pages and the global summary
//!
//! The store is the single writer for every cached value. Each fetch is
//! started with [`DashboardStore::begin_listing`] / [`DashboardStore::begin_summary`],
//! which hands out a [`FetchTicket`]; a result is only applied when it brings
//! back the latest ticket for its key, so superseded responses are dropped
//! instead of overwriting newer state.

use crate::{
    error::GatewayError,
    types::{GlobalSummary, MarketEntry, RequestDescriptor},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Identifies one issued fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchTicket(u64);

impl FetchTicket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Fetch lifecycle of one cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Fetching,
    Succeeded,
    Failed,
}

/// Cached value for one key plus its fetch bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    data: Option<Arc<T>>,
    error: Option<GatewayError>,
    updated_at: Option<Instant>,
    in_flight: Option<FetchTicket>,
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            updated_at: None,
            in_flight: None,
        }
    }
}

impl<T> CacheEntry<T> {
    /// Last successfully fetched value
    pub fn data(&self) -> Option<&Arc<T>> {
        self.data.as_ref()
    }

    /// Error from the most recent settled fetch, if it failed
    pub fn error(&self) -> Option<&GatewayError> {
        self.error.as_ref()
    }

    /// When the most recent fetch settled
    pub fn updated_at(&self) -> Option<Instant> {
        self.updated_at
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn state(&self) -> FetchState {
        if self.in_flight.is_some() {
            FetchState::Fetching
        } else if self.error.is_some() {
            FetchState::Failed
        } else if self.data.is_some() {
            FetchState::Succeeded
        } else {
            FetchState::Idle
        }
    }

    fn begin(&mut self, ticket: FetchTicket) {
        self.in_flight = Some(ticket);
    }

    /// Applies a result if `ticket` is still the authoritative one
    ///
    /// Errors never clear previously cached data.
    fn complete(&mut self, ticket: FetchTicket, result: Result<T, GatewayError>, now: Instant) -> bool {
        if self.in_flight != Some(ticket) {
            return false;
        }

        self.in_flight = None;
        self.updated_at = Some(now);
        match result {
            Ok(data) => {
                self.data = Some(Arc::new(data));
                self.error = None;
            }
            Err(err) => {
                self.error = Some(err);
            }
        }
        true
    }
}

/// Listing and summary cache
#[derive(Debug, Default)]
pub struct DashboardStore {
    listings: HashMap<RequestDescriptor, CacheEntry<Vec<MarketEntry>>>,
    summary: CacheEntry<GlobalSummary>,
    next_ticket: u64,
}

impl DashboardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listing(&self, descriptor: &RequestDescriptor) -> Option<&CacheEntry<Vec<MarketEntry>>> {
        self.listings.get(descriptor)
    }

    pub fn summary(&self) -> &CacheEntry<GlobalSummary> {
        &self.summary
    }

    /// Marks a listing fetch as in flight, superseding any earlier one for
    /// the same descriptor
    pub fn begin_listing(&mut self, descriptor: &RequestDescriptor) -> FetchTicket {
        let ticket = self.issue_ticket();
        self.listings
            .entry(descriptor.clone())
            .or_default()
            .begin(ticket);
        ticket
    }

    /// Stores a listing result; returns false if it was superseded
    pub fn complete_listing(
        &mut self,
        descriptor: &RequestDescriptor,
        ticket: FetchTicket,
        result: Result<Vec<MarketEntry>, GatewayError>,
        now: Instant,
    ) -> bool {
        match self.listings.get_mut(descriptor) {
            Some(entry) => entry.complete(ticket, result, now),
            None => false,
        }
    }

    pub fn begin_summary(&mut self) -> FetchTicket {
        let ticket = self.issue_ticket();
        self.summary.begin(ticket);
        ticket
    }

    pub fn complete_summary(
        &mut self,
        ticket: FetchTicket,
        result: Result<GlobalSummary, GatewayError>,
        now: Instant,
    ) -> bool {
        self.summary.complete(ticket, result, now)
    }

    /// Drops one cached page; an in-flight result for it will be discarded
    pub fn evict(&mut self, descriptor: &RequestDescriptor) -> bool {
        self.listings.remove(descriptor).is_some()
    }

    /// Drops idle pages other than `keep` that settled more than `ttl` ago
    ///
    /// Returns the number of evicted pages.
    pub fn prune(&mut self, keep: &RequestDescriptor, ttl: Duration, now: Instant) -> usize {
        let before = self.listings.len();
        self.listings.retain(|descriptor, entry| {
            descriptor == keep
                || entry.is_fetching()
                || entry
                    .updated_at
                    .is_some_and(|at| now.saturating_duration_since(at) < ttl)
        });
        before - self.listings.len()
    }

    /// Empties the cache, summary included
    pub fn clear(&mut self) {
        self.listings.clear();
        self.summary = CacheEntry::default();
    }

    /// Number of cached listing pages
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    fn issue_ticket(&mut self) -> FetchTicket {
        self.next_ticket += 1;
        FetchTicket(self.next_ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::{entries, sample_summary};
    use crate::types::SortOrder;

    fn page(n: u32) -> RequestDescriptor {
        RequestDescriptor::new("usd", SortOrder::MarketCapDesc, n, 50)
    }

    #[test]
    fn listing_lifecycle() {
        let now = Instant::now();
        let mut store = DashboardStore::new();
        assert!(store.listing(&page(1)).is_none());

        let ticket = store.begin_listing(&page(1));
        assert_eq!(store.listing(&page(1)).unwrap().state(), FetchState::Fetching);

        assert!(store.complete_listing(&page(1), ticket, Ok(entries(3)), now));
        let entry = store.listing(&page(1)).unwrap();
        assert_eq!(entry.state(), FetchState::Succeeded);
        assert_eq!(entry.data().unwrap().len(), 3);
        assert_eq!(entry.updated_at(), Some(now));
    }

    #[test]
    fn failure_keeps_last_good_data() {
        let now = Instant::now();
        let mut store = DashboardStore::new();

        let t1 = store.begin_listing(&page(1));
        store.complete_listing(&page(1), t1, Ok(entries(20)), now);

        let t2 = store.begin_listing(&page(1));
        store.complete_listing(&page(1), t2, Err(GatewayError::status(500, "down")), now);

        let entry = store.listing(&page(1)).unwrap();
        assert_eq!(entry.state(), FetchState::Failed);
        assert_eq!(entry.data().unwrap().len(), 20);
        assert_eq!(entry.error().unwrap().status_code(), Some(500));
    }

    #[test]
    fn superseded_response_is_discarded() {
        let now = Instant::now();
        let mut store = DashboardStore::new();

        let old = store.begin_listing(&page(1));
        let new = store.begin_listing(&page(1));

        assert!(store.complete_listing(&page(1), new, Ok(entries(5)), now));
        assert!(!store.complete_listing(&page(1), old, Ok(entries(1)), now));
        assert_eq!(store.listing(&page(1)).unwrap().data().unwrap().len(), 5);
    }

    #[test]
    fn responses_only_touch_their_own_key() {
        let now = Instant::now();
        let mut store = DashboardStore::new();

        let t1 = store.begin_listing(&page(1));
        let t2 = store.begin_listing(&page(2));
        store.complete_listing(&page(2), t2, Ok(entries(31)), now);
        // A ticket for page 1 cannot be applied to page 2
        assert!(!store.complete_listing(&page(2), t1, Ok(entries(1)), now));
        store.complete_listing(&page(1), t1, Ok(entries(50)), now);

        assert_eq!(store.listing(&page(1)).unwrap().data().unwrap().len(), 50);
        assert_eq!(store.listing(&page(2)).unwrap().data().unwrap().len(), 31);
    }

    #[test]
    fn summary_lifecycle() {
        let now = Instant::now();
        let mut store = DashboardStore::new();
        assert_eq!(store.summary().state(), FetchState::Idle);

        let ticket = store.begin_summary();
        assert!(store.complete_summary(ticket, Ok(sample_summary()), now));
        assert_eq!(store.summary().state(), FetchState::Succeeded);
    }

    #[test]
    fn evicted_page_rejects_late_result() {
        let now = Instant::now();
        let mut store = DashboardStore::new();

        let ticket = store.begin_listing(&page(3));
        assert!(store.evict(&page(3)));
        assert!(!store.complete_listing(&page(3), ticket, Ok(entries(1)), now));
        assert!(store.is_empty());
    }

    #[test]
    fn prune_keeps_active_fresh_and_in_flight_pages() {
        let start = Instant::now();
        let ttl = Duration::from_secs(900);
        let mut store = DashboardStore::new();

        for n in 1..=3 {
            let t = store.begin_listing(&page(n));
            store.complete_listing(&page(n), t, Ok(entries(1)), start);
        }
        let _in_flight = store.begin_listing(&page(4));
        let t5 = store.begin_listing(&page(5));
        store.complete_listing(&page(5), t5, Ok(entries(1)), start + Duration::from_secs(800));

        let removed = store.prune(&page(1), ttl, start + ttl);
        assert_eq!(removed, 2);
        assert!(store.listing(&page(1)).is_some());
        assert!(store.listing(&page(4)).is_some());
        assert!(store.listing(&page(5)).is_some());
        assert!(store.listing(&page(2)).is_none());
    }

    #[test]
    fn clear_resets_everything() {
        let mut store = DashboardStore::new();
        store.begin_listing(&page(1));
        store.begin_summary();
        store.clear();
        assert_eq!(store.len(), 0);
        assert_eq!(store.summary().state(), FetchState::Idle);
    }
}
