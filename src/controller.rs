//! Dashboard state machine
//!
//! [`DashboardController`] owns the user-driven view state (search text, sort
//! order, page), derives the listing [`RequestDescriptor`] from it, decides
//! which fetches are due, applies fetch results to the injected
//! [`DashboardStore`] and computes the [`ViewModel`] that renderers consume.
//!
//! The controller performs no I/O and never reads the clock: every
//! time-dependent call takes `now`. [`crate::tracker::DashboardTracker`]
//! runs it against a real gateway; tests drive it by hand.
//!
//! ```text
//! set_search_term / set_sort_order / set_page
//!     ↓
//! poll(now) -> Vec<FetchCommand>     (descriptor changed, cache miss, poll due)
//!     ↓
//! gateway fetch (outside the controller)
//!     ↓
//! apply(FetchOutcome, now)           (stale tickets discarded)
//!     ↓
//! view_model()
//! ```

use crate::{
    config::DashboardConfig,
    constants::DEFAULT_SORT_ORDER,
    debounce::Debouncer,
    error::{DashboardError, GatewayError},
    metrics::{FetchMetrics, MetricsCollector},
    schedule::RefreshSchedule,
    store::{DashboardStore, FetchTicket},
    types::{
        ComponentHealth, DashboardEvent, DataSource, GlobalSummary, HealthStatus, MarketEntry,
        RequestDescriptor, SortOrder,
    },
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// User-owned view state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    /// Raw search text as typed
    pub search_term: String,
    pub sort_order: SortOrder,
    /// 1-based
    pub current_page: u32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            sort_order: DEFAULT_SORT_ORDER,
            current_page: 1,
        }
    }
}

/// A fetch the caller must execute and report back through [`DashboardController::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCommand {
    Listing {
        descriptor: RequestDescriptor,
        ticket: FetchTicket,
    },
    Summary {
        ticket: FetchTicket,
    },
}

impl FetchCommand {
    pub fn source(&self) -> DataSource {
        match self {
            FetchCommand::Listing { .. } => DataSource::Listing,
            FetchCommand::Summary { .. } => DataSource::GlobalSummary,
        }
    }
}

/// Settled result of a [`FetchCommand`]
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Listing {
        descriptor: RequestDescriptor,
        ticket: FetchTicket,
        result: Result<Vec<MarketEntry>, GatewayError>,
        elapsed: Duration,
    },
    Summary {
        ticket: FetchTicket,
        result: Result<GlobalSummary, GatewayError>,
        elapsed: Duration,
    },
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub search_term: String,
    pub debounced_search: String,
    pub sort_order: SortOrder,
    pub current_page: u32,
    pub page_size: u32,
    pub currency: String,
    /// Entries to render, after search filtering
    pub entries: Arc<Vec<MarketEntry>>,
    /// Size of the unfiltered data set the entries were drawn from
    pub unfiltered_len: usize,
    /// The page came back full, so a next page may exist
    pub has_more_data: bool,
    /// Lower-bound page count; grows as full pages are observed
    pub estimated_total_pages: u32,
    /// Nothing to show yet and a fetch is pending
    pub display_loading: bool,
    /// Data is shown while a background revalidation runs
    pub is_refreshing: bool,
    pub listing_error: Option<String>,
    pub summary: Option<Arc<GlobalSummary>>,
    pub summary_loading: bool,
    /// Only set when no summary data is available at all
    pub summary_error: Option<String>,
    /// A search is active and matched nothing
    pub no_results: bool,
    pub show_pagination: bool,
}

pub struct DashboardController {
    config: DashboardConfig,
    view: ViewState,
    search: Debouncer<String>,
    store: DashboardStore,
    seed: Arc<Vec<MarketEntry>>,
    empty: Arc<Vec<MarketEntry>>,
    listing_schedule: RefreshSchedule,
    summary_schedule: RefreshSchedule,
    last_issued: Option<RequestDescriptor>,
    listing_metrics: MetricsCollector,
    summary_metrics: MetricsCollector,
}

impl DashboardController {
    /// Creates a controller over an injected store
    ///
    /// `seed` is shown for the default view (first page, default order, no
    /// search) until live data arrives.
    pub fn new(config: DashboardConfig, seed: Vec<MarketEntry>, store: DashboardStore) -> Self {
        let search = Debouncer::new(String::new(), config.search_debounce);
        let listing_schedule = RefreshSchedule::new(config.listing_refresh_interval);
        let summary_schedule = RefreshSchedule::new(config.summary_refresh_interval);

        Self {
            config,
            view: ViewState::default(),
            search,
            store,
            seed: Arc::new(seed),
            empty: Arc::new(Vec::new()),
            listing_schedule,
            summary_schedule,
            last_issued: None,
            listing_metrics: MetricsCollector::new(DataSource::Listing),
            summary_metrics: MetricsCollector::new(DataSource::GlobalSummary),
        }
    }

    /// Starts both polling schedules
    pub fn start(&mut self, now: Instant) {
        self.listing_schedule.start(now);
        self.summary_schedule.start(now);
    }

    /// Stops polling; user-driven fetches still happen
    pub fn stop(&mut self) {
        self.listing_schedule.stop();
        self.summary_schedule.stop();
    }

    pub fn set_search_term(&mut self, text: impl Into<String>, now: Instant) {
        let text = text.into();
        self.search.push(text.clone(), now);
        self.view.search_term = text;
        self.view.current_page = 1;
    }

    pub fn set_sort_order(&mut self, order: SortOrder) {
        self.view.sort_order = order;
        self.view.current_page = 1;
    }

    /// Sets the page; there is no upper bound since the total is unknown
    pub fn set_page(&mut self, page: u32) -> Result<(), DashboardError> {
        if page < 1 {
            return Err(DashboardError::InvalidPage(page));
        }
        self.view.current_page = page;
        Ok(())
    }

    /// Advances one page if the estimate allows it
    pub fn next_page(&mut self) -> bool {
        let total = self.estimated_total_pages();
        if self.view.current_page < total {
            self.view.current_page += 1;
            true
        } else {
            false
        }
    }

    pub fn previous_page(&mut self) -> bool {
        if self.view.current_page > 1 {
            self.view.current_page -= 1;
            true
        } else {
            false
        }
    }

    /// Replaces the seed data
    pub fn set_seed(&mut self, seed: Vec<MarketEntry>) {
        self.seed = Arc::new(seed);
    }

    /// Listing descriptor for the current view state
    pub fn descriptor(&self) -> RequestDescriptor {
        RequestDescriptor::new(
            self.config.currency.clone(),
            self.view.sort_order,
            self.view.current_page,
            self.config.page_size,
        )
    }

    /// Commits a settled search term and returns the fetches that are due
    pub fn poll(&mut self, now: Instant) -> Vec<FetchCommand> {
        if self.search.poll(now) {
            tracing::debug!(search = %self.search.value(), "Search term applied");
        }

        let mut commands = Vec::new();
        let descriptor = self.descriptor();

        let (cached, fetching) = match self.store.listing(&descriptor) {
            Some(entry) => (true, entry.is_fetching()),
            None => (false, false),
        };
        let changed = self.last_issued.as_ref() != Some(&descriptor);
        let poll_due = self.listing_schedule.is_due(now);

        if fetching {
            if poll_due {
                self.listing_schedule.reset(now);
            }
            self.last_issued = Some(descriptor.clone());
        } else if !cached || changed || poll_due {
            tracing::debug!(
                descriptor = %descriptor,
                cached,
                changed,
                poll_due,
                "Issuing listing fetch"
            );
            let ticket = self.store.begin_listing(&descriptor);
            self.listing_schedule.reset(now);
            self.last_issued = Some(descriptor.clone());
            commands.push(FetchCommand::Listing {
                descriptor: descriptor.clone(),
                ticket,
            });
        }

        let summary = self.store.summary();
        let never_fetched = summary.updated_at().is_none() && !summary.is_fetching();
        let summary_due = self.summary_schedule.is_due(now);
        if summary.is_fetching() {
            if summary_due {
                self.summary_schedule.reset(now);
            }
        } else if never_fetched || summary_due {
            let ticket = self.store.begin_summary();
            self.summary_schedule.reset(now);
            commands.push(FetchCommand::Summary { ticket });
        }

        let pruned = self.store.prune(&descriptor, self.config.cache_ttl, now);
        if pruned > 0 {
            tracing::debug!(pruned, "Evicted idle listing pages");
        }

        commands
    }

    /// Revalidates the active page and the summary regardless of schedule
    ///
    /// Any in-flight fetch for the same key is superseded.
    pub fn refresh_now(&mut self, now: Instant) -> Vec<FetchCommand> {
        let descriptor = self.descriptor();
        let listing_ticket = self.store.begin_listing(&descriptor);
        let summary_ticket = self.store.begin_summary();
        self.listing_schedule.reset(now);
        self.summary_schedule.reset(now);
        self.last_issued = Some(descriptor.clone());

        vec![
            FetchCommand::Listing {
                descriptor,
                ticket: listing_ticket,
            },
            FetchCommand::Summary {
                ticket: summary_ticket,
            },
        ]
    }

    /// Applies a settled fetch
    ///
    /// Returns the event to publish, or `None` if the result was superseded
    /// and discarded.
    pub fn apply(&mut self, outcome: FetchOutcome, now: Instant) -> Option<DashboardEvent> {
        match outcome {
            FetchOutcome::Listing {
                descriptor,
                ticket,
                result,
                elapsed,
            } => {
                self.listing_metrics.record(elapsed, result.is_ok());
                let event = match &result {
                    Ok(entries) => DashboardEvent::listing_updated(&descriptor, entries.len()),
                    Err(err) => DashboardEvent::listing_failed(&descriptor, err.to_string()),
                };
                if self.store.complete_listing(&descriptor, ticket, result, now) {
                    Some(event)
                } else {
                    tracing::debug!(
                        descriptor = %descriptor,
                        ticket = ticket.value(),
                        "Discarding superseded listing response"
                    );
                    None
                }
            }
            FetchOutcome::Summary {
                ticket,
                result,
                elapsed,
            } => {
                self.summary_metrics.record(elapsed, result.is_ok());
                let event = match &result {
                    Ok(summary) => DashboardEvent::summary_updated(summary.active_cryptocurrencies),
                    Err(err) => DashboardEvent::summary_failed(err.to_string()),
                };
                if self.store.complete_summary(ticket, result, now) {
                    Some(event)
                } else {
                    tracing::debug!(ticket = ticket.value(), "Discarding superseded summary response");
                    None
                }
            }
        }
    }

    /// Earliest instant at which [`Self::poll`] has work to do
    pub fn next_wakeup(&self) -> Option<Instant> {
        [
            self.search.deadline(),
            self.listing_schedule.next_due(),
            self.summary_schedule.next_due(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    pub fn view_model(&self) -> ViewModel {
        let descriptor = self.descriptor();
        let entry = self.store.listing(&descriptor);
        let live = entry.and_then(|e| e.data());
        let seed_applies = self.seed_applies();

        let current = match live {
            Some(data) => Arc::clone(data),
            None if seed_applies => Arc::clone(&self.seed),
            None => Arc::clone(&self.empty),
        };

        let debounced = self.search.value().clone();
        let entries = if debounced.is_empty() {
            Arc::clone(&current)
        } else {
            let needle = debounced.to_lowercase();
            Arc::new(
                current
                    .iter()
                    .filter(|e| e.matches_search(&needle))
                    .cloned()
                    .collect(),
            )
        };

        let has_more_data = current.len() == self.config.page_size as usize;
        let estimated_total_pages = if has_more_data {
            self.view.current_page.saturating_add(1)
        } else {
            self.view.current_page
        };

        let has_data = live.is_some() || (seed_applies && !self.seed.is_empty());
        let pending = entry.map_or(true, |e| e.is_fetching());
        let display_loading = !has_data && pending;
        let is_refreshing = has_data && entry.is_some_and(|e| e.is_fetching());

        let summary_entry = self.store.summary();
        let summary = summary_entry.data().cloned();
        let summary_loading = summary.is_none()
            && (summary_entry.is_fetching() || summary_entry.updated_at().is_none());
        let summary_error = if summary.is_none() {
            summary_entry.error().map(|e| e.to_string())
        } else {
            None
        };

        let no_results = !display_loading && !debounced.is_empty() && entries.is_empty();
        let show_pagination = !display_loading && estimated_total_pages > 1;

        ViewModel {
            search_term: self.view.search_term.clone(),
            debounced_search: debounced,
            sort_order: self.view.sort_order,
            current_page: self.view.current_page,
            page_size: self.config.page_size,
            currency: self.config.currency.clone(),
            entries,
            unfiltered_len: current.len(),
            has_more_data,
            estimated_total_pages,
            display_loading,
            is_refreshing,
            listing_error: entry.and_then(|e| e.error()).map(|e| e.to_string()),
            summary,
            summary_loading,
            summary_error,
            no_results,
            show_pagination,
        }
    }

    pub fn view_state(&self) -> &ViewState {
        &self.view
    }

    pub fn debounced_search(&self) -> &str {
        self.search.value()
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn store(&self) -> &DashboardStore {
        &self.store
    }

    /// Drops every cached page and the summary
    pub fn reset_cache(&mut self) {
        self.store.clear();
        self.last_issued = None;
    }

    pub fn metrics(&self, source: DataSource) -> FetchMetrics {
        match source {
            DataSource::Listing => self.listing_metrics.snapshot(),
            DataSource::GlobalSummary => self.summary_metrics.snapshot(),
        }
    }

    /// Health of the dashboard as seen by a user of the current view
    pub fn health_check(&self) -> ComponentHealth {
        let view = self.view_model();
        let mut details = BTreeMap::new();

        details.insert("rows".to_string(), serde_json::json!(view.unfiltered_len));
        details.insert("current_page".to_string(), serde_json::json!(view.current_page));
        details.insert("cached_pages".to_string(), serde_json::json!(self.store.len()));
        details.insert(
            "listing_error".to_string(),
            serde_json::json!(view.listing_error),
        );
        details.insert(
            "summary_available".to_string(),
            serde_json::json!(view.summary.is_some()),
        );
        for source in [DataSource::Listing, DataSource::GlobalSummary] {
            let metrics = self.metrics(source);
            details.insert(
                format!("{}_metrics", source.as_str()),
                serde_json::to_value(&metrics).unwrap_or(serde_json::Value::Null),
            );
        }

        let summary_failed = self.store.summary().error().is_some();
        let status = if view.unfiltered_len == 0 {
            HealthStatus::Unhealthy
        } else if view.listing_error.is_some() || summary_failed {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let message = match status {
            HealthStatus::Healthy => "Dashboard is showing fresh data".to_string(),
            HealthStatus::Degraded => "Dashboard is showing data but a fetch is failing".to_string(),
            HealthStatus::Unhealthy => "Dashboard has no listing data to show".to_string(),
        };

        ComponentHealth {
            name: "market_dashboard".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: Utc::now(),
        }
    }

    fn estimated_total_pages(&self) -> u32 {
        self.view_model().estimated_total_pages
    }

    /// Seed data stands in only for the default view
    fn seed_applies(&self) -> bool {
        self.view.current_page == 1
            && self.view.sort_order == DEFAULT_SORT_ORDER
            && self.search.value().is_empty()
    }
}
