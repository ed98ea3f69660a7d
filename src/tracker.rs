//! Dashboard tracker service
//!
//! Runs a [`DashboardController`] against a [`MarketDataGateway`]: a
//! background task sleeps until the controller's next wakeup (debounce
//! deadline or poll due), executes the fetches it asks for with retry and
//! backoff, and publishes every new [`ViewModel`] on a watch channel and
//! every settled fetch as a [`DashboardEvent`] on a broadcast channel.

use crate::{
    config::{DashboardConfig, RetryPolicy},
    constants::{DEFAULT_SORT_ORDER, EVENT_CHANNEL_CAPACITY},
    controller::{DashboardController, FetchCommand, FetchOutcome, ViewModel},
    error::{DashboardError, GatewayError},
    gateway::MarketDataGateway,
    metrics::FetchMetrics,
    store::DashboardStore,
    types::{ComponentHealth, DashboardEvent, DataSource, MarketEntry, RequestDescriptor, SortOrder},
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};

/// Shared handles the background task and fetch tasks operate on
#[derive(Clone)]
struct Driver {
    controller: Arc<RwLock<DashboardController>>,
    gateway: Arc<dyn MarketDataGateway>,
    view_tx: Arc<watch::Sender<ViewModel>>,
    events: broadcast::Sender<DashboardEvent>,
    retry: RetryPolicy,
}

impl Driver {
    /// Polls the controller, publishes the view and spawns due fetches
    ///
    /// Returns when the controller next needs to be polled.
    async fn drive(&self) -> Option<Instant> {
        let now = Instant::now();
        let (commands, view, wakeup) = {
            let mut controller = self.controller.write().await;
            let commands = controller.poll(now);
            (commands, controller.view_model(), controller.next_wakeup())
        };

        self.view_tx.send_replace(view);
        self.dispatch(commands);
        wakeup
    }

    fn dispatch(&self, commands: Vec<FetchCommand>) -> Vec<JoinHandle<()>> {
        commands
            .into_iter()
            .map(|command| {
                tracing::debug!(
                    source = command.source().as_str(),
                    gateway = self.gateway.gateway_name(),
                    "Dispatching fetch"
                );
                let driver = self.clone();
                tokio::spawn(async move { driver.execute(command).await })
            })
            .collect()
    }

    async fn publish_view(&self) {
        let view = self.controller.read().await.view_model();
        self.view_tx.send_replace(view);
    }

    /// Runs one fetch to completion and applies the result
    async fn execute(&self, command: FetchCommand) {
        let started = Instant::now();
        let gateway = &self.gateway;

        let outcome = match command {
            FetchCommand::Listing { descriptor, ticket } => {
                let request = &descriptor;
                let result = with_retry(self.retry, DataSource::Listing, move || {
                    gateway.fetch_listing(request)
                })
                .await;
                FetchOutcome::Listing {
                    descriptor,
                    ticket,
                    result,
                    elapsed: started.elapsed(),
                }
            }
            FetchCommand::Summary { ticket } => {
                let result = with_retry(self.retry, DataSource::GlobalSummary, move || {
                    gateway.fetch_global_summary()
                })
                .await;
                FetchOutcome::Summary {
                    ticket,
                    result,
                    elapsed: started.elapsed(),
                }
            }
        };

        let (event, view) = {
            let mut controller = self.controller.write().await;
            let event = controller.apply(outcome, Instant::now());
            (event, controller.view_model())
        };
        self.view_tx.send_replace(view);

        if let Some(event) = event {
            tracing::debug!(event_type = event.event_type(), "{}", event);
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }
}

/// Retries `op` with exponential backoff while it fails with a retryable error
async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    source: DataSource,
    mut op: F,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                let backoff = policy.backoff(attempt);
                tracing::warn!(
                    source = source.as_str(),
                    attempt = attempt,
                    max_attempts = max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Fetch failed, retrying"
                );
                sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!(
                    source = source.as_str(),
                    attempt = attempt,
                    error = %e,
                    "Fetch failed"
                );
                return Err(e);
            }
        }
    }
}

/// Market dashboard tracker
///
/// Owns the dashboard state and keeps it fresh in the background once
/// [`DashboardTracker::start`] is called. User actions are async methods that
/// update the view state and immediately issue whatever fetch the new state
/// needs.
///
/// # Example
/// ```no_run
/// use market_dashboard::{CoinGeckoGateway, DashboardConfig, DashboardTracker};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = Arc::new(CoinGeckoGateway::new()?);
/// let config = DashboardConfig::default();
/// let seed = DashboardTracker::bootstrap_seed(gateway.as_ref(), &config).await;
///
/// let mut tracker = DashboardTracker::new(gateway, config, seed);
/// tracker.start();
/// tracker.set_search_term("sol").await;
///
/// let view = tracker.view_model().await;
/// println!("{} entries on page {}", view.entries.len(), view.current_page);
/// # Ok(())
/// # }
/// ```
pub struct DashboardTracker {
    driver: Driver,
    notify: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl DashboardTracker {
    /// Creates a stopped tracker with an empty cache
    pub fn new(
        gateway: Arc<dyn MarketDataGateway>,
        config: DashboardConfig,
        seed: Vec<MarketEntry>,
    ) -> Self {
        Self::with_store(gateway, config, seed, DashboardStore::new())
    }

    /// Creates a stopped tracker over an existing store
    pub fn with_store(
        gateway: Arc<dyn MarketDataGateway>,
        config: DashboardConfig,
        seed: Vec<MarketEntry>,
        store: DashboardStore,
    ) -> Self {
        let retry = config.retry;
        let controller = DashboardController::new(config, seed, store);
        let (view_tx, _) = watch::channel(controller.view_model());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            driver: Driver {
                controller: Arc::new(RwLock::new(controller)),
                gateway,
                view_tx: Arc::new(view_tx),
                events,
                retry,
            },
            notify: Arc::new(Notify::new()),
            task: None,
        }
    }

    /// Fetches the first page in the default order for use as seed data
    ///
    /// Never fails; an empty seed is returned if the fetch does.
    pub async fn bootstrap_seed(
        gateway: &dyn MarketDataGateway,
        config: &DashboardConfig,
    ) -> Vec<MarketEntry> {
        let descriptor = RequestDescriptor::new(
            config.currency.clone(),
            DEFAULT_SORT_ORDER,
            1,
            config.page_size,
        );
        let request = &descriptor;

        match with_retry(config.retry, DataSource::Listing, move || {
            gateway.fetch_listing(request)
        })
        .await
        {
            Ok(entries) => {
                tracing::info!(entries = entries.len(), "Loaded seed listing");
                entries
            }
            Err(e) => {
                tracing::warn!(error = %e, "Seed listing unavailable, starting empty");
                Vec::new()
            }
        }
    }

    /// Starts the background polling task
    ///
    /// Calling it again while running has no effect.
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }

        let driver = self.driver.clone();
        let notify = self.notify.clone();

        self.task = Some(tokio::spawn(async move {
            {
                let mut controller = driver.controller.write().await;
                controller.start(Instant::now());
                tracing::info!(
                    gateway = driver.gateway.gateway_name(),
                    listing_refresh_secs = controller.config().listing_refresh_interval.as_secs(),
                    summary_refresh_secs = controller.config().summary_refresh_interval.as_secs(),
                    "Starting market dashboard background task"
                );
            }

            loop {
                match driver.drive().await {
                    Some(wakeup) => {
                        tokio::select! {
                            _ = sleep_until(wakeup) => {}
                            _ = notify.notified() => {}
                        }
                    }
                    None => notify.notified().await,
                }
            }
        }));
    }

    /// Stops background polling
    ///
    /// In-flight fetches still settle; user actions keep issuing fetches.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.driver.controller.write().await.stop();
        tracing::info!("Stopped market dashboard background task");
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Updates the raw search text; the filter applies once typing settles
    pub async fn set_search_term(&self, text: impl Into<String>) {
        self.driver
            .controller
            .write()
            .await
            .set_search_term(text, Instant::now());
        self.wake().await;
    }

    pub async fn set_sort_order(&self, order: SortOrder) {
        self.driver.controller.write().await.set_sort_order(order);
        self.wake().await;
    }

    pub async fn set_page(&self, page: u32) -> Result<(), DashboardError> {
        self.driver.controller.write().await.set_page(page)?;
        self.wake().await;
        Ok(())
    }

    /// Moves to the next page; returns false if already on the last known page
    pub async fn next_page(&self) -> bool {
        let moved = self.driver.controller.write().await.next_page();
        if moved {
            self.wake().await;
        }
        moved
    }

    pub async fn previous_page(&self) -> bool {
        let moved = self.driver.controller.write().await.previous_page();
        if moved {
            self.wake().await;
        }
        moved
    }

    /// Forces an immediate refresh of the active page and the summary
    ///
    /// Waits for both fetches, retries included, to settle.
    pub async fn refresh_now(&self) {
        let commands = self
            .driver
            .controller
            .write()
            .await
            .refresh_now(Instant::now());
        self.driver.publish_view().await;

        for handle in self.driver.dispatch(commands) {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Refresh task did not complete");
            }
        }
        self.notify.notify_one();
    }

    /// Drops every cached page and the summary, then refetches
    pub async fn clear_cache(&self) {
        self.driver.controller.write().await.reset_cache();
        self.wake().await;
    }

    /// Current view model
    pub async fn view_model(&self) -> ViewModel {
        self.driver.controller.read().await.view_model()
    }

    /// Receiver that observes every published view model
    pub fn subscribe_view(&self) -> watch::Receiver<ViewModel> {
        self.driver.view_tx.subscribe()
    }

    /// Receiver for fetch events
    pub fn subscribe_events(&self) -> broadcast::Receiver<DashboardEvent> {
        self.driver.events.subscribe()
    }

    /// Latency and success metrics for one data source
    ///
    /// # Example
    /// ```no_run
    /// # use market_dashboard::{DashboardTracker, DataSource};
    /// # async fn example(tracker: &DashboardTracker) {
    /// let metrics = tracker.metrics(DataSource::Listing).await;
    /// println!("listing: p50={}ms, p99={}ms, success_rate={:.1}%",
    ///     metrics.latency_p50_ms,
    ///     metrics.latency_p99_ms,
    ///     metrics.success_rate * 100.0
    /// );
    /// # }
    /// ```
    pub async fn metrics(&self, source: DataSource) -> FetchMetrics {
        self.driver.controller.read().await.metrics(source)
    }

    /// Perform a health check on the dashboard
    pub async fn health_check(&self) -> ComponentHealth {
        let mut health = self.driver.controller.read().await.health_check();
        health.details.insert(
            "gateway".to_string(),
            serde_json::json!(self.gateway_name()),
        );
        health.details.insert(
            "background_task".to_string(),
            serde_json::json!(self.is_running()),
        );
        health
    }

    pub fn gateway_name(&self) -> &'static str {
        self.driver.gateway.gateway_name()
    }

    /// Re-polls right away and lets the background task recompute its wakeup
    async fn wake(&self) {
        self.driver.drive().await;
        self.notify.notify_one();
    }
}

impl Drop for DashboardTracker {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
