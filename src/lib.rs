//! # Market Dashboard
//!
//! Cryptocurrency market dashboard core: paginated market listings and a
//! global market summary fetched from CoinGecko, kept fresh by independent
//! polling schedules, with a keyed stale-while-revalidate cache, debounced
//! client-side search and page-count estimation.
//!
//! ## Layers
//!
//! - [`DashboardController`] is a synchronous state machine. It owns the view
//!   state, decides which fetches are due and derives the [`ViewModel`].
//! - [`DashboardTracker`] drives a controller on a background tokio task
//!   against any [`MarketDataGateway`], retrying transient failures.
//! - [`render`] turns a view model into table rows, stat cards and text.
//!
//! ## Usage
//!
//! ```no_run
//! use market_dashboard::{CoinGeckoGateway, DashboardConfig, DashboardTracker, SortOrder};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = Arc::new(CoinGeckoGateway::new()?);
//! let mut tracker = DashboardTracker::new(gateway, DashboardConfig::default(), Vec::new());
//! tracker.start();
//!
//! tracker.set_sort_order(SortOrder::VolumeDesc).await;
//! let view = tracker.view_model().await;
//! for entry in view.entries.iter() {
//!     println!("{}: {:?}", entry.symbol, entry.current_price);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod format;
pub mod gateway;
pub mod metrics;
pub mod observability;
pub mod providers;
pub mod render;
pub mod schedule;
pub mod store;
pub mod tracker;
pub mod types;

// Re-export commonly used types
pub use config::{api_url_from_env, DashboardConfig, RetryPolicy};
pub use controller::{DashboardController, FetchCommand, FetchOutcome, ViewModel, ViewState};
pub use error::{DashboardError, GatewayError, LoggingInitError};
pub use gateway::MarketDataGateway;
pub use metrics::FetchMetrics;
pub use providers::CoinGeckoGateway;
pub use render::render_dashboard;
pub use store::DashboardStore;
pub use tracker::DashboardTracker;
pub use types::{
    ComponentHealth, DashboardEvent, DataSource, GlobalSummary, HealthStatus, MarketEntry,
    RequestDescriptor, SortOrder,
};
