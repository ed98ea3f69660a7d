//! Types for the market dashboard

use crate::constants::{API_LOCALE, PRICE_CHANGE_WINDOWS};
use crate::error::DashboardError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// One traded asset's latest snapshot from a listing page
///
/// Every numeric field is optional: `None` means the upstream API did not
/// supply the value, never that it was zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEntry {
    /// Stable lowercase slug, e.g. "bitcoin"
    pub id: String,
    /// Ticker symbol as supplied upstream, e.g. "btc"
    pub symbol: String,
    /// Display name, e.g. "Bitcoin"
    pub name: String,
    /// Logo URL
    pub image: String,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_rank: Option<u32>,
    pub fully_diluted_valuation: Option<f64>,
    pub total_volume: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    /// Absolute 24h price change
    pub price_change_24h: Option<f64>,
    pub price_change_percentage_1h: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
    pub price_change_percentage_7d: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub ath: Option<f64>,
    pub ath_change_percentage: Option<f64>,
    pub atl: Option<f64>,
    pub atl_change_percentage: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl MarketEntry {
    /// Creates an entry with only identity fields populated
    pub fn new(id: impl Into<String>, symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            name: name.into(),
            image: String::new(),
            current_price: None,
            market_cap: None,
            market_cap_rank: None,
            fully_diluted_valuation: None,
            total_volume: None,
            high_24h: None,
            low_24h: None,
            price_change_24h: None,
            price_change_percentage_1h: None,
            price_change_percentage_24h: None,
            price_change_percentage_7d: None,
            circulating_supply: None,
            total_supply: None,
            max_supply: None,
            ath: None,
            ath_change_percentage: None,
            atl: None,
            atl_change_percentage: None,
            last_updated: None,
        }
    }

    /// Case-insensitive substring match on name or symbol
    ///
    /// `needle` must already be lowercased.
    pub fn matches_search(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.symbol.to_lowercase().contains(needle)
    }
}

/// Aggregate market snapshot from the global endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSummary {
    /// Total market capitalization keyed by currency code
    pub total_market_cap: BTreeMap<String, f64>,
    /// Total 24h volume keyed by currency code
    pub total_volume: BTreeMap<String, f64>,
    /// Dominance percentages keyed by lowercase symbol
    pub market_cap_percentage: BTreeMap<String, f64>,
    pub market_cap_change_percentage_24h_usd: Option<f64>,
    pub active_cryptocurrencies: u64,
    pub markets: Option<u64>,
    /// Unix epoch seconds
    pub updated_at: Option<i64>,
}

impl GlobalSummary {
    pub fn market_cap(&self, currency: &str) -> Option<f64> {
        self.total_market_cap.get(currency).copied()
    }

    pub fn volume(&self, currency: &str) -> Option<f64> {
        self.total_volume.get(currency).copied()
    }

    pub fn dominance(&self, symbol: &str) -> Option<f64> {
        self.market_cap_percentage.get(symbol).copied()
    }
}

/// Listing sort orders accepted by the upstream API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    MarketCapDesc,
    MarketCapAsc,
    VolumeDesc,
    VolumeAsc,
    IdAsc,
    IdDesc,
}

impl SortOrder {
    /// Wire value for the `order` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::MarketCapDesc => "market_cap_desc",
            SortOrder::MarketCapAsc => "market_cap_asc",
            SortOrder::VolumeDesc => "volume_desc",
            SortOrder::VolumeAsc => "volume_asc",
            SortOrder::IdAsc => "id_asc",
            SortOrder::IdDesc => "id_desc",
        }
    }

    /// Human label shown in the sort selector
    pub fn label(&self) -> &'static str {
        match self {
            SortOrder::MarketCapDesc => "Market Cap Desc",
            SortOrder::MarketCapAsc => "Market Cap Asc",
            SortOrder::VolumeDesc => "Volume Desc",
            SortOrder::VolumeAsc => "Volume Asc",
            SortOrder::IdAsc => "Name Asc (A-Z)",
            SortOrder::IdDesc => "Name Desc (Z-A)",
        }
    }

    /// All orders in selector order
    pub fn all() -> &'static [SortOrder] {
        &[
            SortOrder::MarketCapDesc,
            SortOrder::MarketCapAsc,
            SortOrder::VolumeDesc,
            SortOrder::VolumeAsc,
            SortOrder::IdAsc,
            SortOrder::IdDesc,
        ]
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        SortOrder::all()
            .iter()
            .copied()
            .find(|order| order.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| DashboardError::UnknownSortOrder(trimmed.to_string()))
    }
}

/// Cache key for one listing request
///
/// Equal descriptors identify the same upstream request; the store never
/// issues a second fetch for an equal descriptor inside its refresh window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestDescriptor {
    pub currency: String,
    pub order: SortOrder,
    pub page: u32,
    pub per_page: u32,
}

impl RequestDescriptor {
    pub fn new(currency: impl Into<String>, order: SortOrder, page: u32, per_page: u32) -> Self {
        Self {
            currency: currency.into(),
            order,
            page,
            per_page,
        }
    }

    /// Full query string for the listing endpoint, fixed parameters included
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("vs_currency", self.currency.clone()),
            ("order", self.order.as_str().to_string()),
            ("per_page", self.per_page.to_string()),
            ("page", self.page.to_string()),
            ("sparkline", "false".to_string()),
            ("price_change_percentage", PRICE_CHANGE_WINDOWS.to_string()),
            ("locale", API_LOCALE.to_string()),
        ]
    }
}

impl fmt::Display for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/p{}x{}",
            self.currency, self.order, self.page, self.per_page
        )
    }
}

/// The two independently fetched data sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Listing,
    GlobalSummary,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Listing => "listing",
            DataSource::GlobalSummary => "global_summary",
        }
    }
}

/// Events published whenever a fetch settles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DashboardEvent {
    /// A listing page was fetched and cached
    ListingUpdated {
        id: Uuid,
        order: SortOrder,
        page: u32,
        entries: usize,
        timestamp: DateTime<Utc>,
    },

    /// A listing fetch failed; cached data for the page is kept
    ListingFetchFailed {
        id: Uuid,
        order: SortOrder,
        page: u32,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// The global summary was refreshed
    SummaryUpdated {
        id: Uuid,
        active_cryptocurrencies: u64,
        timestamp: DateTime<Utc>,
    },

    /// The global summary fetch failed
    SummaryFetchFailed {
        id: Uuid,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl DashboardEvent {
    pub fn listing_updated(descriptor: &RequestDescriptor, entries: usize) -> Self {
        Self::ListingUpdated {
            id: Uuid::new_v4(),
            order: descriptor.order,
            page: descriptor.page,
            entries,
            timestamp: Utc::now(),
        }
    }

    pub fn listing_failed(descriptor: &RequestDescriptor, error_message: String) -> Self {
        Self::ListingFetchFailed {
            id: Uuid::new_v4(),
            order: descriptor.order,
            page: descriptor.page,
            error_message,
            timestamp: Utc::now(),
        }
    }

    pub fn summary_updated(active_cryptocurrencies: u64) -> Self {
        Self::SummaryUpdated {
            id: Uuid::new_v4(),
            active_cryptocurrencies,
            timestamp: Utc::now(),
        }
    }

    pub fn summary_failed(error_message: String) -> Self {
        Self::SummaryFetchFailed {
            id: Uuid::new_v4(),
            error_message,
            timestamp: Utc::now(),
        }
    }

    /// Get the event ID
    pub fn id(&self) -> Uuid {
        match self {
            DashboardEvent::ListingUpdated { id, .. } => *id,
            DashboardEvent::ListingFetchFailed { id, .. } => *id,
            DashboardEvent::SummaryUpdated { id, .. } => *id,
            DashboardEvent::SummaryFetchFailed { id, .. } => *id,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            DashboardEvent::ListingUpdated { .. } => "LISTING_UPDATED",
            DashboardEvent::ListingFetchFailed { .. } => "LISTING_FETCH_FAILED",
            DashboardEvent::SummaryUpdated { .. } => "SUMMARY_UPDATED",
            DashboardEvent::SummaryFetchFailed { .. } => "SUMMARY_FETCH_FAILED",
        }
    }

    pub fn source(&self) -> DataSource {
        match self {
            DashboardEvent::ListingUpdated { .. } | DashboardEvent::ListingFetchFailed { .. } => {
                DataSource::Listing
            }
            DashboardEvent::SummaryUpdated { .. } | DashboardEvent::SummaryFetchFailed { .. } => {
                DataSource::GlobalSummary
            }
        }
    }
}

impl fmt::Display for DashboardEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashboardEvent::ListingUpdated {
                order,
                page,
                entries,
                ..
            } => write!(f, "Listing updated: {} page {} ({} entries)", order, page, entries),
            DashboardEvent::ListingFetchFailed {
                order,
                page,
                error_message,
                ..
            } => write!(
                f,
                "Listing fetch failed for {} page {}: {}",
                order, page, error_message
            ),
            DashboardEvent::SummaryUpdated {
                active_cryptocurrencies,
                ..
            } => write!(
                f,
                "Global summary updated ({} active assets)",
                active_cryptocurrencies
            ),
            DashboardEvent::SummaryFetchFailed { error_message, .. } => {
                write!(f, "Global summary fetch failed: {}", error_message)
            }
        }
    }
}

/// Overall dashboard health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Listing and summary are both available with no outstanding errors
    Healthy,
    /// Data is displayable but at least one fetch is failing
    Degraded,
    /// Nothing to display
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub details: BTreeMap<String, serde_json::Value>,
    pub last_checked: DateTime<Utc>,
}
