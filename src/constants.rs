//! Constants for the market dashboard
//!
//! All default configuration lives here. `DashboardConfig::default()` is built
//! from these values; callers that need something else override fields on the
//! config rather than reading environment or files.

use crate::types::SortOrder;

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Listing endpoint (one page of ranked market entries)
pub const COINGECKO_MARKETS_ENDPOINT: &str = "/coins/markets";

/// Global market summary endpoint
pub const COINGECKO_GLOBAL_ENDPOINT: &str = "/global";

/// Currency every listing is priced in
pub const DEFAULT_VS_CURRENCY: &str = "usd";

/// Number of entries requested per listing page
pub const DEFAULT_PER_PAGE: u32 = 50;

/// Sort order used on startup
pub const DEFAULT_SORT_ORDER: SortOrder = SortOrder::MarketCapDesc;

/// Percentage windows requested alongside each listing
pub const PRICE_CHANGE_WINDOWS: &str = "1h,24h,7d";

/// Locale passed to the listing endpoint
pub const API_LOCALE: &str = "en";

/// How often the active listing page is revalidated (in seconds)
pub const LISTING_REFRESH_INTERVAL_SECS: u64 = 120;

/// How often the global summary is revalidated (in seconds)
pub const SUMMARY_REFRESH_INTERVAL_SECS: u64 = 300;

/// Delay before a typed search term is applied (in milliseconds)
pub const SEARCH_DEBOUNCE_MS: u64 = 300;

/// Cached pages other than the active one are dropped after this long (in seconds)
pub const CACHE_TTL_SECS: u64 = 900;

/// HTTP request timeout (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Maximum number of attempts for a single fetch
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Initial backoff delay for retries (in milliseconds)
pub const INITIAL_BACKOFF_MS: u64 = 1000;

/// Maximum backoff delay for retries (in milliseconds)
pub const MAX_BACKOFF_MS: u64 = 30000;

/// Capacity of the dashboard event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// User agent for HTTP requests
pub const USER_AGENT: &str = "market-dashboard/0.1.0";

/// Marker rendered for any missing numeric value
pub const UNAVAILABLE: &str = "N/A";
