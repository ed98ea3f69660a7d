//! CoinGecko gateway implementation

use crate::{
    constants::{
        COINGECKO_API_URL, COINGECKO_GLOBAL_ENDPOINT, COINGECKO_MARKETS_ENDPOINT,
        REQUEST_TIMEOUT_SECS, USER_AGENT,
    },
    error::GatewayError,
    gateway::MarketDataGateway,
    types::{GlobalSummary, MarketEntry, RequestDescriptor},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// One record of the `/coins/markets` response
#[derive(Debug, Deserialize)]
struct MarketEntryWire {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    current_price: Option<f64>,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    market_cap_rank: Option<u32>,
    #[serde(default)]
    fully_diluted_valuation: Option<f64>,
    #[serde(default)]
    total_volume: Option<f64>,
    #[serde(default)]
    high_24h: Option<f64>,
    #[serde(default)]
    low_24h: Option<f64>,
    #[serde(default)]
    price_change_24h: Option<f64>,
    #[serde(default)]
    price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    price_change_percentage_1h_in_currency: Option<f64>,
    #[serde(default)]
    price_change_percentage_24h_in_currency: Option<f64>,
    #[serde(default)]
    price_change_percentage_7d_in_currency: Option<f64>,
    #[serde(default)]
    circulating_supply: Option<f64>,
    #[serde(default)]
    total_supply: Option<f64>,
    #[serde(default)]
    max_supply: Option<f64>,
    #[serde(default)]
    ath: Option<f64>,
    #[serde(default)]
    ath_change_percentage: Option<f64>,
    #[serde(default)]
    atl: Option<f64>,
    #[serde(default)]
    atl_change_percentage: Option<f64>,
    #[serde(default)]
    last_updated: Option<String>,
}

impl MarketEntryWire {
    fn into_entry(self) -> Result<MarketEntry, GatewayError> {
        if self.id.trim().is_empty() {
            return Err(GatewayError::malformed("market entry with empty id"));
        }

        let last_updated = self
            .last_updated
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(MarketEntry {
            id: self.id,
            symbol: self.symbol,
            name: self.name,
            image: self.image.unwrap_or_default(),
            current_price: self.current_price,
            market_cap: self.market_cap,
            market_cap_rank: self.market_cap_rank,
            fully_diluted_valuation: self.fully_diluted_valuation,
            total_volume: self.total_volume,
            high_24h: self.high_24h,
            low_24h: self.low_24h,
            price_change_24h: self.price_change_24h,
            price_change_percentage_1h: self.price_change_percentage_1h_in_currency,
            price_change_percentage_24h: self
                .price_change_percentage_24h_in_currency
                .or(self.price_change_percentage_24h),
            price_change_percentage_7d: self.price_change_percentage_7d_in_currency,
            circulating_supply: self.circulating_supply,
            total_supply: self.total_supply,
            max_supply: self.max_supply,
            ath: self.ath,
            ath_change_percentage: self.ath_change_percentage,
            atl: self.atl,
            atl_change_percentage: self.atl_change_percentage,
            last_updated,
        })
    }
}

/// `/global` response envelope; the payload sits under `data`
#[derive(Debug, Deserialize)]
struct GlobalEnvelope {
    data: Option<GlobalWire>,
}

#[derive(Debug, Deserialize)]
struct GlobalWire {
    #[serde(default)]
    total_market_cap: BTreeMap<String, f64>,
    #[serde(default)]
    total_volume: BTreeMap<String, f64>,
    #[serde(default)]
    market_cap_percentage: BTreeMap<String, f64>,
    #[serde(default)]
    market_cap_change_percentage_24h_usd: Option<f64>,
    #[serde(default)]
    active_cryptocurrencies: u64,
    #[serde(default)]
    markets: Option<u64>,
    #[serde(default)]
    updated_at: Option<i64>,
}

impl From<GlobalWire> for GlobalSummary {
    fn from(wire: GlobalWire) -> Self {
        Self {
            total_market_cap: wire.total_market_cap,
            total_volume: wire.total_volume,
            market_cap_percentage: wire.market_cap_percentage,
            market_cap_change_percentage_24h_usd: wire.market_cap_change_percentage_24h_usd,
            active_cryptocurrencies: wire.active_cryptocurrencies,
            markets: wire.markets,
            updated_at: wire.updated_at,
        }
    }
}

/// Parses a `/coins/markets` body, rejecting any record that does not fit
pub(crate) fn parse_listing(body: &str) -> Result<Vec<MarketEntry>, GatewayError> {
    let records: Vec<MarketEntryWire> = serde_json::from_str(body).map_err(|e| {
        GatewayError::malformed(format!("Failed to parse market listing: {}", e))
    })?;

    records.into_iter().map(MarketEntryWire::into_entry).collect()
}

/// Parses a `/global` body; a missing `data` payload is malformed
pub(crate) fn parse_global_summary(body: &str) -> Result<GlobalSummary, GatewayError> {
    let envelope: GlobalEnvelope = serde_json::from_str(body).map_err(|e| {
        GatewayError::malformed(format!("Failed to parse global summary: {}", e))
    })?;

    envelope
        .data
        .map(GlobalSummary::from)
        .ok_or_else(|| GatewayError::malformed("global summary response has no data payload"))
}

/// Builds the message for a non-success response
///
/// CoinGecko error bodies come in a few shapes (`{"error": "..."}`,
/// `{"error": {"message": "..."}}`, `{"status": {"error_message": "..."}}`);
/// any other JSON is included verbatim and non-JSON bodies are ignored.
pub(crate) fn describe_error_body(context: &str, status: u16, body: &str) -> String {
    let mut details = format!("HTTP error! status: {}", status);

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let upstream = value
            .get("error")
            .and_then(|e| e.as_str().or_else(|| e.get("message").and_then(|m| m.as_str())))
            .or_else(|| {
                value
                    .get("status")
                    .and_then(|s| s.get("error_message"))
                    .and_then(|m| m.as_str())
            })
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string());
        details.push_str(&format!(", message: {}", upstream));
    }

    format!("{}: {}", context, details)
}

/// CoinGecko gateway
pub struct CoinGeckoGateway {
    client: Client,
    base_url: String,
}

impl CoinGeckoGateway {
    /// Creates a gateway against the public CoinGecko API
    pub fn new() -> Result<Self, GatewayError> {
        Self::with_base_url(COINGECKO_API_URL)
    }

    /// Creates a gateway against a custom base URL (proxies, tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issues a GET and returns the body of a successful response
    async fn get_body(
        &self,
        endpoint: &str,
        query: &[(&'static str, String)],
        context: &str,
    ) -> Result<String, GatewayError> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(url = %url, params = query.len(), "Requesting CoinGecko");

        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();

        if !status.is_success() {
            if status.as_u16() == 429 {
                tracing::warn!(url = %url, "CoinGecko rate limit exceeded");
            }
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::status(
                status.as_u16(),
                describe_error_body(context, status.as_u16(), &body),
            ));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl MarketDataGateway for CoinGeckoGateway {
    async fn fetch_listing(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<Vec<MarketEntry>, GatewayError> {
        let body = self
            .get_body(
                COINGECKO_MARKETS_ENDPOINT,
                &descriptor.query_pairs(),
                "Failed to fetch market data",
            )
            .await?;

        let entries = parse_listing(&body)?;
        tracing::debug!(
            descriptor = %descriptor,
            count = entries.len(),
            "Fetched market listing from CoinGecko"
        );
        Ok(entries)
    }

    async fn fetch_global_summary(&self) -> Result<GlobalSummary, GatewayError> {
        let body = self
            .get_body(COINGECKO_GLOBAL_ENDPOINT, &[], "Failed to fetch global summary")
            .await?;

        let summary = parse_global_summary(&body)?;
        tracing::debug!(
            active_cryptocurrencies = summary.active_cryptocurrencies,
            "Fetched global summary from CoinGecko"
        );
        Ok(summary)
    }

    fn gateway_name(&self) -> &'static str {
        "coingecko"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SortOrder;
    use mockito::Matcher;

    const LISTING_BODY: &str = r#"[
        {
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "image": "https://assets.coingecko.com/coins/images/1/large/bitcoin.png",
            "current_price": 43250.12,
            "market_cap": 846000000000,
            "market_cap_rank": 1,
            "total_volume": 21000000000,
            "price_change_percentage_24h": 1.5,
            "price_change_percentage_1h_in_currency": -0.21,
            "price_change_percentage_24h_in_currency": 1.52,
            "price_change_percentage_7d_in_currency": null,
            "max_supply": 21000000,
            "last_updated": "2024-01-15T10:30:00.000Z"
        },
        {
            "id": "tether",
            "symbol": "usdt",
            "name": "Tether",
            "image": "missing_thumb.png",
            "current_price": null,
            "market_cap": null,
            "market_cap_rank": null,
            "total_volume": null,
            "price_change_percentage_24h": 0.01
        }
    ]"#;

    const GLOBAL_BODY: &str = r#"{
        "data": {
            "active_cryptocurrencies": 12345,
            "markets": 1100,
            "total_market_cap": {"usd": 2400000000000.0, "eur": 2200000000000.0},
            "total_volume": {"usd": 91000000000.0},
            "market_cap_percentage": {"btc": 52.3, "eth": 17.1},
            "market_cap_change_percentage_24h_usd": -0.8,
            "updated_at": 1705314600
        }
    }"#;

    fn descriptor() -> RequestDescriptor {
        RequestDescriptor::new("usd", SortOrder::VolumeDesc, 2, 50)
    }

    #[test]
    fn parses_listing_with_nullable_fields() {
        let entries = parse_listing(LISTING_BODY).unwrap();
        assert_eq!(entries.len(), 2);

        let btc = &entries[0];
        assert_eq!(btc.id, "bitcoin");
        assert_eq!(btc.market_cap_rank, Some(1));
        assert_eq!(btc.price_change_percentage_1h, Some(-0.21));
        assert_eq!(btc.price_change_percentage_24h, Some(1.52));
        assert_eq!(btc.price_change_percentage_7d, None);
        assert!(btc.last_updated.is_some());

        let usdt = &entries[1];
        assert_eq!(usdt.current_price, None);
        assert_eq!(usdt.market_cap_rank, None);
        // Falls back to the plain 24h field when the in-currency one is absent
        assert_eq!(usdt.price_change_percentage_24h, Some(0.01));
        assert_eq!(usdt.price_change_percentage_1h, None);
    }

    #[test]
    fn listing_shape_mismatch_is_malformed() {
        let err = parse_listing(r#"{"not": "a list"}"#).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));

        let err = parse_listing(r#"[{"symbol": "btc", "name": "Bitcoin"}]"#).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));

        let err = parse_listing(r#"[{"id": "", "symbol": "x", "name": "X"}]"#).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }

    #[test]
    fn parses_global_summary_envelope() {
        let summary = parse_global_summary(GLOBAL_BODY).unwrap();
        assert_eq!(summary.active_cryptocurrencies, 12345);
        assert_eq!(summary.market_cap("usd"), Some(2.4e12));
        assert_eq!(summary.dominance("btc"), Some(52.3));
        assert_eq!(summary.market_cap_change_percentage_24h_usd, Some(-0.8));
        assert_eq!(summary.markets, Some(1100));
    }

    #[test]
    fn global_summary_without_data_is_malformed() {
        let err = parse_global_summary(r#"{"status": "ok"}"#).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
        let err = parse_global_summary("not json").unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }

    #[test]
    fn error_body_shapes() {
        let msg = describe_error_body("Failed", 500, r#"{"error": "boom"}"#);
        assert_eq!(msg, "Failed: HTTP error! status: 500, message: boom");

        let msg = describe_error_body(
            "Failed",
            429,
            r#"{"status": {"error_code": 429, "error_message": "You've exceeded the Rate Limit"}}"#,
        );
        assert!(msg.ends_with("message: You've exceeded the Rate Limit"));

        let msg = describe_error_body("Failed", 400, r#"{"error": {"message": "bad order", "code": 400}}"#);
        assert!(msg.ends_with("message: bad order"));

        let msg = describe_error_body("Failed", 502, "<html>Bad Gateway</html>");
        assert_eq!(msg, "Failed: HTTP error! status: 502");
    }

    #[tokio::test]
    async fn fetch_listing_sends_fixed_query_parameters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/coins/markets")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("vs_currency".into(), "usd".into()),
                Matcher::UrlEncoded("order".into(), "volume_desc".into()),
                Matcher::UrlEncoded("per_page".into(), "50".into()),
                Matcher::UrlEncoded("page".into(), "2".into()),
                Matcher::UrlEncoded("sparkline".into(), "false".into()),
                Matcher::UrlEncoded("price_change_percentage".into(), "1h,24h,7d".into()),
                Matcher::UrlEncoded("locale".into(), "en".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(LISTING_BODY)
            .create_async()
            .await;

        let gateway = CoinGeckoGateway::with_base_url(server.url()).unwrap();
        let entries = gateway.fetch_listing(&descriptor()).await.unwrap();

        assert_eq!(entries.len(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_listing_non_success_is_transport_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/coins/markets")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body(r#"{"status": {"error_code": 429, "error_message": "Rate limited"}}"#)
            .create_async()
            .await;

        let gateway = CoinGeckoGateway::with_base_url(server.url()).unwrap();
        let err = gateway.fetch_listing(&descriptor()).await.unwrap_err();

        assert_eq!(err.status_code(), Some(429));
        let message = err.to_string();
        assert!(message.contains("429"));
        assert!(message.contains("Rate limited"));
    }

    #[tokio::test]
    async fn fetch_global_summary_requires_data_envelope() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/global")
            .with_status(200)
            .with_body(r#"{"something": "else"}"#)
            .create_async()
            .await;

        let gateway = CoinGeckoGateway::with_base_url(server.url()).unwrap();
        let err = gateway.fetch_global_summary().await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn fetch_global_summary_success() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/global")
            .with_status(200)
            .with_body(GLOBAL_BODY)
            .create_async()
            .await;

        let gateway = CoinGeckoGateway::with_base_url(format!("{}/", server.url())).unwrap();
        let summary = gateway.fetch_global_summary().await.unwrap();
        assert_eq!(summary.volume("usd"), Some(9.1e10));
    }

    #[tokio::test]
    async fn network_failure_is_transport_error_without_status() {
        // Nothing listens on port 1
        let gateway = CoinGeckoGateway::with_base_url("http://127.0.0.1:1").unwrap();
        let err = gateway.fetch_global_summary().await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport { status: None, .. }));
        let message = err.to_string();
        assert!(message.starts_with("Network error: error sending request"));
        assert!(
            message.to_lowercase().contains("connection refused"),
            "cause missing from {:?}",
            message
        );
    }
}
