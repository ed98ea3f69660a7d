//! Presentation models and plain-text rendering
//!
//! Turns a [`ViewModel`] into the pieces a dashboard screen shows: the
//! market overview cards, the listing table, pagination controls, the sort
//! selector and status messages. [`render_dashboard`] lays them out as text
//! for the terminal binary.

use crate::{
    controller::ViewModel,
    format::{format_compact_currency, format_currency, format_number, format_percentage},
    types::{GlobalSummary, MarketEntry, SortOrder},
};
use std::fmt::Write;

/// Direction of a percentage change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    /// Zero or unknown
    Flat,
}

impl Trend {
    pub fn of(value: Option<f64>) -> Self {
        match value {
            Some(v) if v > 0.0 => Trend::Up,
            Some(v) if v < 0.0 => Trend::Down,
            _ => Trend::Flat,
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            Trend::Up => "▲",
            Trend::Down => "▼",
            Trend::Flat => " ",
        }
    }
}

/// Formatted percentage with its trend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeCell {
    pub text: String,
    pub trend: Trend,
}

impl ChangeCell {
    pub fn new(value: Option<f64>) -> Self {
        Self {
            text: format_percentage(value),
            trend: Trend::of(value),
        }
    }
}

/// One formatted listing row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    /// Market cap rank, or "-"
    pub rank: String,
    pub name: String,
    pub symbol: String,
    /// Set only for absolute http(s) URLs
    pub image: Option<String>,
    pub price: String,
    pub change_1h: ChangeCell,
    pub change_24h: ChangeCell,
    pub change_7d: ChangeCell,
    pub market_cap: String,
    pub volume: String,
}

impl TableRow {
    pub fn from_entry(entry: &MarketEntry, currency: &str) -> Self {
        Self {
            rank: entry
                .market_cap_rank
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string()),
            name: entry.name.clone(),
            symbol: entry.symbol.to_uppercase(),
            image: Some(entry.image.clone()).filter(|url| url.starts_with("http")),
            price: format_currency(entry.current_price, currency, None),
            change_1h: ChangeCell::new(entry.price_change_percentage_1h),
            change_24h: ChangeCell::new(entry.price_change_percentage_24h),
            change_7d: ChangeCell::new(entry.price_change_percentage_7d),
            market_cap: format_compact_currency(entry.market_cap, currency),
            volume: format_compact_currency(entry.total_volume, currency),
        }
    }
}

/// What the listing table area shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableView {
    /// Placeholder rows while the first page loads
    Loading { skeleton_rows: usize },
    Rows(Vec<TableRow>),
    Empty,
}

impl TableView {
    pub fn from_view(view: &ViewModel) -> Self {
        if view.display_loading {
            return TableView::Loading {
                skeleton_rows: view.page_size as usize,
            };
        }
        if view.entries.is_empty() {
            return TableView::Empty;
        }
        TableView::Rows(
            view.entries
                .iter()
                .map(|e| TableRow::from_entry(e, &view.currency))
                .collect(),
        )
    }
}

/// One market overview card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatCard {
    pub title: &'static str,
    pub value: String,
    pub change: Option<ChangeCell>,
}

/// Market Cap, 24h Volume and BTC Dominance cards
///
/// Values render as unavailable when there is no summary.
pub fn market_overview(summary: Option<&GlobalSummary>, currency: &str) -> Vec<StatCard> {
    let market_cap = summary.and_then(|s| s.market_cap(currency));
    let volume = summary.and_then(|s| s.volume(currency));
    let dominance = summary.and_then(|s| s.dominance("btc"));
    let cap_change = summary.and_then(|s| s.market_cap_change_percentage_24h_usd);

    vec![
        StatCard {
            title: "Market Cap",
            value: format_compact_currency(market_cap, currency),
            change: Some(ChangeCell::new(cap_change)),
        },
        StatCard {
            title: "24h Volume",
            value: format_compact_currency(volume, currency),
            change: None,
        },
        StatCard {
            title: "BTC Dominance",
            value: match dominance {
                Some(_) => format!("{}%", format_number(dominance)),
                None => format_number(None),
            },
            change: None,
        },
    ]
}

/// Pagination controls for an estimated page count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current: u32,
    pub total: u32,
}

impl Pagination {
    /// Controls for the view, or `None` when there is only one page
    pub fn from_view(view: &ViewModel) -> Option<Self> {
        if !view.show_pagination {
            return None;
        }
        Self::new(view.current_page, view.estimated_total_pages)
    }

    pub fn new(current: u32, total: u32) -> Option<Self> {
        (total > 1).then_some(Self { current, total })
    }

    pub fn label(&self) -> String {
        format!("Page {} of {}", self.current, self.total)
    }

    pub fn has_previous(&self) -> bool {
        self.current > 1
    }

    pub fn has_next(&self) -> bool {
        self.current < self.total
    }

    /// Accepts a requested page only if it lies within `[1, total]`
    pub fn target(&self, page: u32) -> Option<u32> {
        (1..=self.total).contains(&page).then_some(page)
    }

    pub fn previous(&self) -> Option<u32> {
        self.target(self.current.saturating_sub(1))
    }

    pub fn next(&self) -> Option<u32> {
        self.target(self.current.saturating_add(1))
    }
}

/// Entry in the sort selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOption {
    pub order: SortOrder,
    pub label: &'static str,
    pub selected: bool,
}

pub fn sort_options(selected: SortOrder) -> Vec<SortOption> {
    SortOrder::all()
        .iter()
        .map(|&order| SortOption {
            order,
            label: order.label(),
            selected: order == selected,
        })
        .collect()
}

pub fn listing_error_message(view: &ViewModel) -> Option<String> {
    view.listing_error
        .as_ref()
        .map(|msg| format!("Failed to load market data: {}", msg))
}

/// Shown when an applied search matched nothing
pub fn no_results_message(view: &ViewModel) -> Option<String> {
    view.no_results
        .then(|| format!("No results found for \"{}\".", view.debounced_search))
}

pub fn summary_error_message(view: &ViewModel) -> Option<String> {
    view.summary_error
        .as_ref()
        .map(|msg| format!("Global market data unavailable: {}", msg))
}

const NAME_WIDTH: usize = 22;

/// Renders the whole dashboard as text
pub fn render_dashboard(view: &ViewModel) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = write_overview(&mut out, view);
    let _ = write_controls(&mut out, view);
    let _ = write_table(&mut out, view);

    if let Some(pagination) = Pagination::from_view(view) {
        let prev = if pagination.has_previous() { "< prev" } else { "      " };
        let next = if pagination.has_next() { "next >" } else { "      " };
        let _ = writeln!(out, "{}  {}  {}", prev, pagination.label(), next);
    }

    out
}

fn write_overview(out: &mut String, view: &ViewModel) -> std::fmt::Result {
    let cards = market_overview(view.summary.as_deref(), &view.currency);
    let rendered: Vec<String> = cards
        .iter()
        .map(|card| match &card.change {
            Some(change) => format!(
                "{}: {} ({}{})",
                card.title,
                card.value,
                change.trend.marker().trim(),
                change.text
            ),
            None => format!("{}: {}", card.title, card.value),
        })
        .collect();
    writeln!(out, "{}", rendered.join("  |  "))?;

    if view.summary_loading {
        writeln!(out, "Loading global market data...")?;
    }
    if let Some(msg) = summary_error_message(view) {
        writeln!(out, "{}", msg)?;
    }
    Ok(())
}

fn write_controls(out: &mut String, view: &ViewModel) -> std::fmt::Result {
    let selected = sort_options(view.sort_order)
        .into_iter()
        .find(|o| o.selected)
        .map(|o| o.label)
        .unwrap_or_default();

    write!(out, "Sort: {}", selected)?;
    if !view.search_term.is_empty() {
        write!(out, "  Search: \"{}\"", view.search_term)?;
    }
    if view.is_refreshing {
        write!(out, "  (refreshing)")?;
    }
    writeln!(out)?;

    if let Some(msg) = listing_error_message(view) {
        writeln!(out, "{}", msg)?;
    }
    Ok(())
}

fn write_table(out: &mut String, view: &ViewModel) -> std::fmt::Result {
    writeln!(
        out,
        "{:>4}  {:<w$}  {:<6}  {:>14}  {:>9}  {:>9}  {:>9}  {:>10}  {:>10}",
        "#",
        "Name",
        "Symbol",
        "Price",
        "1h",
        "24h",
        "7d",
        "Market Cap",
        "Volume",
        w = NAME_WIDTH
    )?;

    match TableView::from_view(view) {
        TableView::Loading { skeleton_rows } => {
            for _ in 0..skeleton_rows {
                writeln!(out, "{:>4}  {}", "··", "·".repeat(NAME_WIDTH))?;
            }
        }
        TableView::Empty => match no_results_message(view) {
            Some(msg) => writeln!(out, "{}", msg)?,
            None => writeln!(out, "No data available.")?,
        },
        TableView::Rows(rows) => {
            for row in rows {
                let name: String = row.name.chars().take(NAME_WIDTH).collect();
                writeln!(
                    out,
                    "{:>4}  {:<w$}  {:<6}  {:>14}  {:>9}  {:>9}  {:>9}  {:>10}  {:>10}",
                    row.rank,
                    name,
                    row.symbol,
                    row.price,
                    row.change_1h.text,
                    row.change_24h.text,
                    row.change_7d.text,
                    row.market_cap,
                    row.volume,
                    w = NAME_WIDTH
                )?;
            }
        }
    }
    Ok(())
}
