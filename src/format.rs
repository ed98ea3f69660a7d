//! Display formatting for prices, market caps and percentage changes
//!
//! Output follows en-US conventions: comma thousands separators, a leading
//! currency symbol and the minus sign ahead of the symbol (`-$1.50`).
//! Missing values always render as [`UNAVAILABLE`] instead of failing.

use crate::constants::UNAVAILABLE;

/// Compact-notation suffixes with their magnitudes, largest first
const COMPACT_UNITS: &[(f64, &str)] = &[(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")];

/// Formats a value as a currency amount
///
/// Precision adapts to magnitude unless `max_fraction_digits` is given:
/// values of at least 1 use 2 fraction digits, values in `[0.001, 1)` use 4,
/// anything smaller uses 8. At least 2 fraction digits are always shown
/// (fewer only if the override asks for fewer).
pub fn format_currency(value: Option<f64>, currency: &str, max_fraction_digits: Option<usize>) -> String {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return UNAVAILABLE.to_string();
    };

    let max = max_fraction_digits.unwrap_or_else(|| adaptive_precision(value));
    let min = max.min(2);
    with_currency(value, currency, &group_decimal(value.abs(), min, max))
}

/// Formats a value with magnitude suffixes, e.g. `$1.23T`, `$500.0M`
///
/// Uses between 1 and 2 fraction digits. Zero renders as `$0.0`.
pub fn format_compact_currency(value: Option<f64>, currency: &str) -> String {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return UNAVAILABLE.to_string();
    };

    if value == 0.0 {
        return with_currency(0.0, currency, "0.0");
    }

    with_currency(value, currency, &compact_magnitude(value.abs()))
}

/// Formats a value already expressed in percent, e.g. `5.2` -> `+5.2%`
///
/// Positive values get an explicit `+`; negative values carry their own sign.
pub fn format_percentage(value: Option<f64>) -> String {
    format_percentage_with(value, 1, 2)
}

/// [`format_percentage`] with explicit fraction digit bounds
pub fn format_percentage_with(value: Option<f64>, min_fraction_digits: usize, max_fraction_digits: usize) -> String {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return UNAVAILABLE.to_string();
    };

    let max = max_fraction_digits.max(min_fraction_digits);
    let digits = group_decimal(value.abs(), min_fraction_digits, max);
    let sign = if value > 0.0 {
        "+"
    } else if value < 0.0 {
        "-"
    } else {
        ""
    };
    format!("{}{}%", sign, digits)
}

/// Plain grouped number with up to 3 fraction digits, e.g. `54.123`
pub fn format_number(value: Option<f64>) -> String {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return UNAVAILABLE.to_string();
    };

    let digits = group_decimal(value.abs(), 0, 3);
    if value < 0.0 && digits != "0" {
        format!("-{}", digits)
    } else {
        digits
    }
}

/// Currency symbol for a lowercase or uppercase ISO code
pub fn currency_symbol(currency: &str) -> String {
    match currency.to_ascii_lowercase().as_str() {
        "usd" => "$".to_string(),
        "eur" => "€".to_string(),
        "gbp" => "£".to_string(),
        "jpy" => "¥".to_string(),
        "inr" => "₹".to_string(),
        "krw" => "₩".to_string(),
        "btc" => "₿".to_string(),
        other => format!("{} ", other.to_ascii_uppercase()),
    }
}

fn adaptive_precision(value: f64) -> usize {
    let abs = value.abs();
    if abs >= 1.0 {
        2
    } else if abs >= 0.001 {
        4
    } else {
        8
    }
}

fn with_currency(value: f64, currency: &str, digits: &str) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}{}", sign, currency_symbol(currency), digits)
}

fn compact_magnitude(abs: f64) -> String {
    for (idx, (magnitude, suffix)) in COMPACT_UNITS.iter().enumerate() {
        if abs < *magnitude {
            continue;
        }
        let scaled = round_to(abs / magnitude, 2);
        // 999.999K rounds to 1000K; promote to the next unit when there is one
        if scaled >= 1000.0 && idx > 0 {
            let (bigger, bigger_suffix) = COMPACT_UNITS[idx - 1];
            return format!("{}{}", group_decimal(abs / bigger, 1, 2), bigger_suffix);
        }
        return format!("{}{}", group_decimal(scaled, 1, 2), suffix);
    }

    let rounded = round_to(abs, 2);
    if rounded >= 1000.0 {
        return format!("{}K", group_decimal(abs / 1e3, 1, 2));
    }
    group_decimal(abs, 1, 2)
}

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

/// Renders a non-negative value with `max` fraction digits, trims trailing
/// zeros down to `min`, and groups the integer part by thousands.
fn group_decimal(abs: f64, min: usize, max: usize) -> String {
    let rounded = format!("{:.*}", max, abs);
    let (int_part, frac_part) = match rounded.split_once('.') {
        Some((i, f)) => (i.to_string(), f.to_string()),
        None => (rounded.clone(), String::new()),
    };

    let mut frac = frac_part;
    while frac.len() > min && frac.ends_with('0') {
        frac.pop();
    }

    let grouped = group_thousands(&int_part);
    if frac.is_empty() {
        grouped
    } else {
        format!("{}.{}", grouped, frac)
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
