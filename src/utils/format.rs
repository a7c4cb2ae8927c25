//! Default price formatting for chart labels

use std::sync::Arc;

/// Formats a value in the given currency, supplied by the host application
pub type PriceFormatter = Arc<dyn Fn(f64, &str) -> String + Send + Sync>;

/// Wrap the default formatter for use as a `PriceFormatter`
pub fn default_formatter() -> PriceFormatter {
    Arc::new(format_price)
}

/// Format a price with a currency symbol and precision that fits its magnitude
/// Examples: (1234.5, "usd") -> "$1,234.50", (0.000125, "eur") -> "€0.0001250"
pub fn format_price(value: f64, currency: &str) -> String {
    let code = currency.to_uppercase();
    let symbol = match code.as_str() {
        "USD" => "$",
        "EUR" => "€",
        "GBP" => "£",
        "JPY" => "¥",
        "INR" => "₹",
        _ => "",
    };

    let sign = if value < 0.0 { "-" } else { "" };
    let magnitude = value.abs();
    let number = if magnitude >= 1.0 {
        group_thousands(&format!("{:.2}", magnitude))
    } else if magnitude == 0.0 {
        "0.00".to_string()
    } else {
        // Keep four significant digits for sub-unit prices
        let digits = (-magnitude.log10()).floor() as usize + 4;
        format!("{:.*}", digits.min(12), magnitude)
    };

    if symbol.is_empty() {
        format!("{}{} {}", sign, number, code)
    } else {
        format!("{}{}{}", sign, symbol, number)
    }
}

/// Format a signed percentage, e.g. "+3.25%" or "-1.00%"
pub fn format_percent(change: f64) -> String {
    format!("{:+.2}%", change)
}

/// Insert thousands separators into the integer part of an unsigned decimal string
fn group_thousands(formatted: &str) -> String {
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted, None),
    };

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(f) => format!("{}.{}", grouped, f),
        None => grouped,
    }
}
