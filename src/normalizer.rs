use std::sync::OnceLock;

use regex::Regex;

use crate::models::Month;

fn non_numeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9.]").expect("static pattern"))
}

/// Parse a locale-formatted monetary string. `None` means amount-missing.
///
/// Commas become decimal points, every other non-digit is dropped, and when
/// several points remain only the last one is kept as the decimal separator
/// (`"1.234,56"` reads as `1234.56`). Never fails: anything that still does
/// not parse is amount-missing.
pub fn parse_amount(raw: Option<&str>) -> Option<f64> {
    let s = raw?.replace(',', ".");
    let s = non_numeric().replace_all(&s, "");
    if s.is_empty() {
        return None;
    }
    let s = match s.rfind('.') {
        Some(last) => {
            let (int_part, frac_part) = s.split_at(last);
            format!("{}{}", int_part.replace('.', ""), frac_part)
        }
        None => s.into_owned(),
    };
    let value = round_cents(s.parse().ok()?);
    value.is_finite().then_some(value)
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parse a month field. Integral text (including `"5.0"`) is valid; any other
/// non-empty text is the invalid-numeric sentinel.
pub fn parse_month(raw: &str) -> Option<Month> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(m) = raw.parse::<u32>() {
        return Some(Month::Valid(m));
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) => {
            Some(Month::Valid(f as u32))
        }
        _ => Some(Month::Invalid),
    }
}
