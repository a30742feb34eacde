fn group_thousands(int_part: &str) -> String {
    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    with_commas.chars().rev().collect()
}

/// Format a float as an amount with thousands separators: 1,234.56
pub fn amount(val: f64) -> String {
    let negative = val < 0.0;
    let cents = format!("{:.2}", val.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));
    let grouped = group_thousands(int_part);
    if negative {
        format!("-{grouped}.{dec_part}")
    } else {
        format!("{grouped}.{dec_part}")
    }
}

/// `part` as a percentage of `whole`, one decimal. Zero whole reads as 0.0%.
pub fn percent(part: f64, whole: f64) -> String {
    if whole == 0.0 {
        return "0.0%".to_string();
    }
    format!("{:.1}%", part / whole * 100.0)
}

pub fn count(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let grouped = group_thousands(&digits);
    if n < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_formatting() {
        assert_eq!(amount(1234.56), "1,234.56");
        assert_eq!(amount(-500.00), "-500.00");
        assert_eq!(amount(0.0), "0.00");
        assert_eq!(amount(12615000.0), "12,615,000.00");
        assert_eq!(amount(369990.35), "369,990.35");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(1.0, 4.0), "25.0%");
        assert_eq!(percent(2.0, 3.0), "66.7%");
        assert_eq!(percent(5.0, 0.0), "0.0%");
    }

    #[test]
    fn test_count() {
        assert_eq!(count(0), "0");
        assert_eq!(count(1000), "1,000");
        assert_eq!(count(-1234567), "-1,234,567");
    }
}
