use rust_decimal::Decimal;

use crate::models::Amount;

/// Format a decimal with thousands separators, keeping its scale: 1,234.56
pub fn number(val: Decimal) -> String {
    let negative = val.is_sign_negative() && !val.is_zero();
    let text = val.abs().to_string();
    let (int_part, dec_part) = match text.split_once('.') {
        Some((i, d)) => (i, Some(d)),
        None => (text.as_str(), None),
    };

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    let sign = if negative { "-" } else { "" };
    match dec_part {
        Some(d) => format!("{sign}{with_commas}.{d}"),
        None => format!("{sign}{with_commas}"),
    }
}

/// Format an amount for display: -1,234.56 USD
pub fn amount(amount: &Amount) -> String {
    format!("{} {}", number(amount.number), amount.commodity)
}

/// Format a 0..1 ratio as a whole percentage: 85%
pub fn percent(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

/// Shorten `s` to at most `max` characters, ending with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}\u{2026}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(number(dec("1234.56")), "1,234.56");
        assert_eq!(number(dec("-500.00")), "-500.00");
        assert_eq!(number(dec("0")), "0");
        assert_eq!(number(dec("1000000.99")), "1,000,000.99");
        assert_eq!(number(dec("42")), "42");
    }

    #[test]
    fn test_amount_formatting() {
        let a = Amount::new(dec("-2000.00"), "USD");
        assert_eq!(amount(&a), "-2,000.00 USD");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0.85), "85%");
        assert_eq!(percent(1.0), "100%");
        assert_eq!(percent(0.0), "0%");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Weekly groceries", 8), "Weekly \u{2026}");
    }
}
