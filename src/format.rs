// 🔢 Magnitude Formatter - abbreviated readouts for the dashboard
// 1_500_000_000.0 -> 1.5B; under a thousand keeps two decimals; +inf -> ∞.
// NaN reads as zero, negatives keep their sign ahead of the currency symbol.

/// Rendered for `f64::INFINITY`
pub const INFINITY_SYMBOL: &str = "∞";

/// Prefix used by [`format_currency`]
pub const CURRENCY_SYMBOL: &str = "$";

/// (threshold, divisor, suffix), largest first
pub const MAGNITUDE_TABLE: [(f64, f64, &str); 6] = [
    (1e18, 1e18, "Sx"),
    (1e15, 1e15, "Q"),
    (1e12, 1e12, "T"),
    (1e9, 1e9, "B"),
    (1e6, 1e6, "M"),
    (1e3, 1e3, "K"),
];

/// Abbreviate a magnitude: `1.5B`, `1.0K`, `999.00`, `∞`.
pub fn format_magnitude(value: f64) -> String {
    format_with_symbol(value, "")
}

/// Same as [`format_magnitude`] with a `$` prefix: `$1.5B`, `-$2.0M`.
pub fn format_currency(value: f64) -> String {
    format_with_symbol(value, CURRENCY_SYMBOL)
}

/// Magnitude followed by a unit label: `365.67 TU`.
pub fn format_units(value: f64, unit: &str) -> String {
    format!("{} {}", format_magnitude(value), unit)
}

fn format_with_symbol(value: f64, symbol: &str) -> String {
    let value = if value.is_nan() { 0.0 } else { value };
    let sign = if value < 0.0 { "-" } else { "" };

    format!("{sign}{symbol}{}", abbreviate(value.abs()))
}

fn abbreviate(value: f64) -> String {
    if value.is_infinite() {
        return INFINITY_SYMBOL.to_string();
    }

    MAGNITUDE_TABLE
        .iter()
        .find(|(threshold, _, _)| value >= *threshold)
        .map(|(_, divisor, suffix)| format!("{:.1}{}", value / divisor, suffix))
        .unwrap_or_else(|| format!("{:.2}", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_examples() {
        assert_eq!(format_magnitude(1_500_000_000.0), "1.5B");
        assert_eq!(format_magnitude(999.0), "999.00");
        assert_eq!(format_magnitude(1_000.0), "1.0K");
        assert_eq!(format_magnitude(2.5e6), "2.5M");
        assert_eq!(format_magnitude(3.2e12), "3.2T");
        assert_eq!(format_magnitude(7.0e15), "7.0Q");
        assert_eq!(format_magnitude(1.2e18), "1.2Sx");
    }

    #[test]
    fn test_infinity_sentinel() {
        assert_eq!(format_magnitude(f64::INFINITY), "∞");
        assert_eq!(format_currency(f64::INFINITY), "$∞");
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(format_magnitude(0.0), "0.00");
        // just under 1e6 stays in thousands even though it rounds up
        assert!(format_magnitude(999_999.0).ends_with('K'));
        assert_eq!(format_magnitude(999_999.0), "1000.0K");
        assert_eq!(format_magnitude(1e21), "1000.0Sx");
    }

    #[test]
    fn test_suffix_never_shrinks_as_value_grows() {
        let rank = |s: &str| {
            MAGNITUDE_TABLE
                .iter()
                .rev()
                .position(|(_, _, suffix)| s.ends_with(suffix))
                .map(|p| p + 1)
                .unwrap_or(0)
        };

        let mut previous = 0;
        let mut value = 1.0;
        while value < 1e20 {
            let r = rank(&format_magnitude(value));
            assert!(r >= previous, "rank dropped at {value}");
            previous = r;
            value *= 3.7;
        }
    }

    #[test]
    fn test_currency_prefix() {
        assert_eq!(format_currency(1_500_000_000.0), "$1.5B");
        assert_eq!(format_currency(12.5), "$12.50");
    }

    #[test]
    fn test_negative_keeps_sign() {
        assert_eq!(format_magnitude(-1_500_000_000.0), "-1.5B");
        assert_eq!(format_currency(-2_000_000.0), "-$2.0M");
        assert_eq!(format_magnitude(f64::NEG_INFINITY), "-∞");
    }

    #[test]
    fn test_nan_is_zero() {
        assert_eq!(format_magnitude(f64::NAN), "0.00");
        assert_eq!(format_currency(f64::NAN), "$0.00");
    }

    #[test]
    fn test_units_suffix() {
        assert_eq!(format_units(365.668, "TU"), "365.67 TU");
        assert_eq!(format_units(2_000.0, "TU"), "2.0K TU");
    }
}
