// 💱 Conversion Calculator - fixed-ratio unit conversions
//
// result = amount * rate("<from>_<to>") * coherence
// Missing pairs fall back to an identity rate of 1.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Rate used when a pair is missing from the table
pub const DEFAULT_RATE: f64 = 1.0;

/// Scale factor inside the Scarcity Reflection Index
pub const SRI_SCALE: f64 = 0.85;

/// Trust units issued per SRI point (before coherence)
pub const TRUST_UNITS_PER_SRI: f64 = 7.0;

// ============================================================================
// RATE TABLE
// ============================================================================

/// Conversion rates keyed by `"<FROM>_<TO>"`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateTable {
    rates: HashMap<String, f64>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        RateTable {
            rates: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn insert(&mut self, from: &str, to: &str, rate: f64) {
        self.rates.insert(rate_key(from, to), rate);
    }

    /// Rate for the pair, or `DEFAULT_RATE` when absent
    pub fn rate(&self, from: &str, to: &str) -> f64 {
        self.lookup(from, to).unwrap_or(DEFAULT_RATE)
    }

    /// Exact lookup without the identity fallback
    pub fn lookup(&self, from: &str, to: &str) -> Option<f64> {
        self.rates.get(&rate_key(from, to)).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Entries sorted by key, for stable display
    pub fn entries(&self) -> Vec<(&str, f64)> {
        let mut entries: Vec<_> = self.rates.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

/// Composite lookup key
pub fn rate_key(from: &str, to: &str) -> String {
    format!("{from}_{to}")
}

/// `amount * rate * coherence`. Never fails; a NaN amount counts as zero.
pub fn convert(amount: f64, from: &str, to: &str, table: &RateTable, coherence: f64) -> f64 {
    let amount = if amount.is_nan() { 0.0 } else { amount };
    amount * table.rate(from, to) * coherence
}

// ============================================================================
// GATES
// ============================================================================

/// Cosmetic label selecting one of the fixed rate tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gate {
    Gate735,
    Gate144,
}

impl Gate {
    pub const ALL: [Gate; 2] = [Gate::Gate735, Gate::Gate144];

    pub fn label(&self) -> &'static str {
        match self {
            Gate::Gate735 => "Gate735",
            Gate::Gate144 => "Gate144",
        }
    }

    pub fn rate_table(&self) -> RateTable {
        match self {
            Gate::Gate735 => RateTable::from_pairs([
                ("BTC_TU", 113.0),
                ("ETH_TU", 7.35),
                ("USD_TU", 0.735),
                ("TU_USD", 1.0 / 0.735),
                ("GOLD_TU", 2.4),
            ]),
            Gate::Gate144 => RateTable::from_pairs([
                ("BTC_TU", 144.0),
                ("ETH_TU", 14.4),
                ("USD_TU", 1.44),
                ("TU_USD", 1.0 / 1.44),
            ]),
        }
    }

    /// Following gate, wrapping around
    pub fn next(&self) -> Gate {
        match self {
            Gate::Gate735 => Gate::Gate144,
            Gate::Gate144 => Gate::Gate735,
        }
    }
}

impl Default for Gate {
    fn default() -> Self {
        Gate::Gate735
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Gate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gate::ALL
            .iter()
            .find(|g| g.label().eq_ignore_ascii_case(s) || g.label()[4..] == *s)
            .copied()
            .ok_or_else(|| format!("unknown gate: {s}"))
    }
}

// ============================================================================
// AMOUNT PARSING
// ============================================================================

/// Parse user input such as `"1,250.50"` or `" 42 "`.
/// Returns `None` for anything that is not a finite number.
pub fn parse_amount(input: &str) -> Option<f64> {
    let cleaned: String = input
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_amount_or_zero(input: &str) -> f64 {
    parse_amount(input).unwrap_or(0.0)
}

// ============================================================================
// SCARCITY REFLECTION INDEX / TRUST UNITS
// ============================================================================

/// `floor(log10(amount) * 0.85)`; zero for non-positive or NaN amounts
pub fn scarcity_reflection_index(amount: f64) -> f64 {
    if amount.is_nan() || amount <= 0.0 {
        return 0.0;
    }
    (amount.log10() * SRI_SCALE).floor()
}

/// `sri(amount) * 7 * coherence`
pub fn trust_units(amount: f64, coherence: f64) -> f64 {
    scarcity_reflection_index(amount) * TRUST_UNITS_PER_SRI * coherence
}

/// Result of a mock debt nullification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtNullification {
    pub amount: f64,
    pub sri: f64,
    pub trust_units: f64,
    pub coherence: f64,
}

pub fn nullify_debt(amount: f64, coherence: f64) -> DebtNullification {
    let sri = scarcity_reflection_index(amount);
    DebtNullification {
        amount,
        sri,
        trust_units: sri * TRUST_UNITS_PER_SRI * coherence,
        coherence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_known_pair() {
        let table = RateTable::from_pairs([("BTC_TU", 113.0)]);
        assert_eq!(convert(1.0, "BTC", "TU", &table, 1.0), 113.0);
    }

    #[test]
    fn test_missing_pair_uses_identity_rate() {
        let table = RateTable::new();
        assert_eq!(convert(10.0, "USD", "TU", &table, 1.0), 10.0);
        assert_eq!(table.lookup("USD", "TU"), None);
    }

    #[test]
    fn test_coherence_scales_result() {
        let table = RateTable::from_pairs([("BTC_TU", 113.0)]);
        let result = convert(2.0, "BTC", "TU", &table, 1.618);
        assert!(approx(result, 365.668), "got {result}");
    }

    #[test]
    fn test_convert_has_no_hidden_state() {
        let table = Gate::Gate735.rate_table();
        let a = convert(3.5, "ETH", "TU", &table, 1.6);
        let b = convert(3.5, "ETH", "TU", &table, 1.6);
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_is_directional() {
        let mut table = RateTable::new();
        table.insert("BTC", "TU", 113.0);
        assert_eq!(table.rate("TU", "BTC"), DEFAULT_RATE);
    }

    #[test]
    fn test_nan_amount_is_zero() {
        let table = RateTable::from_pairs([("BTC_TU", 113.0)]);
        assert_eq!(convert(f64::NAN, "BTC", "TU", &table, 1.0), 0.0);
    }

    #[test]
    fn test_gate_parsing() {
        assert_eq!("Gate735".parse::<Gate>(), Ok(Gate::Gate735));
        assert_eq!("gate144".parse::<Gate>(), Ok(Gate::Gate144));
        assert_eq!("735".parse::<Gate>(), Ok(Gate::Gate735));
        assert!("gate9".parse::<Gate>().is_err());
        assert_eq!(Gate::Gate735.next().next(), Gate::Gate735);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("42"), Some(42.0));
        assert_eq!(parse_amount(" $1,250.50 "), Some(1250.5));
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("inf"), None);
        assert_eq!(parse_amount_or_zero("not a number"), 0.0);
    }

    #[test]
    fn test_sri() {
        assert_eq!(scarcity_reflection_index(1_000_000.0), 5.0); // 6 * 0.85 = 5.1
        assert_eq!(scarcity_reflection_index(10.0), 0.0);
        assert_eq!(scarcity_reflection_index(0.0), 0.0);
        assert_eq!(scarcity_reflection_index(-5.0), 0.0);
        assert_eq!(scarcity_reflection_index(f64::NAN), 0.0);
    }

    #[test]
    fn test_trust_units() {
        // sri(1e6) = 5 -> 5 * 7 * 1.618
        assert!(approx(trust_units(1_000_000.0, 1.618), 56.63));

        let n = nullify_debt(1_000_000.0, 1.0);
        assert_eq!(n.sri, 5.0);
        assert_eq!(n.trust_units, 35.0);
    }
}
