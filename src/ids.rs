// 🔖 Id Generator - quasi-unique operation identifiers
// Format: <prefix>-<unix millis>-<9 base36 chars>

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ============================================================================
// ID FORMAT
// ============================================================================

/// Delimiter between the three id segments
pub const ID_DELIMITER: char = '-';

/// Length of the random suffix
pub const SUFFIX_LEN: usize = 9;

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate an id for the current wall-clock time using the thread-local RNG
pub fn generate_id(prefix: &str) -> String {
    generate_id_with(prefix, Utc::now().timestamp_millis(), &mut rand::thread_rng())
}

/// Generate an id from an explicit timestamp and random source
pub fn generate_id_with<R: Rng>(prefix: &str, millis: i64, rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();

    format!("{prefix}{ID_DELIMITER}{millis}{ID_DELIMITER}{suffix}")
}

// ============================================================================
// ID GENERATOR
// ============================================================================

/// Id generator owning its random source.
///
/// Seed it for reproducible ids in tests; use `new()` everywhere else.
pub struct IdGenerator<R = StdRng> {
    rng: R,
}

impl IdGenerator<StdRng> {
    /// Generator seeded from OS entropy
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic generator
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for IdGenerator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> IdGenerator<R> {
    pub fn from_rng(rng: R) -> Self {
        IdGenerator { rng }
    }

    /// Next id stamped with the current time
    pub fn next_id(&mut self, prefix: &str) -> String {
        self.next_id_at(prefix, Utc::now().timestamp_millis())
    }

    /// Next id stamped with `millis`
    pub fn next_id_at(&mut self, prefix: &str, millis: i64) -> String {
        generate_id_with(prefix, millis, &mut self.rng)
    }
}

// ============================================================================
// ID PARTS
// ============================================================================

/// The three segments of a generated id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParts<'a> {
    pub prefix: &'a str,
    pub millis: i64,
    pub suffix: &'a str,
}

impl<'a> IdParts<'a> {
    /// Split an id back into its segments.
    /// The prefix may contain the delimiter, so splitting starts from the right.
    pub fn parse(id: &'a str) -> Option<Self> {
        let mut parts = id.rsplitn(3, ID_DELIMITER);
        let suffix = parts.next()?;
        let millis = parts.next()?.parse().ok()?;
        let prefix = parts.next()?;

        let suffix_ok = suffix.len() == SUFFIX_LEN
            && suffix.bytes().all(|b| SUFFIX_ALPHABET.contains(&b));

        if suffix_ok {
            Some(IdParts { prefix, millis, suffix })
        } else {
            None
        }
    }
}
