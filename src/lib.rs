// Quantum Trust Dashboard - Core Library
// Exposes all modules for use in the dashboard, API server, and tests

pub mod ids;         // Id Generator
pub mod coherence;   // Coherence Oscillator
pub mod format;      // Magnitude Formatter
pub mod conversion;  // Conversion Calculator + SRI / trust units
pub mod operations;  // Mock operation log + simulator
pub mod feed;        // Live feed messages
pub mod db;          // Optional relational storage
pub mod error;
pub mod config;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use ids::{generate_id, generate_id_with, IdGenerator, IdParts};
pub use coherence::{sample_coherence, sample_pulse, CoherenceOscillator, GOLDEN_RATIO};
pub use format::{format_currency, format_magnitude, format_units, INFINITY_SYMBOL};
pub use conversion::{
    convert, nullify_debt, parse_amount, parse_amount_or_zero,
    scarcity_reflection_index, trust_units,
    DebtNullification, Gate, RateTable,
};
pub use operations::{
    MockOperationRecord, OperationLog, OperationSimulator, OperationStatus, SettleQueue,
};
pub use feed::{FeedMessage, LiveFeed};
pub use db::{
    load_debt_csv, setup_database, Storage,
    User, NewUser, DebtData, NewDebtData,
    EconomicIndicator, NewEconomicIndicator,
    DebtOwnership, NewDebtOwnership,
    ApiSource, NewApiSource,
};
pub use error::{StorageError, StorageResult, ValidationError};
pub use config::{ConfigArgs, DashboardConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
