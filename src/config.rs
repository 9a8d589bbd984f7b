// ⚙️ Configuration - CLI flags with environment fallbacks
// Shared by the dashboard and the API server.

use crate::coherence::GOLDEN_RATIO;
use crate::feed::DEFAULT_FEED_INTERVAL;
use crate::operations::{DEFAULT_LOG_CAPACITY, DEFAULT_SETTLE_DELAY, DEFAULT_SETTLE_DELAY_MS, DEFAULT_SUCCESS_RATE};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Runtime configuration after parsing
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// SQLite file; `None` runs with a disconnected storage
    pub database_path: Option<PathBuf>,
    pub bind_addr: String,
    pub feed_interval: Duration,
    pub coherence_base: f64,
    pub log_window: usize,
    pub success_rate: f64,
    /// Zero settles mock operations on the spot
    pub settle_delay: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            database_path: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            feed_interval: DEFAULT_FEED_INTERVAL,
            coherence_base: GOLDEN_RATIO,
            log_window: DEFAULT_LOG_CAPACITY,
            success_rate: DEFAULT_SUCCESS_RATE,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Flags flattened into each binary's parser
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// SQLite database path (storage is disabled when absent)
    #[arg(long = "database", env = "QUANTUM_DATABASE")]
    pub database_path: Option<PathBuf>,

    /// Address the API server binds to
    #[arg(long = "bind", env = "QUANTUM_BIND", default_value = DEFAULT_BIND_ADDR)]
    pub bind_addr: String,

    /// Seconds between live feed messages
    #[arg(long, env = "QUANTUM_FEED_INTERVAL_SECS", default_value_t = 30)]
    pub feed_interval_secs: u64,

    /// Baseline the coherence oscillator swings around
    #[arg(long, env = "QUANTUM_COHERENCE_BASE", default_value_t = GOLDEN_RATIO)]
    pub coherence_base: f64,

    /// Number of operation records kept in the rolling log
    #[arg(long, env = "QUANTUM_LOG_WINDOW", default_value_t = DEFAULT_LOG_CAPACITY)]
    pub log_window: usize,

    /// Probability that a simulated operation succeeds (0.0 - 1.0)
    #[arg(long, env = "QUANTUM_SUCCESS_RATE", default_value_t = DEFAULT_SUCCESS_RATE)]
    pub success_rate: f64,

    /// Milliseconds a mock operation stays pending before it settles
    #[arg(long, env = "QUANTUM_SETTLE_DELAY_MS", default_value_t = DEFAULT_SETTLE_DELAY_MS)]
    pub settle_delay_ms: u64,
}

impl From<ConfigArgs> for DashboardConfig {
    fn from(args: ConfigArgs) -> Self {
        DashboardConfig {
            database_path: args.database_path,
            bind_addr: args.bind_addr,
            feed_interval: Duration::from_secs(args.feed_interval_secs.max(1)),
            coherence_base: if args.coherence_base.is_finite() {
                args.coherence_base
            } else {
                GOLDEN_RATIO
            },
            log_window: args.log_window.max(1),
            success_rate: args.success_rate.clamp(0.0, 1.0),
            settle_delay: Duration::from_millis(args.settle_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ConfigArgs,
    }

    #[test]
    fn test_defaults_match_config_default() {
        let cli = TestCli::try_parse_from(["test"]).unwrap();
        let config = DashboardConfig::from(cli.config);
        let expected = DashboardConfig::default();

        assert_eq!(config.feed_interval, expected.feed_interval);
        assert_eq!(config.log_window, expected.log_window);
        assert_eq!(config.coherence_base, expected.coherence_base);
        assert_eq!(config.settle_delay, expected.settle_delay);
    }

    #[test]
    fn test_flags_override() {
        let cli = TestCli::try_parse_from([
            "test",
            "--database",
            "/tmp/q.db",
            "--bind",
            "127.0.0.1:8080",
            "--feed-interval-secs",
            "5",
            "--log-window",
            "0",
            "--success-rate",
            "1.5",
            "--settle-delay-ms",
            "0",
        ])
        .unwrap();
        let config = DashboardConfig::from(cli.config);

        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/q.db")));
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.feed_interval, Duration::from_secs(5));
        assert_eq!(config.log_window, 1);
        assert_eq!(config.success_rate, 1.0);
        assert_eq!(config.settle_delay, Duration::ZERO);
    }
}
