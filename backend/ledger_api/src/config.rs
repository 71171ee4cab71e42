//! Service configuration loaded from environment variables.

use fund_ledger::{FraudConfig, LedgerConfig};

use crate::errors::{Result, ServiceError};

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file holding the block journal
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// How often (in seconds) the journal flushes even without new activity
    pub persist_interval_secs: u64,
    /// Milestones used when a create request does not list any
    pub default_milestones: Vec<String>,
    pub ledger: LedgerConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; missing keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = FraudConfig::default();
        let fraud = FraudConfig {
            min_history: parse_or(&lookup, "FRAUD_MIN_HISTORY", defaults.min_history)?,
            window: parse_or(&lookup, "FRAUD_WINDOW", defaults.window)?,
            contamination: parse_or(&lookup, "FRAUD_CONTAMINATION", defaults.contamination)?,
            trees: parse_or(&lookup, "FRAUD_TREES", defaults.trees)?,
            sample_size: parse_or(&lookup, "FRAUD_SAMPLE_SIZE", defaults.sample_size)?,
            seed: parse_or(&lookup, "FRAUD_SEED", defaults.seed)?,
        };
        let ledger = LedgerConfig { fraud };
        ledger
            .validate()
            .map_err(|e| ServiceError::Config(e.to_string()))?;

        let default_milestones: Vec<String> = lookup("DEFAULT_MILESTONES")
            .unwrap_or_else(|| "Planning,Execution,Completion".to_string())
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .collect();
        if default_milestones.is_empty() {
            return Err(ServiceError::Config(
                "DEFAULT_MILESTONES must name at least one milestone".to_string(),
            ));
        }

        let persist_interval_secs = parse_or(&lookup, "PERSIST_INTERVAL_SECS", 5)?;
        if persist_interval_secs == 0 {
            return Err(ServiceError::Config(
                "PERSIST_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }

        Ok(Config {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:./fund_ledger.db".to_string()),
            api_port: parse_or(&lookup, "API_PORT", 3001)?,
            persist_interval_secs,
            default_milestones,
            ledger,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ServiceError::Config(format!("Invalid {key}: {raw}"))),
    }
}
