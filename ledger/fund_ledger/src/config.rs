//! Ledger configuration.

use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};

/// Tuning for the payment anomaly detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudConfig {
    /// Payments required before any payment can be flagged.
    pub min_history: usize,
    /// Only the most recent `window` payments are scored.
    pub window: usize,
    /// Expected share of outliers in the scored window.
    pub contamination: f64,
    /// Number of isolation trees per fit.
    pub trees: usize,
    /// Observations sampled per tree.
    pub sample_size: usize,
    pub seed: u64,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            min_history: 5,
            window: 256,
            contamination: 0.2,
            trees: 100,
            sample_size: 256,
            seed: 42,
        }
    }
}

impl FraudConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_history < 2 {
            return Err(LedgerError::InvalidInput(
                "fraud min_history must be at least 2".into(),
            ));
        }
        if self.window < self.min_history {
            return Err(LedgerError::InvalidInput(format!(
                "fraud window ({}) must not be smaller than min_history ({})",
                self.window, self.min_history
            )));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(LedgerError::InvalidInput(format!(
                "fraud contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.trees == 0 {
            return Err(LedgerError::InvalidInput("fraud trees must be positive".into()));
        }
        if self.sample_size < 2 {
            return Err(LedgerError::InvalidInput(
                "fraud sample_size must be at least 2".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub fraud: FraudConfig,
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<()> {
        self.fraud.validate()
    }
}
