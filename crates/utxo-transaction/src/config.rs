//! Builder configuration.

use serde::{Deserialize, Serialize};

use crate::TransactionError;

/// Settings for a [`TransactionBuilder`](crate::builder::TransactionBuilder) session.
///
/// The fee-rate ceiling has no default and must be chosen by the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Highest fee rate, in sat/vB, that `build()` accepts.
    pub maximum_fee_rate: u64,
    /// Grind ECDSA signatures until R is below 2^255.
    #[serde(default)]
    pub low_r: bool,
}

impl BuilderConfig {
    /// Create a configuration with the given fee-rate ceiling and low-R off.
    pub fn new(maximum_fee_rate: u64) -> Self {
        BuilderConfig {
            maximum_fee_rate,
            low_r: false,
        }
    }

    /// Set the low-R signing preference.
    pub fn with_low_r(mut self, low_r: bool) -> Self {
        self.low_r = low_r;
        self
    }

    /// Check the configuration.
    ///
    /// A zero ceiling is rejected as a configuration error. Hosts that
    /// want to relay zero-fee transactions skip `build()` and use
    /// `build_incomplete()`.
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.maximum_fee_rate == 0 {
            return Err(TransactionError::InvalidArgument(
                "maximum_fee_rate must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
