//! Configuration for the settlement core.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Address, RingsettleError, Result, constants};

/// Settlement core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Address the broker registry is known by.
    pub registry_address: Address,
    /// Wall-clock budget for one interceptor call.
    pub interceptor_call_timeout_ms: u64,
    /// Calls one interceptor may have running at once, abandoned ones
    /// included.
    pub max_in_flight_interceptor_calls: usize,
    /// Maximum rings in one batch.
    pub max_rings_per_batch: usize,
    /// Maximum orders in one batch.
    pub max_orders_per_batch: usize,
    /// Number of committed batch IDs remembered.
    pub idempotency_cache_size: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            registry_address: Address(constants::DEFAULT_REGISTRY_ADDRESS),
            interceptor_call_timeout_ms: constants::DEFAULT_INTERCEPTOR_CALL_TIMEOUT_MS,
            max_in_flight_interceptor_calls: constants::DEFAULT_MAX_IN_FLIGHT_INTERCEPTOR_CALLS,
            max_rings_per_batch: constants::DEFAULT_MAX_RINGS_PER_BATCH,
            max_orders_per_batch: constants::DEFAULT_MAX_ORDERS_PER_BATCH,
            idempotency_cache_size: constants::DEFAULT_IDEMPOTENCY_CACHE_SIZE,
        }
    }
}

impl SettlementConfig {
    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RingsettleError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject zero timeouts and zero-sized limits.
    pub fn validate(&self) -> Result<()> {
        if self.interceptor_call_timeout_ms == 0 {
            return Err(RingsettleError::Configuration(
                "interceptor_call_timeout_ms must be > 0".into(),
            ));
        }
        if self.max_in_flight_interceptor_calls == 0 {
            return Err(RingsettleError::Configuration(
                "max_in_flight_interceptor_calls must be > 0".into(),
            ));
        }
        if self.max_rings_per_batch == 0 || self.max_orders_per_batch == 0 {
            return Err(RingsettleError::Configuration(
                "batch limits must be > 0".into(),
            ));
        }
        if self.idempotency_cache_size == 0 {
            return Err(RingsettleError::Configuration(
                "idempotency_cache_size must be > 0".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn interceptor_call_timeout(&self) -> Duration {
        Duration::from_millis(self.interceptor_call_timeout_ms)
    }
}
