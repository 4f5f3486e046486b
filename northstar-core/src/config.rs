//! Configuration types

use crate::error::{ConfigError, NorthstarResult};
use serde::{Deserialize, Serialize};

/// Engine configuration.
///
/// `max_hops` bounds every walk along parent pointers (upward recalculation,
/// ancestor checks, subtree collection). The tree is a three-level forest by
/// convention, but that convention is not structurally enforced by the data
/// model, so the guard must hold even against corrupted parent chains.
///
/// `conflict_retries` bounds how many times a conflicting read-compute-write
/// cycle is transparently retried before surfacing the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub max_hops: u32,
    pub conflict_retries: u32,
}

impl EngineConfig {
    /// The standard configuration: generous hop guard for a three-level
    /// tree, a handful of conflict retries.
    pub fn standard() -> Self {
        Self {
            max_hops: 8,
            conflict_retries: 3,
        }
    }

    /// Create from environment variables with fallback to the standard
    /// configuration.
    ///
    /// Environment variables:
    /// - `NORTHSTAR_ENGINE_MAX_HOPS`: maximum parent-chain hops (default: 8)
    /// - `NORTHSTAR_ENGINE_CONFLICT_RETRIES`: write-conflict retries (default: 3)
    pub fn from_env() -> Self {
        let standard = Self::standard();

        Self {
            max_hops: std::env::var("NORTHSTAR_ENGINE_MAX_HOPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(standard.max_hops),
            conflict_retries: std::env::var("NORTHSTAR_ENGINE_CONFLICT_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(standard.conflict_retries),
        }
    }

    /// Validate the configuration.
    ///
    /// A hop guard below 3 cannot cover a well-formed three-level tree.
    pub fn validate(&self) -> NorthstarResult<()> {
        if self.max_hops < 3 {
            return Err(ConfigError::InvalidValue {
                field: "max_hops".to_string(),
                value: self.max_hops.to_string(),
                reason: "max_hops must cover the three-level tree (minimum 3)".to_string(),
            }
            .into());
        }

        Ok(())
    }
}
