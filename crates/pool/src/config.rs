//! Pool configuration types

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default number of idle instances a pool keeps for reuse.
pub const DEFAULT_MAX_SIZE: usize = 32;

/// Configuration for a resource pool
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Maximum number of idle instances kept for reuse.
    ///
    /// Instances returned beyond this are disposed. Zero disables pooling.
    /// Instances on loan are not bounded by this value.
    pub max_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

impl PoolConfig {
    /// Configuration with the given capacity.
    #[must_use]
    pub fn with_max_size(max_size: usize) -> Self {
        Self { max_size }
    }

    /// Whether returned instances can ever be kept for reuse.
    #[must_use]
    pub fn pooling_enabled(&self) -> bool {
        self.max_size > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_default() {
        let config = PoolConfig::default();
        assert_eq!(config.max_size, 32);
        assert!(config.pooling_enabled());
    }

    #[test]
    fn zero_capacity_disables_pooling() {
        assert!(!PoolConfig::with_max_size(0).pooling_enabled());
    }
}
