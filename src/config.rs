//! Queue configuration
//!
//! [`QueueConfig`] collects the knobs a [`FairQueue`](crate::FairQueue) is built
//! with. It validates itself before the queue is constructed, so a running queue
//! never has to deal with a zero capacity or zero weight.

use crate::{Error, Result};

/// Configuration for a [`FairQueue`](crate::FairQueue)
///
/// # Examples
///
/// ```rust
/// use fairq::QueueConfig;
///
/// let config = QueueConfig::new(64)
///     .with_priority_levels(2)
///     .with_default_weight(3);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct QueueConfig {
    /// Maximum number of pending jobs across all entities
    pub capacity: usize,
    /// Number of priority levels; valid priorities are `0..priority_levels`
    pub priority_levels: u8,
    /// Weight given to entities created on first use
    pub default_weight: u32,
    /// Reject entities that were not registered explicitly
    pub require_registration: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            priority_levels: 4,
            default_weight: 1,
            require_registration: false,
        }
    }
}

impl QueueConfig {
    /// Default configuration with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Set the number of priority levels
    pub fn with_priority_levels(mut self, levels: u8) -> Self {
        self.priority_levels = levels;
        self
    }

    /// Set the weight of entities created on first use
    pub fn with_default_weight(mut self, weight: u32) -> Self {
        self.default_weight = weight;
        self
    }

    /// Require entities to be registered before they submit or take
    pub fn with_required_registration(mut self, required: bool) -> Self {
        self.require_registration = required;
        self
    }

    /// Check that every field is usable
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::InvalidConfig("capacity must be greater than 0"));
        }
        if self.priority_levels == 0 {
            return Err(Error::InvalidConfig("at least one priority level is required"));
        }
        if self.default_weight == 0 {
            return Err(Error::InvalidConfig("default weight must be positive"));
        }
        Ok(())
    }
}
