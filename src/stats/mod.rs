//! Queue statistics
//!
//! Point-in-time snapshots of a queue and its entities. A snapshot is taken
//! under the queue lock, so every number in it belongs to the same instant:
//! `len` always equals the sum of the entities' `pending` counts, and
//! `consumed <= submitted` holds for every entity.

use crate::queue::Lifecycle;
use crate::registry::Role;

/// Counters for one entity
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityStats<E> {
    /// Entity id
    pub entity: E,
    /// How the entity has been used so far; `None` if only registered
    pub role: Option<Role>,
    /// Fairness weight
    pub weight: u32,
    /// Own jobs admitted
    pub submitted: u64,
    /// Own jobs taken by any consumer
    pub consumed: u64,
    /// Jobs taken while acting as a consumer
    pub served: u64,
    /// Own jobs currently waiting
    pub pending: usize,
    /// Scheduler credit, when the scheduler keeps one. `None` while nothing is pending.
    pub deficit: Option<i64>,
}

impl<E> EntityStats<E> {
    /// Share of admitted jobs that have been taken, as a percentage
    pub fn completion_rate(&self) -> f64 {
        if self.submitted == 0 {
            0.0
        } else {
            (self.consumed as f64 / self.submitted as f64) * 100.0
        }
    }
}

/// Snapshot of a whole queue
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueueStats<E> {
    /// Pending jobs
    pub len: usize,
    /// Capacity bound
    pub capacity: usize,
    /// Lifecycle state
    pub lifecycle: Lifecycle,
    /// Every entity the queue has seen, in no particular order
    pub entities: Vec<EntityStats<E>>,
}

impl<E: PartialEq> QueueStats<E> {
    /// Look up one entity
    pub fn entity(&self, entity: &E) -> Option<&EntityStats<E>> {
        self.entities.iter().find(|stats| stats.entity == *entity)
    }

    /// Fraction of all taken jobs that belonged to `entity`, in `0.0..=1.0`
    pub fn consumed_share(&self, entity: &E) -> f64 {
        let total = self.total_consumed();
        match self.entity(entity) {
            Some(stats) if total > 0 => stats.consumed as f64 / total as f64,
            _ => 0.0,
        }
    }

    /// Pending jobs of `entity`; zero for entities the queue has never seen
    pub fn backlog(&self, entity: &E) -> usize {
        self.entity(entity).map_or(0, |stats| stats.pending)
    }
}

impl<E> QueueStats<E> {
    /// Jobs taken across all entities
    pub fn total_consumed(&self) -> u64 {
        self.entities.iter().map(|stats| stats.consumed).sum()
    }

    /// Jobs admitted across all entities
    pub fn total_submitted(&self) -> u64 {
        self.entities.iter().map(|stats| stats.submitted).sum()
    }

    /// How full the queue is, as a percentage of capacity
    pub fn utilization(&self) -> f64 {
        (self.len as f64 / self.capacity as f64) * 100.0
    }
}
