//! Fairness scheduling
//!
//! A scheduler answers one question per take: among the entities that have
//! pending work right now, whose job is served next? It never sees jobs. The
//! queue tells it when an entity gains its first pending job
//! ([`Scheduler::ready`]) and when it loses its last one ([`Scheduler::idle`]),
//! and lends it a [`Backlogs`] view for weights and head jobs while it picks.
//!
//! ## Available Schedulers
//!
//! - [`DeficitScheduler`]: deficit-based weighted round robin (the default).
//!   Consumption share converges to each entity's weight share, within one job.
//! - [`RoundRobinScheduler`]: plain rotation that ignores weights. Fair only
//!   when every entity has the same weight. Amortised O(1) per pick.
//!
//! Schedulers are called with the queue lock held, so they need no
//! synchronisation of their own and must not block.

mod deficit;
mod round_robin;

pub use deficit::DeficitScheduler;
pub use round_robin::RoundRobinScheduler;

use crate::job::JobId;

/// Read access to the pending work of ready entities
pub trait Backlogs<E> {
    /// Current fairness weight, always positive
    fn weight(&self, entity: &E) -> u32;

    /// Id of the job `entity` would hand out next, or `None` if it has nothing
    /// pending.
    ///
    /// This is the head of the entity's backlog in (priority, id) order, so a
    /// more urgent job can be the head while an older one still waits.
    fn head(&self, entity: &E) -> Option<JobId>;
}

/// Policy that picks which ready entity is served next
pub trait Scheduler<E>: Send {
    /// `entity` has gained its first pending job
    fn ready(&mut self, entity: &E);

    /// `entity` has no pending jobs left
    fn idle(&mut self, entity: &E);

    /// Pick the ready entity whose head job is removed next.
    ///
    /// Returns `None` only when no entity is ready. Each call is one
    /// scheduling round and is followed by exactly one removal from the
    /// chosen entity.
    fn select(&mut self, backlogs: &dyn Backlogs<E>) -> Option<E>;

    /// Accrued credit of a ready entity, for schedulers that keep one
    fn deficit(&self, _entity: &E) -> Option<i64> {
        None
    }
}

#[cfg(test)]
mod tests;
