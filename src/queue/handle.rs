//! Per-entity handles
//!
//! A [`Producer`] or [`Consumer`] binds a queue to one entity id so a worker
//! thread can be handed exactly the context it needs. Both are registered with
//! the queue when created and are cheap to clone.

use super::sync::{FairQueue, Wait};
use crate::job::{Job, JobId, Priority};
use crate::scheduler::{DeficitScheduler, Scheduler};
use crate::Result;
use core::fmt::{self, Debug};
use core::hash::Hash;
use std::time::Duration;

/// Submits jobs on behalf of one entity
pub struct Producer<E, T, S = DeficitScheduler<E>> {
    queue: FairQueue<E, T, S>,
    entity: E,
}

impl<E: Clone, T, S> Clone for Producer<E, T, S> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            entity: self.entity.clone(),
        }
    }
}

impl<E: Debug, T, S> fmt::Debug for Producer<E, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("entity", &self.entity)
            .field("queue", &self.queue)
            .finish()
    }
}

impl<E, T, S> Producer<E, T, S>
where
    E: Eq + Hash + Clone + Debug + Send,
    T: Send,
    S: Scheduler<E>,
{
    pub(crate) fn new(queue: FairQueue<E, T, S>, entity: E) -> Self {
        Self { queue, entity }
    }

    /// Entity this handle submits as
    pub fn entity(&self) -> &E {
        &self.entity
    }

    /// Queue behind this handle
    pub fn queue(&self) -> &FairQueue<E, T, S> {
        &self.queue
    }

    /// See [`FairQueue::submit_with`]
    pub fn submit_with(&self, priority: Priority, payload: T, wait: Wait) -> Result<JobId> {
        self.queue.submit_with(&self.entity, priority, payload, wait)
    }

    /// Submit, blocking while the queue is full
    pub fn submit(&self, priority: Priority, payload: T) -> Result<JobId> {
        self.submit_with(priority, payload, Wait::Forever)
    }

    /// Submit without blocking
    pub fn try_submit(&self, priority: Priority, payload: T) -> Result<JobId> {
        self.submit_with(priority, payload, Wait::NoWait)
    }

    /// Submit, blocking at most `timeout`
    pub fn submit_timeout(
        &self,
        priority: Priority,
        payload: T,
        timeout: Duration,
    ) -> Result<JobId> {
        self.submit_with(priority, payload, Wait::timeout(timeout))
    }
}

/// Takes jobs on behalf of one entity
///
/// Every job taken through a consumer handle is credited to the entity's
/// `served` counter.
pub struct Consumer<E, T, S = DeficitScheduler<E>> {
    queue: FairQueue<E, T, S>,
    entity: E,
}

impl<E: Clone, T, S> Clone for Consumer<E, T, S> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            entity: self.entity.clone(),
        }
    }
}

impl<E: Debug, T, S> fmt::Debug for Consumer<E, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("entity", &self.entity)
            .field("queue", &self.queue)
            .finish()
    }
}

impl<E, T, S> Consumer<E, T, S>
where
    E: Eq + Hash + Clone + Debug + Send,
    T: Send,
    S: Scheduler<E>,
{
    pub(crate) fn new(queue: FairQueue<E, T, S>, entity: E) -> Self {
        Self { queue, entity }
    }

    /// Entity this handle takes as
    pub fn entity(&self) -> &E {
        &self.entity
    }

    /// Queue behind this handle
    pub fn queue(&self) -> &FairQueue<E, T, S> {
        &self.queue
    }

    /// See [`FairQueue::take_with`]
    pub fn take_with(&self, wait: Wait) -> Result<Job<E, T>> {
        self.queue.take_as(Some(&self.entity), wait)
    }

    /// Take, blocking while nothing is pending
    pub fn take(&self) -> Result<Job<E, T>> {
        self.take_with(Wait::Forever)
    }

    /// Take without blocking
    pub fn try_take(&self) -> Result<Job<E, T>> {
        self.take_with(Wait::NoWait)
    }

    /// Take, blocking at most `timeout`
    pub fn take_timeout(&self, timeout: Duration) -> Result<Job<E, T>> {
        self.take_with(Wait::timeout(timeout))
    }
}
