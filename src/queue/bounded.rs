//! Bounded queue storage
//!
//! [`QueueCore`] holds pending jobs grouped by owning entity, enforces the
//! capacity bound and carries the lifecycle flag. It has no locking and no
//! notion of fairness: the facade decides *whose* job leaves next and calls
//! [`QueueCore::try_remove_for`] with that entity.
//!
//! Each entity's backlog is ordered by `(priority, job id)`, so the job handed
//! out for an entity is its most urgent one, and among equally urgent jobs the
//! oldest.

use crate::job::{Job, JobId, Priority};
use core::hash::Hash;
use std::collections::{BTreeMap, HashMap};

/// Queue-wide admission and drain state
///
/// Transitions only move forward: `Open -> Closing -> Closed`, or straight from
/// `Open` to `Closed` when nothing is pending at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Lifecycle {
    /// Submissions and takes both proceed
    Open,
    /// No new submissions; pending jobs can still be taken
    Closing,
    /// Nothing pending and nothing admitted any more
    Closed,
}

type Backlog<E, T> = BTreeMap<(Priority, JobId), Job<E, T>>;

pub(crate) struct QueueCore<E, T> {
    backlogs: HashMap<E, Backlog<E, T>>,
    len: usize,
    capacity: usize,
    lifecycle: Lifecycle,
    next_id: u64,
}

impl<E, T> QueueCore<E, T>
where
    E: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");
        Self {
            backlogs: HashMap::new(),
            len: 0,
            capacity,
            lifecycle: Lifecycle::Open,
            next_id: 0,
        }
    }

    /// Allocate the id for the next admitted job
    pub fn next_job_id(&mut self) -> JobId {
        let id = JobId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Whether an admission would succeed right now
    pub fn has_room(&self) -> bool {
        self.lifecycle == Lifecycle::Open && self.len < self.capacity
    }

    /// Insert a job if the queue is open and below capacity.
    ///
    /// A rejected job is handed back untouched.
    pub fn try_admit(&mut self, job: Job<E, T>) -> Result<(), Job<E, T>> {
        if !self.has_room() {
            return Err(job);
        }
        let backlog = self.backlogs.entry(job.entity().clone()).or_default();
        debug_assert!(!backlog.contains_key(&job.key()));
        backlog.insert(job.key(), job);
        self.len += 1;
        Ok(())
    }

    /// Remove the most urgent, oldest job of `entity`
    pub fn try_remove_for(&mut self, entity: &E) -> Option<Job<E, T>> {
        let backlog = self.backlogs.get_mut(entity)?;
        let (_, job) = backlog.pop_first()?;
        if backlog.is_empty() {
            self.backlogs.remove(entity);
        }
        self.len -= 1;
        Some(job)
    }

    /// Entities with pending work, each with the id of the job it would hand out next
    pub fn candidates(&self) -> impl Iterator<Item = (&E, JobId)> + '_ {
        self.backlogs.iter().filter_map(|(entity, backlog)| {
            backlog
                .first_key_value()
                .map(|(&(_, head), _)| (entity, head))
        })
    }

    /// Id of the job `entity` would hand out next
    pub fn head_of(&self, entity: &E) -> Option<JobId> {
        let (&(_, head), _) = self.backlogs.get(entity)?.first_key_value()?;
        Some(head)
    }

    pub fn pending_for(&self, entity: &E) -> usize {
        self.backlogs.get(entity).map_or(0, BTreeMap::len)
    }

    /// Stop admissions. Returns the lifecycle after the call.
    pub fn close(&mut self) -> Lifecycle {
        if self.lifecycle == Lifecycle::Open {
            self.lifecycle = if self.len == 0 {
                Lifecycle::Closed
            } else {
                Lifecycle::Closing
            };
        }
        self.lifecycle
    }

    /// Move `Closing` to `Closed` once the last job is gone.
    ///
    /// Returns true when this call made the transition.
    pub fn finish_drain(&mut self) -> bool {
        if self.lifecycle == Lifecycle::Closing && self.len == 0 {
            self.lifecycle = Lifecycle::Closed;
            return true;
        }
        false
    }

    /// Close immediately, handing back every pending job in submission order
    pub fn drain_all(&mut self) -> Vec<Job<E, T>> {
        let mut jobs: Vec<Job<E, T>> = self
            .backlogs
            .drain()
            .flat_map(|(_, backlog)| backlog.into_values())
            .collect();
        jobs.sort_by_key(Job::id);
        self.len = 0;
        self.lifecycle = Lifecycle::Closed;
        jobs
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }
}
