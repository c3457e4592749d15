//! Jobs and their identifiers

use core::fmt;
use std::time::{Duration, Instant};

/// Monotonically increasing job identifier, unique within one queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub(crate) u64);

impl JobId {
    /// Raw numeric value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Priority of a job within its owner's backlog
///
/// Lower values are more urgent; [`Priority::HIGHEST`] is served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Priority(pub u8);

impl Priority {
    /// Most urgent priority
    pub const HIGHEST: Priority = Priority(0);

    /// Level index
    pub fn level(self) -> u8 {
        self.0
    }
}

impl From<u8> for Priority {
    fn from(level: u8) -> Self {
        Priority(level)
    }
}

/// A unit of work owned by one producer entity
///
/// Jobs are immutable once admitted. The payload is handed back to the consumer
/// through [`Job::into_payload`].
#[derive(Debug, Clone)]
pub struct Job<E, T> {
    id: JobId,
    priority: Priority,
    entity: E,
    enqueued_at: Instant,
    payload: T,
}

impl<E, T> Job<E, T> {
    pub(crate) fn new(id: JobId, priority: Priority, entity: E, payload: T) -> Self {
        Self {
            id,
            priority,
            entity,
            enqueued_at: Instant::now(),
            payload,
        }
    }

    /// Identifier assigned at submission
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Priority within the owner's backlog
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Owning producer entity
    pub fn entity(&self) -> &E {
        &self.entity
    }

    /// When the job was admitted
    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    /// Time spent since admission
    pub fn age(&self) -> Duration {
        self.enqueued_at.elapsed()
    }

    /// Borrow the payload
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Consume the job, keeping only the payload
    pub fn into_payload(self) -> T {
        self.payload
    }

    /// Ordering key inside one entity's backlog: priority first, then age
    pub(crate) fn key(&self) -> (Priority, JobId) {
        (self.priority, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_orders_priority_before_id() {
        let urgent = Job::new(JobId(7), Priority(0), "a", ());
        let old = Job::new(JobId(1), Priority(2), "a", ());
        assert!(urgent.key() < old.key());

        let first = Job::new(JobId(1), Priority(1), "a", ());
        let second = Job::new(JobId(2), Priority(1), "a", ());
        assert!(first.key() < second.key());
    }

    #[test]
    fn test_job_accessors() {
        let job = Job::new(JobId(3), Priority::HIGHEST, "tenant", vec![1u8, 2, 3]);
        assert_eq!(job.id().get(), 3);
        assert_eq!(job.id().to_string(), "job-3");
        assert_eq!(job.priority().level(), 0);
        assert_eq!(*job.entity(), "tenant");
        assert!(job.enqueued_at() <= Instant::now());
        assert_eq!(job.into_payload(), vec![1, 2, 3]);
    }
}
