//! # fairq
//!
//! A fairness-aware, bounded, blocking priority queue for handing jobs from many
//! producer entities to many consumer threads inside one process.
//!
//! ## Features
//!
//! - **Bounded**: a hard capacity; producers either block, time out, or get
//!   [`Error::CapacityExceeded`]
//! - **Fair**: a deficit-based weighted round robin decides whose job is served
//!   next, so every producer's share of consumption converges to its weight
//! - **Prioritised**: inside one producer's backlog, urgent jobs go first and
//!   equal-priority jobs stay FIFO
//! - **Clean shutdown**: `Open -> Closing -> Closed`, with draining, immediate and
//!   graceful variants
//!
//! ## Quick Start
//!
//! ```rust
//! use fairq::{FairQueue, Priority};
//!
//! let queue: FairQueue<&str, u32> = FairQueue::new(100);
//! queue.submit(&"tenant-a", Priority::HIGHEST, 42)?;
//!
//! let job = queue.take()?;
//! assert_eq!(*job.payload(), 42);
//! assert_eq!(*job.entity(), "tenant-a");
//! # Ok::<(), fairq::Error>(())
//! ```
//!
//! ## Thread Safety
//!
//! [`FairQueue`] is a cheap, cloneable handle around shared state. Every
//! structural change happens under one lock; blocked callers park on condition
//! variables tied to that lock. A panic that escapes a critical section poisons
//! the queue: every later call returns [`Error::LockPoisoned`].

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod config;
pub mod job;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod stats;

pub use crate::config::QueueConfig;
pub use crate::job::{Job, JobId, Priority};
pub use crate::queue::{Consumer, FairQueue, Lifecycle, Producer, Wait};
pub use crate::registry::Role;
pub use crate::scheduler::{Backlogs, DeficitScheduler, RoundRobinScheduler, Scheduler};
pub use crate::stats::{EntityStats, QueueStats};

/// Error types for fairq operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The queue has left the `Open` state and the operation cannot proceed
    #[error("queue is closed")]
    QueueClosed,
    /// A non-blocking submit found the queue full
    #[error("queue is at capacity ({capacity})")]
    CapacityExceeded {
        /// Configured capacity of the queue
        capacity: usize,
    },
    /// A non-blocking take found nothing pending
    #[error("queue is empty")]
    Empty,
    /// A deadline-bound call expired before its condition was met
    #[error("timed out waiting on the queue")]
    Timeout,
    /// A panic escaped a critical section; the queue is unusable
    #[error("queue state poisoned by a panic inside a critical section")]
    LockPoisoned,
    /// The entity is not acceptable under the registry policy
    #[error("invalid entity: {0}")]
    InvalidEntity(String),
    /// The priority is outside the configured levels
    #[error("priority {priority} out of range (levels: {levels})")]
    InvalidPriority {
        /// Rejected priority
        priority: u8,
        /// Number of configured levels
        levels: u8,
    },
    /// The queue configuration was rejected
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl Error {
    /// Whether retrying the same call later can succeed.
    ///
    /// Full, empty, closed-while-draining and timed-out conditions are
    /// transient. A poisoned queue and malformed requests are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::QueueClosed | Error::CapacityExceeded { .. } | Error::Empty | Error::Timeout
        )
    }
}

/// Result type for fairq operations
pub type Result<T> = std::result::Result<T, Error>;
