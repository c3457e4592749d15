//! The fair queue
//!
//! This module provides the bounded, blocking, fairness-aware queue and the
//! per-entity handles built on it.
//!
//! ## Layers
//!
//! - **Storage** (`bounded`): per-entity backlogs ordered by priority then age,
//!   the capacity bound and the lifecycle flag
//! - **Fairness** ([`crate::scheduler`]): which entity is served next
//! - **Synchronisation** ([`FairQueue`]): one lock over both, condition
//!   variables for blocking, deadlines and shutdown
//!
//! ## Lifecycle
//!
//! | State     | submit            | take                               |
//! |-----------|-------------------|------------------------------------|
//! | `Open`    | admits or blocks  | returns a job or blocks            |
//! | `Closing` | `QueueClosed`     | drains the remaining jobs          |
//! | `Closed`  | `QueueClosed`     | `QueueClosed`                      |
//!
//! ## Examples
//!
//! ```rust
//! use fairq::{FairQueue, Priority};
//!
//! let queue: FairQueue<u32, &str> = FairQueue::new(4);
//! let producer = queue.producer(7)?;
//! let consumer = queue.consumer(1)?;
//!
//! producer.submit(Priority(1), "routine")?;
//! producer.submit(Priority::HIGHEST, "urgent")?;
//!
//! assert_eq!(*consumer.take()?.payload(), "urgent");
//! assert_eq!(*consumer.take()?.payload(), "routine");
//! assert_eq!(queue.entity(&1)?.unwrap().served, 2);
//! # Ok::<(), fairq::Error>(())
//! ```

mod bounded;
mod handle;
mod sync;

pub use bounded::Lifecycle;
pub use handle::{Consumer, Producer};
pub use sync::{FairQueue, Wait};


#[cfg(test)]
mod proptests;
