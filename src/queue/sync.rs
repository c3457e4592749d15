//! The synchronised fair queue
//!
//! [`FairQueue`] wraps the bounded storage, the entity registry and a
//! [`Scheduler`] behind one `parking_lot` mutex, and adds blocking, deadlines
//! and the shutdown lifecycle on top.
//!
//! ## Blocking Model
//!
//! ```text
//! Producer (submit)                      Consumer (take)
//! ---------------                        ---------------
//! lock                                   lock
//! wait on not_full while full            wait on not_empty while nothing pending
//! admit job                              scheduler picks entity, remove its head
//! (entity's first job: scheduler.ready)  (entity's last job: scheduler.idle)
//! unlock, notify_all(not_empty)          unlock, notify_all(not_full)
//! ```
//!
//! Every wake is a broadcast. Waiters always re-check their condition after
//! waking, and a timed-out waiter checks once more before reporting
//! [`Error::Timeout`], so a wake racing the deadline is never lost.
//!
//! ## Poisoning
//!
//! `parking_lot` locks do not poison. Instead, the critical-section guard
//! notices a panic unwinding through it, raises a flag on the shared handle and
//! wakes every waiter. From then on every call returns
//! [`Error::LockPoisoned`].

use super::bounded::{Lifecycle, QueueCore};
use super::handle::{Consumer, Producer};
use crate::config::QueueConfig;
use crate::job::{Job, JobId, Priority};
use crate::registry::{EntityRegistry, Role};
use crate::scheduler::{Backlogs, DeficitScheduler, Scheduler};
use crate::stats::{EntityStats, QueueStats};
use crate::{Error, Result};
use core::fmt::{self, Debug};
use core::hash::Hash;
use core::ops::{Deref, DerefMut};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// How long a call may block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Fail immediately instead of blocking
    NoWait,
    /// Block until the call can proceed or the queue shuts down
    Forever,
    /// Block until the deadline, then fail with [`Error::Timeout`]
    Until(Instant),
}

impl Wait {
    /// Deadline `timeout` from now. Timeouts too large to represent block forever.
    pub fn timeout(timeout: Duration) -> Wait {
        Instant::now()
            .checked_add(timeout)
            .map_or(Wait::Forever, Wait::Until)
    }
}

/// What the scheduler sees of the pending work while it picks
struct Pending<'a, E, T> {
    core: &'a QueueCore<E, T>,
    registry: &'a EntityRegistry<E>,
}

impl<E, T> Backlogs<E> for Pending<'_, E, T>
where
    E: Eq + Hash + Clone + Debug,
{
    fn weight(&self, entity: &E) -> u32 {
        self.registry.weight(entity)
    }

    fn head(&self, entity: &E) -> Option<JobId> {
        self.core.head_of(entity)
    }
}

struct State<E, T, S> {
    core: QueueCore<E, T>,
    registry: EntityRegistry<E>,
    scheduler: S,
    priority_levels: u8,
}

impl<E, T, S> State<E, T, S>
where
    E: Eq + Hash + Clone + Debug,
    S: Scheduler<E>,
{
    fn check_priority(&self, priority: Priority) -> Result<()> {
        if priority.level() >= self.priority_levels {
            return Err(Error::InvalidPriority {
                priority: priority.level(),
                levels: self.priority_levels,
            });
        }
        Ok(())
    }

    /// One scheduling round: pick an entity and remove its head job
    fn next_job(&mut self) -> Option<Job<E, T>> {
        let State {
            core,
            registry,
            scheduler,
            ..
        } = self;

        let entity = scheduler.select(&Pending {
            core: &*core,
            registry: &*registry,
        })?;
        let job = core.try_remove_for(&entity)?;
        if core.pending_for(&entity) == 0 {
            scheduler.idle(&entity);
        }
        Some(job)
    }

    fn entity_stats(&self, entity: &E) -> Option<EntityStats<E>> {
        let record = self.registry.get(entity)?;
        Some(EntityStats {
            entity: entity.clone(),
            role: record.role,
            weight: record.weight,
            submitted: record.submitted,
            consumed: record.consumed,
            served: record.served,
            pending: self.core.pending_for(entity),
            deficit: self.scheduler.deficit(entity),
        })
    }
}

struct Shared<E, T, S> {
    state: Mutex<State<E, T, S>>,
    not_empty: Condvar,
    not_full: Condvar,
    closed: Condvar,
    poisoned: AtomicBool,
    capacity: usize,
}

impl<E, T, S> Shared<E, T, S> {
    fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    fn poison(&self) {
        if !self.poisoned.swap(true, Ordering::AcqRel) {
            warn!("panic inside a queue critical section; queue is now poisoned");
            self.wake_all();
        }
    }

    fn wake_all(&self) {
        self.not_empty.notify_all();
        self.not_full.notify_all();
        self.closed.notify_all();
    }
}

/// Exclusive access to the queue state.
///
/// Poisons the queue if a panic unwinds while it is held.
struct Critical<'a, E, T, S> {
    guard: MutexGuard<'a, State<E, T, S>>,
    shared: &'a Shared<E, T, S>,
    entered_panicking: bool,
}

impl<E, T, S> Critical<'_, E, T, S> {
    fn ensure_healthy(&self) -> Result<()> {
        if self.shared.is_poisoned() {
            return Err(Error::LockPoisoned);
        }
        Ok(())
    }

    /// Park on `condvar` until notified or `wait` expires.
    ///
    /// Returns true when the deadline passed.
    fn park(&mut self, condvar: &Condvar, wait: Wait) -> bool {
        match wait {
            Wait::NoWait => true,
            Wait::Forever => {
                condvar.wait(&mut self.guard);
                false
            }
            Wait::Until(deadline) => condvar.wait_until(&mut self.guard, deadline).timed_out(),
        }
    }
}

impl<E, T, S> Deref for Critical<'_, E, T, S> {
    type Target = State<E, T, S>;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<E, T, S> DerefMut for Critical<'_, E, T, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl<E, T, S> Drop for Critical<'_, E, T, S> {
    fn drop(&mut self) {
        if !self.entered_panicking && std::thread::panicking() {
            self.shared.poison();
        }
    }
}

/// A bounded, fairness-aware, blocking job queue
///
/// Producers submit jobs on behalf of an entity; consumers take jobs in the
/// order the scheduler decides. With the default [`DeficitScheduler`], each
/// entity's share of taken jobs converges to its weight's share of the total
/// weight of entities with pending work.
///
/// The handle is cheap to clone; all clones share one queue.
///
/// # Examples
///
/// ```rust
/// use fairq::{FairQueue, Priority, QueueConfig};
/// use std::thread;
///
/// let queue: FairQueue<&str, u64> = FairQueue::with_config(QueueConfig::new(8))?;
/// queue.register(&"batch", 1)?;
/// queue.register(&"interactive", 3)?;
///
/// let producer = thread::spawn({
///     let queue = queue.clone();
///     move || {
///         for i in 0..4 {
///             queue.submit(&"batch", Priority::HIGHEST, i).unwrap();
///             queue.submit(&"interactive", Priority::HIGHEST, 100 + i).unwrap();
///         }
///         queue.shutdown().unwrap();
///     }
/// });
///
/// let mut taken = 0;
/// while let Ok(job) = queue.take() {
///     taken += 1;
///     let _ = job.into_payload();
/// }
/// producer.join().unwrap();
/// assert_eq!(taken, 8);
/// # Ok::<(), fairq::Error>(())
/// ```
pub struct FairQueue<E, T, S = DeficitScheduler<E>> {
    shared: Arc<Shared<E, T, S>>,
}

impl<E, T, S> Clone for FairQueue<E, T, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E, T, S> fmt::Debug for FairQueue<E, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FairQueue")
            .field("capacity", &self.shared.capacity)
            .field("poisoned", &self.shared.is_poisoned())
            .finish_non_exhaustive()
    }
}

impl<E, T> FairQueue<E, T>
where
    E: Eq + Hash + Clone + Debug + Send,
    T: Send,
{
    /// Create a queue with the given capacity and default settings
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");
        Self::build(QueueConfig::new(capacity), DeficitScheduler::new())
    }

    /// Create a queue from a validated configuration
    pub fn with_config(config: QueueConfig) -> Result<Self> {
        Self::with_scheduler(config, DeficitScheduler::new())
    }
}

impl<E, T, S> FairQueue<E, T, S>
where
    E: Eq + Hash + Clone + Debug + Send,
    T: Send,
    S: Scheduler<E>,
{
    /// Create a queue that uses a custom scheduling policy
    pub fn with_scheduler(config: QueueConfig, scheduler: S) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, scheduler))
    }

    fn build(config: QueueConfig, scheduler: S) -> Self {
        debug!(
            capacity = config.capacity,
            priority_levels = config.priority_levels,
            default_weight = config.default_weight,
            "fair queue created"
        );
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    core: QueueCore::new(config.capacity),
                    registry: EntityRegistry::new(&config),
                    scheduler,
                    priority_levels: config.priority_levels,
                }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                closed: Condvar::new(),
                poisoned: AtomicBool::new(false),
                capacity: config.capacity,
            }),
        }
    }

    fn lock(&self) -> Result<Critical<'_, E, T, S>> {
        if self.shared.is_poisoned() {
            return Err(Error::LockPoisoned);
        }
        let critical = Critical {
            guard: self.shared.state.lock(),
            shared: &self.shared,
            entered_panicking: std::thread::panicking(),
        };
        critical.ensure_healthy()?;
        Ok(critical)
    }

    /// Create an entity or change its weight
    ///
    /// Weight changes apply from the next scheduling round. Counters are kept.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidEntity`] if `weight` is zero.
    pub fn register(&self, entity: &E, weight: u32) -> Result<()> {
        let mut state = self.lock()?;
        state.registry.register(entity, weight)?;
        debug!(?entity, weight, "entity registered");
        Ok(())
    }

    /// A handle that submits as `entity`
    pub fn producer(&self, entity: E) -> Result<Producer<E, T, S>> {
        self.lock()?.registry.touch(&entity, Role::Producer)?;
        Ok(Producer::new(self.clone(), entity))
    }

    /// A handle that takes as `entity` and is credited for every job it takes
    pub fn consumer(&self, entity: E) -> Result<Consumer<E, T, S>> {
        self.lock()?.registry.touch(&entity, Role::Consumer)?;
        Ok(Consumer::new(self.clone(), entity))
    }

    /// Submit a job for `entity`, blocking as `wait` allows
    ///
    /// # Errors
    ///
    /// - [`Error::QueueClosed`] once shutdown has started, including while blocked
    /// - [`Error::CapacityExceeded`] with [`Wait::NoWait`] on a full queue
    /// - [`Error::Timeout`] when a [`Wait::Until`] deadline passes
    /// - [`Error::InvalidPriority`] for a priority outside the configured levels
    /// - [`Error::InvalidEntity`] for an unregistered entity when registration is required
    /// - [`Error::LockPoisoned`] if the queue is poisoned
    pub fn submit_with(
        &self,
        entity: &E,
        priority: Priority,
        payload: T,
        wait: Wait,
    ) -> Result<JobId> {
        let mut state = self.lock()?;
        if state.core.lifecycle() != Lifecycle::Open {
            return Err(Error::QueueClosed);
        }
        state.check_priority(priority)?;
        state.registry.touch(entity, Role::Producer)?;

        let mut expired = false;
        while !state.core.has_room() {
            if state.core.lifecycle() != Lifecycle::Open {
                return Err(Error::QueueClosed);
            }
            if wait == Wait::NoWait {
                return Err(Error::CapacityExceeded {
                    capacity: self.shared.capacity,
                });
            }
            if expired {
                return Err(Error::Timeout);
            }
            expired = state.park(&self.shared.not_full, wait);
            state.ensure_healthy()?;
        }

        let id = state.core.next_job_id();
        let job = Job::new(id, priority, entity.clone(), payload);
        let was_idle = state.core.pending_for(entity) == 0;
        if state.core.try_admit(job).is_err() {
            return Err(Error::CapacityExceeded {
                capacity: self.shared.capacity,
            });
        }
        if was_idle {
            state.scheduler.ready(entity);
        }
        state.registry.record_submitted(entity);
        trace!(
            ?entity,
            %id,
            priority = priority.level(),
            len = state.core.len(),
            "job admitted"
        );
        drop(state);

        self.shared.not_empty.notify_all();
        Ok(id)
    }

    /// Submit, blocking while the queue is full
    pub fn submit(&self, entity: &E, priority: Priority, payload: T) -> Result<JobId> {
        self.submit_with(entity, priority, payload, Wait::Forever)
    }

    /// Submit without blocking
    pub fn try_submit(&self, entity: &E, priority: Priority, payload: T) -> Result<JobId> {
        self.submit_with(entity, priority, payload, Wait::NoWait)
    }

    /// Submit, blocking at most `timeout` while the queue is full
    pub fn submit_timeout(
        &self,
        entity: &E,
        priority: Priority,
        payload: T,
        timeout: Duration,
    ) -> Result<JobId> {
        self.submit_with(entity, priority, payload, Wait::timeout(timeout))
    }

    /// Take the next job in fairness order, blocking as `wait` allows
    ///
    /// # Errors
    ///
    /// - [`Error::QueueClosed`] once the queue is closed and drained
    /// - [`Error::Empty`] with [`Wait::NoWait`] when nothing is pending
    /// - [`Error::Timeout`] when a [`Wait::Until`] deadline passes
    /// - [`Error::LockPoisoned`] if the queue is poisoned
    pub fn take_with(&self, wait: Wait) -> Result<Job<E, T>> {
        self.take_as(None, wait)
    }

    /// Take, blocking while nothing is pending
    pub fn take(&self) -> Result<Job<E, T>> {
        self.take_as(None, Wait::Forever)
    }

    /// Take without blocking
    pub fn try_take(&self) -> Result<Job<E, T>> {
        self.take_as(None, Wait::NoWait)
    }

    /// Take, blocking at most `timeout` while nothing is pending
    pub fn take_timeout(&self, timeout: Duration) -> Result<Job<E, T>> {
        self.take_as(None, Wait::timeout(timeout))
    }

    pub(crate) fn take_as(&self, consumer: Option<&E>, wait: Wait) -> Result<Job<E, T>> {
        let mut state = self.lock()?;
        if let Some(consumer) = consumer {
            state.registry.touch(consumer, Role::Consumer)?;
        }

        let mut expired = false;
        loop {
            if let Some(job) = state.next_job() {
                state.registry.record_consumed(job.entity());
                if let Some(consumer) = consumer {
                    state.registry.record_served(consumer);
                }
                let drained = state.core.finish_drain();
                trace!(
                    entity = ?job.entity(),
                    id = %job.id(),
                    len = state.core.len(),
                    "job taken"
                );
                drop(state);

                self.shared.not_full.notify_all();
                if drained {
                    debug!("last pending job taken; queue closed");
                    self.shared.wake_all();
                }
                return Ok(job);
            }

            if state.core.lifecycle() != Lifecycle::Open {
                return Err(Error::QueueClosed);
            }
            if wait == Wait::NoWait {
                return Err(Error::Empty);
            }
            if expired {
                return Err(Error::Timeout);
            }
            expired = state.park(&self.shared.not_empty, wait);
            state.ensure_healthy()?;
        }
    }

    /// Stop admissions and let consumers drain what is pending
    ///
    /// New submissions fail with [`Error::QueueClosed`] straight away, and so
    /// do producers blocked on a full queue. Takes keep succeeding until the
    /// backlog is empty; then the queue is `Closed` and blocked takes return
    /// [`Error::QueueClosed`]. Calling it again has no further effect.
    pub fn shutdown(&self) -> Result<()> {
        let mut state = self.lock()?;
        let before = state.core.lifecycle();
        let after = state.core.close();
        let pending = state.core.len();
        drop(state);

        if before != after {
            debug!(?after, pending, "queue shutting down");
        }
        self.shared.wake_all();
        Ok(())
    }

    /// Close immediately and hand back every pending job
    ///
    /// Jobs come back in submission order. Nothing is dropped by the queue.
    pub fn shutdown_now(&self) -> Result<Vec<Job<E, T>>> {
        let mut state = self.lock()?;
        let State { core, scheduler, .. } = &mut *state;
        for (entity, _) in core.candidates() {
            scheduler.idle(entity);
        }
        let discarded = core.drain_all();
        drop(state);

        if !discarded.is_empty() {
            warn!(discarded = discarded.len(), "queue closed with pending jobs");
        }
        self.shared.wake_all();
        Ok(discarded)
    }

    /// Block until the queue reaches `Closed`
    ///
    /// With `None` this waits indefinitely, so on an open queue it only returns
    /// after some other thread calls [`shutdown`](Self::shutdown).
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if the backlog is not drained in time.
    pub fn await_drained(&self, timeout: Option<Duration>) -> Result<()> {
        let wait = timeout.map_or(Wait::Forever, Wait::timeout);
        let mut state = self.lock()?;
        let mut expired = false;
        while state.core.lifecycle() != Lifecycle::Closed {
            if expired {
                return Err(Error::Timeout);
            }
            expired = state.park(&self.shared.closed, wait);
            state.ensure_healthy()?;
        }
        Ok(())
    }

    /// [`shutdown`](Self::shutdown), then wait for consumers to drain the backlog
    pub fn shutdown_graceful(&self, timeout: Option<Duration>) -> Result<()> {
        self.shutdown()?;
        self.await_drained(timeout)
    }

    /// Pending jobs
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.core.len())
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Capacity bound
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Current lifecycle state
    pub fn lifecycle(&self) -> Result<Lifecycle> {
        Ok(self.lock()?.core.lifecycle())
    }

    /// Whether a panic has made the queue unusable
    pub fn is_poisoned(&self) -> bool {
        self.shared.is_poisoned()
    }

    /// Entities that currently have at least one pending job
    pub fn pending_entities(&self) -> Result<Vec<E>> {
        let state = self.lock()?;
        Ok(state
            .core
            .candidates()
            .map(|(entity, _)| entity.clone())
            .collect())
    }

    /// Counters for one entity, if the queue has seen it
    pub fn entity(&self, entity: &E) -> Result<Option<EntityStats<E>>> {
        Ok(self.lock()?.entity_stats(entity))
    }

    /// Consistent snapshot of the queue and every entity
    pub fn stats(&self) -> Result<QueueStats<E>> {
        let state = self.lock()?;
        let entities = state
            .registry
            .iter()
            .filter_map(|(entity, _)| state.entity_stats(entity))
            .collect();
        Ok(QueueStats {
            len: state.core.len(),
            capacity: state.core.capacity(),
            lifecycle: state.core.lifecycle(),
            entities,
        })
    }
}
