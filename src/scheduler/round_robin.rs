//! Unweighted round robin
//!
//! Entities join the back of a ring when they become ready, so newcomers are
//! served in the order their first job was admitted. Each round serves the
//! front of the ring and moves it to the back. Weights are ignored.
//!
//! An entity that goes idle is not searched for in the ring. Its membership is
//! dropped and the stale ring slot is discarded when it reaches the front,
//! which keeps every operation amortised O(1).

use super::{Backlogs, Scheduler};
use core::hash::Hash;
use std::collections::{HashMap, VecDeque};

/// Rotation over ready entities that ignores weights
#[derive(Debug)]
pub struct RoundRobinScheduler<E> {
    ring: VecDeque<(E, u64)>,
    // ready entity -> epoch of its live ring slot
    members: HashMap<E, u64>,
    epoch: u64,
}

impl<E> Default for RoundRobinScheduler<E> {
    fn default() -> Self {
        Self {
            ring: VecDeque::new(),
            members: HashMap::new(),
            epoch: 0,
        }
    }
}

impl<E: Eq + Hash + Clone> RoundRobinScheduler<E> {
    /// Create an empty rotation
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E> Scheduler<E> for RoundRobinScheduler<E>
where
    E: Eq + Hash + Clone + Send,
{
    fn ready(&mut self, entity: &E) {
        if self.members.contains_key(entity) {
            return;
        }
        self.epoch += 1;
        self.members.insert(entity.clone(), self.epoch);
        self.ring.push_back((entity.clone(), self.epoch));
    }

    fn idle(&mut self, entity: &E) {
        self.members.remove(entity);
    }

    fn select(&mut self, backlogs: &dyn Backlogs<E>) -> Option<E> {
        while let Some((entity, epoch)) = self.ring.pop_front() {
            if self.members.get(&entity) != Some(&epoch) {
                continue;
            }
            if backlogs.head(&entity).is_none() {
                self.members.remove(&entity);
                continue;
            }
            self.ring.push_back((entity.clone(), epoch));
            return Some(entity);
        }
        None
    }
}
