//! Deficit-based weighted round robin
//!
//! Every round, each ready entity's deficit grows by its weight. The ready
//! entity with the largest deficit wins and pays back the round's quantum: the
//! total weight of the entities that were ready in that round. On a tie the
//! entity whose head job has the lowest id wins, which is the oldest of the
//! jobs competing in that round.
//!
//! ```text
//! weights a=1 b=3, both always ready, quantum 4
//!
//! round   a      b      pick
//!   1     1      3      b  -> b = -1
//!   2     2      2      a  -> a = -2   (tie, a's head is older)
//!   3    -1      5      b  -> b =  1
//!   4     0      4      b  -> b =  0
//! ```
//!
//! After four rounds both deficits are back to zero and the cycle repeats.
//!
//! While the ready set is stable each round adds exactly as much credit as it
//! removes, so every deficit stays within one quantum of zero. That bounds
//! every backlogged entity's consumed count to within one job of its weighted
//! share, and no entity waits more than `max_weight / weight` rounds in a row.
//!
//! An entity that runs out of pending work forfeits its deficit, credit and
//! debt alike, and comes back as a newcomer at zero. The skip bound above
//! therefore also holds for entities returning from idle.

use super::{Backlogs, Scheduler};
use crate::job::JobId;
use core::hash::Hash;
use std::collections::HashMap;

/// Deficit-based weighted round robin over ready entities
#[derive(Debug)]
pub struct DeficitScheduler<E> {
    ready: Vec<E>,
    deficits: HashMap<E, i64>,
}

impl<E> Default for DeficitScheduler<E> {
    fn default() -> Self {
        Self {
            ready: Vec::new(),
            deficits: HashMap::new(),
        }
    }
}

impl<E> DeficitScheduler<E>
where
    E: Eq + Hash + Clone,
{
    /// Create a scheduler with no ready entities
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E> Scheduler<E> for DeficitScheduler<E>
where
    E: Eq + Hash + Clone + Send,
{
    fn ready(&mut self, entity: &E) {
        if !self.deficits.contains_key(entity) {
            self.deficits.insert(entity.clone(), 0);
            self.ready.push(entity.clone());
        }
    }

    fn idle(&mut self, entity: &E) {
        if self.deficits.remove(entity).is_some() {
            if let Some(position) = self.ready.iter().position(|e| e == entity) {
                self.ready.swap_remove(position);
            }
        }
    }

    fn select(&mut self, backlogs: &dyn Backlogs<E>) -> Option<E> {
        let DeficitScheduler { ready, deficits } = self;

        let mut quantum = 0i64;
        let mut best: Option<(&E, i64, JobId)> = None;
        for entity in ready.iter() {
            let Some(head) = backlogs.head(entity) else {
                continue;
            };
            let Some(deficit) = deficits.get_mut(entity) else {
                continue;
            };
            let weight = i64::from(backlogs.weight(entity));
            quantum += weight;
            *deficit += weight;

            let deficit = *deficit;
            let wins = match best {
                None => true,
                Some((_, best_deficit, best_head)) => {
                    deficit > best_deficit || (deficit == best_deficit && head < best_head)
                }
            };
            if wins {
                best = Some((entity, deficit, head));
            }
        }

        let (winner, _, _) = best?;
        let winner = winner.clone();
        if let Some(deficit) = deficits.get_mut(&winner) {
            *deficit -= quantum;
        }
        Some(winner)
    }

    fn deficit(&self, entity: &E) -> Option<i64> {
        self.deficits.get(entity).copied()
    }
}
