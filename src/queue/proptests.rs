//! Property-based tests for the fair queue using proptest
//!
//! These check the invariants that must hold for any sequence of operations:
//! the capacity bound, conservation of jobs, per-entity ordering and weighted
//! fairness.

use super::*;
use crate::config::QueueConfig;
use crate::job::Priority;
use crate::Error;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
enum Op {
    Submit { entity: u8, priority: u8 },
    Take,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..4, 0u8..4).prop_map(|(entity, priority)| Op::Submit { entity, priority }),
        Just(Op::Take),
    ]
}

proptest! {
    #[test]
    fn test_capacity_and_conservation(
        capacity in 1usize..16,
        ops in prop::collection::vec(op(), 1..200)
    ) {
        let queue: FairQueue<u8, u64> = FairQueue::new(capacity);
        let mut admitted = HashSet::new();
        let mut taken = HashSet::new();
        let mut next = 0u64;

        for op in ops {
            match op {
                Op::Submit { entity, priority } => {
                    next += 1;
                    match queue.try_submit(&entity, Priority(priority), next) {
                        Ok(_) => {
                            admitted.insert(next);
                        }
                        Err(err) => prop_assert_eq!(err, Error::CapacityExceeded { capacity }),
                    }
                }
                Op::Take => match queue.try_take() {
                    Ok(job) => prop_assert!(taken.insert(job.into_payload())),
                    Err(err) => prop_assert_eq!(err, Error::Empty),
                },
            }
            let len = queue.len().unwrap();
            prop_assert!(len <= capacity);
            prop_assert_eq!(len, admitted.len() - taken.len());
        }

        for job in queue.shutdown_now().unwrap() {
            prop_assert!(taken.insert(job.into_payload()));
        }
        prop_assert_eq!(admitted, taken);
    }

    #[test]
    fn test_entity_backlog_is_priority_then_fifo(
        jobs in prop::collection::vec((0u8..3, 0u8..4), 1..64)
    ) {
        let queue: FairQueue<u8, usize> = FairQueue::new(64);
        for (index, &(entity, priority)) in jobs.iter().enumerate() {
            queue.submit(&entity, Priority(priority), index).unwrap();
        }

        let mut last: HashMap<u8, (u8, usize)> = HashMap::new();
        while let Ok(job) = queue.try_take() {
            let key = (job.priority().level(), *job.payload());
            if let Some(previous) = last.insert(*job.entity(), key) {
                prop_assert!(previous < key, "{:?} served after {:?}", key, previous);
            }
        }
        prop_assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn test_backlogged_entities_converge_to_weights(
        weights in prop::collection::vec(1u32..6, 1..5),
        cycles in 1usize..20
    ) {
        let total: u32 = weights.iter().sum();
        let queue: FairQueue<usize, ()> =
            FairQueue::with_config(QueueConfig::new(2 * weights.len())).unwrap();
        for (entity, &weight) in weights.iter().enumerate() {
            queue.register(&entity, weight).unwrap();
            queue.submit(&entity, Priority::HIGHEST, ()).unwrap();
            queue.submit(&entity, Priority::HIGHEST, ()).unwrap();
        }

        // every entity stays backlogged: whoever is served gets a new job
        // before its last one could leave, so nobody goes idle
        let rounds = total as usize * cycles;
        for _ in 0..rounds {
            let job = queue.take().unwrap();
            queue.try_submit(job.entity(), Priority::HIGHEST, ()).unwrap();
        }

        let stats = queue.stats().unwrap();
        for (entity, &weight) in weights.iter().enumerate() {
            let consumed = stats.entity(&entity).unwrap().consumed;
            prop_assert_eq!(consumed, u64::from(weight) * cycles as u64);
        }
    }
}
