use super::*;
use std::collections::VecDeque;

/// Pending job ids per entity, driving a scheduler through ready / idle events
/// the way the queue does.
struct Sim {
    weights: Vec<u32>,
    pending: Vec<VecDeque<JobId>>,
    next: u64,
}

impl Backlogs<usize> for Sim {
    fn weight(&self, entity: &usize) -> u32 {
        self.weights[*entity]
    }

    fn head(&self, entity: &usize) -> Option<JobId> {
        self.pending[*entity].front().copied()
    }
}

impl Sim {
    fn new(weights: &[u32]) -> Self {
        Self {
            weights: weights.to_vec(),
            pending: vec![VecDeque::new(); weights.len()],
            next: 0,
        }
    }

    /// Every entity starts with two jobs; see `round`
    fn backlogged<S: Scheduler<usize>>(weights: &[u32], scheduler: &mut S) -> Self {
        let mut sim = Self::new(weights);
        for entity in 0..weights.len() {
            sim.submit(entity, scheduler);
            sim.submit(entity, scheduler);
        }
        sim
    }

    fn submit<S: Scheduler<usize>>(&mut self, entity: usize, scheduler: &mut S) {
        if self.pending[entity].is_empty() {
            scheduler.ready(&entity);
        }
        self.pending[entity].push_back(JobId(self.next));
        self.next += 1;
    }

    fn take<S: Scheduler<usize>>(&mut self, scheduler: &mut S) -> Option<usize> {
        let entity = scheduler.select(&*self)?;
        self.pending[entity].pop_front();
        if self.pending[entity].is_empty() {
            scheduler.idle(&entity);
        }
        Some(entity)
    }

    /// Take one job and refill the served entity, so nobody ever goes idle
    fn round<S: Scheduler<usize>>(&mut self, scheduler: &mut S) -> usize {
        let entity = self.take(scheduler).unwrap();
        self.submit(entity, scheduler);
        entity
    }

    /// Drain everything, returning the longest run of rounds each entity
    /// spent pending without being served.
    fn longest_skips<S: Scheduler<usize>>(&mut self, scheduler: &mut S) -> Vec<usize> {
        let mut current = vec![0; self.weights.len()];
        let mut longest = vec![0; self.weights.len()];
        loop {
            let waiting: Vec<usize> = (0..self.weights.len())
                .filter(|&e| !self.pending[e].is_empty())
                .collect();
            let Some(picked) = self.take(scheduler) else {
                return longest;
            };
            for entity in waiting {
                if entity == picked {
                    current[entity] = 0;
                } else {
                    current[entity] += 1;
                    longest[entity] = longest[entity].max(current[entity]);
                }
            }
        }
    }
}

fn counts<S: Scheduler<usize>>(scheduler: &mut S, weights: &[u32], rounds: usize) -> Vec<u64> {
    let mut sim = Sim::backlogged(weights, scheduler);
    let mut counts = vec![0u64; weights.len()];
    for _ in 0..rounds {
        counts[sim.round(scheduler)] += 1;
    }
    counts
}

#[test]
fn test_equal_weights_split_evenly() {
    let mut scheduler = DeficitScheduler::new();
    assert_eq!(counts(&mut scheduler, &[1, 1, 1, 1], 400), vec![100; 4]);
}

#[test]
fn test_weighted_shares_are_exact_over_full_cycles() {
    let mut scheduler = DeficitScheduler::new();
    assert_eq!(counts(&mut scheduler, &[1, 2, 3], 600), vec![100, 200, 300]);
}

#[test]
fn test_share_stays_within_one_job_at_every_round() {
    for weights in [vec![5, 1, 2, 7], vec![1, 8], vec![3, 3, 1], vec![2]] {
        let total: u32 = weights.iter().sum();
        let mut scheduler = DeficitScheduler::new();
        let mut sim = Sim::backlogged(&weights, &mut scheduler);
        let mut served = vec![0u64; weights.len()];

        for round in 1..=(total as usize * 40) {
            served[sim.round(&mut scheduler)] += 1;
            for (entity, &weight) in weights.iter().enumerate() {
                let ideal = round as f64 * f64::from(weight) / f64::from(total);
                let drift = (served[entity] as f64 - ideal).abs();
                assert!(
                    drift <= 1.0,
                    "weights {weights:?}: entity {entity} drifted {drift} at round {round}"
                );
            }
        }
    }
}

#[test]
fn test_light_entity_is_never_starved() {
    // weight 1 against weight 3: the light entity waits at most 3 rounds
    let mut scheduler = DeficitScheduler::new();
    let mut sim = Sim::backlogged(&[1, 3], &mut scheduler);
    let mut skipped = 0;
    for _ in 0..400 {
        if sim.round(&mut scheduler) == 0 {
            skipped = 0;
        } else {
            skipped += 1;
            assert!(skipped <= 3);
        }
    }
}

#[test]
fn test_tie_goes_to_oldest_head() {
    let mut scheduler = DeficitScheduler::new();
    let mut sim = Sim::new(&[1, 1]);
    scheduler.ready(&0);
    scheduler.ready(&1);
    // entity 0 became ready first but its head is younger, as when a more
    // urgent job jumps its backlog
    sim.pending[0].push_back(JobId(10));
    sim.pending[1].push_back(JobId(3));

    assert_eq!(scheduler.select(&sim), Some(1));
}

#[test]
fn test_idle_entity_forfeits_credit_and_debt() {
    let mut scheduler = DeficitScheduler::new();
    let mut sim = Sim::new(&[1, 1]);
    sim.submit(0, &mut scheduler);
    sim.submit(1, &mut scheduler);

    // 0 is served with its only job and leaves with a debt
    assert_eq!(sim.take(&mut scheduler), Some(0));
    assert_eq!(scheduler.deficit(&0), None);
    assert_eq!(scheduler.deficit(&1), Some(1));

    sim.submit(0, &mut scheduler);
    assert_eq!(scheduler.deficit(&0), Some(0));

    // 1's backlog is discarded while it holds credit
    sim.pending[1].clear();
    scheduler.idle(&1);
    assert_eq!(scheduler.deficit(&1), None);

    sim.submit(1, &mut scheduler);
    assert_eq!(scheduler.deficit(&1), Some(0));
}

#[test]
fn test_returning_entities_are_not_skipped_beyond_weight_ratio() {
    // ten equal entities each served once, then two of them come back
    let mut scheduler = DeficitScheduler::new();
    let mut sim = Sim::new(&[1; 10]);
    for entity in 0..10 {
        sim.submit(entity, &mut scheduler);
    }
    for _ in 0..10 {
        assert!(sim.take(&mut scheduler).is_some());
    }
    for entity in [0, 9] {
        for _ in 0..20 {
            sim.submit(entity, &mut scheduler);
        }
    }

    let longest = sim.longest_skips(&mut scheduler);
    assert!(longest[0] <= 1, "entity 0 skipped {} rounds in a row", longest[0]);
    assert!(longest[9] <= 1, "entity 9 skipped {} rounds in a row", longest[9]);
}

#[test]
fn test_returning_weighted_entities_respect_weight_ratio() {
    let mut scheduler = DeficitScheduler::new();
    let mut sim = Sim::new(&[1, 3]);
    sim.submit(0, &mut scheduler);
    sim.submit(1, &mut scheduler);
    while sim.take(&mut scheduler).is_some() {}

    for _ in 0..20 {
        sim.submit(1, &mut scheduler);
        sim.submit(0, &mut scheduler);
    }
    let longest = sim.longest_skips(&mut scheduler);
    assert!(longest[0] <= 3);
    assert!(longest[1] <= 1);
}

#[test]
fn test_empty_round_selects_nothing() {
    let sim = Sim::new(&[1]);

    let mut deficit: DeficitScheduler<usize> = DeficitScheduler::new();
    assert_eq!(deficit.select(&sim), None);
    deficit.ready(&0);
    deficit.idle(&0);
    assert_eq!(deficit.select(&sim), None);

    let mut rotation: RoundRobinScheduler<usize> = RoundRobinScheduler::new();
    assert_eq!(rotation.select(&sim), None);
    rotation.ready(&0);
    rotation.idle(&0);
    assert_eq!(rotation.select(&sim), None);
}

#[test]
fn test_round_robin_rotates_in_ready_order() {
    let (a, b, c) = (0, 1, 2);
    let mut scheduler = RoundRobinScheduler::new();
    let mut sim = Sim::new(&[9, 1, 1]);
    sim.submit(b, &mut scheduler);
    for entity in [a, a, c, c] {
        sim.submit(entity, &mut scheduler);
    }

    let picked: Vec<usize> = (0..3).filter_map(|_| sim.take(&mut scheduler)).collect();
    assert_eq!(picked, vec![b, a, c]);

    // b went idle after its only job; it comes back behind the others
    sim.submit(b, &mut scheduler);
    let picked: Vec<usize> = (0..3).filter_map(|_| sim.take(&mut scheduler)).collect();
    assert_eq!(picked, vec![a, c, b]);
    assert_eq!(sim.take(&mut scheduler), None);
}

#[test]
fn test_round_robin_ignores_weights() {
    let mut scheduler = RoundRobinScheduler::new();
    assert_eq!(counts(&mut scheduler, &[1, 5], 100), vec![50, 50]);
}
