//! Multi-tenant job broker example
//!
//! Three tenants with different weights feed one bounded queue while a pool
//! of workers drains it. Every tenant submits far more work than the workers
//! can keep up with, so the queue stays full and the scheduler decides who is
//! served. The summary at the end shows each tenant's share of completed jobs
//! tracking its weight.
//!
//! Run with `RUST_LOG=fairq=debug` to see the queue lifecycle events.

use fairq::{Error, FairQueue, Priority, QueueConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Render {
    frame: u32,
    urgent: bool,
}

impl Render {
    fn run(&self) -> u64 {
        // Simulated work
        let mut acc = u64::from(self.frame);
        for i in 0..20_000u64 {
            acc = acc.wrapping_mul(31).wrapping_add(i);
        }
        acc
    }
}

const TENANTS: &[(&str, u32)] = &[("studio", 4), ("agency", 2), ("hobbyist", 1)];
const WORKERS: usize = 3;
const RUN_FOR: Duration = Duration::from_millis(500);

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let queue: FairQueue<&'static str, Render> =
        FairQueue::with_config(QueueConfig::new(16).with_priority_levels(2))?;
    for &(tenant, weight) in TENANTS {
        queue.register(&tenant, weight)?;
    }

    let stop = Arc::new(AtomicBool::new(false));
    let start = Instant::now();

    // Tenants submit until told to stop; a closed queue also ends them
    let tenants: Vec<_> = TENANTS
        .iter()
        .map(|&(tenant, _)| {
            let producer = queue.producer(tenant)?;
            let stop = Arc::clone(&stop);
            Ok::<_, Error>(thread::spawn(move || {
                let mut frame = 0;
                while !stop.load(Ordering::Relaxed) {
                    let urgent = frame % 10 == 0;
                    let priority = if urgent { Priority::HIGHEST } else { Priority(1) };
                    match producer.submit_timeout(
                        priority,
                        Render { frame, urgent },
                        Duration::from_millis(50),
                    ) {
                        Ok(_) | Err(Error::Timeout) => frame += 1,
                        Err(_) => break,
                    }
                }
            }))
        })
        .collect::<Result<_, _>>()?;

    let workers: Vec<_> = (0..WORKERS)
        .map(|id| {
            let consumer = queue.consumer("worker")?;
            Ok::<_, Error>(thread::spawn(move || {
                let mut done = 0u32;
                let mut checksum = 0u64;
                while let Ok(job) = consumer.take() {
                    let render = job.payload();
                    checksum ^= render.run();
                    if render.urgent {
                        info!(
                            worker = id,
                            tenant = *job.entity(),
                            frame = render.frame,
                            "urgent frame rendered"
                        );
                    }
                    done += 1;
                }
                (done, checksum)
            }))
        })
        .collect::<Result<_, _>>()?;

    thread::sleep(RUN_FOR);
    stop.store(true, Ordering::Relaxed);
    queue.shutdown_graceful(Some(Duration::from_secs(5)))?;

    for tenant in tenants {
        let _ = tenant.join();
    }
    let mut rendered = 0;
    for worker in workers {
        if let Ok((done, _)) = worker.join() {
            rendered += done;
        }
    }

    let stats = queue.stats()?;
    println!("\n=== Job broker ({:?}) ===", start.elapsed());
    println!("frames rendered: {rendered}");
    let total_weight: u32 = TENANTS.iter().map(|&(_, weight)| weight).sum();
    for &(tenant, weight) in TENANTS {
        if let Some(entity) = stats.entity(&tenant) {
            println!(
                "{tenant:>9}: weight {weight}, rendered {:>5} ({:>5.1}%, target {:>5.1}%)",
                entity.consumed,
                stats.consumed_share(&tenant) * 100.0,
                f64::from(weight) / f64::from(total_weight) * 100.0,
            );
        }
    }
    if let Some(worker) = stats.entity(&"worker") {
        println!("   worker: served {}", worker.served);
    }

    Ok(())
}
