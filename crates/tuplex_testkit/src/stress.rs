//! Stress tests for Tuplex.
//!
//! These helpers run many transactions against one space, from one or
//! several threads. Threads share the space by reference through
//! [`std::thread::scope`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tuplex_core::{ContainerId, CoreError, Count, Entry, EntryId, Selector, Space};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent threads (for concurrent tests).
    pub threads: usize,
    /// Attempts a consumer makes before giving up on a retryable failure.
    pub max_retries: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            max_retries: 1_000,
        }
    }
}

/// Outcome of [`stress_contended_takes`].
#[derive(Debug, Clone)]
pub struct TakeOutcome {
    /// Throughput figures. Failed operations are retryable conflicts.
    pub result: StressTestResult,
    /// Every entry taken, by any thread.
    pub taken: Vec<EntryId>,
}

/// Run a sequential write stress test.
pub fn stress_sequential_writes(
    space: &Space,
    container: ContainerId,
    config: &StressConfig,
) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        match space.write(container, Entry::new(i as i64)) {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a concurrent write stress test.
///
/// Writes never conflict, since every entry has a fresh identity.
pub fn stress_concurrent_writes(
    space: &Space,
    container: ContainerId,
    config: &StressConfig,
) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let ops_per_thread = config.operations / config.threads.max(1);

    let start = Instant::now();
    thread::scope(|scope| {
        for t in 0..config.threads {
            let successful = &successful;
            let failed = &failed;
            scope.spawn(move || {
                for i in 0..ops_per_thread {
                    let value = (t * ops_per_thread + i) as i64;
                    match space.write(container, Entry::new(value)) {
                        Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Several threads take `Exact(1)` entries until the container is drained.
///
/// `selector` picks the coordinator the consumers go through. Retryable
/// failures (a candidate locked by another consumer) are counted and
/// retried, everything else panics.
pub fn stress_contended_takes(
    space: &Space,
    container: ContainerId,
    selector: &Selector,
    config: &StressConfig,
) -> TakeOutcome {
    let conflicts = AtomicUsize::new(0);
    let selectors = [selector.clone().with_count(Count::Exact(1))];

    let start = Instant::now();
    let taken: Vec<EntryId> = thread::scope(|scope| {
        let handles: Vec<_> = (0..config.threads)
            .map(|_| {
                let conflicts = &conflicts;
                let selectors = &selectors;
                scope.spawn(move || {
                    let mut mine = Vec::new();
                    let mut retries = 0usize;
                    loop {
                        match space.take(container, selectors) {
                            Ok(entries) => {
                                retries = 0;
                                mine.extend(entries.iter().map(Entry::id));
                            }
                            Err(CoreError::CountNotMet { available: 0, .. })
                                if space_is_drained(space, container) =>
                            {
                                break;
                            }
                            Err(e) if e.is_retryable() && retries < config.max_retries => {
                                retries += 1;
                                conflicts.fetch_add(1, Ordering::Relaxed);
                                thread::yield_now();
                            }
                            Err(e) => panic!("take failed: {e}"),
                        }
                    }
                    mine
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|h| h.join().expect("Thread panicked"))
            .collect()
    });

    TakeOutcome {
        result: StressTestResult::new(
            taken.len(),
            conflicts.load(Ordering::Relaxed),
            start.elapsed(),
        ),
        taken,
    }
}

fn space_is_drained(space: &Space, container: ContainerId) -> bool {
    space
        .container(container)
        .and_then(|c| c.is_empty().ok())
        .unwrap_or(true)
}

/// Run a transaction abort stress test.
///
/// Every other transaction fails after writing, so exactly half of the
/// entries survive.
pub fn stress_transaction_aborts(
    space: &Space,
    container: ContainerId,
    config: &StressConfig,
) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        // Every other transaction will fail intentionally
        let should_fail = i % 2 == 0;

        let result = space.transaction(|tx| {
            tx.write(container, Entry::new(i as i64))?;

            if should_fail {
                Err(CoreError::invalid_operation("intentional"))
            } else {
                Ok(())
            }
        });

        match result {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a large transaction stress test.
pub fn stress_large_transactions(
    space: &Space,
    container: ContainerId,
    config: &StressConfig,
) -> StressTestResult {
    let batch_size = 100; // Entries per transaction

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for batch in 0..(config.operations / batch_size) {
        let entries = (0..batch_size).map(|i| Entry::new((batch * batch_size + i) as i64));
        match space.transaction(|tx| tx.write_all(container, entries)) {
            Ok(_) => successful += batch_size,
            Err(_) => failed += batch_size,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}
