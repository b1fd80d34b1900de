/*!
 * Partitioned Accumulation
 *
 * Race avoidance by construction: every contributor owns a private `Tally`
 * and nothing is shared while contributions are being made. Tallies are
 * combined exactly once, after the contributor is done.
 *
 * ## Contention
 *
 * A locked or atomic counter serialises every single update on one cache
 * line. With private tallies the hot loop touches only thread-local memory;
 * the shared total is written once per contributor.
 */

use crate::core::errors::{panic_message, AccumulatorError, AccumulatorResult, Partition};
use std::iter::Sum;
use std::ops::Add;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::thread;
use tracing::{debug, trace};

/// Private running total owned by a single contributor
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    total: i64,
    operations: u64,
}

impl Tally {
    pub const fn new() -> Self {
        Self {
            total: 0,
            operations: 0,
        }
    }

    #[inline(always)]
    pub fn apply(&mut self, delta: i64) {
        self.total = self.total.wrapping_add(delta);
        self.operations += 1;
    }

    #[inline(always)]
    pub fn increment(&mut self) {
        self.apply(1);
    }

    #[inline(always)]
    pub fn decrement(&mut self) {
        self.apply(-1);
    }

    /// Net contribution so far
    pub fn total(&self) -> i64 {
        self.total
    }

    /// Number of `apply` calls folded into this tally
    pub fn operations(&self) -> u64 {
        self.operations
    }
}

impl Add for Tally {
    type Output = Tally;

    fn add(self, rhs: Tally) -> Tally {
        Tally {
            total: self.total.wrapping_add(rhs.total),
            operations: self.operations + rhs.operations,
        }
    }
}

impl Sum for Tally {
    fn sum<I: Iterator<Item = Tally>>(iter: I) -> Tally {
        iter.fold(Tally::new(), Add::add)
    }
}

/// Shared total that only ever receives finished tallies
#[derive(Debug, Default)]
pub struct PartitionedCounter {
    merged: AtomicI64,
    merges: AtomicU64,
}

impl PartitionedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a finished tally into the shared total
    #[inline]
    pub fn merge(&self, tally: Tally) {
        self.merged.fetch_add(tally.total, Ordering::SeqCst);
        self.merges.fetch_add(1, Ordering::Relaxed);
        trace!(
            total = tally.total,
            operations = tally.operations,
            "Merged partitioned tally"
        );
    }

    /// Sum of every merged tally
    #[inline]
    pub fn read(&self) -> i64 {
        self.merged.load(Ordering::SeqCst)
    }

    /// Number of tallies merged since creation or the last reset
    pub fn merges(&self) -> u64 {
        self.merges.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.merged.store(0, Ordering::SeqCst);
        self.merges.store(0, Ordering::Relaxed);
    }
}

/// Run every worker on its own thread with a private tally, then sum them
///
/// The only synchronisation is the final join. A panicking worker is
/// reported as `ComputationFailure` for that worker's index; every other
/// worker is still joined before returning.
///
/// # Example
///
/// ```ignore
/// let workers: Vec<fn(&mut Tally)> = vec![
///     |t| for _ in 0..1_000_000 { t.increment() },
///     |t| for _ in 0..1_000_000 { t.decrement() },
/// ];
/// let total = accumulate_partitioned(workers)?;
/// assert_eq!(total, 0);
/// ```
pub fn accumulate_partitioned<F>(workers: Vec<F>) -> AccumulatorResult<i64>
where
    F: FnOnce(&mut Tally) + Send,
{
    let worker_count = workers.len();
    debug!(workers = worker_count, "Starting partitioned accumulation");

    let outcomes: Vec<thread::Result<Tally>> = thread::scope(|s| {
        let handles: Vec<_> = workers
            .into_iter()
            .map(|worker| {
                s.spawn(move || {
                    let mut tally = Tally::new();
                    worker(&mut tally);
                    tally
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join()).collect()
    });

    let mut tallies = Vec::with_capacity(worker_count);
    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(tally) => tallies.push(tally),
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                tracing::warn!(worker = index, %reason, "Partitioned worker failed");
                return Err(AccumulatorError::computation(Partition::Worker(index), reason));
            }
        }
    }

    let combined: Tally = tallies.into_iter().sum();
    debug!(
        total = combined.total(),
        operations = combined.operations(),
        "Partitioned accumulation complete"
    );
    Ok(combined.total())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_basics() {
        let mut tally = Tally::new();
        tally.increment();
        tally.increment();
        tally.decrement();
        tally.apply(10);

        assert_eq!(tally.total(), 11);
        assert_eq!(tally.operations(), 4);
    }

    #[test]
    fn test_tally_sum() {
        let mut a = Tally::new();
        a.apply(3);
        let mut b = Tally::new();
        b.apply(-5);
        b.apply(1);

        let total: Tally = vec![a, b].into_iter().sum();
        assert_eq!(total.total(), -1);
        assert_eq!(total.operations(), 3);
    }

    #[test]
    fn test_merge_and_reset() {
        let counter = PartitionedCounter::new();
        let mut tally = Tally::new();
        tally.apply(7);

        counter.merge(tally);
        counter.merge(tally);
        assert_eq!(counter.read(), 14);
        assert_eq!(counter.merges(), 2);

        counter.reset();
        assert_eq!(counter.read(), 0);
        assert_eq!(counter.merges(), 0);
    }

    #[test]
    fn test_accumulate_empty() {
        let workers: Vec<fn(&mut Tally)> = Vec::new();
        assert_eq!(accumulate_partitioned(workers).unwrap(), 0);
    }

    #[test]
    fn test_accumulate_reports_failing_worker() {
        let workers: Vec<Box<dyn FnOnce(&mut Tally) + Send>> = vec![
            Box::new(|t: &mut Tally| t.apply(1)),
            Box::new(|_: &mut Tally| panic!("worker exploded")),
        ];

        let err = accumulate_partitioned(workers).unwrap_err();
        assert_eq!(err.partition(), Some(Partition::Worker(1)));
    }
}
