/*!
 * Guarded Counter
 *
 * A shared signed integer that concurrent producers can update without
 * lost updates. Three interchangeable backends:
 *
 * - **Locked**: mutex around every read-modify-write, poisoning surfaced
 * - **Atomic**: single hardware `fetch_add`
 * - **Partitioned**: private per-contributor tallies merged once at the end
 *
 * All three converge on the same value: after every contribution has
 * finished, `read()` equals the algebraic sum of every delta applied.
 *
 * ## Example
 *
 * ```ignore
 * let counter = GuardedCounter::with_strategy(CounterStrategy::Partitioned);
 *
 * thread::scope(|s| {
 *     s.spawn(|| {
 *         let mut c = counter.contributor();
 *         for _ in 0..N { c.increment()?; }
 *         c.finish()
 *     });
 *     // ...
 * });
 *
 * assert_eq!(counter.read()?, expected);
 * ```
 */

mod atomic;
mod locked;
mod partitioned;

pub use atomic::AtomicCounter;
pub use locked::LockedCounter;
pub use partitioned::{accumulate_partitioned, PartitionedCounter, Tally};

use crate::core::errors::AccumulatorResult;
use crate::core::sync::{AccumulatorConfig, CounterStrategy};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

enum Backend {
    Locked(LockedCounter),
    Atomic(AtomicCounter),
    Partitioned(PartitionedCounter),
}

/// Shared counter with a selectable synchronisation strategy
pub struct GuardedCounter {
    backend: Backend,
    strategy: CounterStrategy,
    open_contributors: AtomicUsize,
}

impl GuardedCounter {
    /// Create a counter at zero using the default (`Auto`) strategy
    pub fn new() -> Self {
        Self::with_config(AccumulatorConfig::default())
    }

    pub fn with_strategy(strategy: CounterStrategy) -> Self {
        Self::with_config(AccumulatorConfig::new(strategy))
    }

    pub fn with_config(config: AccumulatorConfig) -> Self {
        let strategy = config.select_strategy();
        let backend = match strategy {
            CounterStrategy::Locked => Backend::Locked(LockedCounter::new()),
            CounterStrategy::Atomic => Backend::Atomic(AtomicCounter::new()),
            CounterStrategy::Partitioned | CounterStrategy::Auto => {
                Backend::Partitioned(PartitionedCounter::new())
            }
        };
        debug!(strategy = %strategy, "Created guarded counter");

        Self {
            backend,
            strategy,
            open_contributors: AtomicUsize::new(0),
        }
    }

    /// Resolved strategy (never `Auto`)
    pub fn strategy(&self) -> CounterStrategy {
        self.strategy
    }

    /// Atomically add `delta`
    ///
    /// On a partitioned counter this behaves like a contributor that applies
    /// one delta and finishes immediately.
    #[inline]
    pub fn apply(&self, delta: i64) -> AccumulatorResult<()> {
        match &self.backend {
            Backend::Locked(c) => c.apply(delta),
            Backend::Atomic(c) => {
                c.apply(delta);
                Ok(())
            }
            Backend::Partitioned(c) => {
                let mut tally = Tally::new();
                tally.apply(delta);
                c.merge(tally);
                Ok(())
            }
        }
    }

    #[inline]
    pub fn increment(&self) -> AccumulatorResult<()> {
        self.apply(1)
    }

    #[inline]
    pub fn decrement(&self) -> AccumulatorResult<()> {
        self.apply(-1)
    }

    /// Consistent snapshot of the value
    ///
    /// For a partitioned counter only finished contributors are visible.
    pub fn read(&self) -> AccumulatorResult<i64> {
        match &self.backend {
            Backend::Locked(c) => c.read(),
            Backend::Atomic(c) => Ok(c.read()),
            Backend::Partitioned(c) => Ok(c.read()),
        }
    }

    /// Set the value back to zero
    ///
    /// Precondition: no `apply`, `read` or open contributor may be in flight.
    /// This is not enforced; an open partitioned contributor that finishes
    /// after a reset still merges its tally.
    pub fn reset(&self) -> AccumulatorResult<()> {
        let open = self.open_contributors.load(Ordering::Acquire);
        if open > 0 {
            tracing::warn!(open, "Resetting counter with contributors still open");
        }
        match &self.backend {
            Backend::Locked(c) => c.reset()?,
            Backend::Atomic(c) => c.reset(),
            Backend::Partitioned(c) => c.reset(),
        }
        debug!(strategy = %self.strategy, "Counter reset");
        Ok(())
    }

    /// Hand out a per-worker contribution handle
    pub fn contributor(&self) -> Contributor<'_> {
        self.open_contributors.fetch_add(1, Ordering::AcqRel);
        Contributor {
            counter: self,
            tally: Tally::new(),
            finished: false,
        }
    }

    /// Contributors handed out and not yet finished or dropped
    pub fn open_contributors(&self) -> usize {
        self.open_contributors.load(Ordering::Acquire)
    }
}

impl Default for GuardedCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GuardedCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedCounter")
            .field("strategy", &self.strategy)
            .field("value", &self.read().ok())
            .field("open_contributors", &self.open_contributors())
            .finish()
    }
}

/// Per-worker view of a `GuardedCounter`
///
/// Locked and atomic counters see each delta as it is applied. A partitioned
/// counter sees nothing until the contributor finishes; the local tally is
/// merged exactly once, by `finish()` or on drop.
pub struct Contributor<'a> {
    counter: &'a GuardedCounter,
    tally: Tally,
    finished: bool,
}

impl<'a> Contributor<'a> {
    #[inline]
    pub fn apply(&mut self, delta: i64) -> AccumulatorResult<()> {
        match &self.counter.backend {
            Backend::Locked(c) => c.apply(delta)?,
            Backend::Atomic(c) => c.apply(delta),
            Backend::Partitioned(_) => {}
        }
        self.tally.apply(delta);
        Ok(())
    }

    #[inline]
    pub fn increment(&mut self) -> AccumulatorResult<()> {
        self.apply(1)
    }

    #[inline]
    pub fn decrement(&mut self) -> AccumulatorResult<()> {
        self.apply(-1)
    }

    /// Net delta this contributor has applied so far
    pub fn local_total(&self) -> i64 {
        self.tally.total()
    }

    /// Merge any pending tally and return this contributor's net delta
    pub fn finish(mut self) -> AccumulatorResult<i64> {
        self.close();
        Ok(self.tally.total())
    }

    fn close(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Backend::Partitioned(c) = &self.counter.backend {
            c.merge(self.tally);
        }
        self.counter.open_contributors.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Drop for Contributor<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn counters() -> Vec<GuardedCounter> {
        CounterStrategy::CONCRETE
            .iter()
            .map(|s| GuardedCounter::with_strategy(*s))
            .collect()
    }

    #[test]
    fn test_fresh_counter_is_zero() {
        for counter in counters() {
            assert_eq!(counter.read().unwrap(), 0, "{}", counter.strategy());
        }
    }

    #[test]
    fn test_default_strategy_is_partitioned() {
        assert_eq!(GuardedCounter::new().strategy(), CounterStrategy::Partitioned);
    }

    #[test]
    fn test_apply_read_reset() {
        for counter in counters() {
            counter.increment().unwrap();
            counter.increment().unwrap();
            counter.decrement().unwrap();
            counter.apply(40).unwrap();
            assert_eq!(counter.read().unwrap(), 41, "{}", counter.strategy());

            counter.reset().unwrap();
            assert_eq!(counter.read().unwrap(), 0);
        }
    }

    #[test]
    fn test_partitioned_contributor_invisible_until_finish() {
        let counter = GuardedCounter::with_strategy(CounterStrategy::Partitioned);
        let mut contributor = counter.contributor();
        contributor.apply(5).unwrap();

        assert_eq!(counter.read().unwrap(), 0);
        assert_eq!(counter.open_contributors(), 1);

        assert_eq!(contributor.finish().unwrap(), 5);
        assert_eq!(counter.read().unwrap(), 5);
        assert_eq!(counter.open_contributors(), 0);
    }

    #[test]
    fn test_locked_contributor_visible_immediately() {
        let counter = GuardedCounter::with_strategy(CounterStrategy::Locked);
        let mut contributor = counter.contributor();
        contributor.apply(5).unwrap();

        assert_eq!(counter.read().unwrap(), 5);
        assert_eq!(contributor.local_total(), 5);
        drop(contributor);
        assert_eq!(counter.read().unwrap(), 5);
    }

    #[test]
    fn test_dropped_contributor_merges_once() {
        let counter = GuardedCounter::with_strategy(CounterStrategy::Partitioned);
        {
            let mut contributor = counter.contributor();
            contributor.increment().unwrap();
            contributor.increment().unwrap();
        }
        assert_eq!(counter.read().unwrap(), 2);
        assert_eq!(counter.open_contributors(), 0);
    }

    #[test]
    fn test_scoped_contributors_converge() {
        for counter in counters() {
            thread::scope(|s| {
                for i in 0..4 {
                    let counter = &counter;
                    s.spawn(move || {
                        let mut c = counter.contributor();
                        let delta = if i % 2 == 0 { 1 } else { -1 };
                        for _ in 0..5_000 {
                            c.apply(delta).unwrap();
                        }
                        c.finish().unwrap()
                    });
                }
            });
            assert_eq!(counter.read().unwrap(), 0, "{}", counter.strategy());
        }
    }
}
