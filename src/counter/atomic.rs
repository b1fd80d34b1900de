/*!
 * Atomic Counter
 * Lock-free counter backed by a single hardware atomic
 */

use std::sync::atomic::{AtomicI64, Ordering};

/// Cache-line aligned atomic counter
///
/// # Performance
///
/// - **No lock**: one `fetch_add` per update
/// - **Contention**: every writer hits the same cache line, so heavy
///   fan-in still ping-pongs between cores (see `PartitionedCounter`)
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicI64,
}

impl AtomicCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta`, wrapping on overflow
    #[inline(always)]
    pub fn apply(&self, delta: i64) {
        self.value.fetch_add(delta, Ordering::SeqCst);
    }

    #[inline(always)]
    pub fn read(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_alignment() {
        assert_eq!(std::mem::align_of::<AtomicCounter>(), 64);
    }

    #[test]
    fn test_concurrent_apply() {
        let counter = Arc::new(AtomicCounter::new());
        let mut handles = vec![];

        for _ in 0..16 {
            let counter = counter.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    counter.apply(1);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.read(), 16_000);
        counter.reset();
        assert_eq!(counter.read(), 0);
    }

    #[test]
    fn test_wrapping_at_bounds() {
        let counter = AtomicCounter::new();
        counter.apply(i64::MAX);
        counter.apply(1);
        assert_eq!(counter.read(), i64::MIN);
    }
}
