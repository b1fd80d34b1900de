/*!
 * Locked Counter
 * Exclusive-access counter that surfaces lock poisoning
 */

use crate::core::errors::AccumulatorResult;
use std::sync::Mutex;

/// Counter whose every read-modify-write runs under a mutex
///
/// Uses `std::sync::Mutex` rather than a non-poisoning lock: if a writer
/// panics mid-update, every later `apply`/`read`/`reset` returns
/// `SynchronizationFailure` instead of a value that may be stale.
#[derive(Debug, Default)]
pub struct LockedCounter {
    value: Mutex<i64>,
}

impl LockedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn apply(&self, delta: i64) -> AccumulatorResult<()> {
        let mut value = self.value.lock().map_err(|e| {
            tracing::warn!("Locked counter poisoned during apply");
            e
        })?;
        *value = value.wrapping_add(delta);
        Ok(())
    }

    #[inline]
    pub fn read(&self) -> AccumulatorResult<i64> {
        Ok(*self.value.lock()?)
    }

    pub fn reset(&self) -> AccumulatorResult<()> {
        self.with_locked(|value| *value = 0)
    }

    pub fn is_poisoned(&self) -> bool {
        self.value.is_poisoned()
    }

    /// Run `f` with the lock held
    pub(crate) fn with_locked<R>(&self, f: impl FnOnce(&mut i64) -> R) -> AccumulatorResult<R> {
        let mut value = self.value.lock()?;
        Ok(f(&mut value))
    }
}
