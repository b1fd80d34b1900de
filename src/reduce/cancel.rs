/*!
 * Cooperative Cancellation
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag polled by partition folds between elements
///
/// Blocking tasks cannot be aborted from outside, so a fold stops at the
/// next element boundary once the flag is raised.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[inline(always)]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Raises the flag when dropped unless disarmed
///
/// Held across a partition fold: an `Err` return or a panic leaves it armed,
/// which stops the sibling partition at its next element.
#[derive(Debug)]
pub(crate) struct CancelOnFailure<'a> {
    flag: &'a CancelFlag,
    armed: bool,
}

impl<'a> CancelOnFailure<'a> {
    pub(crate) fn new(flag: &'a CancelFlag) -> Self {
        Self { flag, armed: true }
    }

    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnFailure<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flag.cancel();
        }
    }
}
