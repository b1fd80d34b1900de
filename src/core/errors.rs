/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::PoisonError;
use thiserror::Error;

/// Which concurrent unit an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    /// Lower half of a fork-join split
    Left,
    /// Upper half of a fork-join split
    Right,
    /// Indexed worker of a partitioned accumulation
    Worker(usize),
    /// The final combine of the two partition results
    Combine,
    /// A plain left-to-right fold over the whole sequence
    Sequential,
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left partition"),
            Self::Right => f.write_str("right partition"),
            Self::Worker(index) => write!(f, "worker {}", index),
            Self::Combine => f.write_str("final combine"),
            Self::Sequential => f.write_str("sequential fold"),
        }
    }
}

/// Accumulation and reduction errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum AccumulatorError {
    #[error("Synchronization failure: {0}")]
    #[diagnostic(
        code(accumulator::synchronization_failure),
        help("A writer panicked while holding the counter lock. Rebuild the counter.")
    )]
    SynchronizationFailure(String),

    #[error("Computation failed in {partition}: {reason}")]
    #[diagnostic(
        code(reduce::computation_failure),
        help("The combine function returned an error or panicked. No partial result was produced.")
    )]
    ComputationFailure { partition: Partition, reason: String },

    #[error("Reduction timed out after {elapsed_ms}ms (limit {timeout_ms}ms)")]
    #[diagnostic(
        code(reduce::timeout),
        help("Both partitions were cancelled and awaited. Raise the timeout or shrink the input.")
    )]
    Timeout { elapsed_ms: u64, timeout_ms: u64 },

    #[error("The {partition} was cancelled before completion")]
    #[diagnostic(
        code(reduce::cancelled),
        help("A sibling partition failed or the timeout expired before this one finished.")
    )]
    Cancelled { partition: Partition },
}

impl AccumulatorError {
    /// Build a computation failure for one partition
    pub fn computation(partition: Partition, reason: impl fmt::Display) -> Self {
        Self::ComputationFailure {
            partition,
            reason: reason.to_string(),
        }
    }

    /// Partition the failure originated from, if any
    pub fn partition(&self) -> Option<Partition> {
        match self {
            Self::ComputationFailure { partition, .. } | Self::Cancelled { partition } => {
                Some(*partition)
            }
            _ => None,
        }
    }

    /// True when the failure was caused by cancellation rather than by the work itself
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl<T> From<PoisonError<T>> for AccumulatorError {
    fn from(err: PoisonError<T>) -> Self {
        AccumulatorError::SynchronizationFailure(format!("Lock poisoned: {}", err))
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub(crate) fn saturating_millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Result type for accumulator operations
pub type AccumulatorResult<T> = std::result::Result<T, AccumulatorError>;

/// Render a panic payload from a joined thread as text
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked with non-string payload".to_string()
    }
}
