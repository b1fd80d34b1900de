/*!
 * Fork-Join Reduction (threads)
 *
 * Split at `len / 2`, fold both halves on their own scoped threads, join
 * both, combine left-then-right.
 */

use super::cancel::CancelFlag;
use crate::core::errors::{panic_message, AccumulatorError, AccumulatorResult, Partition};
use crate::counter::GuardedCounter;
use std::fmt::Display;
use std::thread;
use tracing::{debug, instrument, trace, warn};

/// Sequential left-to-right fold; the reference result for every parallel path
pub fn reduce_sequential<T, F, E>(sequence: &[T], identity: T, combine: F) -> Result<T, E>
where
    T: Clone,
    F: Fn(T, T) -> Result<T, E>,
{
    sequence
        .iter()
        .cloned()
        .try_fold(identity, |acc, item| combine(acc, item))
}

/// Reduce `sequence` with `combine` over two concurrent halves
///
/// Both halves are dispatched before either is awaited, and both are always
/// joined, so a failure in one never leaves the other running. If both
/// fail, the left failure is reported.
///
/// Floating-point combines may round differently from `reduce_sequential`
/// because the grouping changes.
///
/// # Example
///
/// ```ignore
/// let sum = reduce_parallel(&[1, 2, 3, 4], 0, |a, b| Ok::<_, Infallible>(a + b))?;
/// assert_eq!(sum, 10);
/// ```
pub fn reduce_parallel<T, F, E>(sequence: &[T], identity: T, combine: F) -> AccumulatorResult<T>
where
    T: Clone + Send + Sync,
    F: Fn(T, T) -> Result<T, E> + Sync,
    E: Display,
{
    reduce_parallel_with(sequence, identity, &combine, None)
}

#[instrument(level = "debug", skip_all, fields(len = sequence.len()))]
pub(crate) fn reduce_parallel_with<T, F, E>(
    sequence: &[T],
    identity: T,
    combine: &F,
    progress: Option<&GuardedCounter>,
) -> AccumulatorResult<T>
where
    T: Clone + Send + Sync,
    F: Fn(T, T) -> Result<T, E> + Sync,
    E: Display,
{
    if sequence.is_empty() {
        return Ok(identity);
    }

    let (left, right) = sequence.split_at(sequence.len() / 2);
    debug!(left_len = left.len(), right_len = right.len(), "Forking partitions");

    let (left_outcome, right_outcome) = thread::scope(|s| {
        let left_identity = identity.clone();
        let left_handle = s.spawn(move || {
            fold_partition(Partition::Left, left, left_identity, combine, None, progress)
        });
        let right_handle = s.spawn(move || {
            fold_partition(Partition::Right, right, identity, combine, None, progress)
        });

        (left_handle.join(), right_handle.join())
    });

    let left_result = settle_thread(Partition::Left, left_outcome);
    let right_result = settle_thread(Partition::Right, right_outcome);
    debug!("Joined partitions");

    combine_partials(left_result?, right_result?, combine)
}

/// Fold one partition in order, seeded with `identity`
pub(crate) fn fold_partition<T, F, E>(
    partition: Partition,
    items: &[T],
    identity: T,
    combine: &F,
    cancel: Option<&CancelFlag>,
    progress: Option<&GuardedCounter>,
) -> AccumulatorResult<T>
where
    T: Clone,
    F: Fn(T, T) -> Result<T, E>,
    E: Display,
{
    let mut contributor = progress.map(|counter| counter.contributor());
    let mut acc = identity;

    for item in items {
        if cancel.is_some_and(CancelFlag::is_cancelled) {
            debug!(%partition, "Partition cancelled before completion");
            return Err(AccumulatorError::Cancelled { partition });
        }

        acc = combine(acc, item.clone()).map_err(|e| {
            warn!(%partition, error = %e, "Combine failed");
            AccumulatorError::computation(partition, e)
        })?;

        if let Some(contributor) = contributor.as_mut() {
            contributor.increment()?;
        }
    }

    if let Some(contributor) = contributor {
        contributor.finish()?;
    }
    trace!(%partition, elements = items.len(), "Partition folded");
    Ok(acc)
}

/// Final left-then-right combine
pub(crate) fn combine_partials<T, F, E>(left: T, right: T, combine: &F) -> AccumulatorResult<T>
where
    F: Fn(T, T) -> Result<T, E>,
    E: Display,
{
    combine(left, right).map_err(|e| {
        warn!(error = %e, "Final combine failed");
        AccumulatorError::computation(Partition::Combine, e)
    })
}

fn settle_thread<T>(
    partition: Partition,
    outcome: thread::Result<AccumulatorResult<T>>,
) -> AccumulatorResult<T> {
    match outcome {
        Ok(result) => result,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            warn!(%partition, %reason, "Partition thread panicked");
            Err(AccumulatorError::computation(partition, reason))
        }
    }
}
