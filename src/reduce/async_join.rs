/*!
 * Fork-Join Reduction (tokio)
 *
 * Same split and combine rules as the threaded reducer, with each half on
 * tokio's blocking pool. Both handles are always awaited. A failing half
 * cancels its sibling; on timeout both halves are cancelled. Cancellation is
 * cooperative and the halves are still awaited before an error is returned,
 * so nothing is left running unobserved.
 */

use super::cancel::{CancelFlag, CancelOnFailure};
use super::fork_join::{combine_partials, fold_partition};
use crate::core::errors::{
    panic_message, saturating_millis, AccumulatorError, AccumulatorResult, Partition,
};
use crate::counter::GuardedCounter;
use std::fmt::Display;
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, instrument, warn};

/// Async counterpart of [`reduce_parallel`](super::reduce_parallel)
///
/// # Errors
///
/// - `ComputationFailure` if either half fails or panics (left reported first),
///   even when the timeout expired while the other half was still draining
/// - `Timeout` if `timeout` expires before both halves finish and neither failed
pub async fn reduce_parallel_async<T, F, E>(
    sequence: Arc<[T]>,
    identity: T,
    combine: Arc<F>,
    timeout: Option<Duration>,
) -> AccumulatorResult<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T, T) -> Result<T, E> + Send + Sync + 'static,
    E: Display + 'static,
{
    reduce_parallel_async_with(sequence, identity, combine, timeout, None).await
}

#[instrument(level = "debug", skip_all, fields(len = sequence.len()))]
pub(crate) async fn reduce_parallel_async_with<T, F, E>(
    sequence: Arc<[T]>,
    identity: T,
    combine: Arc<F>,
    timeout: Option<Duration>,
    progress: Option<Arc<GuardedCounter>>,
) -> AccumulatorResult<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T, T) -> Result<T, E> + Send + Sync + 'static,
    E: Display + 'static,
{
    if sequence.is_empty() {
        return Ok(identity);
    }

    let len = sequence.len();
    let mid = len / 2;
    let cancel = CancelFlag::new();
    debug!(left_len = mid, right_len = len - mid, "Forking async partitions");

    let left_handle = spawn_partition(
        Partition::Left,
        sequence.clone(),
        0..mid,
        identity.clone(),
        combine.clone(),
        cancel.clone(),
        progress.clone(),
    );
    let right_handle = spawn_partition(
        Partition::Right,
        sequence,
        mid..len,
        identity,
        combine.clone(),
        cancel.clone(),
        progress,
    );

    let joined = async { tokio::join!(left_handle, right_handle) };
    tokio::pin!(joined);

    let start = Instant::now();
    let timeout_ms = timeout.map_or(0, saturating_millis);
    let (left_outcome, right_outcome, expired) = match timeout {
        None => {
            let (left, right) = joined.await;
            (left, right, false)
        }
        Some(limit) => match tokio::time::timeout(limit, &mut joined).await {
            Ok((left, right)) => (left, right, false),
            Err(_) => {
                cancel.cancel();
                // Drain both halves before deciding what to report
                let (left, right) = joined.await;
                (left, right, true)
            }
        },
    };

    let left_result = settle_task(Partition::Left, left_outcome);
    let right_result = settle_task(Partition::Right, right_outcome);
    debug!(expired, "Joined async partitions");

    // A partition failure outranks the timeout and the cancellations it raised
    match (left_result, right_result) {
        (Err(e), _) if !e.is_cancellation() => Err(e),
        (_, Err(e)) if !e.is_cancellation() => Err(e),
        _ if expired => {
            let elapsed_ms = saturating_millis(start.elapsed());
            warn!(elapsed_ms, timeout_ms, "Reduction timed out");
            Err(AccumulatorError::Timeout {
                elapsed_ms,
                timeout_ms,
            })
        }
        (Ok(left), Ok(right)) => combine_partials(left, right, combine.as_ref()),
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}

fn spawn_partition<T, F, E>(
    partition: Partition,
    sequence: Arc<[T]>,
    range: Range<usize>,
    identity: T,
    combine: Arc<F>,
    cancel: CancelFlag,
    progress: Option<Arc<GuardedCounter>>,
) -> JoinHandle<AccumulatorResult<T>>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T, T) -> Result<T, E> + Send + Sync + 'static,
    E: Display + 'static,
{
    tokio::task::spawn_blocking(move || {
        let guard = CancelOnFailure::new(&cancel);
        let result = fold_partition(
            partition,
            &sequence[range],
            identity,
            combine.as_ref(),
            Some(&cancel),
            progress.as_deref(),
        );
        if result.is_ok() {
            guard.disarm();
        }
        result
    })
}

fn settle_task<T>(
    partition: Partition,
    outcome: Result<AccumulatorResult<T>, JoinError>,
) -> AccumulatorResult<T> {
    match outcome {
        Ok(result) => result,
        Err(e) if e.is_panic() => {
            let reason = panic_message(e.into_panic().as_ref());
            warn!(%partition, %reason, "Partition task panicked");
            Err(AccumulatorError::computation(partition, reason))
        }
        Err(e) => {
            warn!(%partition, error = %e, "Partition task cancelled");
            Err(AccumulatorError::computation(partition, format!("task cancelled: {}", e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn add(a: i64, b: i64) -> Result<i64, Infallible> {
        Ok(a + b)
    }

    #[tokio::test]
    async fn test_async_matches_sequential() {
        let numbers: Arc<[i64]> = (1..=10).collect();
        let sum = reduce_parallel_async(numbers, 0, Arc::new(add), None)
            .await
            .unwrap();
        assert_eq!(sum, 55);
    }

    #[tokio::test]
    async fn test_async_empty_and_single() {
        let empty: Arc<[i64]> = Arc::from(Vec::new());
        assert_eq!(
            reduce_parallel_async(empty, 0, Arc::new(add), None).await.unwrap(),
            0
        );

        let single: Arc<[i64]> = Arc::from(vec![5]);
        assert_eq!(
            reduce_parallel_async(single, 0, Arc::new(add), None).await.unwrap(),
            5
        );
    }

    #[tokio::test]
    async fn test_async_timeout_cancels_both_halves() {
        let numbers: Arc<[i64]> = (0..10_000).collect();
        let slow = Arc::new(|a: i64, b: i64| {
            std::thread::sleep(Duration::from_millis(1));
            Ok::<_, Infallible>(a + b)
        });

        let err = reduce_parallel_async(numbers, 0, slow, Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, AccumulatorError::Timeout { timeout_ms: 20, .. }));
    }
}
