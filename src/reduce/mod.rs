/*!
 * Fork-Join Reduction
 *
 * Parallel reduction over an immutable sequence:
 *
 * 1. **Fork**: split at `len / 2` (lower half gets the floor)
 * 2. **Fold**: each half folds in order from `identity`, concurrently
 * 3. **Join**: wait for both, then `combine(left, right)`
 *
 * With an associative `combine` the result equals a sequential fold. A
 * non-commutative `combine` is fine: the left partial is always the left
 * operand.
 *
 * ## Failure handling
 *
 * A failing half never short-circuits the join. Both halves are always
 * awaited, the left failure is reported before the right, and no partial
 * value escapes.
 */

mod async_join;
mod cancel;
mod fork_join;

pub use async_join::reduce_parallel_async;
pub use cancel::CancelFlag;
pub use fork_join::{reduce_parallel, reduce_sequential};

use crate::core::errors::{AccumulatorError, AccumulatorResult, Partition};
use crate::core::sync::ReducerConfig;
use crate::counter::GuardedCounter;
use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;

/// Lift an infallible binary operation into a combine function
///
/// ```ignore
/// let reducer = ForkJoinReducer::new(0, infallible(|a: i64, b| a + b));
/// ```
pub fn infallible<T, G>(op: G) -> impl Fn(T, T) -> Result<T, Infallible> + Send + Sync
where
    G: Fn(T, T) -> T + Send + Sync,
{
    move |a, b| Ok(op(a, b))
}

/// Reusable reducer holding a combine function and its identity
///
/// Stateless between calls. An attached progress counter receives one
/// increment per element folded, through one contributor per partition.
pub struct ForkJoinReducer<T, F> {
    identity: T,
    combine: Arc<F>,
    config: ReducerConfig,
    progress: Option<Arc<GuardedCounter>>,
}

impl<T, F> ForkJoinReducer<T, F> {
    pub fn new(identity: T, combine: F) -> Self {
        Self {
            identity,
            combine: Arc::new(combine),
            config: ReducerConfig::default(),
            progress: None,
        }
    }

    pub fn with_config(mut self, config: ReducerConfig) -> Self {
        self.config = config;
        self
    }

    /// Count folded elements into `counter`
    pub fn with_progress(mut self, counter: Arc<GuardedCounter>) -> Self {
        self.progress = Some(counter);
        self
    }

    pub fn config(&self) -> &ReducerConfig {
        &self.config
    }

    pub fn identity(&self) -> &T {
        &self.identity
    }
}

impl<T, F, E> ForkJoinReducer<T, F>
where
    T: Clone + Send + Sync,
    F: Fn(T, T) -> Result<T, E> + Sync,
    E: Display,
{
    /// Fork-join reduction on two scoped threads
    ///
    /// The configured timeout only applies to [`reduce_async`](Self::reduce_async).
    pub fn reduce(&self, sequence: &[T]) -> AccumulatorResult<T> {
        fork_join::reduce_parallel_with(
            sequence,
            self.identity.clone(),
            self.combine.as_ref(),
            self.progress.as_deref(),
        )
    }

    /// Plain left-to-right fold with the same combine and identity
    ///
    /// A combine failure is reported against `Partition::Sequential`.
    pub fn reduce_sequential(&self, sequence: &[T]) -> AccumulatorResult<T> {
        reduce_sequential(sequence, self.identity.clone(), self.combine.as_ref())
            .map_err(|e| AccumulatorError::computation(Partition::Sequential, e))
    }
}

impl<T, F, E> ForkJoinReducer<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T, T) -> Result<T, E> + Send + Sync + 'static,
    E: Display + 'static,
{
    /// Fork-join reduction on tokio's blocking pool, honouring the timeout
    pub async fn reduce_async(&self, sequence: Arc<[T]>) -> AccumulatorResult<T> {
        async_join::reduce_parallel_async_with(
            sequence,
            self.identity.clone(),
            self.combine.clone(),
            self.config.timeout,
            self.progress.clone(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sync::CounterStrategy;
    use std::time::Duration;

    #[test]
    fn test_reducer_matches_sequential() {
        let reducer = ForkJoinReducer::new(0i64, infallible(|a: i64, b: i64| a + b));
        let numbers: Vec<i64> = (1..=100).collect();

        assert_eq!(reducer.reduce(&numbers).unwrap(), 5050);
        assert_eq!(reducer.reduce_sequential(&numbers).unwrap(), 5050);
        assert_eq!(*reducer.identity(), 0);
    }

    #[test]
    fn test_sequential_failure_is_tagged() {
        let reducer = ForkJoinReducer::new(0i64, |a: i64, b: i64| {
            if b < 0 {
                Err(format!("negative element {}", b))
            } else {
                Ok(a + b)
            }
        });

        let err = reducer.reduce_sequential(&[1, 2, -3, 4]).unwrap_err();
        assert_eq!(
            err,
            AccumulatorError::ComputationFailure {
                partition: Partition::Sequential,
                reason: "negative element -3".to_string(),
            }
        );
    }

    #[test]
    fn test_reducer_is_stateless_between_calls() {
        let reducer = ForkJoinReducer::new(1i64, infallible(|a: i64, b: i64| a * b));
        assert_eq!(reducer.reduce(&[2, 3, 4]).unwrap(), 24);
        assert_eq!(reducer.reduce(&[5]).unwrap(), 5);
        assert_eq!(reducer.reduce(&[]).unwrap(), 1);
    }

    #[test]
    fn test_reducer_progress() {
        let progress = Arc::new(GuardedCounter::with_strategy(CounterStrategy::Atomic));
        let reducer = ForkJoinReducer::new(0i64, infallible(|a: i64, b: i64| a.max(b)))
            .with_progress(progress.clone());

        assert_eq!(reducer.reduce(&[3, 9, 1, 4, 7]).unwrap(), 9);
        assert_eq!(progress.read().unwrap(), 5);
    }

    #[tokio::test]
    async fn test_reducer_async() {
        let reducer = ForkJoinReducer::new(0i64, infallible(|a: i64, b: i64| a + b))
            .with_config(ReducerConfig::with_timeout(Duration::from_secs(5)));

        let numbers: Arc<[i64]> = (1..=10).collect();
        assert_eq!(reducer.reduce_async(numbers).await.unwrap(), 55);
    }
}
