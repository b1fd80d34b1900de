/*!
 * Concurrent Accumulator Library
 *
 * Race-free accumulation from concurrent producers and fork-join parallel
 * reduction:
 * - `GuardedCounter`: shared counter with locked, atomic or partitioned backends
 * - `ForkJoinReducer`: two-way parallel reduction with deterministic combine order
 */

pub mod core;
pub mod counter;
pub mod monitoring;
pub mod reduce;

// Re-exports
pub use crate::core::errors::{AccumulatorError, AccumulatorResult, Partition};
pub use crate::core::sync::{AccumulatorConfig, CounterStrategy, ReducerConfig};
pub use counter::{accumulate_partitioned, Contributor, GuardedCounter, Tally};
pub use monitoring::init_tracing;
pub use reduce::{
    infallible, reduce_parallel, reduce_parallel_async, reduce_sequential, CancelFlag,
    ForkJoinReducer,
};
