/*!
 * Synchronization Configuration
 *
 * Strategy selection for guarded counters and limits for fork-join
 * reductions.
 */

mod config;

pub use config::{
    AccumulatorConfig, CounterStrategy, ParseStrategyError, ReducerConfig, STRATEGY_ENV,
};
