/*!
 * Core Module
 * Shared error taxonomy and synchronization configuration
 */

pub mod errors;
pub mod sync;

// Re-export for convenience
pub use errors::*;
pub use sync::{AccumulatorConfig, CounterStrategy, ReducerConfig};
