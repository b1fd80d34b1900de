/*!
 * Monitoring
 * Structured tracing setup
 */

mod tracer;

pub use tracer::{init_tracing, TraceFormat, TRACE_JSON_ENV};
