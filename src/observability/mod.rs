//! Observability module.
//!
//! Initializes structured logging with configurable formats (pretty,
//! compact, JSON). Every sweep decision (skip, create, delete, summary) is
//! emitted as a `tracing` event with structured fields, so the log stream
//! doubles as the audit trail of a run.

mod tracing_init;

pub use tracing_init::*;
