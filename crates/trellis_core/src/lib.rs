//! TRELLIS Core
//!
//! Shared pieces for the node-graph builder: the error taxonomy, name
//! helpers for kinds and generated instance names, and the logging facade
//! the engine writes through.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod logger;
pub mod naming;

// Re-exports
pub use error::{DslError, DslResult};
pub use logger::{Level, LogRecord, LogSink, Logged, Logger, MemorySink, StdoutSink, TracingSink};
pub use naming::{demodulize, first_free_name, indexed_name, underscore};
