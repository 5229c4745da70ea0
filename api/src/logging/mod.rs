//! Business event stream.
//!
//! Every entry is one flat JSON object written as a single line to an
//! [`EventSink`]. Operational logs go through `tracing` instead and are set
//! up in [`crate::observability`].

pub mod entry;
pub mod logger;
pub mod sink;

pub use entry::*;
pub use logger::*;
pub use sink::*;
