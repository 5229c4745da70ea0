//! Request correlation context.
//!
//! # Data Flow
//! ```text
//! inbound headers + upstream transaction (optional)
//!     → resolver.rs (trace/request/span ids, passthrough ids)
//!     → RequestContext (immutable, shared via Arc)
//!     → logger, handlers, detached follow-up work (child context)
//! ```

pub mod resolver;
pub mod transaction;

pub use resolver::*;
pub use transaction::*;
