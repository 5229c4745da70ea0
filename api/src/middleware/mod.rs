pub mod instrumentation;
pub mod observer;

pub use instrumentation::*;
pub use observer::*;
