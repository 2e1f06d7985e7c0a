//! Shared tracing setup for the Uppe binaries.

mod subscriber;

pub use subscriber::{LogFormat, init_tracing, init_tracing_with_level};
