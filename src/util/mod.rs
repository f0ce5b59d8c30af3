//! Shared utilities: aligned buffers, payload generation, cancellation,
//! throughput formatting and logger setup

pub mod buffer;
pub mod cancel;
pub mod logger;
pub mod payload;
pub mod time;
