//! Result rendering
//!
//! - [`text`]: per-path and totals tables for the terminal
//! - [`json`]: machine-readable report
//! - [`live`]: progress display fed by the progress channel

pub mod json;
pub mod live;
pub mod text;
