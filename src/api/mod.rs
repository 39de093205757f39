//! API Module
//!
//! The surface the presentation layer calls: scan lifecycle, history,
//! config and weather commands.

pub mod commands;

pub use commands::*;
