//! plugbridge CLI library
//!
//! Command implementations live here so they can be driven from tests with an
//! in-memory writer instead of stdout.

pub mod commands;
pub mod logging;

pub use logging::LogOptions;
