//! pgscope CLI library.
//!
//! This module exposes internal types for testing purposes.
//! The main entry point is the `pgscope` binary.

pub mod catalog;
pub mod cli;
pub mod logging;
pub mod output;
pub mod settings;

// Re-export commonly used types
pub use cli::Args;
