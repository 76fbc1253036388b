//! # relsync
//!
//! Library half of the relsync binary: configuration loading and the CLI
//! command implementations, exposed for integration tests.

pub mod cli;
pub mod config;
