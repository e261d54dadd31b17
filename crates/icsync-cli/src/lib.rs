//! CLI, config file, JSON record store
//!
//! This crate provides the `icsync` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod store;

pub use cli::Cli;
pub use error::{CliError, CliResult};
pub use store::JsonRecordStore;
