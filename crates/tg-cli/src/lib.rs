//! Tab governor CLI library.
//!
//! This crate provides the CLI interface for the tab governor.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, SettingsArgs};
pub use config::Config;
