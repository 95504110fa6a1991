//! CLI subcommand implementations.

pub mod replay;
pub mod settings;
pub mod stats;
pub mod status;
pub mod tracker;
pub mod util;
