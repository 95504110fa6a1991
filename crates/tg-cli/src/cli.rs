//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use tg_core::SettingsEdit;

/// Browser tab governor.
///
/// Caps the number of open tabs, closes duplicates, counts down to
/// closing the focused tab, and tracks how long each tab was used.
#[derive(Debug, Parser)]
#[command(name = "tabgov", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show settings, open tabs and today's peak.
    Status,

    /// Show or change governor settings.
    Settings(SettingsArgs),

    /// List tracked tabs with their open and active time.
    Tracker {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show daily peak tab counts, newest first.
    Stats {
        /// Number of days to show, including today.
        #[arg(long, default_value_t = 7)]
        days: u32,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run the governor against a scripted browser session.
    Replay {
        /// JSONL script, one action per line.
        script: PathBuf,

        /// Use the real ticker and wall-clock time instead of virtual time.
        #[arg(long)]
        realtime: bool,

        /// Read and write the configured database instead of a scratch store.
        #[arg(long)]
        persist: bool,
    },
}

/// Settings to change. Omitted settings are left alone.
#[derive(Debug, Clone, Default, Args)]
pub struct SettingsArgs {
    /// Maximum number of open tabs (1-100).
    #[arg(long)]
    pub max_tabs: Option<u32>,

    /// Enforce the tab limit.
    #[arg(long)]
    pub max_tabs_enabled: Option<bool>,

    /// Countdown length in minutes (1-60).
    #[arg(long)]
    pub countdown: Option<f64>,

    /// Close the focused tab when the countdown expires.
    #[arg(long)]
    pub countdown_enabled: Option<bool>,

    /// Close tabs that repeat an open tab's URL.
    #[arg(long)]
    pub close_duplicates: Option<bool>,

    /// Keep closing tabs, one per countdown, until none remain.
    #[arg(long)]
    pub kill_all: Option<bool>,

    /// Treat URLs differing only in query string as duplicates.
    #[arg(long)]
    pub ignore_query: Option<bool>,
}

impl SettingsArgs {
    pub const fn to_edit(&self) -> SettingsEdit {
        SettingsEdit {
            max_tabs: self.max_tabs,
            max_tabs_enabled: self.max_tabs_enabled,
            countdown_minutes: self.countdown,
            countdown_enabled: self.countdown_enabled,
            close_duplicates: self.close_duplicates,
            kill_all_mode: self.kill_all,
            duplicates_ignore_query: self.ignore_query,
        }
    }
}
