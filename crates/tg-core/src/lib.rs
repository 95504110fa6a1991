//! Core domain logic for the tab governor.
//!
//! This crate contains the state and policies, free of I/O:
//! - Registry: the authoritative mirror of open tabs and their positions
//! - Activity: focus time accounting per tab
//! - Duplicates, limit, countdown: the policies reacting to tab changes
//! - Badge and stats: state derived for display and daily reporting

pub mod activity;
pub mod badge;
pub mod clock;
pub mod config;
pub mod countdown;
pub mod duplicates;
pub mod event;
pub mod limit;
pub mod registry;
pub mod settings;
pub mod stats;
pub mod tab;
pub mod types;

pub use activity::ActivityTracker;
pub use badge::{Badge, BadgeConfig, BadgeInput, BadgePresenter};
pub use clock::{Clock, ManualClock, SystemClock, date_key};
pub use config::{ConfigDelta, GovernorConfig, keys};
pub use countdown::{CountdownScheduler, CountdownState, TickOutcome};
pub use duplicates::DuplicateDetector;
pub use event::HostEvent;
pub use limit::{Admission, StartupAdjustment};
pub use registry::{TabRegistry, UpdateOutcome};
pub use settings::{SettingsChange, SettingsEdit, SettingsError};
pub use stats::{StatsEntry, StatsRecorder, StatsWrite};
pub use tab::{HostTab, NEW_TAB_URL, TabChange, TabRecord, UrlMatch};
pub use types::{TabId, TabStatus, ValidationError, WindowId};
