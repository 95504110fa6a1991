//! Persisted governor settings.
//!
//! Settings live in the key/value store under the keys below. Missing or
//! malformed values fall back to defaults rather than failing, since a
//! first run has no stored settings at all.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tab::UrlMatch;

/// Keys under which settings and governor state are persisted.
pub mod keys {
    pub const TABS: &str = "tabs";
    pub const MAX_TABS: &str = "maxTabs";
    pub const MAX_TABS_ENABLED: &str = "maxTabsEnabled";
    pub const COUNTDOWN: &str = "countdown";
    pub const COUNTDOWN_ENABLED: &str = "countdownEnabled";
    pub const CLOSE_DUPLICATES: &str = "closeDuplicates";
    pub const KILL_ALL_MODE: &str = "killAllMode";
    pub const DUPLICATES_IGNORE_QUERY: &str = "duplicatesIgnoreQuery";
    pub const TODAY: &str = "today";

    /// Every settings key, in the order they are shown.
    pub const SETTINGS: [&str; 7] = [
        MAX_TABS,
        MAX_TABS_ENABLED,
        COUNTDOWN,
        COUNTDOWN_ENABLED,
        CLOSE_DUPLICATES,
        KILL_ALL_MODE,
        DUPLICATES_IGNORE_QUERY,
    ];
}

/// Default countdown length in minutes.
pub const DEFAULT_COUNTDOWN_MINUTES: f64 = 5.0;

/// User-facing governor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernorConfig {
    /// Tab limit. Unset until a baseline is captured.
    pub max_tabs: Option<u32>,
    pub max_tabs_enabled: bool,
    /// Countdown length in minutes.
    #[serde(rename = "countdown")]
    pub countdown_minutes: f64,
    pub countdown_enabled: bool,
    pub close_duplicates: bool,
    /// When the countdown expires, keep closing the focused tab until no
    /// tab is left instead of stopping after one.
    pub kill_all_mode: bool,
    pub duplicates_ignore_query: bool,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_tabs: None,
            max_tabs_enabled: false,
            countdown_minutes: DEFAULT_COUNTDOWN_MINUTES,
            countdown_enabled: false,
            close_duplicates: false,
            kill_all_mode: false,
            duplicates_ignore_query: false,
        }
    }
}

/// Which settings changed when a batch was applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigDelta {
    pub max_tabs: bool,
    pub max_tabs_enabled: bool,
    pub countdown: bool,
    pub countdown_enabled: bool,
    pub close_duplicates: bool,
    pub kill_all_mode: bool,
    pub duplicates_ignore_query: bool,
}

impl ConfigDelta {
    /// Whether anything the countdown depends on changed.
    pub const fn affects_countdown(&self) -> bool {
        self.max_tabs
            || self.max_tabs_enabled
            || self.countdown
            || self.countdown_enabled
            || self.kill_all_mode
    }

    pub const fn is_empty(&self) -> bool {
        !(self.affects_countdown() || self.close_duplicates || self.duplicates_ignore_query)
    }
}

impl GovernorConfig {
    /// Builds settings from stored values, defaulting anything missing.
    pub fn from_entries(entries: &Map<String, Value>) -> Self {
        let mut config = Self::default();
        config.apply_entries(entries);
        config.normalize();
        config
    }

    /// Serializes every setting for storage.
    pub fn to_entries(&self) -> Map<String, Value> {
        let mut entries = Map::new();
        entries.insert(
            keys::MAX_TABS.into(),
            self.max_tabs.map_or(Value::Null, Value::from),
        );
        entries.insert(keys::MAX_TABS_ENABLED.into(), self.max_tabs_enabled.into());
        entries.insert(keys::COUNTDOWN.into(), self.countdown_minutes.into());
        entries.insert(
            keys::COUNTDOWN_ENABLED.into(),
            self.countdown_enabled.into(),
        );
        entries.insert(keys::CLOSE_DUPLICATES.into(), self.close_duplicates.into());
        entries.insert(keys::KILL_ALL_MODE.into(), self.kill_all_mode.into());
        entries.insert(
            keys::DUPLICATES_IGNORE_QUERY.into(),
            self.duplicates_ignore_query.into(),
        );
        entries
    }

    /// Applies a batch of changed values as one unit.
    ///
    /// All keys are applied and the flag implications re-established before
    /// the delta is computed, so callers see one consistent transition.
    /// Unknown keys are ignored.
    pub fn apply_changes(&mut self, entries: &Map<String, Value>) -> ConfigDelta {
        let before = self.clone();
        self.apply_entries(entries);
        self.normalize();
        self.delta_from(&before)
    }

    /// Clears flags whose prerequisite is off.
    ///
    /// The countdown needs the limit, and kill-all needs the countdown.
    /// Returns whether anything was changed.
    pub fn normalize(&mut self) -> bool {
        let before = self.clone();
        if !self.max_tabs_enabled {
            self.countdown_enabled = false;
        }
        if !self.countdown_enabled {
            self.kill_all_mode = false;
        }
        if !(self.countdown_minutes.is_finite() && self.countdown_minutes > 0.0) {
            self.countdown_minutes = DEFAULT_COUNTDOWN_MINUTES;
        }
        *self != before
    }

    /// The active tab limit, if enforcement is on and a limit is known.
    pub const fn enforced_limit(&self) -> Option<u32> {
        if self.max_tabs_enabled {
            self.max_tabs
        } else {
            None
        }
    }

    /// Whether the countdown may run at all.
    pub const fn countdown_armed(&self) -> bool {
        self.max_tabs_enabled && self.countdown_enabled && self.max_tabs.is_some()
    }

    /// Countdown length in whole seconds, at least one.
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "value is clamped to the u32 range first"
    )]
    pub fn countdown_seconds(&self) -> u32 {
        (self.countdown_minutes * 60.0)
            .round()
            .clamp(1.0, f64::from(u32::MAX)) as u32
    }

    /// URL comparison used for duplicate detection.
    pub const fn url_match(&self) -> UrlMatch {
        if self.duplicates_ignore_query {
            UrlMatch::IgnoreQuery
        } else {
            UrlMatch::Exact
        }
    }

    fn apply_entries(&mut self, entries: &Map<String, Value>) {
        for (key, value) in entries {
            match key.as_str() {
                keys::MAX_TABS => self.max_tabs = parse_limit(value),
                keys::MAX_TABS_ENABLED => set_bool(&mut self.max_tabs_enabled, key, value),
                keys::COUNTDOWN => match value.as_f64() {
                    Some(minutes) if minutes.is_finite() && minutes > 0.0 => {
                        self.countdown_minutes = minutes;
                    }
                    _ => {
                        tracing::debug!(%value, "ignoring invalid countdown, using default");
                        self.countdown_minutes = DEFAULT_COUNTDOWN_MINUTES;
                    }
                },
                keys::COUNTDOWN_ENABLED => set_bool(&mut self.countdown_enabled, key, value),
                keys::CLOSE_DUPLICATES => set_bool(&mut self.close_duplicates, key, value),
                keys::KILL_ALL_MODE => set_bool(&mut self.kill_all_mode, key, value),
                keys::DUPLICATES_IGNORE_QUERY => {
                    set_bool(&mut self.duplicates_ignore_query, key, value);
                }
                _ => {}
            }
        }
    }

    #[expect(
        clippy::float_cmp,
        reason = "any change to the stored value counts"
    )]
    fn delta_from(&self, before: &Self) -> ConfigDelta {
        ConfigDelta {
            max_tabs: self.max_tabs != before.max_tabs,
            max_tabs_enabled: self.max_tabs_enabled != before.max_tabs_enabled,
            countdown: self.countdown_minutes != before.countdown_minutes,
            countdown_enabled: self.countdown_enabled != before.countdown_enabled,
            close_duplicates: self.close_duplicates != before.close_duplicates,
            kill_all_mode: self.kill_all_mode != before.kill_all_mode,
            duplicates_ignore_query: self.duplicates_ignore_query
                != before.duplicates_ignore_query,
        }
    }
}

fn parse_limit(value: &Value) -> Option<u32> {
    let limit = value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0);
    if limit.is_none() && !value.is_null() {
        tracing::debug!(%value, "ignoring invalid max tabs");
    }
    limit
}

fn set_bool(slot: &mut bool, key: &str, value: &Value) {
    match value {
        Value::Bool(b) => *slot = *b,
        Value::Null => *slot = false,
        other => tracing::debug!(key, value = %other, "ignoring non-boolean setting"),
    }
}
