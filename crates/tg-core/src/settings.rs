//! Rules for user edits to the governor settings.
//!
//! Edits are checked against the live tab count so that switching on a
//! limit never immediately closes tabs the user already has open.

use std::ops::RangeInclusive;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::GovernorConfig;
use crate::types::ValidationError;

/// Accepted tab limits.
pub const MAX_TABS_RANGE: RangeInclusive<u32> = 1..=100;

/// Accepted countdown lengths in minutes.
pub const COUNTDOWN_RANGE: RangeInclusive<f64> = 1.0..=60.0;

/// Errors from applying a settings edit.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SettingsError {
    /// A value was out of range.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// More tabs are open than the limit allows.
    #[error("{extra} more tab(s) open than the limit allows")]
    ExtraTabs { extra: u32 },
}

impl SettingsError {
    /// Message telling the user what to do.
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(err) => err.to_string(),
            Self::ExtraTabs { extra: 1 } => "You need to close 1 tab.".to_string(),
            Self::ExtraTabs { extra } => format!("You need to close {extra} tabs."),
        }
    }
}

/// A requested change to some settings. `None` leaves a setting alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsEdit {
    pub max_tabs: Option<u32>,
    pub max_tabs_enabled: Option<bool>,
    pub countdown_minutes: Option<f64>,
    pub countdown_enabled: Option<bool>,
    pub close_duplicates: Option<bool>,
    pub kill_all_mode: Option<bool>,
    pub duplicates_ignore_query: Option<bool>,
}

/// The settings after an edit, and the entries to write.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsChange {
    pub config: GovernorConfig,
    /// Only the keys whose value changed, to be written as one batch.
    pub entries: Map<String, Value>,
}

impl SettingsEdit {
    /// Whether the edit leaves every setting alone.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the edit to `current` with `live_tabs` open.
    ///
    /// - a limit below the live count switches enforcement, countdown and
    ///   kill-all off
    /// - enabling the limit, countdown or kill-all with extra tabs open
    ///   is refused
    /// - enabling the countdown enables the limit; enabling kill-all
    ///   enables both
    /// - disabling the limit disables the countdown and kill-all;
    ///   disabling the countdown disables kill-all
    pub fn apply(
        &self,
        current: &GovernorConfig,
        live_tabs: u32,
    ) -> Result<SettingsChange, SettingsError> {
        self.validate()?;
        let mut next = current.clone();

        if let Some(max_tabs) = self.max_tabs {
            next.max_tabs = Some(max_tabs);
            if max_tabs < live_tabs {
                disable_limit(&mut next);
            }
        }

        match self.max_tabs_enabled {
            Some(true) => {
                check_extra_tabs(&mut next, live_tabs)?;
                next.max_tabs_enabled = true;
            }
            Some(false) => disable_limit(&mut next),
            None => {}
        }

        if let Some(minutes) = self.countdown_minutes {
            next.countdown_minutes = minutes;
        }

        match self.countdown_enabled {
            Some(true) => {
                check_extra_tabs(&mut next, live_tabs)?;
                next.max_tabs_enabled = true;
                next.countdown_enabled = true;
            }
            Some(false) => {
                next.countdown_enabled = false;
                next.kill_all_mode = false;
            }
            None => {}
        }

        match self.kill_all_mode {
            Some(true) => {
                check_extra_tabs(&mut next, live_tabs)?;
                next.max_tabs_enabled = true;
                next.countdown_enabled = true;
                next.kill_all_mode = true;
            }
            Some(false) => next.kill_all_mode = false,
            None => {}
        }

        if let Some(close) = self.close_duplicates {
            next.close_duplicates = close;
        }
        if let Some(ignore) = self.duplicates_ignore_query {
            next.duplicates_ignore_query = ignore;
        }

        next.normalize();
        let before = current.to_entries();
        let entries = next
            .to_entries()
            .into_iter()
            .filter(|(key, value)| before.get(key) != Some(value))
            .collect();
        Ok(SettingsChange {
            config: next,
            entries,
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(value) = self.max_tabs {
            if !MAX_TABS_RANGE.contains(&value) {
                return Err(ValidationError::MaxTabsOutOfRange {
                    value,
                    min: *MAX_TABS_RANGE.start(),
                    max: *MAX_TABS_RANGE.end(),
                });
            }
        }
        if let Some(value) = self.countdown_minutes {
            if !COUNTDOWN_RANGE.contains(&value) {
                return Err(ValidationError::CountdownOutOfRange {
                    value,
                    min: *COUNTDOWN_RANGE.start(),
                    max: *COUNTDOWN_RANGE.end(),
                });
            }
        }
        Ok(())
    }
}

const fn disable_limit(config: &mut GovernorConfig) {
    config.max_tabs_enabled = false;
    config.countdown_enabled = false;
    config.kill_all_mode = false;
}

fn check_extra_tabs(config: &mut GovernorConfig, live_tabs: u32) -> Result<(), SettingsError> {
    let limit = *config.max_tabs.get_or_insert(live_tabs.max(1));
    if live_tabs > limit {
        return Err(SettingsError::ExtraTabs {
            extra: live_tabs - limit,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::keys;

    fn config(max_tabs: u32) -> GovernorConfig {
        GovernorConfig {
            max_tabs: Some(max_tabs),
            ..GovernorConfig::default()
        }
    }

    #[test]
    fn enabling_countdown_enables_limit() {
        let edit = SettingsEdit {
            countdown_enabled: Some(true),
            ..SettingsEdit::default()
        };
        let change = edit.apply(&config(5), 3).unwrap();

        assert!(change.config.max_tabs_enabled);
        assert!(change.config.countdown_enabled);
        assert_eq!(change.entries.len(), 2);
        assert_eq!(change.entries[keys::COUNTDOWN_ENABLED], Value::Bool(true));
    }

    #[test]
    fn kill_all_sets_three_keys_at_once() {
        let edit = SettingsEdit {
            kill_all_mode: Some(true),
            ..SettingsEdit::default()
        };
        let change = edit.apply(&config(5), 5).unwrap();

        let mut changed: Vec<_> = change.entries.keys().cloned().collect();
        changed.sort();
        assert_eq!(
            changed,
            vec![
                keys::COUNTDOWN_ENABLED,
                keys::KILL_ALL_MODE,
                keys::MAX_TABS_ENABLED
            ]
        );
    }

    #[test]
    fn enabling_with_extra_tabs_is_refused() {
        let edit = SettingsEdit {
            max_tabs_enabled: Some(true),
            ..SettingsEdit::default()
        };
        let err = edit.apply(&config(3), 5).unwrap_err();

        assert_eq!(err, SettingsError::ExtraTabs { extra: 2 });
        assert_eq!(err.user_message(), "You need to close 2 tabs.");
        assert_eq!(
            SettingsError::ExtraTabs { extra: 1 }.user_message(),
            "You need to close 1 tab."
        );
    }

    #[test]
    fn lowering_limit_below_live_count_disables_enforcement() {
        let current = GovernorConfig {
            max_tabs_enabled: true,
            countdown_enabled: true,
            kill_all_mode: true,
            ..config(10)
        };
        let edit = SettingsEdit {
            max_tabs: Some(4),
            ..SettingsEdit::default()
        };
        let change = edit.apply(&current, 6).unwrap();

        assert_eq!(change.config.max_tabs, Some(4));
        assert!(!change.config.max_tabs_enabled);
        assert!(!change.config.countdown_enabled);
        assert!(!change.config.kill_all_mode);
    }

    #[test]
    fn disabling_limit_disables_dependents() {
        let current = GovernorConfig {
            max_tabs_enabled: true,
            countdown_enabled: true,
            kill_all_mode: true,
            ..config(10)
        };
        let edit = SettingsEdit {
            max_tabs_enabled: Some(false),
            ..SettingsEdit::default()
        };
        let change = edit.apply(&current, 2).unwrap();

        assert!(!change.config.countdown_enabled);
        assert!(!change.config.kill_all_mode);
    }

    #[test]
    fn enabling_limit_without_stored_limit_uses_live_count() {
        let edit = SettingsEdit {
            max_tabs_enabled: Some(true),
            ..SettingsEdit::default()
        };
        let change = edit.apply(&GovernorConfig::default(), 6).unwrap();
        assert_eq!(change.config.max_tabs, Some(6));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let edit = SettingsEdit {
            max_tabs: Some(0),
            ..SettingsEdit::default()
        };
        assert!(matches!(
            edit.apply(&config(3), 1),
            Err(SettingsError::Invalid(ValidationError::MaxTabsOutOfRange { .. }))
        ));

        let edit = SettingsEdit {
            countdown_minutes: Some(90.0),
            ..SettingsEdit::default()
        };
        assert!(matches!(
            edit.apply(&config(3), 1),
            Err(SettingsError::Invalid(ValidationError::CountdownOutOfRange { .. }))
        ));
    }

    #[test]
    fn unchanged_edit_writes_nothing() {
        let edit = SettingsEdit {
            close_duplicates: Some(false),
            ..SettingsEdit::default()
        };
        assert!(edit.apply(&config(3), 1).unwrap().entries.is_empty());
    }
}
