//! Badge rendering.
//!
//! The badge is a pure function of governor state. A running countdown
//! takes priority over the occupancy display.

use serde::{Deserialize, Serialize};

/// Badge colors and countdown display threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BadgeConfig {
    /// Background for the occupancy display.
    pub base_color: String,
    /// Background while a countdown is shown.
    pub countdown_color: String,
    /// Below this many seconds remaining the countdown is shown in seconds.
    pub countdown_seconds: u32,
    /// Whether a running countdown is shown at all.
    pub countdown_enabled: bool,
}

impl Default for BadgeConfig {
    fn default() -> Self {
        Self {
            base_color: "#90EE90".to_string(),
            countdown_color: "#B81D13".to_string(),
            countdown_seconds: 60,
            countdown_enabled: true,
        }
    }
}

/// Text and background color shown on the badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub text: String,
    pub color: String,
}

/// The slice of governor state the badge depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeInput {
    pub tab_count: u32,
    /// The enforced limit, if any.
    pub limit: Option<u32>,
    /// Seconds left on a running countdown.
    pub countdown_remaining: Option<u32>,
}

/// Renders governor state to a badge.
///
/// - countdown at or above the threshold: whole minutes, rounded up (`"5m"`)
/// - countdown below the threshold: bare seconds (`"59"`)
/// - limit enforced: remaining slots (`"0"`, `"-2"`)
/// - otherwise: the open tab count
pub fn render(config: &BadgeConfig, input: BadgeInput) -> Badge {
    if let Some(remaining) = input.countdown_remaining.filter(|_| config.countdown_enabled) {
        let text = if remaining < config.countdown_seconds {
            remaining.to_string()
        } else {
            format!("{}m", remaining.div_ceil(60))
        };
        return Badge {
            text,
            color: config.countdown_color.clone(),
        };
    }

    let text = match input.limit {
        Some(limit) => match limit.saturating_sub(input.tab_count) {
            0 => "0".to_string(),
            slots => format!("-{slots}"),
        },
        None => input.tab_count.to_string(),
    };
    Badge {
        text,
        color: config.base_color.clone(),
    }
}

/// Remembers the last rendered badge so identical renders can be skipped.
#[derive(Debug, Clone, Default)]
pub struct BadgePresenter {
    config: BadgeConfig,
    last: Option<Badge>,
}

impl BadgePresenter {
    pub const fn new(config: BadgeConfig) -> Self {
        Self { config, last: None }
    }

    pub const fn config(&self) -> &BadgeConfig {
        &self.config
    }

    pub const fn last(&self) -> Option<&Badge> {
        self.last.as_ref()
    }

    /// Renders `input`, returning the badge only if it differs from the
    /// last one shown.
    pub fn present(&mut self, input: BadgeInput) -> Option<Badge> {
        let badge = render(&self.config, input);
        if self.last.as_ref() == Some(&badge) {
            return None;
        }
        self.last = Some(badge.clone());
        Some(badge)
    }
}
