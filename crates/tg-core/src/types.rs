//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types and settings values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// A tab limit outside the accepted range.
    #[error("max tabs must be between {min} and {max}, got {value}")]
    MaxTabsOutOfRange { value: u32, min: u32, max: u32 },

    /// A countdown duration outside the accepted range.
    #[error("countdown must be between {min} and {max} minutes, got {value}")]
    CountdownOutOfRange { value: f64, min: f64, max: f64 },

    /// Invalid tab load status value.
    #[error("invalid tab status: {value}")]
    InvalidTabStatus { value: String },
}

/// Generates a host handle newtype with common trait implementations.
///
/// Handles are opaque integers assigned by the browser; they are unique
/// only while the tab or window they name exists.
macro_rules! define_handle {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw host handle.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw host handle.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_handle!(
    /// A browser tab handle.
    TabId
);

define_handle!(
    /// A browser window handle.
    WindowId
);

/// Load state reported by the host for a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    /// The tab is navigating; its URL may still change through redirects.
    Loading,
    /// The final URL is known.
    Complete,
}

impl TabStatus {
    /// String representation used by the host.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for TabStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TabStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "loading" => Ok(Self::Loading),
            "complete" => Ok(Self::Complete),
            _ => Err(ValidationError::InvalidTabStatus {
                value: s.to_string(),
            }),
        }
    }
}
