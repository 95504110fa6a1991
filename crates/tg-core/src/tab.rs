//! Tab records and URL identity.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{TabId, TabStatus, WindowId};

/// URL the browser uses for a freshly opened, empty tab.
pub const NEW_TAB_URL: &str = "chrome://newtab/";

/// A tab as reported by the host when enumerating or creating tabs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostTab {
    pub id: TabId,
    pub window_id: WindowId,
    pub index: u32,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
}

/// Field changes reported for an existing tab.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TabStatus>,
}

/// The governor's record of one open tab.
///
/// This is also the persisted shape under the `tabs` key, so only fields
/// the tracker needs are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabRecord {
    pub id: TabId,
    pub window_id: WindowId,
    /// Position within the window, 0-based.
    pub index: u32,
    pub url: String,
    pub title: String,
    /// When the governor first observed the tab (or its current page).
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Set while this is the focused tab of a focused window.
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub active_at: Option<DateTime<Utc>>,
    /// Accumulated focus time in milliseconds, excluding the current
    /// focus interval.
    #[serde(default)]
    pub time_active: i64,
}

impl TabRecord {
    /// Creates a record for a tab observed for the first time at `now`.
    pub fn observed(tab: HostTab, now: DateTime<Utc>) -> Self {
        Self {
            id: tab.id,
            window_id: tab.window_id,
            index: tab.index,
            url: tab.url,
            title: tab.title,
            created_at: now,
            active_at: None,
            time_active: 0,
        }
    }

    /// Milliseconds since the tab was first observed.
    pub fn time_open(&self, now: DateTime<Utc>) -> i64 {
        elapsed_ms(self.created_at, now)
    }

    /// Accumulated focus time including the running focus interval.
    pub fn current_time_active(&self, now: DateTime<Utc>) -> i64 {
        self.time_active
            + self
                .active_at
                .map_or(0, |active_at| elapsed_ms(active_at, now))
    }

    /// Share of the open time spent focused, rounded to a whole percent.
    pub fn active_percentage(&self, now: DateTime<Utc>) -> i64 {
        let open = self.time_open(now);
        if open <= 0 {
            return 0;
        }
        let active = self.current_time_active(now).min(open);
        (active * 100 + open / 2) / open
    }

    /// Whether the tab shows the browser's empty new-tab page.
    pub fn is_new_tab_page(&self) -> bool {
        is_new_tab_url(&self.url)
    }
}

/// Non-negative milliseconds between two instants.
pub fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).max(TimeDelta::zero()).num_milliseconds()
}

/// Whether a URL denotes the new-tab page. An empty URL counts as one.
pub fn is_new_tab_url(url: &str) -> bool {
    url.is_empty() || url == NEW_TAB_URL
}

/// Canonical form used for exact duplicate matching.
pub fn canonical_url(url: &str) -> &str {
    if url.is_empty() { NEW_TAB_URL } else { url }
}

/// Host and path of a URL, dropping the query string and fragment.
pub fn page_identity(url: &str) -> &str {
    let url = canonical_url(url);
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Whether navigating from `old` to `new` leaves the current page.
///
/// Query-string and fragment changes stay on the same page.
pub fn is_navigation(old: &str, new: &str) -> bool {
    page_identity(old) != page_identity(new)
}

/// How two tab URLs are compared when looking for duplicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlMatch {
    /// The full URL must be equal.
    #[default]
    Exact,
    /// URLs differing only in query string or fragment are equal.
    IgnoreQuery,
}

impl UrlMatch {
    /// Returns the comparison key for a URL under this policy.
    pub fn key<'a>(&self, url: &'a str) -> &'a str {
        match self {
            Self::Exact => canonical_url(url),
            Self::IgnoreQuery => page_identity(url),
        }
    }

    /// Whether two URLs name the same page under this policy.
    pub fn same(&self, a: &str, b: &str) -> bool {
        self.key(a) == self.key(b)
    }
}
