//! Duplicate tab detection.
//!
//! Steady-state checks are incremental: a single new or updated tab is
//! compared against the existing set in one pass. The full sweep only runs
//! when the feature is switched on.

use std::collections::HashSet;

use crate::tab::{TabRecord, UrlMatch};
use crate::types::TabId;

/// Finds tabs showing the same page.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateDetector {
    policy: UrlMatch,
}

impl DuplicateDetector {
    pub const fn new(policy: UrlMatch) -> Self {
        Self { policy }
    }

    pub const fn policy(&self) -> UrlMatch {
        self.policy
    }

    /// All other tabs whose URL matches `target`.
    pub fn find_duplicates_of<'a>(
        &self,
        tabs: impl IntoIterator<Item = &'a TabRecord>,
        target: &TabRecord,
    ) -> Vec<TabId> {
        let key = self.policy.key(&target.url);
        tabs.into_iter()
            .filter(|tab| tab.id != target.id && self.policy.key(&tab.url) == key)
            .map(|tab| tab.id)
            .collect()
    }

    /// Every tab that repeats the URL of an earlier tab.
    ///
    /// The first tab seen for each URL is kept; iteration order decides
    /// which one that is.
    pub fn sweep<'a>(&self, tabs: impl IntoIterator<Item = &'a TabRecord>) -> Vec<TabId> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for tab in tabs {
            if !seen.insert(self.policy.key(&tab.url)) {
                duplicates.push(tab.id);
            }
        }
        duplicates
    }
}
