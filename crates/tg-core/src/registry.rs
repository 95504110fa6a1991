//! Authoritative in-memory mirror of open tabs.
//!
//! The registry is a pure state container: it applies host tab events and
//! keeps window positions consistent, but performs no I/O and runs no
//! policy. Other components read it and request changes through its
//! methods.
//!
//! # Positions
//!
//! For every window the indices of its tabs are always exactly
//! `0..n`. Every structural change shifts the neighbours of the affected
//! position by one:
//!
//! - open / attach at `p`: tabs at or after `p` move right
//! - close / detach at `p`: tabs after `p` move left
//! - move `from → to`: tabs in between move one step towards `from`
//!
//! Closing a whole window skips the shift, since the window is going away.
//! A detached tab belongs to no window until it is attached again.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::tab::{HostTab, TabChange, TabRecord, elapsed_ms, is_navigation};
use crate::types::{TabId, TabStatus, WindowId};

/// Result of applying a [`TabChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// The URL moved to a different page; activity counters were reset.
    pub navigated: bool,
    /// The host reported the load as complete.
    pub completed: bool,
}

/// The collection of open tabs.
#[derive(Debug, Clone, Default)]
pub struct TabRegistry {
    tabs: Vec<TabRecord>,
    detached: HashSet<TabId>,
}

impl TabRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry from already-built records.
    pub fn from_records(tabs: Vec<TabRecord>) -> Self {
        Self {
            tabs,
            detached: HashSet::new(),
        }
    }

    /// Number of tracked tabs.
    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Tabs in observation order.
    pub fn iter(&self) -> impl Iterator<Item = &TabRecord> {
        self.tabs.iter()
    }

    /// All records, in observation order.
    pub fn records(&self) -> &[TabRecord] {
        &self.tabs
    }

    pub fn get(&self, id: TabId) -> Option<&TabRecord> {
        self.tabs.iter().find(|tab| tab.id == id)
    }

    pub fn contains(&self, id: TabId) -> bool {
        self.get(id).is_some()
    }

    fn get_mut(&mut self, id: TabId) -> Option<&mut TabRecord> {
        self.tabs.iter_mut().find(|tab| tab.id == id)
    }

    /// Tabs currently placed in `window`, ordered by index.
    pub fn tabs_in_window(&self, window: WindowId) -> Vec<&TabRecord> {
        let mut tabs: Vec<_> = self
            .tabs
            .iter()
            .filter(|tab| tab.window_id == window && !self.detached.contains(&tab.id))
            .collect();
        tabs.sort_by_key(|tab| tab.index);
        tabs
    }

    /// The tab at `index` in `window`.
    pub fn tab_at(&self, window: WindowId, index: u32) -> Option<&TabRecord> {
        self.tabs.iter().find(|tab| {
            tab.window_id == window && tab.index == index && !self.detached.contains(&tab.id)
        })
    }

    /// Records a newly created tab.
    ///
    /// Returns `false` if the tab was already tracked.
    pub fn open(&mut self, tab: HostTab, now: DateTime<Utc>) -> bool {
        if self.contains(tab.id) {
            tracing::debug!(tab = %tab.id, "tab already tracked");
            return false;
        }
        self.shift_right(tab.window_id, tab.index, tab.id);
        self.tabs.push(TabRecord::observed(tab, now));
        true
    }

    /// Removes a closed tab.
    ///
    /// When the whole window is closing the remaining tabs keep their
    /// indices.
    pub fn close(&mut self, id: TabId, window_closing: bool) -> Option<TabRecord> {
        let position = self.tabs.iter().position(|tab| tab.id == id)?;
        let removed = self.tabs.remove(position);
        let was_detached = self.detached.remove(&id);
        if !window_closing && !was_detached {
            self.shift_left(removed.window_id, removed.index);
        }
        Some(removed)
    }

    /// Moves a tab within its window.
    pub fn move_tab(&mut self, id: TabId, window: WindowId, from: u32, to: u32) -> bool {
        if !self.contains(id) {
            return false;
        }
        for tab in &mut self.tabs {
            if tab.id == id || tab.window_id != window || self.detached.contains(&tab.id) {
                continue;
            }
            if from < to && tab.index > from && tab.index <= to {
                tab.index -= 1;
            } else if from > to && tab.index >= to && tab.index < from {
                tab.index += 1;
            }
        }
        if let Some(tab) = self.get_mut(id) {
            tab.window_id = window;
            tab.index = to;
        }
        true
    }

    /// Takes a tab out of its window ahead of an attach elsewhere.
    pub fn detach(&mut self, id: TabId, window: WindowId, position: u32) -> bool {
        if !self.contains(id) || self.detached.contains(&id) {
            return false;
        }
        self.detached.insert(id);
        self.shift_left(window, position);
        true
    }

    /// Places a detached tab into `window` at `position`.
    pub fn attach(&mut self, id: TabId, window: WindowId, position: u32) -> bool {
        let Some(current) = self.get(id).map(|tab| (tab.window_id, tab.index)) else {
            return false;
        };
        if !self.detached.contains(&id) {
            // Attach without a preceding detach: vacate the old slot first.
            self.detach(id, current.0, current.1);
        }
        self.detached.remove(&id);
        self.shift_right(window, position, id);
        if let Some(tab) = self.get_mut(id) {
            tab.window_id = window;
            tab.index = position;
        }
        true
    }

    /// Merges changed fields into a tab.
    ///
    /// Navigating to a different page (query-only changes excluded) makes
    /// the tab count as new for duration purposes.
    pub fn update(
        &mut self,
        id: TabId,
        change: &TabChange,
        now: DateTime<Utc>,
    ) -> Option<UpdateOutcome> {
        let tab = self.get_mut(id)?;
        let mut navigated = false;

        if let Some(url) = &change.url {
            if *url != tab.url {
                navigated = is_navigation(&tab.url, url);
                tab.url.clone_from(url);
            }
        }
        if let Some(title) = &change.title {
            tab.title.clone_from(title);
        }
        if navigated {
            tab.created_at = now;
            tab.time_active = 0;
            tab.active_at = tab.active_at.map(|_| now);
        }

        Some(UpdateOutcome {
            navigated,
            completed: change.status == Some(TabStatus::Complete),
        })
    }

    /// Starts a focus interval for a tab if none is running.
    pub fn mark_focused(&mut self, id: TabId, now: DateTime<Utc>) -> bool {
        match self.get_mut(id) {
            Some(tab) if tab.active_at.is_none() => {
                tab.active_at = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Ends a running focus interval, folding it into `time_active`.
    pub fn mark_unfocused(&mut self, id: TabId, now: DateTime<Utc>) -> bool {
        let Some(tab) = self.get_mut(id) else {
            return false;
        };
        let Some(active_at) = tab.active_at.take() else {
            return false;
        };
        tab.time_active += elapsed_ms(active_at, now);
        true
    }

    /// Ends every running focus interval. Used to repair state restored
    /// after an unclean shutdown.
    pub fn fold_all_active(&mut self, now: DateTime<Utc>) -> usize {
        let mut folded = 0;
        for tab in &mut self.tabs {
            if let Some(active_at) = tab.active_at.take() {
                tab.time_active += elapsed_ms(active_at, now);
                folded += 1;
            }
        }
        folded
    }

    /// Restarts all duration counters from `now`.
    pub fn reset_activity(&mut self, now: DateTime<Utc>, focused: Option<TabId>) {
        for tab in &mut self.tabs {
            tab.created_at = now;
            tab.time_active = 0;
            tab.active_at = (Some(tab.id) == focused).then_some(now);
        }
    }

    fn shift_right(&mut self, window: WindowId, from: u32, except: TabId) {
        for tab in &mut self.tabs {
            if tab.window_id == window
                && tab.id != except
                && tab.index >= from
                && !self.detached.contains(&tab.id)
            {
                tab.index += 1;
            }
        }
    }

    fn shift_left(&mut self, window: WindowId, after: u32) {
        for tab in &mut self.tabs {
            if tab.window_id == window && tab.index > after && !self.detached.contains(&tab.id) {
                tab.index -= 1;
            }
        }
    }
}
