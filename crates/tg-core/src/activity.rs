//! Per-tab focus time tracking.
//!
//! A tab is "active" only while it is the selected tab of the window that
//! holds OS focus. The tracker follows tab activation and window focus
//! events and asks the registry to open or close focus intervals, so at
//! most one record has `active_at` set at any time, and none while no
//! window is focused.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::registry::TabRegistry;
use crate::types::{TabId, WindowId};

/// Tracks which tab currently holds global focus.
#[derive(Debug, Clone, Default)]
pub struct ActivityTracker {
    focused_window: Option<WindowId>,
    selected: HashMap<WindowId, TabId>,
    focused_tab: Option<TabId>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The globally focused tab, if any window is focused.
    pub const fn focused_tab(&self) -> Option<TabId> {
        self.focused_tab
    }

    pub const fn focused_window(&self) -> Option<WindowId> {
        self.focused_window
    }

    /// Moves global focus to `tab`, or clears it.
    ///
    /// The previously focused tab has its running interval folded into
    /// `time_active`; the newly focused tab starts one.
    pub fn on_focus_changed(
        &mut self,
        registry: &mut TabRegistry,
        tab: Option<TabId>,
        now: DateTime<Utc>,
    ) {
        let tab = tab.filter(|id| registry.contains(*id));
        if let Some(previous) = self.focused_tab {
            if Some(previous) != tab {
                registry.mark_unfocused(previous, now);
            }
        }
        if let Some(id) = tab {
            registry.mark_focused(id, now);
        }
        self.focused_tab = tab;
    }

    /// A tab became the selected tab of its window.
    pub fn on_tab_activated(
        &mut self,
        registry: &mut TabRegistry,
        tab: TabId,
        window: WindowId,
        now: DateTime<Utc>,
    ) {
        self.selected.insert(window, tab);
        if self.focused_window == Some(window) {
            self.on_focus_changed(registry, Some(tab), now);
        }
    }

    /// OS focus moved to another window, or left the browser entirely.
    pub fn on_window_focus_changed(
        &mut self,
        registry: &mut TabRegistry,
        window: Option<WindowId>,
        now: DateTime<Utc>,
    ) {
        self.focused_window = window;
        let tab = window.and_then(|w| self.selected.get(&w).copied());
        self.on_focus_changed(registry, tab, now);
    }

    /// Forgets a tab that left `window` (closed or detached).
    pub fn on_tab_left_window(&mut self, tab: TabId, window: WindowId) {
        if self.selected.get(&window) == Some(&tab) {
            self.selected.remove(&window);
        }
        if self.focused_tab == Some(tab) {
            self.focused_tab = None;
        }
    }

    /// Rebuilds focus state from the host at startup.
    ///
    /// Any `active_at` that survived in restored records has no matching
    /// focus event anymore: the gap is folded into `time_active` once, then
    /// the currently focused tab (if any) starts a fresh interval.
    pub fn restore(
        &mut self,
        registry: &mut TabRegistry,
        focused_window: Option<WindowId>,
        selected: &[(WindowId, TabId)],
        now: DateTime<Utc>,
    ) {
        let stale = registry.fold_all_active(now);
        if stale > 0 {
            tracing::debug!(stale, "folded stale focus intervals");
        }
        self.selected = selected.iter().copied().collect();
        self.focused_window = focused_window;
        self.focused_tab = None;
        let tab = focused_window.and_then(|w| self.selected.get(&w).copied());
        self.on_focus_changed(registry, tab, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeDelta, TimeZone};

    use crate::tab::HostTab;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap() + TimeDelta::seconds(secs)
    }

    fn setup() -> (TabRegistry, ActivityTracker) {
        let mut registry = TabRegistry::new();
        for (id, window, index) in [(1, 1, 0), (2, 1, 1), (3, 2, 0)] {
            registry.open(
                HostTab {
                    id: TabId::new(id),
                    window_id: WindowId::new(window),
                    index,
                    url: format!("https://site/{id}"),
                    title: String::new(),
                },
                t(0),
            );
        }
        (registry, ActivityTracker::new())
    }

    fn active_count(registry: &TabRegistry) -> usize {
        registry.iter().filter(|tab| tab.active_at.is_some()).count()
    }

    #[test]
    fn activation_in_unfocused_window_does_not_start_interval() {
        let (mut registry, mut tracker) = setup();
        tracker.on_tab_activated(&mut registry, TabId::new(1), WindowId::new(1), t(0));

        assert_eq!(tracker.focused_tab(), None);
        assert_eq!(active_count(&registry), 0);
    }

    #[test]
    fn switching_tabs_moves_the_single_interval() {
        let (mut registry, mut tracker) = setup();
        tracker.on_tab_activated(&mut registry, TabId::new(1), WindowId::new(1), t(0));
        tracker.on_window_focus_changed(&mut registry, Some(WindowId::new(1)), t(0));
        assert_eq!(tracker.focused_tab(), Some(TabId::new(1)));

        tracker.on_tab_activated(&mut registry, TabId::new(2), WindowId::new(1), t(30));

        assert_eq!(active_count(&registry), 1);
        assert_eq!(registry.get(TabId::new(1)).unwrap().time_active, 30_000);
        assert_eq!(registry.get(TabId::new(2)).unwrap().active_at, Some(t(30)));
    }

    #[test]
    fn losing_os_focus_clears_every_interval() {
        let (mut registry, mut tracker) = setup();
        tracker.on_tab_activated(&mut registry, TabId::new(3), WindowId::new(2), t(0));
        tracker.on_window_focus_changed(&mut registry, Some(WindowId::new(2)), t(0));

        tracker.on_window_focus_changed(&mut registry, None, t(45));

        assert_eq!(active_count(&registry), 0);
        assert_eq!(registry.get(TabId::new(3)).unwrap().time_active, 45_000);
        assert_eq!(registry.get(TabId::new(3)).unwrap().current_time_active(t(90)), 45_000);
    }

    #[test]
    fn window_switch_focuses_that_windows_selected_tab() {
        let (mut registry, mut tracker) = setup();
        tracker.on_tab_activated(&mut registry, TabId::new(1), WindowId::new(1), t(0));
        tracker.on_tab_activated(&mut registry, TabId::new(3), WindowId::new(2), t(0));
        tracker.on_window_focus_changed(&mut registry, Some(WindowId::new(1)), t(0));

        tracker.on_window_focus_changed(&mut registry, Some(WindowId::new(2)), t(10));

        assert_eq!(tracker.focused_tab(), Some(TabId::new(3)));
        assert_eq!(registry.get(TabId::new(1)).unwrap().time_active, 10_000);
        assert_eq!(active_count(&registry), 1);
    }

    #[test]
    fn closed_focused_tab_is_forgotten() {
        let (mut registry, mut tracker) = setup();
        tracker.on_tab_activated(&mut registry, TabId::new(1), WindowId::new(1), t(0));
        tracker.on_window_focus_changed(&mut registry, Some(WindowId::new(1)), t(0));

        registry.close(TabId::new(1), false);
        tracker.on_tab_left_window(TabId::new(1), WindowId::new(1));

        assert_eq!(tracker.focused_tab(), None);
        tracker.on_tab_activated(&mut registry, TabId::new(2), WindowId::new(1), t(5));
        assert_eq!(tracker.focused_tab(), Some(TabId::new(2)));
    }

    #[test]
    fn restore_folds_stale_intervals_and_restamps_focus() {
        let (mut registry, mut tracker) = setup();
        // Left over from a previous run that never saw the blur.
        registry.mark_focused(TabId::new(2), t(0));

        tracker.restore(
            &mut registry,
            Some(WindowId::new(1)),
            &[(WindowId::new(1), TabId::new(1)), (WindowId::new(2), TabId::new(3))],
            t(60),
        );

        let stale = registry.get(TabId::new(2)).unwrap();
        assert_eq!(stale.time_active, 60_000);
        assert_eq!(stale.active_at, None);
        assert_eq!(registry.get(TabId::new(1)).unwrap().active_at, Some(t(60)));
        assert_eq!(active_count(&registry), 1);
    }

    #[test]
    fn restore_without_focused_window_leaves_nothing_active() {
        let (mut registry, mut tracker) = setup();
        registry.mark_focused(TabId::new(1), t(0));

        tracker.restore(&mut registry, None, &[(WindowId::new(1), TabId::new(1))], t(20));

        assert_eq!(active_count(&registry), 0);
        assert_eq!(registry.get(TabId::new(1)).unwrap().time_active, 20_000);
    }
}
