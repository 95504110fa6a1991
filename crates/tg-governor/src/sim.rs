//! An in-process browser for replays and tests.
//!
//! [`SimulatedHost`] keeps windows with ordered tabs, a selected tab per
//! window and the focused window. Every user action emits the events a
//! real browser would emit, in the same order, into a governor inbox.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tg_core::{Badge, HostEvent, HostTab, TabChange, TabId, TabStatus, WindowId};

use crate::host::{BadgeSink, HostError, TabHost};
use crate::inbox::GovernorHandle;

#[derive(Debug, Clone)]
struct Page {
    id: TabId,
    url: String,
    title: String,
}

#[derive(Debug, Default)]
struct Window {
    tabs: Vec<Page>,
    active: Option<TabId>,
}

#[derive(Debug, Default)]
struct Browser {
    next_tab: i64,
    next_window: i64,
    windows: BTreeMap<WindowId, Window>,
    focused: Option<WindowId>,
}

impl Browser {
    fn new_tab_id(&mut self) -> TabId {
        self.next_tab += 1;
        TabId::new(self.next_tab)
    }

    fn new_window_id(&mut self) -> WindowId {
        self.next_window += 1;
        WindowId::new(self.next_window)
    }

    fn window_mut(&mut self, id: WindowId) -> Result<&mut Window, HostError> {
        self.windows
            .get_mut(&id)
            .ok_or(HostError::WindowNotFound(id))
    }

    /// Window and position of a tab.
    fn locate(&self, tab: TabId) -> Result<(WindowId, usize), HostError> {
        self.windows
            .iter()
            .find_map(|(id, window)| {
                window
                    .tabs
                    .iter()
                    .position(|page| page.id == tab)
                    .map(|pos| (*id, pos))
            })
            .ok_or(HostError::TabNotFound(tab))
    }

    fn page_mut(&mut self, tab: TabId) -> Result<&mut Page, HostError> {
        let (window, pos) = self.locate(tab)?;
        Ok(&mut self.window_mut(window)?.tabs[pos])
    }

    fn insert(
        &mut self,
        window_id: WindowId,
        page: Page,
        events: &mut Vec<HostEvent>,
    ) -> Result<(), HostError> {
        let window = self.window_mut(window_id)?;
        let index = window.tabs.len();
        events.push(HostEvent::Created {
            tab: host_tab(window_id, index, &page),
        });
        window.tabs.push(page);
        Ok(())
    }

    fn activate(&mut self, tab: TabId, events: &mut Vec<HostEvent>) -> Result<(), HostError> {
        let (window_id, _) = self.locate(tab)?;
        let window = self.window_mut(window_id)?;
        if window.active != Some(tab) {
            window.active = Some(tab);
            events.push(HostEvent::Activated {
                tab_id: tab,
                window_id,
            });
        }
        Ok(())
    }

    fn focus(&mut self, window: Option<WindowId>, events: &mut Vec<HostEvent>) {
        if self.focused != window {
            self.focused = window;
            events.push(HostEvent::WindowFocusChanged { window_id: window });
        }
    }

    /// Takes a tab out of its window, selecting a neighbour if it was the
    /// active one. Returns the window and the removed page.
    fn take(
        &mut self,
        tab: TabId,
        events: &mut Vec<HostEvent>,
    ) -> Result<(WindowId, usize, Page), HostError> {
        let (window_id, pos) = self.locate(tab)?;
        let window = self.window_mut(window_id)?;
        let page = window.tabs.remove(pos);
        if window.active == Some(tab) {
            window.active = None;
            let next = window
                .tabs
                .get(pos)
                .or_else(|| pos.checked_sub(1).and_then(|prev| window.tabs.get(prev)))
                .map(|page| page.id);
            if let Some(next) = next {
                window.active = Some(next);
                // Emitted after the caller's removal event.
                events.push(HostEvent::Activated {
                    tab_id: next,
                    window_id,
                });
            }
        }
        Ok((window_id, pos, page))
    }

    /// Forgets an empty window, moving focus elsewhere if it had it.
    fn drop_window_if_empty(&mut self, window_id: WindowId, events: &mut Vec<HostEvent>) {
        let empty = self
            .windows
            .get(&window_id)
            .is_some_and(|window| window.tabs.is_empty());
        if !empty {
            return;
        }
        self.windows.remove(&window_id);
        if self.focused == Some(window_id) {
            let next = self.windows.keys().next().copied();
            self.focus(next, events);
        }
    }

    fn remove(&mut self, tab: TabId, events: &mut Vec<HostEvent>) -> Result<(), HostError> {
        let (window_id, _) = self.locate(tab)?;
        let last_in_window = self
            .windows
            .get(&window_id)
            .is_some_and(|window| window.tabs.len() == 1);
        let mut follow_up = Vec::new();
        self.take(tab, &mut follow_up)?;
        events.push(HostEvent::Removed {
            tab_id: tab,
            window_id,
            window_closing: last_in_window,
        });
        events.append(&mut follow_up);
        self.drop_window_if_empty(window_id, events);
        Ok(())
    }
}

fn host_tab(window_id: WindowId, index: usize, page: &Page) -> HostTab {
    HostTab {
        id: page.id,
        window_id,
        index: u32::try_from(index).unwrap_or(u32::MAX),
        url: page.url.clone(),
        title: page.title.clone(),
    }
}

/// A scripted browser that implements [`TabHost`].
#[derive(Debug)]
pub struct SimulatedHost {
    browser: Mutex<Browser>,
    events: GovernorHandle,
    fail_removals: AtomicBool,
}

impl SimulatedHost {
    /// Creates an empty browser whose events go to `events`.
    pub fn new(events: GovernorHandle) -> Self {
        Self {
            browser: Mutex::new(Browser::default()),
            events,
            fail_removals: AtomicBool::new(false),
        }
    }

    /// Makes the host refuse every removal request from the governor.
    pub fn set_fail_removals(&self, fail: bool) {
        self.fail_removals.store(fail, Ordering::SeqCst);
    }

    /// Creates a window holding `urls` without emitting events, as if it
    /// existed before the governor started. The first tab is selected and
    /// the window takes focus if no other window has it.
    pub fn seed_window(&self, urls: &[&str]) -> WindowId {
        let mut browser = self.lock();
        let window_id = browser.new_window_id();
        let mut window = Window::default();
        for url in urls {
            let id = browser.new_tab_id();
            window.tabs.push(Page {
                id,
                url: (*url).to_string(),
                title: String::new(),
            });
        }
        window.active = window.tabs.first().map(|page| page.id);
        browser.windows.insert(window_id, window);
        if browser.focused.is_none() {
            browser.focused = Some(window_id);
        }
        window_id
    }

    /// Opens a focused window with one selected tab.
    pub fn open_window(&self, url: &str) -> (WindowId, TabId) {
        let mut events = Vec::new();
        let (window_id, tab) = {
            let mut browser = self.lock();
            let window_id = browser.new_window_id();
            browser.windows.insert(window_id, Window::default());
            let tab = browser.new_tab_id();
            let page = Page {
                id: tab,
                url: url.to_string(),
                title: String::new(),
            };
            // The window was just inserted.
            let _ = browser.insert(window_id, page, &mut events);
            let _ = browser.activate(tab, &mut events);
            browser.focus(Some(window_id), &mut events);
            (window_id, tab)
        };
        self.emit(events);
        (window_id, tab)
    }

    /// Opens a selected tab at the end of `window`.
    pub fn open_tab(&self, window: WindowId, url: &str) -> Result<TabId, HostError> {
        self.apply(|browser, events| {
            let tab = open_page(browser, window, url, events)?;
            browser.activate(tab, events)?;
            Ok(tab)
        })
    }

    /// Opens a tab at the end of `window` without selecting it.
    pub fn open_background_tab(&self, window: WindowId, url: &str) -> Result<TabId, HostError> {
        self.apply(|browser, events| open_page(browser, window, url, events))
    }

    /// Closes a tab as the user would.
    pub fn close_tab(&self, tab: TabId) -> Result<(), HostError> {
        self.apply(|browser, events| browser.remove(tab, events))
    }

    /// Loads `url` in a tab.
    pub fn navigate(&self, tab: TabId, url: &str) -> Result<(), HostError> {
        self.navigate_via(tab, &[url])
    }

    /// Loads a page through a chain of redirects. Only the last URL
    /// finishes loading.
    pub fn navigate_via(&self, tab: TabId, urls: &[&str]) -> Result<(), HostError> {
        self.apply(|browser, events| {
            let page = browser.page_mut(tab)?;
            for url in urls {
                page.url = (*url).to_string();
                events.push(HostEvent::Updated {
                    tab_id: tab,
                    change: TabChange {
                        url: Some(page.url.clone()),
                        title: None,
                        status: Some(TabStatus::Loading),
                    },
                });
            }
            page.title = page_title(&page.url);
            events.push(HostEvent::Updated {
                tab_id: tab,
                change: TabChange {
                    url: None,
                    title: Some(page.title.clone()),
                    status: Some(TabStatus::Complete),
                },
            });
            Ok(())
        })
    }

    /// Selects a tab in its window.
    pub fn activate(&self, tab: TabId) -> Result<(), HostError> {
        self.apply(|browser, events| browser.activate(tab, events))
    }

    /// Moves a tab within its window.
    pub fn move_tab(&self, tab: TabId, to_index: u32) -> Result<(), HostError> {
        self.apply(|browser, events| {
            let (window_id, from) = browser.locate(tab)?;
            let window = browser.window_mut(window_id)?;
            let to = usize::try_from(to_index)
                .unwrap_or(usize::MAX)
                .min(window.tabs.len() - 1);
            if to == from {
                return Ok(());
            }
            let page = window.tabs.remove(from);
            window.tabs.insert(to, page);
            events.push(HostEvent::Moved {
                tab_id: tab,
                window_id,
                from_index: u32::try_from(from).unwrap_or(u32::MAX),
                to_index: u32::try_from(to).unwrap_or(u32::MAX),
            });
            Ok(())
        })
    }

    /// Drags a tab into another window, where it becomes selected and
    /// the window takes focus.
    pub fn move_to_window(
        &self,
        tab: TabId,
        window: WindowId,
        position: u32,
    ) -> Result<(), HostError> {
        self.apply(|browser, events| {
            browser.window_mut(window)?;
            let mut follow_up = Vec::new();
            let (old_window, old_position, page) = browser.take(tab, &mut follow_up)?;
            events.push(HostEvent::Detached {
                tab_id: tab,
                old_window_id: old_window,
                old_position: u32::try_from(old_position).unwrap_or(u32::MAX),
            });
            events.append(&mut follow_up);

            let target = browser.window_mut(window)?;
            let position = usize::try_from(position)
                .unwrap_or(usize::MAX)
                .min(target.tabs.len());
            target.tabs.insert(position, page);
            events.push(HostEvent::Attached {
                tab_id: tab,
                new_window_id: window,
                new_position: u32::try_from(position).unwrap_or(u32::MAX),
            });
            browser.activate(tab, events)?;
            browser.focus(Some(window), events);
            browser.drop_window_if_empty(old_window, events);
            Ok(())
        })
    }

    /// Closes a window and every tab in it.
    pub fn close_window(&self, window: WindowId) -> Result<(), HostError> {
        self.apply(|browser, events| {
            let closed = browser
                .windows
                .remove(&window)
                .ok_or(HostError::WindowNotFound(window))?;
            for page in closed.tabs {
                events.push(HostEvent::Removed {
                    tab_id: page.id,
                    window_id: window,
                    window_closing: true,
                });
            }
            if browser.focused == Some(window) {
                let next = browser.windows.keys().next().copied();
                browser.focus(next, events);
            }
            Ok(())
        })
    }

    /// Gives OS focus to a window, or takes it away from the browser.
    pub fn focus_window(&self, window: Option<WindowId>) -> Result<(), HostError> {
        self.apply(|browser, events| {
            if let Some(id) = window {
                browser.window_mut(id)?;
            }
            browser.focus(window, events);
            Ok(())
        })
    }

    /// Every open tab, ordered by window then index.
    pub fn tabs(&self) -> Vec<HostTab> {
        let browser = self.lock();
        browser
            .windows
            .iter()
            .flat_map(|(window_id, window)| {
                window
                    .tabs
                    .iter()
                    .enumerate()
                    .map(|(index, page)| host_tab(*window_id, index, page))
            })
            .collect()
    }

    pub fn selected_tab(&self, window: WindowId) -> Option<TabId> {
        self.lock()
            .windows
            .get(&window)
            .and_then(|window| window.active)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Browser> {
        self.browser.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs an action against the browser, then emits its events once the
    /// lock is released.
    fn apply<T>(
        &self,
        action: impl FnOnce(&mut Browser, &mut Vec<HostEvent>) -> Result<T, HostError>,
    ) -> Result<T, HostError> {
        let mut events = Vec::new();
        let result = {
            let mut browser = self.lock();
            action(&mut browser, &mut events)
        };
        self.emit(events);
        result
    }

    fn emit(&self, events: Vec<HostEvent>) {
        for event in events {
            if self.events.send_event(event).is_err() {
                tracing::debug!("governor gone, dropping host event");
                return;
            }
        }
    }
}

fn open_page(
    browser: &mut Browser,
    window: WindowId,
    url: &str,
    events: &mut Vec<HostEvent>,
) -> Result<TabId, HostError> {
    browser.window_mut(window)?;
    let tab = browser.new_tab_id();
    let page = Page {
        id: tab,
        url: url.to_string(),
        title: String::new(),
    };
    browser.insert(window, page, events)?;
    Ok(tab)
}

/// A plausible title for a loaded page: its host.
fn page_title(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split(['/', '?', '#']).next().unwrap_or(rest).to_string()
}

impl TabHost for SimulatedHost {
    async fn query_tabs(&self) -> Result<Vec<HostTab>, HostError> {
        Ok(self.tabs())
    }

    async fn focused_window(&self) -> Result<Option<WindowId>, HostError> {
        Ok(self.lock().focused)
    }

    async fn active_tab(&self, window: WindowId) -> Result<Option<TabId>, HostError> {
        let browser = self.lock();
        let window = browser
            .windows
            .get(&window)
            .ok_or(HostError::WindowNotFound(window))?;
        Ok(window.active)
    }

    async fn remove_tab(&self, tab: TabId) -> Result<(), HostError> {
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(HostError::Unavailable("removal refused".to_string()));
        }
        self.close_tab(tab)
    }

    async fn highlight_tab(&self, window: WindowId, index: u32) -> Result<(), HostError> {
        self.apply(|browser, events| {
            let tab = browser
                .windows
                .get(&window)
                .ok_or(HostError::WindowNotFound(window))?
                .tabs
                .get(usize::try_from(index).unwrap_or(usize::MAX))
                .map(|page| page.id)
                .ok_or(HostError::NoTabAtIndex { window, index })?;
            browser.activate(tab, events)?;
            browser.focus(Some(window), events);
            Ok(())
        })
    }
}

/// A badge sink that remembers everything it was asked to show.
#[derive(Debug, Default)]
pub struct RecordingBadge {
    history: Mutex<Vec<Badge>>,
}

impl RecordingBadge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<Badge> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Texts of every rendered badge, oldest first.
    pub fn texts(&self) -> Vec<String> {
        self.history().into_iter().map(|badge| badge.text).collect()
    }

    pub fn last(&self) -> Option<Badge> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl BadgeSink for RecordingBadge {
    fn render(&self, badge: &Badge) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(badge.clone());
    }
}
