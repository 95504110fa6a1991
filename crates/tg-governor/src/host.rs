//! Collaborators the governor drives: the browser host and the badge.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use tg_core::{Badge, HostTab, TabId, WindowId};

/// Errors reported by a [`TabHost`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("tab {0} not found")]
    TabNotFound(TabId),
    #[error("window {0} not found")]
    WindowNotFound(WindowId),
    #[error("no tab at index {index} in window {window}")]
    NoTabAtIndex { window: WindowId, index: u32 },
    #[error("host unavailable: {0}")]
    Unavailable(String),
}

/// The browser's tab and window API.
///
/// Mutating calls return once the host accepted them. The matching
/// events arrive later through the governor's inbox.
pub trait TabHost: Send + Sync {
    /// Every open tab in every window.
    fn query_tabs(&self) -> impl Future<Output = Result<Vec<HostTab>, HostError>> + Send;

    /// The window holding OS focus, if any.
    fn focused_window(&self) -> impl Future<Output = Result<Option<WindowId>, HostError>> + Send;

    /// The selected tab of `window`.
    fn active_tab(
        &self,
        window: WindowId,
    ) -> impl Future<Output = Result<Option<TabId>, HostError>> + Send;

    fn remove_tab(&self, tab: TabId) -> impl Future<Output = Result<(), HostError>> + Send;

    /// Selects the tab at `index` in `window`.
    fn highlight_tab(
        &self,
        window: WindowId,
        index: u32,
    ) -> impl Future<Output = Result<(), HostError>> + Send;
}

impl<T: TabHost> TabHost for Arc<T> {
    fn query_tabs(&self) -> impl Future<Output = Result<Vec<HostTab>, HostError>> + Send {
        (**self).query_tabs()
    }

    fn focused_window(&self) -> impl Future<Output = Result<Option<WindowId>, HostError>> + Send {
        (**self).focused_window()
    }

    fn active_tab(
        &self,
        window: WindowId,
    ) -> impl Future<Output = Result<Option<TabId>, HostError>> + Send {
        (**self).active_tab(window)
    }

    fn remove_tab(&self, tab: TabId) -> impl Future<Output = Result<(), HostError>> + Send {
        (**self).remove_tab(tab)
    }

    fn highlight_tab(
        &self,
        window: WindowId,
        index: u32,
    ) -> impl Future<Output = Result<(), HostError>> + Send {
        (**self).highlight_tab(window, index)
    }
}

/// Where rendered badges go.
pub trait BadgeSink: Send + Sync {
    fn render(&self, badge: &Badge);
}

impl<T: BadgeSink + ?Sized> BadgeSink for Arc<T> {
    fn render(&self, badge: &Badge) {
        (**self).render(badge);
    }
}
