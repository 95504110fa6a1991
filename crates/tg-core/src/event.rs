//! Tab and window events delivered by the browser host.

use serde::{Deserialize, Serialize};

use crate::tab::{HostTab, TabChange};
use crate::types::{TabId, WindowId};

/// One notification from the host's tab or window event streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// A tab was opened.
    Created { tab: HostTab },
    /// A tab was closed. `window_closing` is set when its whole window
    /// is closing.
    Removed {
        tab_id: TabId,
        window_id: WindowId,
        #[serde(default)]
        window_closing: bool,
    },
    /// A tab's URL, title or load status changed.
    Updated {
        tab_id: TabId,
        #[serde(flatten)]
        change: TabChange,
    },
    /// A tab became the selected tab of its window.
    Activated { tab_id: TabId, window_id: WindowId },
    /// A tab moved within its window.
    Moved {
        tab_id: TabId,
        window_id: WindowId,
        from_index: u32,
        to_index: u32,
    },
    /// A tab left a window on its way to another one.
    Detached {
        tab_id: TabId,
        old_window_id: WindowId,
        old_position: u32,
    },
    /// A tab was placed into a window.
    Attached {
        tab_id: TabId,
        new_window_id: WindowId,
        new_position: u32,
    },
    /// OS focus moved to a browser window, or away from all of them.
    WindowFocusChanged { window_id: Option<WindowId> },
}

impl HostEvent {
    /// Short name for logging.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Removed { .. } => "removed",
            Self::Updated { .. } => "updated",
            Self::Activated { .. } => "activated",
            Self::Moved { .. } => "moved",
            Self::Detached { .. } => "detached",
            Self::Attached { .. } => "attached",
            Self::WindowFocusChanged { .. } => "window_focus_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::types::TabStatus;

    #[test]
    fn updated_event_flattens_change() {
        let json = r#"{"type":"updated","tab_id":4,"url":"https://a/","status":"complete"}"#;
        let event: HostEvent = serde_json::from_str(json).unwrap();

        assert_eq!(
            event,
            HostEvent::Updated {
                tab_id: TabId::new(4),
                change: TabChange {
                    url: Some("https://a/".into()),
                    title: None,
                    status: Some(TabStatus::Complete),
                },
            }
        );
        assert_eq!(event.kind(), "updated");
    }

    #[test]
    fn removed_event_defaults_window_closing() {
        let json = r#"{"type":"removed","tab_id":1,"window_id":2}"#;
        let event: HostEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(
            event,
            HostEvent::Removed {
                window_closing: false,
                ..
            }
        ));
    }

    #[test]
    fn focus_loss_is_null_window() {
        let json = r#"{"type":"window_focus_changed","window_id":null}"#;
        let event: HostEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, HostEvent::WindowFocusChanged { window_id: None });
    }
}
