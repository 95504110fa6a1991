//! The governor's single task queue.
//!
//! Host events, countdown ticks and front-end commands all enter through
//! one channel, so every state change is handled by one dispatcher in
//! arrival order.

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use tg_core::{Badge, CountdownState, GovernorConfig, HostEvent, TabId, TabRecord, WindowId};

use crate::GovernorError;

/// Requests from front-ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Select the tab at `index` in `window_id`.
    HighlightTab { index: u32, window_id: WindowId },
    /// Restart activity accounting for every tab.
    ResetActivity,
    Snapshot,
}

/// Replies to [`Command`]s.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Done,
    Snapshot(Box<Snapshot>),
}

/// Read-only view of governor state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub tabs: Vec<TabRecord>,
    pub config: GovernorConfig,
    pub countdown: Option<CountdownState>,
    pub badge: Option<Badge>,
    pub focused_tab: Option<TabId>,
    /// Tabs the governor asked the host to close that are still open.
    pub pending_removals: Vec<TabId>,
    /// Open tabs, excluding pending removals.
    pub tab_count: u32,
    pub today_peak: u32,
}

pub(crate) type ReplySender = oneshot::Sender<Result<Reply, GovernorError>>;

/// One unit of work for the dispatcher.
#[derive(Debug)]
pub(crate) enum Input {
    Host(HostEvent),
    /// One second elapsed on the countdown started under this generation.
    Tick(u64),
    Command(Command, ReplySender),
    /// Answered once everything queued before it has been handled.
    Barrier(oneshot::Sender<()>),
    Shutdown,
}

/// Sending side of the inbox. Cheap to clone.
#[derive(Debug, Clone)]
pub struct GovernorHandle {
    tx: mpsc::UnboundedSender<Input>,
}

/// Receiving side of the inbox, consumed by the governor.
#[derive(Debug)]
pub struct Inbox {
    pub(crate) rx: mpsc::UnboundedReceiver<Input>,
    pub(crate) handle: GovernorHandle,
}

/// Creates a connected handle and inbox.
pub fn channel() -> (GovernorHandle, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = GovernorHandle { tx };
    (
        handle.clone(),
        Inbox {
            rx,
            handle,
        },
    )
}

impl GovernorHandle {
    /// Queues a host event.
    pub fn send_event(&self, event: HostEvent) -> Result<(), GovernorError> {
        self.send(Input::Host(event))
    }

    /// Sends a command and waits for the governor to answer it.
    pub async fn command(&self, command: Command) -> Result<Reply, GovernorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Input::Command(command, reply))?;
        rx.await.map_err(|_| GovernorError::Closed)?
    }

    pub async fn snapshot(&self) -> Result<Snapshot, GovernorError> {
        match self.command(Command::Snapshot).await? {
            Reply::Snapshot(snapshot) => Ok(*snapshot),
            Reply::Done => Err(GovernorError::UnexpectedReply),
        }
    }

    /// Waits until everything queued so far has been handled.
    pub async fn barrier(&self) -> Result<(), GovernorError> {
        let (done, rx) = oneshot::channel();
        self.send(Input::Barrier(done))?;
        rx.await.map_err(|_| GovernorError::Closed)
    }

    /// Asks the governor to stop after the work queued before this call.
    pub fn shutdown(&self) -> Result<(), GovernorError> {
        self.send(Input::Shutdown)
    }

    pub(crate) fn tick(&self, generation: u64) -> Result<(), GovernorError> {
        self.send(Input::Tick(generation))
    }

    fn send(&self, input: Input) -> Result<(), GovernorError> {
        self.tx.send(input).map_err(|_| GovernorError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_keep_arrival_order() {
        let (handle, mut inbox) = channel();
        handle
            .send_event(HostEvent::WindowFocusChanged { window_id: None })
            .unwrap();
        handle.tick(3).unwrap();
        handle.shutdown().unwrap();

        assert!(matches!(inbox.rx.try_recv(), Ok(Input::Host(_))));
        assert!(matches!(inbox.rx.try_recv(), Ok(Input::Tick(3))));
        assert!(matches!(inbox.rx.try_recv(), Ok(Input::Shutdown)));
    }

    #[tokio::test]
    async fn command_fails_once_inbox_is_gone() {
        let (handle, inbox) = channel();
        drop(inbox);

        let result = handle.command(Command::ResetActivity).await;
        assert!(matches!(result, Err(GovernorError::Closed)));
    }
}
