//! Background tab governor.
//!
//! The [`Governor`] owns all tab state and applies the limit, duplicate,
//! countdown and activity policies to browser events, one at a time, in
//! arrival order. Everything reaches it through a [`GovernorHandle`].
//!
//! ```text
//! TabHost events ─┐
//! ticker ─────────┼─► inbox ─► Governor ─► TabHost / BadgeSink / ConfigStore
//! front-ends ─────┘              ▲
//! ConfigStore changes ───────────┘
//! ```

pub mod governor;
pub mod host;
pub mod inbox;
pub mod sim;

pub use governor::{
    Collaborators, Governor, GovernorError, GovernorOptions, RemovalCause, TickSource,
};
pub use host::{BadgeSink, HostError, TabHost};
pub use inbox::{Command, GovernorHandle, Inbox, Reply, Snapshot, channel};
pub use sim::{RecordingBadge, SimulatedHost};
