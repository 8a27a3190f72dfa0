//! Session change notifications.
//!
//! [`PlaylistEngine`](crate::PlaylistEngine) applies a change and then
//! notifies every subscriber explicitly. Hosts hold a [`SessionEvents`]
//! handle and drain it after each call, for example to schedule an auto-save
//! or refresh a sidebar.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::gate::GateStatus;

/// Handle for consuming session change events.
///
/// Sending never blocks, so the engine stays synchronous.
#[derive(Debug)]
pub struct SessionEvents {
    /// Receiver for events from the engine.
    event_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionEvents {
    /// Create a handle from a receiver.
    pub(crate) fn new(event_rx: mpsc::UnboundedReceiver<SessionEvent>) -> Self {
        Self { event_rx }
    }

    /// Next pending event, or `None` when nothing is queued.
    pub fn try_next(&mut self) -> Option<SessionEvent> {
        self.event_rx.try_recv().ok()
    }

    /// All pending events in emission order.
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

/// A state change applied by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SessionEvent {
    /// Moved to the next active entry.
    Advanced {
        from: usize,
        to: usize,
    },

    /// Skipped past mastered entries.
    Branched {
        from: usize,
        to: usize,
        skipped: Vec<String>,
    },

    /// The last entry was left; nothing remains.
    Completed,

    /// A gate attempt was appended.
    GateRecorded {
        unit_id: String,
        attempt_number: u32,
        status: GateStatus,
    },

    /// Node mastery was overwritten.
    NodeUpdated {
        node_id: String,
        mastery: f64,
    },

    /// Direct index positioning, bypassing the resolver.
    Navigated {
        from: usize,
        to: usize,
    },
}
