//! The single live browser session and its outbound channel.
//!
//! Every peripheral produces events for "the browser", but at most one
//! browser is attached at a time.  [`SessionBroker`] owns the one slot that
//! holds the current session's outbound queue:
//!
//! - [`attach`](SessionBroker::attach) swaps a new queue into the slot and
//!   drops the previous one, which makes the evicted session's writer task
//!   drain, close its WebSocket and exit.
//! - [`send`](SessionBroker::send) never waits: without a session the event
//!   is dropped, with a session it is queued with `try_send`.
//! - [`detach`](SessionBroker::detach) empties the slot, but only if the
//!   caller is still the current session.
//!
//! The queue has exactly one consumer (the session's writer task), which
//! writes one complete WebSocket frame per event, so two events can never
//! interleave on the wire no matter how many peripherals send at once.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::messages::BridgeToClientMsg;

/// Identifier assigned to each attached session, used in log messages.
pub type SessionId = Uuid;

struct Session {
    id: SessionId,
    outbound: mpsc::Sender<BridgeToClientMsg>,
}

/// Exclusive owner of the current live session's outbound queue.
#[derive(Default)]
pub struct SessionBroker {
    slot: Mutex<Option<Session>>,
}

impl SessionBroker {
    /// Creates a broker with no attached session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `outbound` as the live session and returns its id together
    /// with the id of the session it evicted, if any.
    pub fn attach(&self, outbound: mpsc::Sender<BridgeToClientMsg>) -> (SessionId, Option<SessionId>) {
        let id = Uuid::new_v4();
        let previous = self.slot().replace(Session { id, outbound });
        let evicted = previous.map(|session| session.id);

        match evicted {
            Some(old) => info!("session {id} attached; evicted session {old}"),
            None => info!("session {id} attached"),
        }
        (id, evicted)
    }

    /// Removes session `id` from the slot.
    ///
    /// Returns `false` (and changes nothing) when `id` has already been
    /// evicted by a newer session.
    pub fn detach(&self, id: SessionId) -> bool {
        let mut slot = self.slot();
        match slot.as_ref() {
            Some(session) if session.id == id => {
                *slot = None;
                info!("session {id} detached");
                true
            }
            _ => {
                debug!("session {id} already evicted; nothing to detach");
                false
            }
        }
    }

    /// Queues `msg` for the live session without waiting.
    ///
    /// Returns `true` when the message was queued.  Without a session, or
    /// when the session's queue is full, the message is dropped.
    pub fn send(&self, msg: BridgeToClientMsg) -> bool {
        let slot = self.slot();
        let Some(session) = slot.as_ref() else {
            return false;
        };

        match session.outbound.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(msg)) => {
                warn!(
                    "session {}: outbound queue full; dropping {}",
                    session.id,
                    msg.kind()
                );
                false
            }
            Err(TrySendError::Closed(msg)) => {
                debug!(
                    "session {}: writer gone; dropping {}",
                    session.id,
                    msg.kind()
                );
                false
            }
        }
    }

    /// Id of the attached session, if any.
    pub fn current(&self) -> Option<SessionId> {
        self.slot().as_ref().map(|session| session.id)
    }

    fn slot(&self) -> MutexGuard<'_, Option<Session>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
