//! Connection registry for the position server
//!
//! This module tracks every live connection together with the state the
//! server keeps for it:
//! - The connection identity minted at accept time
//! - The user id handed to the client
//! - The authoritative character driven by that client's Move commands
//! - The outbound queue feeding the connection's writer task
//!
//! The registry itself is a plain map. The server shares it as
//! `Arc<RwLock<Registry>>`; readers (broadcast, tick, roster) take the read
//! lock only long enough to clone what they need, and never hold it across
//! socket I/O.

use crate::character::Character;
use log::{debug, info, warn};
use shared::{UserId, UserInfo};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// One encoded frame, shared between all recipients of a broadcast.
pub type Frame = Arc<[u8]>;

/// Frames a connection may have queued but not yet written. Past this, new
/// frames for that connection are dropped.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 1024;

/// Opaque identity of one TCP connection. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Character handle shared by a session and the simulation tick.
pub type SharedCharacter = Arc<Mutex<Character>>;

/// Everything the server keeps for one connected client
#[derive(Debug)]
pub struct Session {
    /// Connection identity, also sent on the wire as the character id
    pub id: ConnectionId,
    /// Numeric id assigned by the listener
    pub user_id: UserId,
    /// Peer address, for logging
    pub addr: SocketAddr,
    /// Authoritative movement state
    pub character: SharedCharacter,
    /// Frames queued here are written to the socket by the writer task.
    /// Bounded by [`OUTBOUND_QUEUE_CAPACITY`], so a peer that stops reading
    /// loses frames instead of growing server memory.
    outbound: mpsc::Sender<Frame>,
}

impl Session {
    pub fn new(
        id: ConnectionId,
        user_id: UserId,
        addr: SocketAddr,
        character: Character,
        outbound: mpsc::Sender<Frame>,
    ) -> Self {
        Self {
            id,
            user_id,
            addr,
            character: Arc::new(Mutex::new(character)),
            outbound,
        }
    }

    /// Queues a frame for this connection without waiting.
    ///
    /// Fails if the queue is full or the writer task has already gone away.
    pub fn send(&self, frame: Frame) -> Result<(), TrySendError<Frame>> {
        self.outbound.try_send(frame)
    }
}

/// Concurrent-access store of all active sessions, keyed by connection id
///
/// Entries are inserted at accept time before any message from the client
/// is processed, and removed exactly once in the session's cleanup path.
/// Dropping a removed [`Session`] drops the last sender of its outbound
/// queue, which ends the writer task and closes the write half.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<ConnectionId, Session>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    /// Registers a session. Returns false if the id is already present.
    pub fn add(&mut self, session: Session) -> bool {
        if self.sessions.contains_key(&session.id) {
            return false;
        }
        info!(
            "Client {} registered as user {} from {}",
            session.id, session.user_id, session.addr
        );
        self.sessions.insert(session.id, session);
        true
    }

    /// Removes a session, returning it if it was present.
    pub fn remove(&mut self, id: &ConnectionId) -> Option<Session> {
        let session = self.sessions.remove(id)?;
        info!("Client {} (user {}) removed", session.id, session.user_id);
        Some(session)
    }

    /// Character handles of every session, ordered by user id.
    ///
    /// The returned handles stay valid after the lock is released, so
    /// callers can lock each character without holding the registry.
    pub fn snapshot(&self) -> Vec<(ConnectionId, SharedCharacter)> {
        let mut entries: Vec<_> = self
            .sessions
            .values()
            .map(|s| (s.user_id, s.id, Arc::clone(&s.character)))
            .collect();
        entries.sort_by_key(|(user_id, _, _)| *user_id);
        entries
            .into_iter()
            .map(|(_, id, character)| (id, character))
            .collect()
    }

    /// Builds the AllUsersInfo roster, skipping `exclude`.
    pub async fn roster(&self, exclude: Option<ConnectionId>) -> Vec<UserInfo> {
        let mut users = Vec::with_capacity(self.sessions.len());
        for (id, character) in self.snapshot() {
            if Some(id) == exclude {
                continue;
            }
            users.push(character.lock().await.user_info());
        }
        users
    }

    /// Queues `frame` on every session except `exclude`.
    ///
    /// Best effort: a recipient whose queue is full or whose writer has
    /// stopped is skipped. Returns the number of sessions the frame was
    /// queued for.
    pub fn broadcast(&self, frame: &Frame, exclude: Option<ConnectionId>) -> usize {
        let mut delivered = 0;
        for session in self.sessions.values() {
            if Some(session.id) == exclude {
                continue;
            }
            match session.send(Arc::clone(frame)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => warn!(
                    "Outbound queue full for client {} (user {}); frame dropped",
                    session.id, session.user_id
                ),
                Err(TrySendError::Closed(_)) => {
                    debug!("Dropped frame for departing client {}", session.id)
                }
            }
        }
        delivered
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn user_id_of(&self, id: &ConnectionId) -> Option<UserId> {
        self.sessions.get(id).map(|s| s.user_id)
    }

    /// Returns the number of registered sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no sessions are registered
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
