//! Connection registry mapping ids to sockets and sockets to ids.
//!
//! Every live connection has exactly one entry holding its socket handle and
//! its FIFO outbound queue. Sockets are identified by a [`Token`] handed out
//! by the registry, so the id→socket and socket→id maps stay exact inverses.
//!
//! Ids come from two places, and the registration contract keeps them apart:
//! - [`Registry::register_accepted`] allocates the next id from a
//!   process-lifetime counter (listening role)
//! - [`Registry::register_with_id`] takes the id chosen by the peer
//!   (connector role) and refuses duplicates
//!
//! The registry is only ever touched by the reactor, so it takes `&mut self`
//! and needs no locking.
//!
//! # Example
//!
//! ```
//! use stdio_mux::registry::Registry;
//! use stdio_mux::protocol::Frame;
//!
//! let mut registry: Registry<&str> = Registry::new();
//! let token = registry.next_token();
//! let id = registry.register_accepted(token, "socket-a");
//!
//! assert_eq!(id, 0);
//! assert_eq!(registry.lookup_by_token(token), Some(id));
//! registry.enqueue(id, Frame::close(id)).unwrap();
//! assert_eq!(registry.write_interest(), vec![id]);
//! ```

use std::collections::{HashMap, VecDeque};

use crate::error::{MuxError, Result};
use crate::protocol::{ConnId, Frame};

/// Identity of a registered socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub u64);

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Entry for a registered connection.
struct Entry<S> {
    /// Socket identity.
    token: Token,
    /// The socket handle, exclusively owned.
    socket: S,
    /// Frames waiting to be delivered to the socket.
    queue: VecDeque<Frame>,
}

/// Bidirectional id↔socket bookkeeping plus per-connection outbound queues.
pub struct Registry<S> {
    /// Entries by connection id.
    entries: HashMap<ConnId, Entry<S>>,
    /// Connection id by socket token.
    tokens: HashMap<Token, ConnId>,
    /// Next id to allocate for accepted connections.
    next_id: ConnId,
    /// Next socket token to hand out.
    next_token: u64,
}

impl<S> Registry<S> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            tokens: HashMap::new(),
            next_id: 0,
            next_token: 0,
        }
    }

    /// Hand out a fresh socket token.
    ///
    /// Tokens are never reused.
    pub fn next_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    /// Register a locally accepted socket under a freshly allocated id.
    ///
    /// Ids increase strictly for the lifetime of the registry; an id that is
    /// currently taken by a peer-chosen registration is skipped.
    pub fn register_accepted(&mut self, token: Token, socket: S) -> ConnId {
        while self.entries.contains_key(&self.next_id) {
            self.next_id += 1;
        }
        let id = self.next_id;
        self.next_id += 1;

        self.insert(id, token, socket);
        id
    }

    /// Register a socket under an id chosen by the peer.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::DuplicateId`] if the id is already registered. The
    /// existing registration is left untouched and `socket` is dropped.
    pub fn register_with_id(&mut self, id: ConnId, token: Token, socket: S) -> Result<ConnId> {
        if self.entries.contains_key(&id) {
            return Err(MuxError::DuplicateId(id));
        }

        self.insert(id, token, socket);
        Ok(id)
    }

    fn insert(&mut self, id: ConnId, token: Token, socket: S) {
        debug_assert!(!self.tokens.contains_key(&token), "token registered twice");

        self.entries.insert(
            id,
            Entry {
                token,
                socket,
                queue: VecDeque::new(),
            },
        );
        self.tokens.insert(token, id);
    }

    /// Remove the connection owning `token`.
    ///
    /// Returns the id and the socket, or `None` if the token is unknown.
    pub fn unregister(&mut self, token: Token) -> Option<(ConnId, S)> {
        let id = self.tokens.remove(&token)?;
        let entry = self.entries.remove(&id)?;
        Some((id, entry.socket))
    }

    /// Remove the connection registered under `id`.
    ///
    /// Returns the token and the socket, or `None` if the id is unknown.
    pub fn unregister_id(&mut self, id: ConnId) -> Option<(Token, S)> {
        let entry = self.entries.remove(&id)?;
        self.tokens.remove(&entry.token);
        Some((entry.token, entry.socket))
    }

    /// Get the socket registered under `id`.
    pub fn lookup_by_id(&self, id: ConnId) -> Option<&S> {
        self.entries.get(&id).map(|e| &e.socket)
    }

    /// Get the socket registered under `id` mutably.
    pub fn lookup_by_id_mut(&mut self, id: ConnId) -> Option<&mut S> {
        self.entries.get_mut(&id).map(|e| &mut e.socket)
    }

    /// Get the id of the connection owning `token`.
    pub fn lookup_by_token(&self, token: Token) -> Option<ConnId> {
        self.tokens.get(&token).copied()
    }

    /// Get the token of the connection registered under `id`.
    pub fn token_of(&self, id: ConnId) -> Option<Token> {
        self.entries.get(&id).map(|e| e.token)
    }

    /// Check whether `id` is registered.
    pub fn contains_id(&self, id: ConnId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Append a frame to the outbound queue of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::UnknownConnection`] (and drops the frame) if the
    /// id is not registered.
    pub fn enqueue(&mut self, id: ConnId, frame: Frame) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(MuxError::UnknownConnection(id))?;
        entry.queue.push_back(frame);
        Ok(())
    }

    /// Take the front frame of the outbound queue of `id`.
    pub fn dequeue(&mut self, id: ConnId) -> Option<Frame> {
        self.entries.get_mut(&id)?.queue.pop_front()
    }

    /// Peek at the front frame of the outbound queue of `id`.
    pub fn front(&self, id: ConnId) -> Option<&Frame> {
        self.entries.get(&id)?.queue.front()
    }

    /// Put a frame back at the front of the outbound queue of `id`.
    ///
    /// Used for the unwritten remainder of a partial write.
    pub fn requeue_front(&mut self, id: ConnId, frame: Frame) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.queue.push_front(frame);
                true
            }
            None => false,
        }
    }

    /// Number of frames queued for `id`.
    pub fn queued(&self, id: ConnId) -> usize {
        self.entries.get(&id).map_or(0, |e| e.queue.len())
    }

    /// Ids of every connection with a non-empty outbound queue, ascending.
    pub fn write_interest(&self) -> Vec<ConnId> {
        let mut ids: Vec<ConnId> = self
            .entries
            .iter()
            .filter(|(_, e)| !e.queue.is_empty())
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// All registered ids, ascending.
    pub fn ids(&self) -> Vec<ConnId> {
        let mut ids: Vec<ConnId> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every connection, returning their ids and sockets.
    pub fn drain(&mut self) -> Vec<(ConnId, S)> {
        self.tokens.clear();
        self.entries.drain().map(|(id, e)| (id, e.socket)).collect()
    }

    /// Check that the id and token maps are exact inverses.
    pub fn is_consistent(&self) -> bool {
        self.entries.len() == self.tokens.len()
            && self
                .entries
                .iter()
                .all(|(id, e)| self.tokens.get(&e.token) == Some(id))
    }
}

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}
