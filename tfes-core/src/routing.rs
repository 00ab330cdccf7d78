//! The routing table: the single shared structure behind fan-out.
//!
//! Presents "which local clients and which peers are interested in subject
//! X" to the client and peer planes while tolerating an unpredictable mix
//! of client- and peer-originated subscription edits. A single
//! [`parking_lot::Mutex`] guards a plain `hashbrown::HashMap`-based inner
//! struct — a coarse lock over the whole table is simple to reason about
//! and cheap enough at the expected table size (tens of thousands of
//! clients/patterns) that sharding isn't worth the complexity. Methods
//! that fan out return cloned `flume::Sender` handles and drop the lock
//! before any channel send, so the lock is never held across a suspension
//! point.

use crate::message::Message;
use crate::subject::matches;
use flume::Sender;
use hashbrown::HashMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::debug;

/// Most clients and peers carry only a handful of patterns; inlining the
/// first four avoids a heap allocation for the common case.
type PatternList = SmallVec<[String; 4]>;

/// Opaque identifier for a registered local client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

/// Opaque identifier for a registered peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(u64);

/// Where a `PUBLISH` originated — gates whether it may be forwarded on to
/// other peers (it must not be, when it already came from one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Published by a locally-connected client.
    Local,
    /// Relayed from the named peer.
    Peer(PeerId),
}

struct ClientEntry {
    uri: String,
    subscriptions: PatternList,
    sender: Sender<Message>,
}

struct PeerEntry {
    name: String,
    uri: String,
    interests: PatternList,
    sender: Sender<Message>,
}

#[derive(Default)]
struct Inner {
    clients: HashMap<ClientId, ClientEntry>,
    next_client_id: u64,
    peers: HashMap<PeerId, PeerEntry>,
    peer_by_name: HashMap<String, PeerId>,
    next_peer_id: u64,
}

/// The authoritative client/peer interest table.
#[derive(Default)]
pub struct RoutingTable {
    inner: Mutex<Inner>,
}

impl RoutingTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly-`CONNECT`ed client, with no subscriptions yet.
    pub fn register_client(&self, uri: String, sender: Sender<Message>) -> ClientId {
        let mut inner = self.inner.lock();
        let id = ClientId(inner.next_client_id);
        inner.next_client_id += 1;
        inner.clients.insert(
            id,
            ClientEntry {
                uri,
                subscriptions: PatternList::new(),
                sender,
            },
        );
        id
    }

    /// Appends `pattern` to the client's subscription list. Duplicates are
    /// permitted by design — each matching pattern still yields at most one
    /// bounty per publish, enforced at the `deliver_publish` dedup step.
    pub fn add_client_subscription(&self, id: ClientId, pattern: String) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.clients.get_mut(&id) {
            entry.subscriptions.push(pattern);
        }
    }

    /// Removes the first occurrence of `pattern` from the client's
    /// subscription list. A no-op if the client or the pattern is absent.
    pub fn remove_client_subscription(&self, id: ClientId, pattern: &str) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.clients.get_mut(&id) {
            if let Some(pos) = entry.subscriptions.iter().position(|p| p == pattern) {
                entry.subscriptions.remove(pos);
            }
        }
    }

    /// Removes `id` and every one of its subscriptions.
    pub fn drop_client(&self, id: ClientId) {
        if let Some(entry) = self.inner.lock().clients.remove(&id) {
            debug!(client = %entry.uri, subscriptions = entry.subscriptions.len(), "dropping client");
        }
    }

    /// Client URI as formed by the client plane (`client_id[:client_group]`).
    #[must_use]
    pub fn client_uri(&self, id: ClientId) -> Option<String> {
        self.inner.lock().clients.get(&id).map(|c| c.uri.clone())
    }

    /// Registers a freshly-accepted or freshly-dialed peer transport before
    /// its identity is known. The peer handshake race means every peer
    /// connection starts anonymous — early `SUBSCRIBE`/`UNSUBSCRIBE`/
    /// `PUBLISH` frames must still resolve against this id.
    pub fn register_peer_anonymous(&self, sender: Sender<Message>) -> PeerId {
        let mut inner = self.inner.lock();
        let id = PeerId(inner.next_peer_id);
        inner.next_peer_id += 1;
        inner.peers.insert(
            id,
            PeerEntry {
                name: String::new(),
                uri: String::new(),
                interests: PatternList::new(),
                sender,
            },
        );
        id
    }

    /// Records the peer's announced name/address on `PEER_CONNECT`. If
    /// another connection already carries the same name, that entry is
    /// replaced (last-writer-wins) rather than left to grow stale.
    pub fn register_peer(&self, id: PeerId, peer_name: String, peer_uri: String) {
        let mut inner = self.inner.lock();
        if let Some(&existing) = inner.peer_by_name.get(&peer_name) {
            if existing != id {
                debug!(peer = %peer_name, "replacing existing peer entry with same name");
                inner.peers.remove(&existing);
            }
        }
        if let Some(entry) = inner.peers.get_mut(&id) {
            entry.name = peer_name.clone();
            entry.uri = peer_uri;
            inner.peer_by_name.insert(peer_name, id);
        }
    }

    /// Adds `pattern` to the peer's advertised-interest set.
    pub fn add_peer_interest(&self, id: PeerId, pattern: String) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.peers.get_mut(&id) {
            entry.interests.push(pattern);
        }
    }

    /// Removes the first occurrence of `pattern` from the peer's
    /// advertised-interest set.
    pub fn remove_peer_interest(&self, id: PeerId, pattern: &str) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.peers.get_mut(&id) {
            if let Some(pos) = entry.interests.iter().position(|p| p == pattern) {
                entry.interests.remove(pos);
            }
        }
    }

    /// Removes `id` and discards its advertised-interest set.
    pub fn drop_peer(&self, id: PeerId) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.peers.remove(&id) {
            debug!(peer = %entry.name, interests = entry.interests.len(), "dropping peer");
            if inner.peer_by_name.get(&entry.name) == Some(&id) {
                inner.peer_by_name.remove(&entry.name);
            }
        }
    }

    /// Returns a sender for every currently-connected peer, for the
    /// unconditional `SUBSCRIBE`/`UNSUBSCRIBE` broadcast.
    #[must_use]
    pub fn all_peer_senders(&self) -> Vec<Sender<Message>> {
        self.inner
            .lock()
            .peers
            .values()
            .map(|p| p.sender.clone())
            .collect()
    }

    /// Enumerates the fan-out targets for a publish of `subject`.
    ///
    /// A client whose subscription list matches `subject` via more than one
    /// pattern is still returned exactly once. When `origin` is a peer, the
    /// second element is always empty — a relayed publish is never
    /// re-forwarded to other peers, which caps loop length at one hop.
    #[must_use]
    pub fn deliver_publish(
        &self,
        subject: &str,
        origin: Origin,
    ) -> (Vec<Sender<Message>>, Vec<Sender<Message>>) {
        let inner = self.inner.lock();

        let local_targets = inner
            .clients
            .values()
            .filter(|c| c.subscriptions.iter().any(|p| matches(subject, p)))
            .map(|c| c.sender.clone())
            .collect();

        let peer_targets = match origin {
            Origin::Peer(_) => Vec::new(),
            Origin::Local => inner
                .peers
                .values()
                .filter(|p| p.interests.iter().any(|pat| matches(subject, pat)))
                .map(|p| p.sender.clone())
                .collect(),
        };

        (local_targets, peer_targets)
    }
}
