//! The two bounded inter-plane mailboxes.
//!
//! The client plane and peer plane each run a single broadcast task that
//! drains one of these mailboxes and performs the actual cross-plane
//! writes; nothing here does I/O itself, it only routes already-decoded
//! messages between the two broadcast tasks. Both mailboxes are bounded
//! at [`MAILBOX_CAPACITY`]; a full mailbox makes the sender block, which is
//! the documented backpressure path — a slow peer can stall local clients,
//! and that is accepted, not a bug.

use crate::message::Message;
use crate::routing::PeerId;
use flume::{Receiver, Sender};

/// Capacity of both inter-plane mailboxes.
pub const MAILBOX_CAPACITY: usize = 200;

/// A job crossing from the client plane into the peer plane.
#[derive(Debug, Clone)]
pub enum ClientToPeerJob {
    /// A local client issued `SUBSCRIBE`/`UNSUBSCRIBE`; broadcast verbatim
    /// to every currently-connected peer.
    Broadcast(Message),
    /// A local client published `message` on `subject`; forward it to
    /// every peer whose advertised interest matches.
    Publish { subject: String, message: Message },
}

/// A job crossing from the peer plane into the client plane: a `PUBLISH`
/// relayed from `origin`, to be delivered as a `BOUNTY` to matching local
/// clients only (never re-forwarded to other peers).
#[derive(Debug, Clone)]
pub struct PeerToClientJob {
    pub origin: PeerId,
    pub subject: String,
    pub message: Message,
}

/// Sending half of the client-plane → peer-plane mailbox.
pub type ClientToPeerSender = Sender<ClientToPeerJob>;
/// Receiving half of the client-plane → peer-plane mailbox.
pub type ClientToPeerReceiver = Receiver<ClientToPeerJob>;
/// Sending half of the peer-plane → client-plane mailbox.
pub type PeerToClientSender = Sender<PeerToClientJob>;
/// Receiving half of the peer-plane → client-plane mailbox.
pub type PeerToClientReceiver = Receiver<PeerToClientJob>;

/// Creates the bounded client-plane → peer-plane mailbox.
#[must_use]
pub fn client_to_peer_mailbox() -> (ClientToPeerSender, ClientToPeerReceiver) {
    flume::bounded(MAILBOX_CAPACITY)
}

/// Creates the bounded peer-plane → client-plane mailbox.
#[must_use]
pub fn peer_to_client_mailbox() -> (PeerToClientSender, PeerToClientReceiver) {
    flume::bounded(MAILBOX_CAPACITY)
}
