//! # TFES Core
//!
//! Sans-IO protocol core for the TFES federated pub/sub broker:
//!
//! - **`subject`** — the subject/pattern grammar and matcher
//! - **`message`** — the wire envelope and the validated tagged-union message
//! - **`codec`** — newline-delimited JSON framing
//! - **`routing`** — the shared client/peer interest table and fan-out
//!   enumeration
//! - **`mailbox`** — the two bounded inter-plane queues
//! - **`config`** — the JSON configuration shape
//! - **`error`** — the crate-wide error type
//!
//! No networking dependency lives here — everything is unit-testable
//! without an async runtime, leaving `compio` and raw sockets to the
//! `tfes-net` crate.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod message;
pub mod routing;
pub mod subject;

/// Convenience re-exports for downstream crates.
pub mod prelude {
    pub use crate::codec::{encode, Frame, MessageDecoder, MAX_FRAME_SIZE};
    pub use crate::config::Config;
    pub use crate::error::{Result, TfesError};
    pub use crate::mailbox::{
        client_to_peer_mailbox, peer_to_client_mailbox, ClientToPeerJob, ClientToPeerReceiver,
        ClientToPeerSender, PeerToClientJob, PeerToClientReceiver, PeerToClientSender,
    };
    pub use crate::message::{
        AckBody, BountyBody, ConnectBody, Envelope, Message, PeerConnectBody, PublishBody,
        SubscriptionBody,
    };
    pub use crate::routing::{ClientId, Origin, PeerId, RoutingTable};
    pub use crate::subject::{matches, validate};
}
