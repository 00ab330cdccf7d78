//! The two single-consumer broadcast tasks that actually cross the planes.
//!
//! Neither of these does any decoding — they only turn a queued job into
//! `flume::Sender::send` calls against the routing table's per-connection
//! channels.

use std::sync::Arc;
use tfes_core::mailbox::{
    ClientToPeerJob, ClientToPeerReceiver, PeerToClientJob, PeerToClientReceiver,
};
use tfes_core::message::Message;
use tfes_core::routing::{Origin, RoutingTable};
use tracing::debug;

/// Drains the client→peer mailbox, writing each job to every peer
/// connection it applies to.
///
/// Runs until the mailbox's last sender is dropped (broker shutdown).
pub async fn run_client_to_peer(table: Arc<RoutingTable>, rx: ClientToPeerReceiver) {
    while let Ok(job) = rx.recv_async().await {
        match job {
            ClientToPeerJob::Broadcast(msg) => {
                let targets = table.all_peer_senders();
                debug!(peers = targets.len(), "broadcasting subscription change to peers");
                for target in targets {
                    let _ = target.send(msg.clone());
                }
            }
            ClientToPeerJob::Publish { subject, message } => {
                let (_local, peer_targets) = table.deliver_publish(&subject, Origin::Local);
                for target in peer_targets {
                    let _ = target.send(message.clone());
                }
            }
        }
    }
}

/// Drains the peer→client mailbox, delivering each relayed `PUBLISH` as a
/// `BOUNTY` to every matching local client.
///
/// Runs until the mailbox's last sender is dropped (broker shutdown).
pub async fn run_peer_to_client(table: Arc<RoutingTable>, rx: PeerToClientReceiver) {
    while let Ok(job) = rx.recv_async().await {
        let PeerToClientJob {
            origin,
            subject,
            message,
        } = job;

        let Some((header, body)) = (match &message {
            Message::Publish { header, body } => Some((header.clone(), body.clone())),
            _ => None,
        }) else {
            continue;
        };

        let (local_targets, _peers) = table.deliver_publish(&subject, Origin::Peer(origin));
        let bounty = Message::bounty_from_publish(header, &body);
        debug!(targets = local_targets.len(), %subject, "delivering relayed publish to local clients");
        for target in local_targets {
            let _ = target.send(bounty.clone());
        }
    }
}
