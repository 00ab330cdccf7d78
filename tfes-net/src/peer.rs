//! The Peer Plane: one task per inbound or outbound federation link.
//!
//! A peer connection has no `INITIAL`/`CONNECTED` split the way a client
//! connection does — it is registered anonymously the instant the
//! transport is established (accept or dial), and `PEER_CONNECT` merely
//! attaches a name/address to that already-live [`PeerId`] whenever it
//! arrives. There is no peer-plane ACK and no reconnect loop: a dial that
//! fails is simply logged and abandoned.

use crate::io::{enable_tcp_nodelay, poll_read, write_message, ReadOutcome};
use compio::net::TcpStream;
use std::sync::Arc;
use tfes_core::codec::{Frame, MessageDecoder};
use tfes_core::config::RouteConfig;
use tfes_core::mailbox::{PeerToClientJob, PeerToClientSender};
use tfes_core::message::{Message, PeerConnectBody};
use tfes_core::routing::{PeerId, RoutingTable};
use tracing::{debug, info, warn};

use crate::client::MAX_CONSECUTIVE_READ_ERRORS;

/// Handles one already-connected peer transport (inbound or outbound) to
/// completion. Registers it anonymously, then dispatches frames until EOF,
/// a fatal decode error, or too many consecutive read errors.
async fn run(mut stream: TcpStream, table: Arc<RoutingTable>, peer_to_client: PeerToClientSender) {
    if let Err(e) = enable_tcp_nodelay(&stream) {
        warn!(error = %e, "failed to set TCP_NODELAY on peer connection");
    }

    let (out_tx, out_rx) = flume::unbounded::<Message>();
    let id = table.register_peer_anonymous(out_tx);
    let mut decoder = MessageDecoder::new();
    let mut consecutive_errors = 0u32;

    'conn: loop {
        while let Ok(msg) = out_rx.try_recv() {
            if let Err(e) = write_message(&mut stream, &msg).await {
                warn!(error = %e, "write failed on peer connection");
                break 'conn;
            }
        }

        match poll_read(&mut stream).await {
            ReadOutcome::TimedOut => continue,
            ReadOutcome::Eof => break,
            ReadOutcome::Err(e) => {
                consecutive_errors += 1;
                debug!(error = %e, consecutive_errors, "transient read error on peer connection");
                if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                    warn!("dropping peer connection after too many consecutive read errors");
                    break;
                }
                continue;
            }
            ReadOutcome::Data(chunk) => {
                consecutive_errors = 0;
                decoder.feed(&chunk);
                loop {
                    match decoder.next_frame() {
                        Err(e) => {
                            warn!(error = %e, "oversized or unrecoverable frame on peer connection");
                            break 'conn;
                        }
                        Ok(None) => break,
                        Ok(Some(Frame::Invalid(e))) => {
                            debug!(error = %e, "malformed frame on peer connection, ignoring");
                        }
                        Ok(Some(Frame::Message(msg))) => {
                            handle_message(msg, id, &table, &peer_to_client).await;
                        }
                    }
                }
            }
        }
    }

    table.drop_peer(id);
}

/// Dispatches one frame already attributed to peer `id`. Peer-plane frames
/// never produce a reply of any kind.
async fn handle_message(
    msg: Message,
    id: PeerId,
    table: &RoutingTable,
    peer_to_client: &PeerToClientSender,
) {
    match msg {
        Message::PeerConnect { body, .. } => {
            info!(peer_name = %body.peer_name, "peer identified itself");
            table.register_peer(id, body.peer_name, body.advertise_addr);
        }
        Message::Subscribe { subject, .. } => {
            table.add_peer_interest(id, subject);
        }
        Message::Unsubscribe { subject, .. } => {
            table.remove_peer_interest(id, &subject);
        }
        Message::Publish { header, body } => {
            let subject = body.subject.clone();
            let message = Message::Publish { header, body };
            // Local fan-out happens in the client plane's broadcast task
            // once it dequeues this job; one-hop loop prevention means it
            // is never forwarded on to other peers.
            let job = PeerToClientJob {
                origin: id,
                subject,
                message,
            };
            let _ = peer_to_client.send_async(job).await;
        }
        Message::Connect { .. } | Message::Ack { .. } | Message::Bounty { .. } => {
            debug!("ignoring client-plane-only message kind on peer connection");
        }
    }
}

/// Runs a freshly-accepted inbound peer connection.
pub async fn handle_inbound(
    stream: TcpStream,
    table: Arc<RoutingTable>,
    peer_to_client: PeerToClientSender,
) {
    run(stream, table, peer_to_client).await;
}

/// Dials one configured route, announces this broker's identity, then
/// services the connection exactly like an inbound peer. Never retried —
/// a failed dial is only logged, and the route stays unreachable until the
/// process is restarted.
pub async fn dial(
    route: RouteConfig,
    local_identity: PeerConnectBody,
    table: Arc<RoutingTable>,
    peer_to_client: PeerToClientSender,
) {
    let mut stream = match TcpStream::connect(&route.url).await {
        Ok(s) => s,
        Err(e) => {
            warn!(route = %route.name, url = %route.url, error = %e, "failed to dial peer route, not retrying");
            return;
        }
    };

    let announce = Message::PeerConnect {
        header: None,
        body: local_identity,
    };
    if let Err(e) = write_message(&mut stream, &announce).await {
        warn!(route = %route.name, error = %e, "failed to announce identity to dialed peer");
        return;
    }

    info!(route = %route.name, url = %route.url, "dialed peer route");
    run(stream, table, peer_to_client).await;
}
