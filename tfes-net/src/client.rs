//! The Client Plane: one task per accepted client connection.
//!
//! Drives the `INITIAL` → `CONNECTED` state machine, hands `PUBLISH` to the
//! routing table, writes `BOUNTY`s to matching local clients directly, and
//! forwards cross-plane traffic (the unconditional `SUBSCRIBE`/
//! `UNSUBSCRIBE` broadcast, and peer-bound `PUBLISH` copies) onto the
//! client→peer mailbox for the peer plane's broadcast task to deliver.

use crate::io::{enable_tcp_nodelay, poll_read, write_message, ReadOutcome};
use compio::net::TcpStream;
use std::sync::Arc;
use tfes_core::codec::{Frame, MessageDecoder};
use tfes_core::mailbox::{ClientToPeerJob, ClientToPeerSender};
use tfes_core::message::Message;
use tfes_core::routing::{ClientId, Origin, RoutingTable};
use tfes_core::subject::validate;
use tracing::{debug, warn};

/// A client connection is dropped after this many consecutive non-EOF read
/// errors, to avoid livelock on a connection that keeps erroring without
/// ever reaching EOF.
pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 16;

enum ClientState {
    Initial,
    Connected { id: ClientId, suppress_acks: bool },
}

/// Runs one client connection to completion (EOF, unrecoverable error, or
/// the consecutive-error threshold).
pub async fn handle_client(
    mut stream: TcpStream,
    table: Arc<RoutingTable>,
    client_to_peer: ClientToPeerSender,
) {
    if let Err(e) = enable_tcp_nodelay(&stream) {
        warn!(error = %e, "failed to set TCP_NODELAY on client connection");
    }

    let (out_tx, out_rx) = flume::unbounded::<Message>();
    let mut decoder = MessageDecoder::new();
    let mut state = ClientState::Initial;
    let mut consecutive_errors = 0u32;

    'conn: loop {
        // Drain anything queued for this client (bounties, and any other
        // broker-originated frame) before polling the socket again. Never
        // suppressed, regardless of the client's suppress_acks setting.
        while let Ok(msg) = out_rx.try_recv() {
            if let Err(e) = write_message(&mut stream, &msg).await {
                warn!(error = %e, "write failed on client connection");
                break 'conn;
            }
        }

        match poll_read(&mut stream).await {
            ReadOutcome::TimedOut => continue,
            ReadOutcome::Eof => break,
            ReadOutcome::Err(e) => {
                consecutive_errors += 1;
                debug!(error = %e, consecutive_errors, "transient read error on client connection");
                if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                    warn!("dropping client connection after too many consecutive read errors");
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
                            warn!(error = %e, "oversized or unrecoverable frame on client connection");
                            break 'conn;
                        }
                        Ok(None) => break,
                        Ok(Some(Frame::Invalid(e))) => {
                            // Unconditional, unlike the per-command ACKs below:
                            // a client can't have asked to suppress an ACK for
                            // a message it never successfully sent.
                            let _ = write_message(&mut stream, &Message::ack_err(e.to_string()))
                                .await;
                        }
                        Ok(Some(Frame::Message(msg))) => {
                            if !handle_message(
                                msg,
                                &mut state,
                                &table,
                                &client_to_peer,
                                &out_tx,
                                &mut stream,
                            )
                            .await
                            {
                                break 'conn;
                            }
                        }
                    }
                }
            }
        }
    }

    if let ClientState::Connected { id, .. } = state {
        table.drop_client(id);
    }
}

/// Handles one decoded message. Returns `false` if the connection should be
/// torn down (a write failed).
async fn handle_message(
    msg: Message,
    state: &mut ClientState,
    table: &Arc<RoutingTable>,
    client_to_peer: &ClientToPeerSender,
    out_tx: &flume::Sender<Message>,
    stream: &mut TcpStream,
) -> bool {
    match state {
        ClientState::Initial => match msg {
            Message::Connect { body, .. } => {
                let uri = if body.client_group.is_empty() {
                    body.client_id.clone()
                } else {
                    format!("{}:{}", body.client_id, body.client_group)
                };
                let suppress_acks = body.suppress_acks;
                let id = table.register_client(uri, out_tx.clone());
                *state = ClientState::Connected { id, suppress_acks };
                if !suppress_acks {
                    return write_message(stream, &Message::ack_ok()).await.is_ok();
                }
                true
            }
            _ => write_message(
                stream,
                &Message::ack_err("expected CONNECT before any other command"),
            )
            .await
            .is_ok(),
        },
        ClientState::Connected { id, suppress_acks } => {
            let id = *id;
            let suppress_acks = *suppress_acks;
            match msg {
                Message::Publish { header, body } => {
                    let (local_targets, _peers_handled_by_mailbox) =
                        table.deliver_publish(&body.subject, Origin::Local);
                    let bounty = Message::bounty_from_publish(header.clone(), &body);
                    for target in local_targets {
                        let _ = target.send(bounty.clone());
                    }

                    let job = ClientToPeerJob::Publish {
                        subject: body.subject.clone(),
                        message: Message::Publish { header, body },
                    };
                    // Blocks this connection's task if the mailbox is full —
                    // the documented backpressure path.
                    let _ = client_to_peer.send_async(job).await;

                    if !suppress_acks {
                        return write_message(stream, &Message::ack_ok()).await.is_ok();
                    }
                    true
                }
                Message::Subscribe { header, subject } => {
                    if let Err(e) = validate(&subject) {
                        return write_message(stream, &Message::ack_err(e.to_string()))
                            .await
                            .is_ok();
                    }
                    table.add_client_subscription(id, subject.clone());
                    let job = ClientToPeerJob::Broadcast(Message::Subscribe { header, subject });
                    let _ = client_to_peer.send_async(job).await;

                    if !suppress_acks {
                        return write_message(stream, &Message::ack_ok()).await.is_ok();
                    }
                    true
                }
                Message::Unsubscribe { header, subject } => {
                    if let Err(e) = validate(&subject) {
                        return write_message(stream, &Message::ack_err(e.to_string()))
                            .await
                            .is_ok();
                    }
                    table.remove_client_subscription(id, &subject);
                    let job =
                        ClientToPeerJob::Broadcast(Message::Unsubscribe { header, subject });
                    let _ = client_to_peer.send_async(job).await;

                    if !suppress_acks {
                        return write_message(stream, &Message::ack_ok()).await.is_ok();
                    }
                    true
                }
                Message::Connect { .. } => write_message(
                    stream,
                    &Message::ack_err("already connected"),
                )
                .await
                .is_ok(),
                Message::Ack { .. } | Message::Bounty { .. } | Message::PeerConnect { .. } => {
                    write_message(
                        stream,
                        &Message::ack_err("unexpected message kind on a client connection"),
                    )
                    .await
                    .is_ok()
                }
            }
        }
    }
}
