//! Shared test scaffolding: a minimal in-process broker wiring plus a raw
//! NDJSON client usable from either plane, driven over real sockets —
//! `compio::runtime::spawn` for concurrent tasks, `compio::time::timeout`
//! to bound a `recv`.

#![allow(dead_code)]

use compio::buf::BufResult;
use compio::io::{AsyncReadExt, AsyncWriteExt};
use compio::net::TcpStream;
use compio::time::timeout;
use std::sync::Arc;
use std::time::Duration;
use tfes_core::codec::{encode, Frame, MessageDecoder};
use tfes_core::mailbox::{client_to_peer_mailbox, peer_to_client_mailbox};
use tfes_core::message::Message;
use tfes_core::routing::RoutingTable;
use tfes_net::{broadcast, client, peer};

/// How long a test `recv` waits before concluding nothing arrived.
pub const RECV_TIMEOUT: Duration = Duration::from_millis(500);

/// A bare NDJSON peer over a raw `TcpStream`, standing in for a real TFES
/// client or peer in tests.
pub struct RawConn {
    stream: TcpStream,
    decoder: MessageDecoder,
}

impl RawConn {
    pub async fn connect(addr: &str) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        Self {
            stream,
            decoder: MessageDecoder::new(),
        }
    }

    pub async fn send(&mut self, msg: &Message) {
        let frame = encode(msg).expect("encode");
        let BufResult(res, _) = self.stream.write_all(frame).await;
        res.expect("write");
    }

    /// Waits up to [`RECV_TIMEOUT`] for the next decoded message.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            if let Some(frame) = self.decoder.next_frame().expect("decode") {
                return match frame {
                    Frame::Message(msg) => Some(msg),
                    Frame::Invalid(e) => panic!("unexpected invalid frame: {e}"),
                };
            }

            let buf = vec![0u8; 4096];
            match timeout(RECV_TIMEOUT, self.stream.read(buf)).await {
                Ok(BufResult(Ok(0), _)) => return None,
                Ok(BufResult(Ok(n), buf)) => self.decoder.feed(&buf[..n]),
                Ok(BufResult(Err(e), _)) => panic!("read error: {e}"),
                Err(_elapsed) => return None,
            }
        }
    }

    /// Asserts no frame arrives within the timeout.
    pub async fn expect_silence(&mut self) {
        assert!(
            self.recv().await.is_none(),
            "expected no frame, but one arrived"
        );
    }
}

/// A fully wired broker (both planes, both broadcast tasks) bound to
/// ephemeral ports and running as tasks on the caller's own runtime.
pub struct TestBroker {
    pub table: Arc<RoutingTable>,
    pub client_addr: String,
    pub peer_addr: String,
}

impl TestBroker {
    pub async fn start() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        let table = Arc::new(RoutingTable::new());

        let (c2p_tx, c2p_rx) = client_to_peer_mailbox();
        let (p2c_tx, p2c_rx) = peer_to_client_mailbox();

        compio::runtime::spawn(broadcast::run_client_to_peer(table.clone(), c2p_rx)).detach();
        compio::runtime::spawn(broadcast::run_peer_to_client(table.clone(), p2c_rx)).detach();

        let client_listener = compio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind client listener");
        let client_addr = client_listener.local_addr().expect("client addr").to_string();

        let peer_listener = compio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind peer listener");
        let peer_addr = peer_listener.local_addr().expect("peer addr").to_string();

        let table_for_clients = table.clone();
        let c2p_tx_for_clients = c2p_tx.clone();
        compio::runtime::spawn(async move {
            loop {
                let (stream, _addr) = match client_listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => return,
                };
                let table = table_for_clients.clone();
                let c2p_tx = c2p_tx_for_clients.clone();
                compio::runtime::spawn(client::handle_client(stream, table, c2p_tx)).detach();
            }
        })
        .detach();

        let table_for_peers = table.clone();
        let p2c_tx_for_peers = p2c_tx.clone();
        compio::runtime::spawn(async move {
            loop {
                let (stream, _addr) = match peer_listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => return,
                };
                let table = table_for_peers.clone();
                let p2c_tx = p2c_tx_for_peers.clone();
                compio::runtime::spawn(peer::handle_inbound(stream, table, p2c_tx)).detach();
            }
        })
        .detach();

        Self {
            table,
            client_addr,
            peer_addr,
        }
    }
}

pub fn connect_body(client_id: &str, suppress_acks: bool) -> Message {
    Message::Connect {
        header: None,
        body: tfes_core::message::ConnectBody {
            client_id: client_id.to_string(),
            suppress_acks,
            ..Default::default()
        },
    }
}

pub fn publish(subject: &str, body: serde_json::Value) -> Message {
    Message::Publish {
        header: None,
        body: tfes_core::message::PublishBody {
            subject: subject.to_string(),
            reply_to: String::new(),
            body,
        },
    }
}

pub fn subscribe(subject: &str) -> Message {
    Message::Subscribe {
        header: None,
        subject: subject.to_string(),
    }
}

pub fn peer_connect(peer_name: &str, advertise_addr: &str) -> Message {
    Message::PeerConnect {
        header: None,
        body: tfes_core::message::PeerConnectBody {
            peer_name: peer_name.to_string(),
            advertise_addr: advertise_addr.to_string(),
        },
    }
}
