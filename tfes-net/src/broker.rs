//! Wires the client-plane listener, the cluster-plane listener, the
//! configured dialer, the shared routing table, and both broadcast tasks
//! into one running broker.
//!
//! Each accepted (or dialed) connection gets its own OS thread running its
//! own fresh [`compio::runtime::Runtime`], since `compio`'s `io_uring`
//! reactor is inherently per-thread. A soft cap bounds how many of these
//! can be live at once.

use crate::io::write_message;
use crate::{broadcast, client, peer};
use compio::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tfes_core::config::Config;
use tfes_core::error::TfesError;
use tfes_core::mailbox::{
    client_to_peer_mailbox, peer_to_client_mailbox, ClientToPeerSender, PeerToClientSender,
};
use tfes_core::message::{Message, PeerConnectBody};
use tfes_core::routing::RoutingTable;
use tracing::{error, info, warn};

/// Live accept-loop connection threads are capped at
/// `num_cpus::get() * CONNECTION_THREADS_PER_CPU`. Not mandated by spec —
/// an unbounded one-thread-per-connection accept loop is an operational
/// hazard worth a stated ceiling.
const CONNECTION_THREADS_PER_CPU: usize = 256;

/// Runs the broker until the client or cluster listener fails to bind.
/// Accept loops and the dialer run forever once started; this only
/// returns on a startup error.
///
/// # Errors
///
/// Returns an error if either listener fails to bind.
pub async fn run(config: Config) -> Result<(), TfesError> {
    let table = Arc::new(RoutingTable::new());
    let connection_cap = num_cpus::get() * CONNECTION_THREADS_PER_CPU;
    let active_connections = Arc::new(AtomicUsize::new(0));

    let (c2p_tx, c2p_rx) = client_to_peer_mailbox();
    let (p2c_tx, p2c_rx) = peer_to_client_mailbox();

    compio::runtime::spawn(broadcast::run_client_to_peer(table.clone(), c2p_rx)).detach();
    compio::runtime::spawn(broadcast::run_peer_to_client(table.clone(), p2c_rx)).detach();

    let local_identity = PeerConnectBody {
        peer_name: config.server.name.clone(),
        advertise_addr: config.cluster_addr(),
    };
    for route in config.cluster.routes.clone() {
        let table = table.clone();
        let p2c_tx = p2c_tx.clone();
        let identity = local_identity.clone();
        compio::runtime::spawn(async move {
            peer::dial(route, identity, table, p2c_tx).await;
        })
        .detach();
    }

    let client_listener = TcpListener::bind(config.client_addr())
        .await
        .map_err(|e| TfesError::config(format!("binding client listener: {e}")))?;
    info!(addr = %config.client_addr(), "client plane listening");

    let cluster_listener = TcpListener::bind(config.cluster_addr())
        .await
        .map_err(|e| TfesError::config(format!("binding cluster listener: {e}")))?;
    info!(addr = %config.cluster_addr(), "cluster plane listening");

    let client_loop = accept_client_connections(
        client_listener,
        table.clone(),
        c2p_tx,
        active_connections.clone(),
        connection_cap,
    );
    let peer_loop = accept_peer_connections(
        cluster_listener,
        table,
        p2c_tx,
        active_connections,
        connection_cap,
    );

    futures::join!(client_loop, peer_loop);
    Ok(())
}

async fn accept_client_connections(
    listener: TcpListener,
    table: Arc<RoutingTable>,
    c2p_tx: ClientToPeerSender,
    active: Arc<AtomicUsize>,
    cap: usize,
) {
    loop {
        match listener.accept().await {
            Ok((mut stream, addr)) => {
                if active.load(Ordering::Relaxed) >= cap {
                    warn!(%addr, cap, "client connection cap reached, rejecting connection");
                    let _ = write_message(
                        &mut stream,
                        &Message::ack_err("broker connection cap reached"),
                    )
                    .await;
                    drop(stream);
                    continue;
                }
                active.fetch_add(1, Ordering::Relaxed);
                let table = table.clone();
                let c2p_tx = c2p_tx.clone();
                let active = active.clone();
                std::thread::spawn(move || {
                    let rt = match compio::runtime::Runtime::new() {
                        Ok(rt) => rt,
                        Err(e) => {
                            error!(error = %e, "failed to start runtime for client connection");
                            active.fetch_sub(1, Ordering::Relaxed);
                            return;
                        }
                    };
                    rt.block_on(client::handle_client(stream, table, c2p_tx));
                    active.fetch_sub(1, Ordering::Relaxed);
                });
            }
            Err(e) => {
                error!(error = %e, "client listener accept failed");
            }
        }
    }
}

async fn accept_peer_connections(
    listener: TcpListener,
    table: Arc<RoutingTable>,
    p2c_tx: PeerToClientSender,
    active: Arc<AtomicUsize>,
    cap: usize,
) {
    loop {
        match listener.accept().await {
            Ok((mut stream, addr)) => {
                if active.load(Ordering::Relaxed) >= cap {
                    warn!(%addr, cap, "peer connection cap reached, rejecting connection");
                    let _ = write_message(
                        &mut stream,
                        &Message::ack_err("broker connection cap reached"),
                    )
                    .await;
                    drop(stream);
                    continue;
                }
                active.fetch_add(1, Ordering::Relaxed);
                let table = table.clone();
                let p2c_tx = p2c_tx.clone();
                let active = active.clone();
                std::thread::spawn(move || {
                    let rt = match compio::runtime::Runtime::new() {
                        Ok(rt) => rt,
                        Err(e) => {
                            error!(error = %e, "failed to start runtime for peer connection");
                            active.fetch_sub(1, Ordering::Relaxed);
                            return;
                        }
                    };
                    rt.block_on(peer::handle_inbound(stream, table, p2c_tx));
                    active.fetch_sub(1, Ordering::Relaxed);
                });
            }
            Err(e) => {
                error!(error = %e, "cluster listener accept failed");
            }
        }
    }
}
