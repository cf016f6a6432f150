use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::RwLock;
use tokio_tungstenite::connect_async;
use tracing::{event, Level};

use crate::crypto::CourierPublicKey;
use crate::keypair::Keypair;
use crate::networking::directory::{ClientDirectory, PeerDirectory};
use crate::networking::filters::ws_upgrade_route_filter;
use crate::networking::frame::Frame;
use crate::networking::handshake::{self, ChallengesDB};
use crate::networking::locator::PendingQueries;
use crate::networking::peer::{
    cleanup_session, close_session, handle_session_frame, new_session_id,
    register_outbound_session, send_frame_to_session, SessionId, SessionKind,
};
use crate::CourierError;

/// Shared state of one relay node. Cloning is cheap; every task driving a
/// session holds a clone. The directories, the challenge table and the
/// pending-query table are only ever mutated through these handles.
#[derive(Clone)]
pub struct Relay {
    pub keypair_lock: Arc<RwLock<Keypair>>,
    pub clients_lock: Arc<RwLock<ClientDirectory>>,
    pub peers_lock: Arc<RwLock<PeerDirectory>>,
    pub challenges_lock: Arc<RwLock<ChallengesDB>>,
    pub pending_lock: Arc<RwLock<PendingQueries>>,
    /// Our own advertised URL; compared by exact string equality to suppress
    /// self-dials and self-records.
    pub listen_url: String,
}

impl Relay {
    pub fn new(keypair: Keypair, listen_url: String) -> Relay {
        Relay {
            keypair_lock: Arc::new(RwLock::new(keypair)),
            clients_lock: Arc::new(RwLock::new(ClientDirectory::new())),
            peers_lock: Arc::new(RwLock::new(PeerDirectory::new())),
            challenges_lock: Arc::new(RwLock::new(ChallengesDB::new())),
            pending_lock: Arc::new(RwLock::new(PendingQueries::new())),
            listen_url,
        }
    }

    pub async fn publickey(&self) -> CourierPublicKey {
        self.keypair_lock.read().await.get_publickey()
    }

    /// Classification of a session, derived from directory membership.
    pub async fn session_kind(&self, session_id: &SessionId) -> SessionKind {
        if self
            .clients_lock
            .read()
            .await
            .key_for_session(session_id)
            .is_some()
        {
            return SessionKind::Client;
        }
        if self
            .peers_lock
            .read()
            .await
            .key_for_session(session_id)
            .is_some()
        {
            return SessionKind::Peer;
        }
        SessionKind::Unset
    }

    /// Send one frame to every peer session currently attached.
    pub async fn broadcast_to_peers(&self, frame: &Frame) {
        let sessions = {
            let peers = self.peers_lock.read().await;
            peers.attached_sessions()
        };
        for session_id in sessions {
            send_frame_to_session(frame, &session_id).await;
        }
    }
}

/// The listening side of a node: binds the websocket port and dials the
/// seed peers handed to it at startup.
pub struct Network {
    relay: Relay,
    port: u16,
    seed_peers: Vec<String>,
}

impl Network {
    pub fn new(relay: Relay, port: u16, seed_peers: Vec<String>) -> Network {
        Network {
            relay,
            port,
            seed_peers,
        }
    }

    pub async fn run(&self) -> crate::Result<()> {
        let routes = ws_upgrade_route_filter(&self.relay);

        for seed in &self.seed_peers {
            event!(Level::INFO, "dialing seed peer {}", seed);
            tokio::spawn(connect_to_peer(self.relay.clone(), seed.clone()));
        }

        let addr: SocketAddr = ([0, 0, 0, 0], self.port).into();
        let (bound_addr, server) = warp::serve(routes)
            .try_bind_ephemeral(addr)
            .map_err(|e| CourierError::Transport(format!("failed to bind {}: {}", addr, e)))?;
        event!(Level::INFO, "listening on {}", bound_addr);
        server.await;
        Ok(())
    }
}

/// Dial a peer URL, pre-mark the session as a peer, greet it with a
/// challenge and then drive it exactly like an inbound session. Dial
/// failures are logged and never retried; a sessionless peer record for the
/// address, if any, stays dialable.
pub fn connect_to_peer(relay: Relay, address: String) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        if address == relay.listen_url {
            event!(Level::DEBUG, "refusing to dial our own address {}", address);
            return;
        }
        let url = match url::Url::parse(&address) {
            Ok(url) => url,
            Err(e) => {
                event!(Level::WARN, "invalid peer address {}: {}", address, e);
                return;
            }
        };
        let (ws_stream, _) = match connect_async(url.as_str()).await {
            Ok(connected) => connected,
            Err(e) => {
                event!(Level::WARN, "failed to dial peer {}: {}", address, e);
                return;
            }
        };

        let (write_sink, mut read_stream) = ws_stream.split();
        let session_id = new_session_id();
        register_outbound_session(session_id, write_sink).await;
        event!(
            Level::DEBUG,
            "outbound session {} open to {}",
            hex::encode(session_id),
            address
        );

        handshake::initiate_handshake(&relay, session_id, true, Some(address.clone())).await;

        while let Some(result) = read_stream.next().await {
            let msg = match result {
                Ok(msg) => msg,
                Err(e) => {
                    event!(
                        Level::DEBUG,
                        "error receiving ws message from {}: {}",
                        address,
                        e
                    );
                    break;
                }
            };
            if msg.is_close() {
                break;
            }
            if !msg.is_binary() {
                continue;
            }
            let data = msg.into_data();
            if let Err(e) = handle_session_frame(&relay, session_id, &data).await {
                event!(
                    Level::WARN,
                    "closing outbound session {}: {}",
                    hex::encode(session_id),
                    e
                );
                break;
            }
        }

        close_session(&session_id).await;
        cleanup_session(&relay, &session_id).await;
        event!(
            Level::DEBUG,
            "outbound session {} to {} closed",
            hex::encode(session_id),
            address
        );
    })
}
