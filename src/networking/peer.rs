use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::SplitSink;
use futures::{FutureExt, SinkExt, StreamExt};
use lazy_static::lazy_static;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::{tungstenite, MaybeTlsStream, WebSocketStream};
use tracing::{event, Level};
use uuid::Uuid;
use warp::ws::{Message, WebSocket};

use crate::crypto::{hash, CourierHash};
use crate::networking::frame::{Frame, FrameType};
use crate::networking::handshake;
use crate::networking::network::Relay;
use crate::networking::node_info;
use crate::networking::router;
use crate::CourierError;

/// Opaque per-session identifier, used for registry keys and logs.
pub type SessionId = CourierHash;

/// What a session has authenticated as. `Unset` sessions may only exchange
/// HANDSHAKE frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Unset,
    Client,
    Peer,
}

/// Send half of a session the listener accepted.
pub struct InboundSession {
    pub sender: mpsc::UnboundedSender<std::result::Result<Message, warp::Error>>,
}

/// Send half of a session this node dialed.
pub struct OutboundSession {
    pub write_sink:
        SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, tungstenite::protocol::Message>,
}

pub type InboundSessionsDB = HashMap<SessionId, InboundSession>;
pub type OutboundSessionsDB = HashMap<SessionId, OutboundSession>;

lazy_static! {
    pub static ref INBOUND_SESSIONS_GLOBAL: Arc<tokio::sync::RwLock<InboundSessionsDB>> =
        Arc::new(tokio::sync::RwLock::new(InboundSessionsDB::new()));
    pub static ref OUTBOUND_SESSIONS_GLOBAL: Arc<tokio::sync::RwLock<OutboundSessionsDB>> =
        Arc::new(tokio::sync::RwLock::new(OutboundSessionsDB::new()));
}

pub fn new_session_id() -> SessionId {
    hash(Uuid::new_v4().as_bytes())
}

pub async fn register_inbound_session(
    session_id: SessionId,
    sender: mpsc::UnboundedSender<std::result::Result<Message, warp::Error>>,
) {
    INBOUND_SESSIONS_GLOBAL
        .write()
        .await
        .insert(session_id, InboundSession { sender });
}

pub async fn register_outbound_session(
    session_id: SessionId,
    write_sink: SplitSink<
        WebSocketStream<MaybeTlsStream<TcpStream>>,
        tungstenite::protocol::Message,
    >,
) {
    OUTBOUND_SESSIONS_GLOBAL
        .write()
        .await
        .insert(session_id, OutboundSession { write_sink });
}

/// Enqueue one frame on a session. Returns false if the session is gone or
/// its transport has failed; in-flight sends to a closed session are simply
/// discarded.
pub async fn send_frame_to_session(frame: &Frame, session_id: &SessionId) -> bool {
    let serialized = frame.serialize();
    {
        let inbound_sessions = INBOUND_SESSIONS_GLOBAL.read().await;
        if let Some(session) = inbound_sessions.get(session_id) {
            return session
                .sender
                .send(Ok(Message::binary(serialized)))
                .is_ok();
        }
    }
    let mut outbound_sessions = OUTBOUND_SESSIONS_GLOBAL.write().await;
    if let Some(session) = outbound_sessions.get_mut(session_id) {
        return session
            .write_sink
            .send(tungstenite::protocol::Message::Binary(serialized))
            .await
            .is_ok();
    }
    false
}

pub async fn session_is_open(session_id: &SessionId) -> bool {
    if INBOUND_SESSIONS_GLOBAL.read().await.contains_key(session_id) {
        return true;
    }
    OUTBOUND_SESSIONS_GLOBAL
        .read()
        .await
        .contains_key(session_id)
}

/// Close the transport of a session. Dropping an inbound sender terminates
/// its forwarding task, which closes the websocket; an outbound sink is
/// closed explicitly. The session's own read loop performs directory
/// cleanup when it observes the close.
pub async fn close_session(session_id: &SessionId) {
    if INBOUND_SESSIONS_GLOBAL
        .write()
        .await
        .remove(session_id)
        .is_some()
    {
        return;
    }
    if let Some(mut session) = OUTBOUND_SESSIONS_GLOBAL.write().await.remove(session_id) {
        let _ = session.write_sink.close().await;
    }
}

/// Remove every reference a dead session still holds: its challenge, its
/// client record, and its peer-record attachment (the peer record itself is
/// retained so the address stays dialable). Pending queries are left to
/// their own deadlines.
pub async fn cleanup_session(relay: &Relay, session_id: &SessionId) {
    relay.challenges_lock.write().await.remove(session_id);
    if let Some(record) = relay.clients_lock.write().await.remove_by_session(session_id) {
        event!(
            Level::INFO,
            "client {} disconnected",
            hex::encode(record.publickey)
        );
    }
    if let Some(publickey) = relay.peers_lock.write().await.detach_session(session_id) {
        event!(Level::INFO, "peer {} disconnected", hex::encode(publickey));
    }
}

/// Drive one inbound websocket: split it, pump outgoing frames through an
/// unbounded channel, greet the unauthenticated session with a challenge,
/// then dispatch its frames in arrival order until it closes.
pub async fn handle_inbound_session(ws: WebSocket, relay: Relay) {
    let (session_ws_sender, mut session_ws_rcv) = ws.split();
    let (session_sender, session_rcv) = mpsc::unbounded_channel();
    let session_rcv = UnboundedReceiverStream::new(session_rcv);
    tokio::task::spawn(session_rcv.forward(session_ws_sender).map(|result| {
        if let Err(e) = result {
            event!(Level::DEBUG, "error sending websocket msg: {}", e);
        }
    }));

    let session_id = new_session_id();
    register_inbound_session(session_id, session_sender).await;
    event!(
        Level::DEBUG,
        "inbound session {} open",
        hex::encode(session_id)
    );

    handshake::initiate_handshake(&relay, session_id, false, None).await;

    while let Some(result) = session_ws_rcv.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                event!(
                    Level::DEBUG,
                    "error receiving ws message for session {}: {}",
                    hex::encode(session_id),
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
        if let Err(e) = handle_session_frame(&relay, session_id, msg.as_bytes()).await {
            event!(
                Level::WARN,
                "closing session {}: {}",
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
        "inbound session {} closed",
        hex::encode(session_id)
    );
}

/// Decode one websocket message and route it by frame type. An error return
/// closes the session; handlers deal with merely-malformed payloads
/// internally by logging and dropping the frame.
pub async fn handle_session_frame(
    relay: &Relay,
    session_id: SessionId,
    bytes: &[u8],
) -> crate::Result<()> {
    let frame = Frame::deserialize(bytes)?;
    match frame.frame_type {
        FrameType::Handshake => {
            handshake::handle_handshake_frame(relay, session_id, &frame).await
        }
        FrameType::Data | FrameType::SignedData => {
            match relay.session_kind(&session_id).await {
                SessionKind::Unset => Err(CourierError::Handshake(
                    "data frame on unauthenticated session",
                )),
                _ => router::route_data_frame(relay, session_id, frame).await,
            }
        }
        FrameType::NodeInfo => match relay.session_kind(&session_id).await {
            SessionKind::Unset => Err(CourierError::Handshake(
                "node-info frame on unauthenticated session",
            )),
            kind => node_info::handle_node_info_frame(relay, session_id, kind, &frame).await,
        },
    }
}
