use std::collections::HashMap;
use std::time::Duration;

use tracing::{event, Level};

use crate::crypto::CourierPublicKey;
use crate::networking::frame::{Frame, FrameType};
use crate::networking::message_types::query_client_message::QueryClientMessage;
use crate::networking::message_types::query_response_message::QueryResponseMessage;
use crate::networking::network::Relay;
use crate::networking::node_info;
use crate::networking::peer::{send_frame_to_session, session_is_open, SessionId};
use crate::time::create_timestamp;

/// How long a parked frame waits for some peer to claim its addressee.
pub const QUERY_TIMEOUT_MS: u64 = 5_000;

/// A frame parked while a federated lookup is in flight. The frame keeps its
/// own backing storage, so whatever the transport does to its buffers after
/// the handoff is irrelevant. `sender_session` is for diagnostics only.
pub struct PendingQuery {
    pub frame: Frame,
    pub deadline: u64,
    pub sender_session: SessionId,
}

pub type PendingQueries = HashMap<CourierPublicKey, PendingQuery>;

/// Park `frame` for a non-local addressee and broadcast a QUERY_CLIENT to
/// every open peer session. At most one query per addressee is outstanding:
/// while one is in flight, further frames for the same addressee are dropped,
/// not queued.
pub async fn forward_remote(
    relay: &Relay,
    addressee: CourierPublicKey,
    frame: Frame,
    sender_session: SessionId,
) {
    forward_remote_with_timeout(relay, addressee, frame, sender_session, QUERY_TIMEOUT_MS).await
}

pub async fn forward_remote_with_timeout(
    relay: &Relay,
    addressee: CourierPublicKey,
    frame: Frame,
    sender_session: SessionId,
    timeout_ms: u64,
) {
    {
        let mut pending = relay.pending_lock.write().await;
        if pending.contains_key(&addressee) {
            event!(
                Level::DEBUG,
                "query for {} already in flight, dropping frame",
                hex::encode(addressee)
            );
            return;
        }
        pending.insert(
            addressee,
            PendingQuery {
                frame,
                deadline: create_timestamp() + timeout_ms,
                sender_session,
            },
        );
        event!(
            Level::DEBUG,
            "parked frame for {} pending federated lookup",
            hex::encode(addressee)
        );
    }

    // arm the deadline; the check against the recorded deadline keeps an
    // expired timer from clobbering a newer entry for the same addressee
    let deadline_relay = relay.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
        let mut pending = deadline_relay.pending_lock.write().await;
        let expired = match pending.get(&addressee) {
            Some(entry) => entry.deadline <= create_timestamp(),
            None => false,
        };
        if expired {
            pending.remove(&addressee);
            event!(
                Level::DEBUG,
                "query for {} expired, dropping held frame",
                hex::encode(addressee)
            );
        }
    });

    let own_key = relay.publickey().await;
    let query = QueryClientMessage::new(addressee);
    let broadcast = Frame::new(
        FrameType::NodeInfo,
        own_key,
        node_info::query_client_payload(&query),
    );
    relay.broadcast_to_peers(&broadcast).await;
}

/// Correlate a QUERY_RESPONSE with its pending entry. The first response for
/// an addressee consumes the entry; later ones find nothing and are ignored.
/// On a positive answer the held frame is forwarded, addressee prefix
/// intact, to the owning peer's session.
pub async fn handle_query_response(relay: &Relay, response: &QueryResponseMessage) {
    let entry = {
        let mut pending = relay.pending_lock.write().await;
        pending.remove(&response.get_target())
    };
    let entry = match entry {
        Some(entry) => entry,
        None => {
            event!(
                Level::DEBUG,
                "query response for {} matches no pending entry, ignoring",
                hex::encode(response.get_target())
            );
            return;
        }
    };
    if !response.is_found() {
        event!(
            Level::DEBUG,
            "no relay claims {}, dropping held frame",
            hex::encode(response.get_target())
        );
        return;
    }
    let owner = match response.get_owner() {
        Some(owner) => owner,
        None => return,
    };
    let owner_session = {
        let peers = relay.peers_lock.read().await;
        peers.get(&owner).and_then(|record| record.session_id)
    };
    match owner_session {
        Some(owner_session) if session_is_open(&owner_session).await => {
            let forward = Frame::new(
                entry.frame.frame_type,
                entry.frame.sender_id,
                entry.frame.payload.clone(),
            );
            send_frame_to_session(&forward, &owner_session).await;
            event!(
                Level::DEBUG,
                "forwarded held frame for {} to peer {}",
                hex::encode(response.get_target()),
                hex::encode(owner)
            );
        }
        _ => {
            event!(
                Level::DEBUG,
                "owner {} has no open session, dropping held frame",
                hex::encode(owner)
            );
        }
    }
}
