use std::convert::TryFrom;
use std::time::Duration;

use courier_macros::TryFromByte;
use tracing::{event, Level};

use crate::networking::frame::{Frame, FrameType};
use crate::networking::locator;
use crate::networking::message_types::add_peer_message::AddPeerMessage;
use crate::networking::message_types::peer_list_message::{PeerListEntry, PeerListMessage};
use crate::networking::message_types::query_client_message::QueryClientMessage;
use crate::networking::message_types::query_response_message::QueryResponseMessage;
use crate::networking::network::{connect_to_peer, Relay};
use crate::networking::peer::{send_frame_to_session, SessionId, SessionKind};

/// Minimum defer before dialing an address learned from RESPONSE_SERVERS.
pub const DISCOVERY_DIAL_DELAY: Duration = Duration::from_millis(100);

/// NODE_INFO subtypes; the first payload byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromByte)]
#[repr(u8)]
pub enum NodeInfoType {
    RequestClients = 0,
    ResponseClients = 1,
    RequestServers = 2,
    ResponseServers = 3,
    AddServer = 4,
    QueryClient = 5,
    QueryResponse = 6,
}

fn node_info_payload(subtype: NodeInfoType, body: Vec<u8>) -> Vec<u8> {
    let mut payload = Vec::with_capacity(1 + body.len());
    payload.push(subtype as u8);
    payload.extend(body);
    payload
}

pub fn request_servers_payload() -> Vec<u8> {
    node_info_payload(NodeInfoType::RequestServers, vec![])
}

pub fn response_servers_payload(message: &PeerListMessage) -> Vec<u8> {
    node_info_payload(NodeInfoType::ResponseServers, message.serialize())
}

pub fn add_server_payload(message: &AddPeerMessage) -> Vec<u8> {
    node_info_payload(NodeInfoType::AddServer, message.serialize())
}

pub fn query_client_payload(message: &QueryClientMessage) -> Vec<u8> {
    node_info_payload(NodeInfoType::QueryClient, message.serialize())
}

pub fn query_response_payload(message: &QueryResponseMessage) -> Vec<u8> {
    node_info_payload(NodeInfoType::QueryResponse, message.serialize())
}

/// Sub-dispatch a NODE_INFO frame by its first payload byte. Malformed or
/// reserved payloads are dropped with a warning; only RESPONSE_SERVERS and
/// QUERY_RESPONSE care who sent them (they are honored on peer sessions
/// only). QUERY_CLIENT is answered for any authenticated session: a node
/// that dialed us queries over a link we may classify as a client.
pub async fn handle_node_info_frame(
    relay: &Relay,
    session_id: SessionId,
    kind: SessionKind,
    frame: &Frame,
) -> crate::Result<()> {
    let subtype_byte = match frame.payload.first() {
        Some(byte) => *byte,
        None => {
            event!(Level::WARN, "empty node-info payload, dropping");
            return Ok(());
        }
    };
    let subtype = match NodeInfoType::try_from(subtype_byte) {
        Ok(subtype) => subtype,
        Err(_) => {
            event!(
                Level::WARN,
                "unknown node-info subtype {}, dropping",
                subtype_byte
            );
            return Ok(());
        }
    };
    let body = &frame.payload[1..];

    match subtype {
        NodeInfoType::RequestServers => {
            handle_request_servers(relay, session_id).await;
        }
        NodeInfoType::ResponseServers => {
            if kind != SessionKind::Peer {
                event!(
                    Level::WARN,
                    "ignoring server list from non-peer session {}",
                    hex::encode(session_id)
                );
                return Ok(());
            }
            match PeerListMessage::deserialize(body) {
                Ok(message) => handle_response_servers(relay, message).await,
                Err(e) => event!(Level::WARN, "malformed server list: {}, dropping", e),
            }
        }
        NodeInfoType::AddServer => match AddPeerMessage::deserialize(body) {
            Ok(message) => handle_add_server(relay, message).await,
            Err(e) => event!(Level::WARN, "malformed add-server request: {}, dropping", e),
        },
        NodeInfoType::QueryClient => match QueryClientMessage::deserialize(body) {
            Ok(message) => handle_query_client(relay, session_id, message).await,
            Err(e) => event!(Level::WARN, "malformed client query: {}, dropping", e),
        },
        NodeInfoType::QueryResponse => {
            if kind != SessionKind::Peer {
                event!(
                    Level::WARN,
                    "ignoring query response from non-peer session {}",
                    hex::encode(session_id)
                );
                return Ok(());
            }
            match QueryResponseMessage::deserialize(body) {
                Ok(message) => locator::handle_query_response(relay, &message).await,
                Err(e) => event!(Level::WARN, "malformed query response: {}, dropping", e),
            }
        }
        NodeInfoType::RequestClients | NodeInfoType::ResponseClients => {
            event!(Level::DEBUG, "reserved node-info subtype, ignoring");
        }
    }
    Ok(())
}

/// Answer with every peer whose address we actually know. Our own identity
/// is never listed (it has no peer record on this node).
async fn handle_request_servers(relay: &Relay, session_id: SessionId) {
    let entries = {
        let peers = relay.peers_lock.read().await;
        peers
            .addressed_entries()
            .into_iter()
            .map(|(publickey, address)| PeerListEntry { publickey, address })
            .collect::<Vec<PeerListEntry>>()
    };
    let message = PeerListMessage::new(entries);
    let own_key = relay.publickey().await;
    let response = Frame::new(
        FrameType::NodeInfo,
        own_key,
        response_servers_payload(&message),
    );
    send_frame_to_session(&response, &session_id).await;
}

/// Absorb an advertised peer list: record every unknown key as a sessionless
/// peer and dial its address shortly after. Our own key and our own
/// listening URL are suppressed, as are peers we already track.
async fn handle_response_servers(relay: &Relay, message: PeerListMessage) {
    let own_key = relay.publickey().await;
    for entry in message.into_entries() {
        if entry.publickey == own_key || entry.address == relay.listen_url {
            continue;
        }
        {
            let mut peers = relay.peers_lock.write().await;
            if peers.contains_key(&entry.publickey) {
                continue;
            }
            peers.insert_known(entry.publickey, entry.address.clone());
        }
        event!(
            Level::INFO,
            "discovered peer {} at {}",
            hex::encode(entry.publickey),
            entry.address
        );
        let dial_relay = relay.clone();
        let address = entry.address;
        tokio::spawn(async move {
            tokio::time::sleep(DISCOVERY_DIAL_DELAY).await;
            connect_to_peer(dial_relay, address).await;
        });
    }
}

/// Dial a pushed address unless it is our own or already known. No reply.
async fn handle_add_server(relay: &Relay, message: AddPeerMessage) {
    let address = message.get_address().to_string();
    if address == relay.listen_url {
        event!(Level::DEBUG, "add-server names our own address, ignoring");
        return;
    }
    if relay.peers_lock.read().await.has_address(&address) {
        event!(Level::DEBUG, "add-server address {} already known", address);
        return;
    }
    event!(Level::INFO, "add-server request for {}", address);
    tokio::spawn(connect_to_peer(relay.clone(), address));
}

/// Answer a location query on the session it arrived on. Queries are not
/// forwarded further: the federation locates addressees one hop out.
async fn handle_query_client(relay: &Relay, session_id: SessionId, message: QueryClientMessage) {
    let target = message.get_target();
    let found = {
        let clients = relay.clients_lock.read().await;
        clients.contains_key(&target)
    };
    let own_key = relay.publickey().await;
    let response = if found {
        QueryResponseMessage::new_found(target, own_key)
    } else {
        QueryResponseMessage::new_not_found(target)
    };
    let frame = Frame::new(
        FrameType::NodeInfo,
        own_key,
        query_response_payload(&response),
    );
    send_frame_to_session(&frame, &session_id).await;
}
