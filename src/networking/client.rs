use std::convert::TryInto;

use futures::{SinkExt, StreamExt};
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite};
use tracing::{event, Level};

use crate::crypto::{sign_blob, verify, CourierPublicKey, CourierSignature, SIGNATURE_SIZE};
use crate::keypair::Keypair;
use crate::networking::frame::{Frame, FrameType};
use crate::networking::handshake::{CHALLENGE_SIZE, HANDSHAKE_CONFIRM};
use crate::networking::message_types::add_peer_message::AddPeerMessage;
use crate::networking::message_types::peer_list_message::{PeerListEntry, PeerListMessage};
use crate::networking::node_info::{self, NodeInfoType};
use crate::CourierError;

/// Everything a relay session can deliver to a client, as a typed event on
/// the receiver returned by [`CourierClient::connect`].
#[derive(Debug)]
pub enum ClientEvent {
    /// The relay confirmed our authentication. `server` is the relay key
    /// proven during the handshake.
    HandshakeComplete { server: CourierPublicKey },
    /// A DATA delivery; the addressee prefix is already stripped.
    Message {
        sender: CourierPublicKey,
        payload: Vec<u8>,
    },
    /// A SIGNED_DATA delivery. The SDK verifies the embedded signature over
    /// the content against the sender key; the relay never does.
    SignedMessage {
        sender: CourierPublicKey,
        payload: Vec<u8>,
        signature_valid: bool,
    },
    /// The relay's answer to [`CourierClient::request_peer_list`].
    PeerList { peers: Vec<PeerListEntry> },
    /// The transport ended.
    Closed,
}

/// Client SDK: one websocket session to a relay, authenticated with the
/// caller's keypair. The handshake runs automatically; once a
/// [`ClientEvent::HandshakeComplete`] arrives, messages can be sent.
pub struct CourierClient {
    outgoing: mpsc::UnboundedSender<tungstenite::protocol::Message>,
    keypair: Keypair,
}

impl CourierClient {
    pub async fn connect(
        url: &str,
        keypair: Keypair,
    ) -> crate::Result<(CourierClient, mpsc::UnboundedReceiver<ClientEvent>)> {
        let parsed = url::Url::parse(url)
            .map_err(|e| CourierError::Transport(format!("invalid relay url {}: {}", url, e)))?;
        let (ws_stream, _) = connect_async(parsed.as_str())
            .await
            .map_err(|e| CourierError::Transport(format!("failed to connect to {}: {}", url, e)))?;
        let (mut write_sink, mut read_stream) = ws_stream.split();

        let (outgoing, mut outgoing_rcv) =
            mpsc::unbounded_channel::<tungstenite::protocol::Message>();
        tokio::spawn(async move {
            while let Some(msg) = outgoing_rcv.recv().await {
                if write_sink.send(msg).await.is_err() {
                    break;
                }
            }
        });

        // greet the relay with our own challenge so it proves its identity
        let mut challenge = [0u8; CHALLENGE_SIZE];
        OsRng.fill_bytes(&mut challenge);
        let hello = Frame::new(FrameType::Handshake, [0; 32], challenge.to_vec());
        outgoing
            .send(tungstenite::protocol::Message::Binary(hello.serialize()))
            .map_err(|_| CourierError::Transport(String::from("session closed")))?;

        let (events_sender, events_rcv) = mpsc::unbounded_channel();
        let task_keypair = keypair.clone();
        let task_outgoing = outgoing.clone();
        tokio::spawn(async move {
            let mut server_key: Option<CourierPublicKey> = None;
            while let Some(result) = read_stream.next().await {
                let msg = match result {
                    Ok(msg) => msg,
                    Err(e) => {
                        event!(Level::DEBUG, "client transport error: {}", e);
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
                let frame = match Frame::deserialize(&data) {
                    Ok(frame) => frame,
                    Err(e) => {
                        event!(Level::WARN, "relay sent an undecodable frame: {}", e);
                        break;
                    }
                };
                if !handle_relay_frame(
                    frame,
                    &challenge,
                    &task_keypair,
                    &task_outgoing,
                    &events_sender,
                    &mut server_key,
                ) {
                    break;
                }
            }
            let _ = events_sender.send(ClientEvent::Closed);
        });

        Ok((CourierClient { outgoing, keypair }, events_rcv))
    }

    pub fn get_publickey(&self) -> CourierPublicKey {
        self.keypair.get_publickey()
    }

    /// Send opaque content to an addressee. The payload on the wire starts
    /// with the addressee's 32-byte key; the relay strips it on delivery.
    pub fn send_to(&self, addressee: &CourierPublicKey, content: &[u8]) -> crate::Result<()> {
        let mut payload = Vec::with_capacity(addressee.len() + content.len());
        payload.extend_from_slice(addressee);
        payload.extend_from_slice(content);
        self.send_frame(Frame::new(
            FrameType::Data,
            self.keypair.get_publickey(),
            payload,
        ))
    }

    /// Send content with an embedded end-to-end signature. The receiving
    /// client verifies it; relays only route the bytes.
    pub fn send_signed(&self, addressee: &CourierPublicKey, content: &[u8]) -> crate::Result<()> {
        let signature = sign_blob(content, &self.keypair.get_privatekey());
        let mut payload =
            Vec::with_capacity(addressee.len() + signature.len() + content.len());
        payload.extend_from_slice(addressee);
        payload.extend_from_slice(&signature);
        payload.extend_from_slice(content);
        self.send_frame(Frame::new(
            FrameType::SignedData,
            self.keypair.get_publickey(),
            payload,
        ))
    }

    /// Ask the relay for the peers it can advertise; answered with a
    /// [`ClientEvent::PeerList`].
    pub fn request_peer_list(&self) -> crate::Result<()> {
        self.send_frame(Frame::new(
            FrameType::NodeInfo,
            self.keypair.get_publickey(),
            node_info::request_servers_payload(),
        ))
    }

    /// Ask the relay to dial another relay.
    pub fn add_peer(&self, address: &str) -> crate::Result<()> {
        let message = AddPeerMessage::new(address);
        self.send_frame(Frame::new(
            FrameType::NodeInfo,
            self.keypair.get_publickey(),
            node_info::add_server_payload(&message),
        ))
    }

    fn send_frame(&self, frame: Frame) -> crate::Result<()> {
        self.outgoing
            .send(tungstenite::protocol::Message::Binary(frame.serialize()))
            .map_err(|_| CourierError::Transport(String::from("session closed")))
    }
}

/// React to one frame from the relay. Returns false when the session should
/// end (the relay failed its identity proof).
fn handle_relay_frame(
    frame: Frame,
    challenge: &[u8; CHALLENGE_SIZE],
    keypair: &Keypair,
    outgoing: &mpsc::UnboundedSender<tungstenite::protocol::Message>,
    events: &mpsc::UnboundedSender<ClientEvent>,
    server_key: &mut Option<CourierPublicKey>,
) -> bool {
    match frame.frame_type {
        FrameType::Handshake => {
            if frame.payload.len() == CHALLENGE_SIZE && !frame.has_signature() {
                // the relay's challenge: sign it and identify ourselves
                let proof = sign_blob(&frame.payload, &keypair.get_privatekey());
                let reply = Frame::new_signed(
                    FrameType::Handshake,
                    keypair.get_publickey(),
                    frame.payload,
                    proof,
                );
                let _ = outgoing.send(tungstenite::protocol::Message::Binary(reply.serialize()));
            } else if frame.payload.len() == CHALLENGE_SIZE && frame.has_signature() {
                // the relay's proof over our challenge
                if frame.payload[..] == challenge[..]
                    && verify(&frame.payload, &frame.signature, &frame.sender_id)
                {
                    *server_key = Some(frame.sender_id);
                } else {
                    event!(Level::WARN, "relay identity proof rejected");
                    return false;
                }
            } else if frame.payload.as_slice() == [HANDSHAKE_CONFIRM] {
                let server = server_key.unwrap_or(frame.sender_id);
                let _ = events.send(ClientEvent::HandshakeComplete { server });
            }
        }
        FrameType::Data => {
            let _ = events.send(ClientEvent::Message {
                sender: frame.sender_id,
                payload: frame.payload,
            });
        }
        FrameType::SignedData => {
            if frame.payload.len() < SIGNATURE_SIZE {
                event!(Level::WARN, "signed message shorter than its signature");
                return true;
            }
            let signature: CourierSignature =
                frame.payload[0..SIGNATURE_SIZE].try_into().unwrap();
            let content = frame.payload[SIGNATURE_SIZE..].to_vec();
            let signature_valid = verify(&content, &signature, &frame.sender_id);
            let _ = events.send(ClientEvent::SignedMessage {
                sender: frame.sender_id,
                payload: content,
                signature_valid,
            });
        }
        FrameType::NodeInfo => {
            if frame.payload.first() == Some(&(NodeInfoType::ResponseServers as u8)) {
                match PeerListMessage::deserialize(&frame.payload[1..]) {
                    Ok(message) => {
                        let _ = events.send(ClientEvent::PeerList {
                            peers: message.into_entries(),
                        });
                    }
                    Err(e) => event!(Level::WARN, "malformed peer list from relay: {}", e),
                }
            }
        }
    }
    true
}
