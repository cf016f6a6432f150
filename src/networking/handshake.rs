use std::collections::HashMap;

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{event, Level};

use crate::crypto::{sign_blob, verify, CourierPublicKey};
use crate::networking::directory::{ClientRecord, UNKNOWN_ADDRESS};
use crate::networking::frame::{Frame, FrameType};
use crate::networking::network::Relay;
use crate::networking::node_info;
use crate::networking::peer::{close_session, send_frame_to_session, SessionId};
use crate::time::create_timestamp;
use crate::CourierError;

pub const CHALLENGE_SIZE: usize = 32;
pub const HANDSHAKE_CONFIRM: u8 = 0x01;

/// Handshake state recorded per session while authentication is in
/// progress: the challenge this node emitted, whether the session was
/// dialed by us (and is therefore provisionally a peer), and the URL we
/// dialed so the eventual peer record keeps a dialable address.
pub struct ChallengeEntry {
    pub challenge: [u8; CHALLENGE_SIZE],
    pub premarked_peer: bool,
    pub dialed_address: Option<String>,
}

pub type ChallengesDB = HashMap<SessionId, ChallengeEntry>;

/// Greet a fresh session: record a random challenge for it and send the
/// challenge out with an all-zero sender id and no signature.
pub async fn initiate_handshake(
    relay: &Relay,
    session_id: SessionId,
    premarked_peer: bool,
    dialed_address: Option<String>,
) {
    let mut challenge = [0u8; CHALLENGE_SIZE];
    OsRng.fill_bytes(&mut challenge);
    relay.challenges_lock.write().await.insert(
        session_id,
        ChallengeEntry {
            challenge,
            premarked_peer,
            dialed_address,
        },
    );
    let frame = Frame::new(FrameType::Handshake, [0; 32], challenge.to_vec());
    send_frame_to_session(&frame, &session_id).await;
}

/// Drive the per-session handshake state machine from one inbound
/// HANDSHAKE frame. The accepted shapes:
///
/// - 32-byte payload, signed: the counterpart's proof over the challenge we
///   emitted. Verifies and authenticates the session.
/// - 32-byte payload, unsigned: the counterpart's own challenge. We sign it
///   and identify ourselves; our recorded challenge is unchanged.
/// - 1-byte payload `0x01`: confirmation, no state change.
///
/// Anything else, or a failed verification, closes the session.
pub async fn handle_handshake_frame(
    relay: &Relay,
    session_id: SessionId,
    frame: &Frame,
) -> crate::Result<()> {
    if frame.payload.len() == CHALLENGE_SIZE && frame.has_signature() {
        return complete_handshake(relay, session_id, frame).await;
    }
    if frame.payload.len() == CHALLENGE_SIZE {
        let keypair = relay.keypair_lock.read().await;
        let proof = sign_blob(&frame.payload, &keypair.get_privatekey());
        let reply = Frame::new_signed(
            FrameType::Handshake,
            keypair.get_publickey(),
            frame.payload.clone(),
            proof,
        );
        drop(keypair);
        send_frame_to_session(&reply, &session_id).await;
        return Ok(());
    }
    if frame.payload.as_slice() == [HANDSHAKE_CONFIRM] {
        event!(
            Level::DEBUG,
            "session {} confirmed by {}",
            hex::encode(session_id),
            hex::encode(frame.sender_id)
        );
        return Ok(());
    }
    Err(CourierError::Handshake("unexpected handshake shape"))
}

async fn complete_handshake(
    relay: &Relay,
    session_id: SessionId,
    frame: &Frame,
) -> crate::Result<()> {
    if !verify(&frame.payload, &frame.signature, &frame.sender_id) {
        return Err(CourierError::Handshake("signature verification failed"));
    }
    let entry = match relay.challenges_lock.write().await.remove(&session_id) {
        Some(entry) => entry,
        None => return Err(CourierError::Handshake("no challenge outstanding")),
    };
    if entry.challenge[..] != frame.payload[..] {
        return Err(CourierError::Handshake("challenge mismatch"));
    }

    let publickey = frame.sender_id;
    let as_peer = entry.premarked_peer || relay.peers_lock.read().await.contains_key(&publickey);
    if as_peer {
        install_peer(relay, session_id, publickey, entry.dialed_address).await;
    } else {
        install_client(relay, session_id, publickey).await;
    }

    let own_key = relay.publickey().await;
    let confirmation = Frame::new(FrameType::Handshake, own_key, vec![HANDSHAKE_CONFIRM]);
    send_frame_to_session(&confirmation, &session_id).await;

    if as_peer {
        // seed discovery over the fresh peer link
        let request = Frame::new(
            FrameType::NodeInfo,
            own_key,
            node_info::request_servers_payload(),
        );
        send_frame_to_session(&request, &session_id).await;
    }
    Ok(())
}

/// Install a local-client record. A record already held by the same key is
/// displaced: its session is force-closed before the new record becomes
/// visible.
async fn install_client(relay: &Relay, session_id: SessionId, publickey: CourierPublicKey) {
    let mut clients = relay.clients_lock.write().await;
    if let Some(previous) = clients.get(&publickey).map(|record| record.session_id) {
        if previous != session_id {
            event!(
                Level::INFO,
                "client {} re-authenticated, closing old session {}",
                hex::encode(publickey),
                hex::encode(previous)
            );
            close_session(&previous).await;
        }
    }
    clients.insert(ClientRecord {
        publickey,
        session_id,
        connected_at: create_timestamp(),
    });
    event!(
        Level::INFO,
        "client {} authenticated on session {}",
        hex::encode(publickey),
        hex::encode(session_id)
    );
}

/// Attach an authenticated peer session, preserving any previously known
/// address. A key cannot be a client and a peer at once: an existing client
/// record under this key is evicted and its session closed first.
async fn install_peer(
    relay: &Relay,
    session_id: SessionId,
    publickey: CourierPublicKey,
    dialed_address: Option<String>,
) {
    {
        let mut clients = relay.clients_lock.write().await;
        if let Some(record) = clients.remove_by_key(&publickey) {
            event!(
                Level::INFO,
                "key {} promoted from client to peer",
                hex::encode(publickey)
            );
            if record.session_id != session_id {
                close_session(&record.session_id).await;
            }
        }
    }
    let mut peers = relay.peers_lock.write().await;
    if let Some(previous) = peers.get(&publickey).and_then(|record| record.session_id) {
        if previous != session_id {
            event!(
                Level::INFO,
                "peer {} re-authenticated, closing old session {}",
                hex::encode(publickey),
                hex::encode(previous)
            );
            close_session(&previous).await;
        }
    }
    let address = dialed_address
        .or_else(|| peers.get(&publickey).map(|record| record.address.clone()))
        .unwrap_or_else(|| String::from(UNKNOWN_ADDRESS));
    peers.attach(publickey, address, session_id);
    event!(
        Level::INFO,
        "peer {} authenticated on session {}",
        hex::encode(publickey),
        hex::encode(session_id)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keys;
    use crate::keypair::Keypair;
    use crate::networking::peer::new_session_id;

    fn test_relay() -> Relay {
        Relay::new(Keypair::new(), String::from("ws://127.0.0.1:8080"))
    }

    async fn recorded_challenge(relay: &Relay, session_id: &SessionId) -> [u8; CHALLENGE_SIZE] {
        relay
            .challenges_lock
            .read()
            .await
            .get(session_id)
            .expect("challenge recorded")
            .challenge
    }

    #[tokio::test]
    async fn test_signed_proof_installs_client() {
        let relay = test_relay();
        let session_id = new_session_id();
        initiate_handshake(&relay, session_id, false, None).await;
        let challenge = recorded_challenge(&relay, &session_id).await;

        let (publickey, privatekey) = generate_keys();
        let proof = sign_blob(&challenge, &privatekey);
        let frame =
            Frame::new_signed(FrameType::Handshake, publickey, challenge.to_vec(), proof);

        handle_handshake_frame(&relay, session_id, &frame)
            .await
            .unwrap();

        let clients = relay.clients_lock.read().await;
        let record = clients.get(&publickey).expect("client installed");
        assert_eq!(record.session_id, session_id);
        assert!(relay.challenges_lock.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_challenge_mismatch_rejected() {
        let relay = test_relay();
        let session_id = new_session_id();
        initiate_handshake(&relay, session_id, false, None).await;

        let (publickey, privatekey) = generate_keys();
        let wrong: [u8; CHALLENGE_SIZE] = [0x42; CHALLENGE_SIZE];
        let proof = sign_blob(&wrong, &privatekey);
        let frame = Frame::new_signed(FrameType::Handshake, publickey, wrong.to_vec(), proof);

        assert!(handle_handshake_frame(&relay, session_id, &frame)
            .await
            .is_err());
        assert!(relay.clients_lock.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_bad_signature_rejected() {
        let relay = test_relay();
        let session_id = new_session_id();
        initiate_handshake(&relay, session_id, false, None).await;
        let challenge = recorded_challenge(&relay, &session_id).await;

        let (publickey, _) = generate_keys();
        let (_, other_private) = generate_keys();
        let proof = sign_blob(&challenge, &other_private);
        let frame =
            Frame::new_signed(FrameType::Handshake, publickey, challenge.to_vec(), proof);

        assert!(handle_handshake_frame(&relay, session_id, &frame)
            .await
            .is_err());
        assert!(relay.clients_lock.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_premarked_session_installs_peer() {
        let relay = test_relay();
        let session_id = new_session_id();
        initiate_handshake(
            &relay,
            session_id,
            true,
            Some(String::from("ws://10.0.0.9:8080")),
        )
        .await;
        let challenge = recorded_challenge(&relay, &session_id).await;

        let (publickey, privatekey) = generate_keys();
        let proof = sign_blob(&challenge, &privatekey);
        let frame =
            Frame::new_signed(FrameType::Handshake, publickey, challenge.to_vec(), proof);

        handle_handshake_frame(&relay, session_id, &frame)
            .await
            .unwrap();

        let peers = relay.peers_lock.read().await;
        let record = peers.get(&publickey).expect("peer installed");
        assert_eq!(record.session_id, Some(session_id));
        assert_eq!(record.address, "ws://10.0.0.9:8080");
        assert!(relay.clients_lock.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_known_peer_key_upgrades_instead_of_client() {
        let relay = test_relay();
        let (publickey, privatekey) = generate_keys();
        relay
            .peers_lock
            .write()
            .await
            .insert_known(publickey, String::from("ws://10.0.0.7:8080"));

        // inbound session, not premarked
        let session_id = new_session_id();
        initiate_handshake(&relay, session_id, false, None).await;
        let challenge = recorded_challenge(&relay, &session_id).await;
        let proof = sign_blob(&challenge, &privatekey);
        let frame =
            Frame::new_signed(FrameType::Handshake, publickey, challenge.to_vec(), proof);
        handle_handshake_frame(&relay, session_id, &frame)
            .await
            .unwrap();

        let peers = relay.peers_lock.read().await;
        let record = peers.get(&publickey).unwrap();
        assert_eq!(record.session_id, Some(session_id));
        // the previously known address survives the attach
        assert_eq!(record.address, "ws://10.0.0.7:8080");
        assert!(relay.clients_lock.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_unsigned_challenge_gets_signed_reply() {
        let relay = test_relay();
        let session_id = new_session_id();
        initiate_handshake(&relay, session_id, false, None).await;
        let recorded = recorded_challenge(&relay, &session_id).await;

        // counterpart's own challenge; we reply but keep our challenge
        let frame = Frame::new(FrameType::Handshake, [0; 32], vec![0x11; CHALLENGE_SIZE]);
        handle_handshake_frame(&relay, session_id, &frame)
            .await
            .unwrap();
        assert_eq!(recorded_challenge(&relay, &session_id).await, recorded);
    }

    #[tokio::test]
    async fn test_garbage_handshake_shape_rejected() {
        let relay = test_relay();
        let session_id = new_session_id();
        initiate_handshake(&relay, session_id, false, None).await;

        let frame = Frame::new(FrameType::Handshake, [0; 32], vec![1, 2, 3]);
        assert!(handle_handshake_frame(&relay, session_id, &frame)
            .await
            .is_err());
    }
}
