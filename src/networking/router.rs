use std::convert::TryInto;

use tracing::{event, Level};

use crate::crypto::{CourierPublicKey, PUBLIC_KEY_SIZE};
use crate::networking::frame::Frame;
use crate::networking::locator;
use crate::networking::network::Relay;
use crate::networking::peer::{send_frame_to_session, session_is_open, SessionId};

/// Route one DATA or SIGNED_DATA frame from an authenticated session. The
/// first 32 payload bytes name the addressee; the rest is opaque.
///
/// Local addressees get the frame directly, with the addressee prefix
/// stripped and the sender id preserved verbatim. Anything else is handed to
/// the location service; this router never talks to peers itself, so
/// duplicate suppression and deadlines live in one place.
pub async fn route_data_frame(
    relay: &Relay,
    session_id: SessionId,
    frame: Frame,
) -> crate::Result<()> {
    if frame.payload.len() < PUBLIC_KEY_SIZE {
        event!(
            Level::WARN,
            "data frame from session {} shorter than addressee prefix, dropping",
            hex::encode(session_id)
        );
        return Ok(());
    }
    let addressee: CourierPublicKey = frame.payload[0..PUBLIC_KEY_SIZE].try_into().unwrap();

    let target_session = {
        let clients = relay.clients_lock.read().await;
        clients.get(&addressee).map(|record| record.session_id)
    };
    if let Some(target_session) = target_session {
        if session_is_open(&target_session).await {
            let delivery = Frame::new(
                frame.frame_type,
                frame.sender_id,
                frame.payload[PUBLIC_KEY_SIZE..].to_vec(),
            );
            send_frame_to_session(&delivery, &target_session).await;
            event!(
                Level::DEBUG,
                "delivered {} bytes to local client {}",
                delivery.payload.len(),
                hex::encode(addressee)
            );
            return Ok(());
        }
    }

    locator::forward_remote(relay, addressee, frame, session_id).await;
    Ok(())
}
