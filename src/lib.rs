/*!
# Welcome to Courier

Courier is a **federated end-to-end message relay**. Clients authenticate to a
relay node with long-lived Ed25519 signing keys and exchange opaque payloads
addressed to peer public keys. Relay nodes form a flat federation: a node
delivers a message directly when the addressee is connected locally, and
otherwise locates the addressee by broadcasting a short query to its peer
nodes and forwarding the payload to whichever node claims it.

The relay treats message payloads as opaque bytes. There is no persistent
storage, no offline queueing and no delivery acknowledgment: a message either
reaches a currently-connected addressee or it is dropped.

# Usage

Run a node (listens on `PORT`, default 8080):

```text
PORT=8080 courier --connect ws://peer.example:8080
```

Connect with [`networking::client::CourierClient`] to send and receive
messages programmatically.
*/
pub mod crypto;
pub mod keypair;
pub mod networking;
pub mod time;

use thiserror::Error;

use crate::networking::frame::FrameError;
use crate::networking::message_types::ParseError;

/// Errors surfaced by the relay core and the client SDK.
#[derive(Debug, Error)]
pub enum CourierError {
    #[error("frame decode failed: {0}")]
    Frame(#[from] FrameError),
    #[error("message parse failed: {0}")]
    Parse(#[from] ParseError),
    #[error("handshake rejected: {0}")]
    Handshake(&'static str),
    #[error("transport: {0}")]
    Transport(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CourierError>;
