/*!

# Networking Interfaces and Methods

## Introduction

Courier nodes speak a minimalistic binary protocol over websockets. Every
websocket message carries exactly one frame: a fixed 120-byte header followed
by the payload. The same framing is used node-to-node and node-to-client;
2-way (full-duplex) sessions let a relay push deliveries to clients without
polling.

## Frame layout

All multi-byte integers are big-endian.

```text
bytes
0       magic (0x58)
1       version (0x01, not checked on decode)
2       frame type
3       flags (reserved, zero)
4-7     payload length (u32)
8-23    message id (reserved, zero)
24-55   sender public key (all-zero before the sender has identified itself)
56-119  signature (all-zero when the frame is unsigned)
120..   payload
```

## Frame types

```text
1  HANDSHAKE
2  DATA
3  NODE_INFO
4  SIGNED_DATA
```

### HANDSHAKE

Both ends of a fresh session emit a 32-byte random challenge (unsigned,
sender all-zero). Whichever side reads the other's unsigned challenge signs
it and replies with its public key and the signature over the same 32 bytes.
A side that verifies a signature over its own exact challenge has
authenticated its counterpart and answers with the 1-byte confirmation
payload `0x01`.

### DATA / SIGNED_DATA

Payload starts with the 32-byte addressee public key; the rest is opaque
content. The relay strips the addressee prefix before local delivery and
preserves the sender id verbatim. SIGNED_DATA additionally embeds a 64-byte
signature over the content after the addressee; the relay does not verify
it — receiving clients do.

### NODE_INFO

The first payload byte selects a subtype:

```text
0  REQUEST_CLIENTS   (reserved)
1  RESPONSE_CLIENTS  (reserved)
2  REQUEST_SERVERS   empty body
3  RESPONSE_SERVERS  u16 count, then count x { 32-byte key, u8 addr_len, address }
4  ADD_SERVER        u8 addr_len, address
5  QUERY_CLIENT      32-byte target key
6  QUERY_RESPONSE    u8 status, 32-byte target, (status=1) 32-byte owner
```

*/

pub mod client;
pub mod directory;
pub mod filters;
pub mod frame;
pub mod handshake;
pub mod locator;
pub mod message_types;
pub mod network;
pub mod node_info;
pub mod peer;
pub mod router;
