/*!

Structured NODE_INFO bodies. Each message owns its fixed-layout
serialize/deserialize pair; the subtype byte itself is written and dispatched
by the node-info handler, so these codecs see only the body that follows it.

Deserialization is bounds-checked end to end: a malformed body yields a
[`ParseError`] and the frame is dropped without touching the session.

*/

pub mod add_peer_message;
pub mod peer_list_message;
pub mod query_client_message;
pub mod query_response_message;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("message body too short: need {need}, got {got}")]
    TooShort { need: usize, got: usize },
    #[error("embedded address length exceeds remaining bytes")]
    AddressOverrun,
    #[error("address is not valid UTF-8")]
    BadUtf8,
    #[error("unknown status byte {0}")]
    BadStatus(u8),
}
