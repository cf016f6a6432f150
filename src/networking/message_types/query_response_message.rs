use std::convert::TryInto;

use super::ParseError;
use crate::crypto::{CourierPublicKey, PUBLIC_KEY_SIZE};

pub const QUERY_STATUS_NOT_FOUND: u8 = 0;
pub const QUERY_STATUS_FOUND: u8 = 1;

/// Body of a QUERY_RESPONSE message.
///
/// ```bytes
/// 0       status (1 = found, 0 = not found)
/// 1-32    target publickey
/// 33-64   owning-node publickey (present only when status = 1)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResponseMessage {
    target: CourierPublicKey,
    owner: Option<CourierPublicKey>,
}

impl QueryResponseMessage {
    pub fn new_found(target: CourierPublicKey, owner: CourierPublicKey) -> Self {
        QueryResponseMessage {
            target,
            owner: Some(owner),
        }
    }

    pub fn new_not_found(target: CourierPublicKey) -> Self {
        QueryResponseMessage {
            target,
            owner: None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.owner.is_some()
    }

    pub fn get_target(&self) -> CourierPublicKey {
        self.target
    }

    pub fn get_owner(&self) -> Option<CourierPublicKey> {
        self.owner
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut vbytes: Vec<u8> = vec![];
        match self.owner {
            Some(owner) => {
                vbytes.push(QUERY_STATUS_FOUND);
                vbytes.extend(&self.target);
                vbytes.extend(&owner);
            }
            None => {
                vbytes.push(QUERY_STATUS_NOT_FOUND);
                vbytes.extend(&self.target);
            }
        }
        vbytes
    }

    pub fn deserialize(bytes: &[u8]) -> Result<QueryResponseMessage, ParseError> {
        if bytes.is_empty() {
            return Err(ParseError::TooShort { need: 1, got: 0 });
        }
        let status = bytes[0];
        let body = &bytes[1..];
        match status {
            QUERY_STATUS_NOT_FOUND => {
                if body.len() < PUBLIC_KEY_SIZE {
                    return Err(ParseError::TooShort {
                        need: 1 + PUBLIC_KEY_SIZE,
                        got: bytes.len(),
                    });
                }
                let target: CourierPublicKey = body[0..PUBLIC_KEY_SIZE].try_into().unwrap();
                Ok(QueryResponseMessage::new_not_found(target))
            }
            QUERY_STATUS_FOUND => {
                if body.len() < 2 * PUBLIC_KEY_SIZE {
                    return Err(ParseError::TooShort {
                        need: 1 + 2 * PUBLIC_KEY_SIZE,
                        got: bytes.len(),
                    });
                }
                let target: CourierPublicKey = body[0..PUBLIC_KEY_SIZE].try_into().unwrap();
                let owner: CourierPublicKey = body
                    [PUBLIC_KEY_SIZE..2 * PUBLIC_KEY_SIZE]
                    .try_into()
                    .unwrap();
                Ok(QueryResponseMessage::new_found(target, owner))
            }
            other => Err(ParseError::BadStatus(other)),
        }
    }
}
