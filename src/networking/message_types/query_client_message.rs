use std::convert::TryInto;

use super::ParseError;
use crate::crypto::{CourierPublicKey, PUBLIC_KEY_SIZE};

/// Body of a QUERY_CLIENT message: the public key being located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryClientMessage {
    target: CourierPublicKey,
}

impl QueryClientMessage {
    pub fn new(target: CourierPublicKey) -> Self {
        QueryClientMessage { target }
    }

    pub fn get_target(&self) -> CourierPublicKey {
        self.target
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.target.to_vec()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<QueryClientMessage, ParseError> {
        if bytes.len() < PUBLIC_KEY_SIZE {
            return Err(ParseError::TooShort {
                need: PUBLIC_KEY_SIZE,
                got: bytes.len(),
            });
        }
        let target: CourierPublicKey = bytes[0..PUBLIC_KEY_SIZE].try_into().unwrap();
        Ok(QueryClientMessage { target })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_client_serialize() {
        let message = QueryClientMessage::new([5; 32]);
        let deserialized = QueryClientMessage::deserialize(&message.serialize()).unwrap();
        assert_eq!(deserialized.get_target(), [5; 32]);
    }

    #[test]
    fn test_deserialize_rejects_short_body() {
        assert!(QueryClientMessage::deserialize(&[0; 16]).is_err());
    }
}
