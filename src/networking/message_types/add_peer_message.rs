use super::ParseError;

/// Body of an ADD_SERVER message: a length-prefixed dialable URL.
///
/// ```bytes
/// 0       address length
/// 1..     address (UTF-8)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPeerMessage {
    address: String,
}

impl AddPeerMessage {
    pub fn new(address: &str) -> Self {
        AddPeerMessage {
            address: String::from(address),
        }
    }

    pub fn get_address(&self) -> &str {
        &self.address
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut vbytes: Vec<u8> = vec![];
        vbytes.push(self.address.len() as u8);
        vbytes.extend(self.address.as_bytes());
        vbytes
    }

    pub fn deserialize(bytes: &[u8]) -> Result<AddPeerMessage, ParseError> {
        if bytes.is_empty() {
            return Err(ParseError::TooShort { need: 1, got: 0 });
        }
        let addr_len = bytes[0] as usize;
        if bytes.len() < 1 + addr_len {
            return Err(ParseError::AddressOverrun);
        }
        let address = String::from_utf8(bytes[1..1 + addr_len].to_vec())
            .map_err(|_| ParseError::BadUtf8)?;
        Ok(AddPeerMessage { address })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_peer_serialize() {
        let message = AddPeerMessage::new("ws://relay.example:9000");
        let deserialized = AddPeerMessage::deserialize(&message.serialize()).unwrap();
        assert_eq!(message, deserialized);
        assert_eq!(deserialized.get_address(), "ws://relay.example:9000");
    }

    #[test]
    fn test_deserialize_rejects_overrun() {
        assert_eq!(
            AddPeerMessage::deserialize(&[10, b'w', b's']),
            Err(ParseError::AddressOverrun)
        );
    }

    #[test]
    fn test_deserialize_rejects_bad_utf8() {
        assert_eq!(
            AddPeerMessage::deserialize(&[2, 0xC3, 0x28]),
            Err(ParseError::BadUtf8)
        );
    }
}
