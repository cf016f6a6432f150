use std::convert::TryInto;

use serde::{Deserialize, Serialize};

use super::ParseError;
use crate::crypto::{CourierPublicKey, PUBLIC_KEY_SIZE};

/// One advertised relay: its identity key and the URL used to dial it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PeerListEntry {
    pub publickey: CourierPublicKey,
    pub address: String,
}

/// Body of a RESPONSE_SERVERS message.
///
/// ```bytes
/// 0-1     entry count (big-endian u16)
/// per entry:
///   0-31  publickey
///   32    address length
///   33..  address (UTF-8)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerListMessage {
    entries: Vec<PeerListEntry>,
}

impl PeerListMessage {
    /// Entries whose address cannot be length-prefixed with a u8 are not
    /// representable on the wire and are dropped here.
    pub fn new(mut entries: Vec<PeerListEntry>) -> Self {
        entries.retain(|entry| entry.address.len() <= u8::MAX as usize);
        PeerListMessage { entries }
    }

    pub fn get_entries(&self) -> &Vec<PeerListEntry> {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<PeerListEntry> {
        self.entries
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut vbytes: Vec<u8> = vec![];
        vbytes.extend(&(self.entries.len() as u16).to_be_bytes());
        for entry in &self.entries {
            vbytes.extend(&entry.publickey);
            vbytes.push(entry.address.len() as u8);
            vbytes.extend(entry.address.as_bytes());
        }
        vbytes
    }

    pub fn deserialize(bytes: &[u8]) -> Result<PeerListMessage, ParseError> {
        if bytes.len() < 2 {
            return Err(ParseError::TooShort {
                need: 2,
                got: bytes.len(),
            });
        }
        let count = u16::from_be_bytes(bytes[0..2].try_into().unwrap()) as usize;
        let mut cursor = 2;
        let mut entries = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            if bytes.len() < cursor + PUBLIC_KEY_SIZE + 1 {
                return Err(ParseError::TooShort {
                    need: cursor + PUBLIC_KEY_SIZE + 1,
                    got: bytes.len(),
                });
            }
            let publickey: CourierPublicKey =
                bytes[cursor..cursor + PUBLIC_KEY_SIZE].try_into().unwrap();
            cursor += PUBLIC_KEY_SIZE;
            let addr_len = bytes[cursor] as usize;
            cursor += 1;
            if bytes.len() < cursor + addr_len {
                return Err(ParseError::AddressOverrun);
            }
            let address = String::from_utf8(bytes[cursor..cursor + addr_len].to_vec())
                .map_err(|_| ParseError::BadUtf8)?;
            cursor += addr_len;
            entries.push(PeerListEntry { publickey, address });
        }
        Ok(PeerListMessage { entries })
    }
}
