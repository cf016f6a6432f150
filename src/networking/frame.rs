use std::convert::TryFrom;
use std::convert::TryInto;

use courier_macros::TryFromByte;
use thiserror::Error;

use crate::crypto::{CourierPublicKey, CourierSignature};

pub const FRAME_MAGIC: u8 = 0x58;
pub const FRAME_VERSION: u8 = 0x01;
pub const FRAME_HEADER_SIZE: usize = 120;

/// The wire type of a frame. Discriminants are the bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromByte)]
#[repr(u8)]
pub enum FrameType {
    Handshake = 1,
    Data = 2,
    NodeInfo = 3,
    SignedData = 4,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("bad magic byte 0x{0:02x}")]
    BadMagic(u8),
    #[error("buffer too short for frame header: need {need}, got {got}")]
    BufferTooShort { need: usize, got: usize },
    #[error("buffer too short for payload: need {need}, got {got}")]
    TruncatedPayload { need: usize, got: usize },
    #[error("unknown frame type {0}")]
    UnknownFrameType(u8),
}

/// The core data type transported across the Courier network: one frame per
/// websocket message, fixed header plus payload. The header and payload of a
/// decoded frame are copied out of the receive buffer, so a frame stays
/// valid however the transport reuses its buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub sender_id: CourierPublicKey,
    pub signature: CourierSignature,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(frame_type: FrameType, sender_id: CourierPublicKey, payload: Vec<u8>) -> Frame {
        Frame {
            frame_type,
            sender_id,
            signature: [0; 64],
            payload,
        }
    }

    pub fn new_signed(
        frame_type: FrameType,
        sender_id: CourierPublicKey,
        payload: Vec<u8>,
        signature: CourierSignature,
    ) -> Frame {
        Frame {
            frame_type,
            sender_id,
            signature,
            payload,
        }
    }

    /// A signature is "present" when its bytes are not all zero; encoders
    /// that omit one write 64 zero bytes.
    pub fn has_signature(&self) -> bool {
        self.signature.iter().any(|byte| *byte != 0)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut vbytes: Vec<u8> = Vec::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        vbytes.push(FRAME_MAGIC);
        vbytes.push(FRAME_VERSION);
        vbytes.push(self.frame_type as u8);
        vbytes.push(0); // flags
        vbytes.extend(&(self.payload.len() as u32).to_be_bytes());
        vbytes.extend(&[0u8; 16]); // message id, reserved
        vbytes.extend(&self.sender_id);
        vbytes.extend(&self.signature);
        vbytes.extend(&self.payload);
        vbytes
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Frame, FrameError> {
        if bytes.len() < FRAME_HEADER_SIZE {
            return Err(FrameError::BufferTooShort {
                need: FRAME_HEADER_SIZE,
                got: bytes.len(),
            });
        }
        if bytes[0] != FRAME_MAGIC {
            return Err(FrameError::BadMagic(bytes[0]));
        }
        let frame_type =
            FrameType::try_from(bytes[2]).map_err(|_| FrameError::UnknownFrameType(bytes[2]))?;
        let payload_len = u32::from_be_bytes(bytes[4..8].try_into().unwrap()) as usize;
        if bytes.len() < FRAME_HEADER_SIZE + payload_len {
            return Err(FrameError::TruncatedPayload {
                need: FRAME_HEADER_SIZE + payload_len,
                got: bytes.len(),
            });
        }
        let sender_id: CourierPublicKey = bytes[24..56].try_into().unwrap();
        let signature: CourierSignature = bytes[56..120].try_into().unwrap();
        let payload = bytes[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + payload_len].to_vec();
        Ok(Frame {
            frame_type,
            sender_id,
            signature,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_serialize() {
        let frame = Frame::new_signed(
            FrameType::Data,
            [7; 32],
            b"SOMEDATA".to_vec(),
            [9; 64],
        );
        let serialized = frame.serialize();
        assert_eq!(serialized.len(), FRAME_HEADER_SIZE + 8);
        assert_eq!(serialized[0], FRAME_MAGIC);
        assert_eq!(serialized[1], FRAME_VERSION);
        assert_eq!(serialized[2], 2);

        let deserialized = Frame::deserialize(&serialized).unwrap();
        assert_eq!(frame, deserialized);
        assert!(deserialized.has_signature());
    }

    #[test]
    fn test_unsigned_frame_has_no_signature() {
        let frame = Frame::new(FrameType::Handshake, [0; 32], vec![0xAB; 32]);
        let deserialized = Frame::deserialize(&frame.serialize()).unwrap();
        assert!(!deserialized.has_signature());
        assert_eq!(deserialized.signature, [0; 64]);
    }

    #[test]
    fn test_deserialize_rejects_bad_magic() {
        let mut bytes = Frame::new(FrameType::Data, [1; 32], vec![]).serialize();
        bytes[0] = 0x59;
        assert_eq!(Frame::deserialize(&bytes), Err(FrameError::BadMagic(0x59)));
    }

    #[test]
    fn test_deserialize_rejects_short_header() {
        let result = Frame::deserialize(&[FRAME_MAGIC; 17]);
        assert_eq!(
            result,
            Err(FrameError::BufferTooShort {
                need: FRAME_HEADER_SIZE,
                got: 17
            })
        );
    }

    #[test]
    fn test_deserialize_rejects_truncated_payload() {
        let bytes = Frame::new(FrameType::Data, [1; 32], vec![1, 2, 3, 4]).serialize();
        let result = Frame::deserialize(&bytes[..bytes.len() - 2]);
        assert_eq!(
            result,
            Err(FrameError::TruncatedPayload {
                need: FRAME_HEADER_SIZE + 4,
                got: FRAME_HEADER_SIZE + 2
            })
        );
    }

    #[test]
    fn test_deserialize_rejects_unknown_type() {
        let mut bytes = Frame::new(FrameType::Data, [1; 32], vec![]).serialize();
        bytes[2] = 0x2A;
        assert_eq!(
            Frame::deserialize(&bytes),
            Err(FrameError::UnknownFrameType(0x2A))
        );
    }

    #[test]
    fn test_version_is_not_enforced() {
        let mut bytes = Frame::new(FrameType::Data, [1; 32], b"x".to_vec()).serialize();
        bytes[1] = 0x7F;
        assert!(Frame::deserialize(&bytes).is_ok());
    }
}
