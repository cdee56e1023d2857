//! UBX binary frames: assembly, parsing and checksums.
//!
//! A frame on the wire is laid out as
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 2 | sync chars `0xb5 0x62` |
//! | 2 | 1 | class id |
//! | 3 | 1 | message id |
//! | 4 | 2 | payload length N, little endian |
//! | 6 | N | payload |
//! | 6+N | 2 | checksum (ck_a, ck_b) |

pub mod packets;

use crate::{
    constants::{
        UBX_CHECKSUM_LEN, UBX_CLASS_OFFSET, UBX_HEADER_LEN, UBX_LENGTH_OFFSET, UBX_MAX_PAYLOAD_LEN,
        UBX_MSG_ID_OFFSET, UBX_SYNC_CHAR_1, UBX_SYNC_CHAR_2,
    },
    error::ParserError,
};

/// UBX [Fletcher-16 checksum](https://en.wikipedia.org/wiki/Fletcher%27s_checksum) calculator supporting both streaming and single-shot validation
#[derive(Default, Debug, Clone, Copy)]
pub struct UbxChecksumCalc {
    ck_a: u8,
    ck_b: u8,
}

impl UbxChecksumCalc {
    pub const fn new() -> Self {
        Self { ck_a: 0, ck_b: 0 }
    }

    /// Update checksum with new bytes
    pub const fn update(&mut self, bytes: &[u8]) {
        let mut i = 0;
        while i < bytes.len() {
            self.update_byte(bytes[i]);
            i += 1;
        }
    }

    /// Update checksum with a single byte
    pub const fn update_byte(&mut self, byte: u8) {
        self.ck_a = self.ck_a.wrapping_add(byte);
        self.ck_b = self.ck_b.wrapping_add(self.ck_a);
    }

    /// Get the current checksum result
    pub const fn result(self) -> (u8, u8) {
        (self.ck_a, self.ck_b)
    }

    /// Validate checksum and return result
    pub const fn validate_result(
        self,
        received_ck_a: u8,
        received_ck_b: u8,
    ) -> Result<(), ParserError> {
        if self.ck_a == received_ck_a && self.ck_b == received_ck_b {
            Ok(())
        } else {
            Err(ParserError::InvalidChecksum {
                expect: u16::from_le_bytes([received_ck_a, received_ck_b]),
                got: u16::from_le_bytes([self.ck_a, self.ck_b]),
            })
        }
    }
}

/// The checksum is calculated over the packet, starting and including the CLASS field,
/// up until, but excluding, the Checksum Field.
/// So slice should starts with class id.
/// Return ck_a and ck_b
pub const fn ubx_checksum(data: &[u8]) -> (u8, u8) {
    let mut calc = UbxChecksumCalc::new();
    calc.update(data);
    calc.result()
}

/// Build the wire bytes of a frame: header, class, id, length, payload and checksum
pub fn assemble(class: u8, msg_id: u8, payload: &[u8]) -> Result<Vec<u8>, ParserError> {
    if payload.len() > UBX_MAX_PAYLOAD_LEN {
        return Err(ParserError::PayloadTooLong { len: payload.len() });
    }
    Ok(frame_bytes(class, msg_id, payload))
}

/// `payload` must be at most `UBX_MAX_PAYLOAD_LEN` bytes
pub(crate) fn frame_bytes(class: u8, msg_id: u8, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= UBX_MAX_PAYLOAD_LEN);
    let len_bytes = (payload.len() as u16).to_le_bytes();

    let mut out = Vec::with_capacity(UBX_HEADER_LEN + payload.len() + UBX_CHECKSUM_LEN);
    out.extend_from_slice(&[UBX_SYNC_CHAR_1, UBX_SYNC_CHAR_2, class, msg_id]);
    out.extend_from_slice(&len_bytes);
    out.extend_from_slice(payload);

    let (ck_a, ck_b) = ubx_checksum(&out[UBX_CLASS_OFFSET..]);
    out.push(ck_a);
    out.push(ck_b);
    out
}

/// One complete, checksum-verified UBX frame
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UbxFrame {
    class: u8,
    msg_id: u8,
    payload: Vec<u8>,
    checksum: [u8; 2],
}

impl UbxFrame {
    pub fn new(class: u8, msg_id: u8, payload: impl Into<Vec<u8>>) -> Result<Self, ParserError> {
        let payload = payload.into();
        if payload.len() > UBX_MAX_PAYLOAD_LEN {
            return Err(ParserError::PayloadTooLong { len: payload.len() });
        }
        Ok(Self::from_checked_parts(class, msg_id, payload))
    }

    /// `payload` must be at most `UBX_MAX_PAYLOAD_LEN` bytes
    pub(crate) fn from_checked_parts(class: u8, msg_id: u8, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= UBX_MAX_PAYLOAD_LEN);
        let mut calc = UbxChecksumCalc::new();
        calc.update(&[class, msg_id]);
        calc.update(&(payload.len() as u16).to_le_bytes());
        calc.update(&payload);
        let (ck_a, ck_b) = calc.result();
        Self {
            class,
            msg_id,
            payload,
            checksum: [ck_a, ck_b],
        }
    }

    /// Parse exactly one frame. `bytes` must start with the sync chars and end
    /// with the checksum, nothing more.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParserError> {
        let min_len = UBX_HEADER_LEN + UBX_CHECKSUM_LEN;
        if bytes.len() < min_len {
            return Err(ParserError::InvalidPacketLen {
                expect: min_len,
                got: bytes.len(),
            });
        }
        if bytes[0] != UBX_SYNC_CHAR_1 || bytes[1] != UBX_SYNC_CHAR_2 {
            return Err(ParserError::InvalidSync {
                got: [bytes[0], bytes[1]],
            });
        }
        let pack_len = u16::from_le_bytes([bytes[UBX_LENGTH_OFFSET], bytes[UBX_LENGTH_OFFSET + 1]])
            as usize;
        let expect = UBX_HEADER_LEN + pack_len + UBX_CHECKSUM_LEN;
        if bytes.len() != expect {
            return Err(ParserError::InvalidPacketLen {
                expect,
                got: bytes.len(),
            });
        }

        let checksum_at = UBX_HEADER_LEN + pack_len;
        let mut calc = UbxChecksumCalc::new();
        calc.update(&bytes[UBX_CLASS_OFFSET..checksum_at]);
        calc.validate_result(bytes[checksum_at], bytes[checksum_at + 1])?;

        Ok(Self {
            class: bytes[UBX_CLASS_OFFSET],
            msg_id: bytes[UBX_MSG_ID_OFFSET],
            payload: bytes[UBX_HEADER_LEN..checksum_at].to_vec(),
            checksum: [bytes[checksum_at], bytes[checksum_at + 1]],
        })
    }

    pub fn class(&self) -> u8 {
        self.class
    }

    pub fn msg_id(&self) -> u8 {
        self.msg_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// (ck_a, ck_b) packed little endian, the order they appear on the wire
    pub fn checksum(&self) -> u16 {
        u16::from_le_bytes(self.checksum)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(UBX_HEADER_LEN + self.payload.len() + UBX_CHECKSUM_LEN);
        out.extend_from_slice(&[UBX_SYNC_CHAR_1, UBX_SYNC_CHAR_2, self.class, self.msg_id]);
        out.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&self.checksum);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // UBX-ACK-ACK packet: Class=0x05, ID=0x01, Length=0x0002, Payload=[0x06, 0x01], Checksum=[0x0f, 0x38]
    static FULL_ACK_ACK_PACK: [u8; 10] = [0xb5, 0x62, 0x5, 0x1, 0x2, 0x0, 0x6, 0x1, 0xf, 0x38];

    #[test]
    fn test_streaming_checksum_incremental() {
        let mut calc = UbxChecksumCalc::new();
        for byte in &FULL_ACK_ACK_PACK[2..8] {
            calc.update_byte(*byte);
        }
        assert_eq!(calc.validate_result(0x0f, 0x38), Ok(()));
    }

    #[test]
    fn test_streaming_checksum_chunks() {
        let mut calc = UbxChecksumCalc::new();
        calc.update(&FULL_ACK_ACK_PACK[2..4]); // Class and ID
        calc.update(&FULL_ACK_ACK_PACK[4..6]); // Length
        calc.update(&FULL_ACK_ACK_PACK[6..8]); // Payload
        assert_eq!(calc.result(), (0x0f, 0x38));
    }

    #[test]
    fn test_assemble_ack_ack() {
        assert_eq!(
            assemble(0x05, 0x01, &[0x06, 0x01]).unwrap(),
            FULL_ACK_ACK_PACK.to_vec()
        );
    }

    #[test]
    fn test_cfg_nav5_all_zero_checksum() {
        // ck_a = 0x06 + 0x24 + 0x24 = 0x4e
        // ck_b = 0x06 + 0x2a + 38 * 0x4e = 0xc4 (mod 256)
        let bytes = assemble(0x06, 0x24, &[0; 36]).unwrap();
        assert_eq!(bytes.len(), 44);
        assert_eq!(&bytes[42..], &[0x4e, 0xc4]);
        assert_eq!(UbxFrame::parse(&bytes).unwrap().checksum(), 0xc44e);
    }

    #[test]
    fn test_parse_ack_ack() {
        let frame = UbxFrame::parse(&FULL_ACK_ACK_PACK).unwrap();
        assert_eq!(frame.class(), 0x05);
        assert_eq!(frame.msg_id(), 0x01);
        assert_eq!(frame.payload(), &[0x06, 0x01]);
        assert_eq!(frame.to_bytes(), FULL_ACK_ACK_PACK.to_vec());
    }

    #[test]
    fn test_parse_bad_checksum() {
        let mut bad_pack = FULL_ACK_ACK_PACK;
        bad_pack[bad_pack.len() - 3] = 5;
        assert_eq!(
            UbxFrame::parse(&bad_pack),
            Err(ParserError::InvalidChecksum {
                expect: 0x380f,
                got: 0x3c13
            })
        );
    }

    #[test]
    fn test_parse_bad_sync() {
        let mut bad_pack = FULL_ACK_ACK_PACK;
        bad_pack[1] = 0x63;
        assert_eq!(
            UbxFrame::parse(&bad_pack),
            Err(ParserError::InvalidSync { got: [0xb5, 0x63] })
        );
    }

    #[test]
    fn test_parse_truncated() {
        assert_eq!(
            UbxFrame::parse(&FULL_ACK_ACK_PACK[..9]),
            Err(ParserError::InvalidPacketLen { expect: 10, got: 9 })
        );
        assert_eq!(
            UbxFrame::parse(&FULL_ACK_ACK_PACK[..4]),
            Err(ParserError::InvalidPacketLen { expect: 8, got: 4 })
        );
    }

    #[test]
    fn test_empty_payload() {
        let bytes = assemble(0x0a, 0x04, &[]).unwrap();
        let frame = UbxFrame::parse(&bytes).unwrap();
        assert!(frame.payload().is_empty());
        assert_eq!(frame, UbxFrame::new(0x0a, 0x04, vec![]).unwrap());
    }

    #[test]
    fn test_payload_too_long() {
        let payload = vec![0; UBX_MAX_PAYLOAD_LEN + 1];
        assert_eq!(
            assemble(0x06, 0x01, &payload),
            Err(ParserError::PayloadTooLong {
                len: UBX_MAX_PAYLOAD_LEN + 1
            })
        );
        assert!(UbxFrame::new(0x06, 0x01, payload).is_err());
    }

    #[test]
    fn test_reversed_payload_changes_checksum() {
        let payload: Vec<u8> = (1..=16).collect();
        let reversed: Vec<u8> = payload.iter().rev().copied().collect();
        let a = UbxFrame::new(0x06, 0x24, payload).unwrap();
        let b = UbxFrame::new(0x06, 0x24, reversed).unwrap();
        assert_ne!(a.checksum(), b.checksum());
    }
}
