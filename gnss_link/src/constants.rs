pub const UBX_SYNC_CHAR_1: u8 = 0xb5;
pub const UBX_SYNC_CHAR_2: u8 = 0x62;
pub(crate) const UBX_SYNC_SIZE: usize = 2;
pub(crate) const UBX_PAYLOAD_SIZE_LEN: usize = 2;
pub(crate) const UBX_CLASS_LEN: usize = 1;
pub(crate) const UBX_ID_LEN: usize = 1;
pub(crate) const UBX_HEADER_LEN: usize =
    UBX_SYNC_SIZE + UBX_PAYLOAD_SIZE_LEN + UBX_CLASS_LEN + UBX_ID_LEN;
pub(crate) const UBX_CHECKSUM_LEN: usize = 2;

pub(crate) const UBX_CLASS_OFFSET: usize = 2; // After SYNC_CHAR_1, SYNC_CHAR_2
pub(crate) const UBX_MSG_ID_OFFSET: usize = 3; // After CLASS
pub(crate) const UBX_LENGTH_OFFSET: usize = 4; // After MSG_ID

/// Bytes the frame classifier reads after the first sync char before the length field:
/// second sync char, class and message id
pub(crate) const UBX_HEADER_REMAINDER: usize = UBX_LENGTH_OFFSET - 1;

pub const UBX_MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

pub const UBX_CLASS_ACK: u8 = 0x05;
pub const UBX_ID_ACK_ACK: u8 = 0x01;
pub const UBX_ID_ACK_NAK: u8 = 0x00;
pub const UBX_CLASS_CFG: u8 = 0x06;
pub const UBX_CLASS_NMEA_STD: u8 = 0xf0;

pub const NMEA_SYNC_CHAR: u8 = 0x24; // '$'
pub const NMEA_CHECKSUM_DELIMITER: u8 = 0x2a; // '*'
pub const NMEA_FIELD_SEPARATOR: u8 = 0x2c; // ','
pub const NMEA_END_CHAR_1: u8 = 0x0d; // '\r' (<CR>)
pub const NMEA_END_CHAR_2: u8 = 0x0a; // '\n' (<LF>)
pub(crate) const NMEA_MAX_SENTENCE_LENGTH: usize = 82; // Maximum NMEA sentence length
