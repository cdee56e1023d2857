//! Splits the receiver byte stream into binary frames and text lines.
//!
//! The first byte of every frame decides its type: [`UBX_SYNC_CHAR_1`] starts
//! a binary frame, anything else starts a line. A text line that happens to
//! begin with `0xb5` is therefore misread as a binary frame; NMEA sentences
//! always start with `$` so this only affects garbage.

use std::time::Duration;

use crate::{
    constants::{
        NMEA_END_CHAR_2, NMEA_MAX_SENTENCE_LENGTH, UBX_CHECKSUM_LEN, UBX_HEADER_LEN,
        UBX_HEADER_REMAINDER, UBX_LENGTH_OFFSET, UBX_PAYLOAD_SIZE_LEN, UBX_SYNC_CHAR_1,
    },
    error::ReadError,
    transport::Transport,
};

/// Lines longer than this are cut, the decoder rejects them as too long
const MAX_LINE_LEN: usize = NMEA_MAX_SENTENCE_LENGTH + 2;

/// One undecoded unit read from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame {
    /// A complete binary frame including sync chars and checksum
    Ubx(Vec<u8>),
    /// A candidate text line including its terminator
    Line(Vec<u8>),
}

/// Read the next frame, `Ok(None)` when no byte is waiting.
///
/// While the remainder of a binary frame is read, the transport timeout is
/// raised to `frame_timeout` and restored afterwards, on failure too.
pub fn read_frame<T>(
    transport: &mut T,
    frame_timeout: Duration,
) -> Result<Option<RawFrame>, ReadError>
where
    T: Transport + ?Sized,
{
    if transport.bytes_available()? == 0 {
        return Ok(None);
    }
    let first = transport.read_exact(1)?;
    if first[0] == UBX_SYNC_CHAR_1 {
        let normal_timeout = transport.timeout();
        transport.set_timeout(frame_timeout)?;
        let frame = read_ubx_remainder(transport, first);
        transport.set_timeout(normal_timeout)?;
        return frame.map(|bytes| Some(RawFrame::Ubx(bytes)));
    }
    if first[0] == NMEA_END_CHAR_2 {
        return Ok(Some(RawFrame::Line(first)));
    }
    let mut line = first;
    match transport.read_line(MAX_LINE_LEN - 1) {
        Ok(rest) => line.extend_from_slice(&rest),
        Err(ReadError::LineTimeout { got }) => {
            return Err(ReadError::LineTimeout { got: got + 1 })
        },
        Err(e) => return Err(e),
    }
    Ok(Some(RawFrame::Line(line)))
}

fn read_ubx_remainder<T>(transport: &mut T, mut frame: Vec<u8>) -> Result<Vec<u8>, ReadError>
where
    T: Transport + ?Sized,
{
    read_into(transport, &mut frame, UBX_HEADER_REMAINDER, UBX_HEADER_LEN)?;
    read_into(transport, &mut frame, UBX_PAYLOAD_SIZE_LEN, UBX_HEADER_LEN)?;
    let payload_len = usize::from(u16::from_le_bytes([
        frame[UBX_LENGTH_OFFSET],
        frame[UBX_LENGTH_OFFSET + 1],
    ]));
    let total = UBX_HEADER_LEN + payload_len + UBX_CHECKSUM_LEN;
    read_into(transport, &mut frame, payload_len + UBX_CHECKSUM_LEN, total)?;
    Ok(frame)
}

/// Append `len` bytes to `frame`, timeouts report progress against `expected`
fn read_into<T>(
    transport: &mut T,
    frame: &mut Vec<u8>,
    len: usize,
    expected: usize,
) -> Result<(), ReadError>
where
    T: Transport + ?Sized,
{
    match transport.read_exact(len) {
        Ok(bytes) => {
            frame.extend_from_slice(&bytes);
            Ok(())
        },
        Err(ReadError::FrameTimeout { got, .. }) => Err(ReadError::FrameTimeout {
            expected,
            got: frame.len() + got,
        }),
        Err(e) => Err(e),
    }
}
