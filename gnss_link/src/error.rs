use std::{fmt, io};

use crate::nmea::SentenceKind;

/// Error that possible during UBX frame assembly and parsing
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ParserError {
    InvalidChecksum {
        expect: u16,
        got: u16,
    },
    InvalidSync {
        got: [u8; 2],
    },
    InvalidPacketLen {
        expect: usize,
        got: usize,
    },
    PayloadTooLong {
        len: usize,
    },
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserError::InvalidChecksum { expect, got } => write!(
                f,
                "Not valid packet's checksum, expect {:x}, got {:x}",
                expect, got
            ),
            ParserError::InvalidSync { got } => write!(
                f,
                "Invalid sync chars, got {:02x} {:02x}",
                got[0], got[1]
            ),
            ParserError::InvalidPacketLen { expect, got } => {
                write!(f, "Invalid packet length, expect {}, got {}", expect, got)
            },
            ParserError::PayloadTooLong { len } => {
                write!(f, "Payload of {} bytes does not fit a UBX frame", len)
            },
        }
    }
}

impl std::error::Error for ParserError {}

/// Error that possible during NMEA sentence decoding
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum NmeaError {
    NotAscii,
    TooLong {
        len: usize,
    },
    MissingStart,
    MissingChecksum,
    MultipleChecksumDelimiters,
    InvalidChecksumDigits,
    ChecksumMismatch {
        expect: u8,
        got: u8,
    },
    InvalidTalker,
    UnknownSentence,
    FieldCount {
        kind: SentenceKind,
        expect: usize,
        got: usize,
    },
    InvalidField {
        kind: SentenceKind,
        field: &'static str,
    },
}

impl fmt::Display for NmeaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NmeaError::NotAscii => f.write_str("Sentence contains non-ASCII bytes"),
            NmeaError::TooLong { len } => write!(f, "Sentence too long: {} chars", len),
            NmeaError::MissingStart => f.write_str("Sentence does not start with '$'"),
            NmeaError::MissingChecksum => f.write_str("Sentence has no '*' checksum delimiter"),
            NmeaError::MultipleChecksumDelimiters => {
                f.write_str("Sentence has more than one '*' delimiter")
            },
            NmeaError::InvalidChecksumDigits => {
                f.write_str("Checksum is not two hexadecimal digits")
            },
            NmeaError::ChecksumMismatch { expect, got } => write!(
                f,
                "Not valid sentence checksum, expect {:02X}, got {:02X}",
                expect, got
            ),
            NmeaError::InvalidTalker => f.write_str("Invalid talker identifier"),
            NmeaError::UnknownSentence => f.write_str("Unknown sentence type"),
            NmeaError::FieldCount { kind, expect, got } => write!(
                f,
                "Invalid field count for {:?}, expect {}, got {}",
                kind, expect, got
            ),
            NmeaError::InvalidField { kind, field } => {
                write!(f, "Invalid field {} of sentence {:?}", field, kind)
            },
        }
    }
}

impl std::error::Error for NmeaError {}

/// Failure to read one complete frame or line from the transport
#[derive(Debug)]
pub enum ReadError {
    /// The read timeout expired before the binary frame was complete
    FrameTimeout { expected: usize, got: usize },
    /// The read timeout expired before a line terminator was seen
    LineTimeout { got: usize },
    Io(io::Error),
}

impl ReadError {
    /// Timeouts only lose the current frame, the transport itself is still usable
    pub fn is_timeout(&self) -> bool {
        match self {
            ReadError::FrameTimeout { .. } | ReadError::LineTimeout { .. } => true,
            ReadError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
            ),
        }
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::FrameTimeout { expected, got } => write!(
                f,
                "Timed out reading frame, expect {} bytes, got {}",
                expected, got
            ),
            ReadError::LineTimeout { got } => {
                write!(f, "Timed out reading line after {} bytes", got)
            },
            ReadError::Io(e) => write!(f, "Transport error: {}", e),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ReadError {
    fn from(error: io::Error) -> Self {
        ReadError::Io(error)
    }
}

/// Bytes were read but did not form a valid sentence or frame.
///
/// Never fatal: the I/O loop discards the data and counts it.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum DecodeError {
    Ubx(ParserError),
    Nmea(NmeaError),
    /// An ASCII candidate line that does not start with '$'
    NonSentenceLine,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Ubx(e) => write!(f, "UBX frame rejected: {}", e),
            DecodeError::Nmea(e) => write!(f, "NMEA sentence rejected: {}", e),
            DecodeError::NonSentenceLine => f.write_str("Line is not an NMEA sentence"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<ParserError> for DecodeError {
    fn from(e: ParserError) -> Self {
        DecodeError::Ubx(e)
    }
}

impl From<NmeaError> for DecodeError {
    fn from(e: NmeaError) -> Self {
        DecodeError::Nmea(e)
    }
}

/// Identifies one of the two bounded read queues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Sentence,
    Frame,
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueKind::Sentence => f.write_str("sentence"),
            QueueKind::Frame => f.write_str("binary frame"),
        }
    }
}

/// Unrecoverable link failures
#[derive(Debug)]
pub enum LinkError {
    /// A bounded read queue was full: its consumer stopped draining
    QueueOverflow { queue: QueueKind, capacity: usize },
    /// A read queue was configured without room for a single entry
    ZeroCapacity { queue: QueueKind },
    /// A command was issued while frames from a previous exchange are still queued
    CommandOutstanding { pending: usize },
    /// The other side of a queue is gone, usually because the I/O loop terminated
    Disconnected,
    Io(io::Error),
    Parser(ParserError),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::QueueOverflow { queue, capacity } => write!(
                f,
                "The {} queue is full ({} entries), consumer stalled",
                queue, capacity
            ),
            LinkError::ZeroCapacity { queue } => {
                write!(f, "The {} queue needs a capacity of at least 1", queue)
            },
            LinkError::CommandOutstanding { pending } => write!(
                f,
                "Binary frame queue must be empty before sending a command, {} pending",
                pending
            ),
            LinkError::Disconnected => f.write_str("I/O loop is not running"),
            LinkError::Io(e) => write!(f, "Transport error: {}", e),
            LinkError::Parser(e) => write!(f, "Cannot assemble command: {}", e),
        }
    }
}

impl std::error::Error for LinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LinkError::Io(e) => Some(e),
            LinkError::Parser(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LinkError {
    fn from(error: io::Error) -> Self {
        LinkError::Io(error)
    }
}

impl From<ReadError> for LinkError {
    fn from(error: ReadError) -> Self {
        match error {
            ReadError::Io(e) => LinkError::Io(e),
            timeout => {
                LinkError::Io(io::Error::new(io::ErrorKind::TimedOut, timeout.to_string()))
            },
        }
    }
}

impl From<ParserError> for LinkError {
    fn from(e: ParserError) -> Self {
        LinkError::Parser(e)
    }
}
