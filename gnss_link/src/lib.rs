//! # gnss_link
//!
//! Communication with u-blox GNSS receivers that interleave NMEA sentences and
//! UBX binary frames on a single serial link.
//!
//! A background I/O loop owns the transport. It classifies every incoming
//! frame, validates it and hands the result to bounded queues: sentences for
//! position fixes, binary frames for command acknowledgements. The
//! application talks to a [`GnssReader`] which polls the newest fix and runs
//! a blocking command/acknowledgement handshake on top of the queues.
//!
//! Starting a link
//! ===============
//!
//! [`GnssLink::spawn`] runs the I/O loop on its own thread. [`GnssLink::build`]
//! hands the loop to the caller instead, which makes each step observable:
//!
//! ```
//! use gnss_link::{GnssLink, LinkConfig, MemoryTransport, ReadOutcome};
//!
//! const GGA: &[u8] =
//!     b"$GPGGA,092725.00,4717.11399,N,00833.91590,E,1,08,1.01,499.6,M,48.0,M,,*5B\r\n";
//!
//! let (transport, device) = MemoryTransport::new();
//! device.push_incoming(GGA);
//!
//! let (mut io_loop, mut reader) = GnssLink::build(transport, &LinkConfig::default())?;
//! assert_eq!(io_loop.iterate()?, ReadOutcome::Sentence);
//!
//! let fix = reader.latest_fix()?.expect("fix was queued");
//! assert!(fix.is_valid());
//! assert_eq!(fix.satellites, 8);
//! # Ok::<(), gnss_link::LinkError>(())
//! ```
//!
//! Building commands
//! =================
//!
//! Typed configuration packets implement [`UbxPacketCreator`]:
//! ```
//! use gnss_link::{CfgNav5, UbxPacketCreator};
//!
//! let bytes = CfgNav5::flight_mode().into_packet_bytes();
//! assert_eq!(bytes.len(), 44);
//! assert_eq!(&bytes[..4], &[0xb5, 0x62, 0x06, 0x24]);
//! ```

pub use crate::{
    command::{AckOutcome, CommandChannel, PendingCommand},
    config::LinkConfig,
    error::{DecodeError, LinkError, NmeaError, ParserError, QueueKind, ReadError},
    framing::{read_frame, RawFrame},
    io_loop::{IoLoop, LinkStats, LinkStatsSnapshot, ReadOutcome},
    link::{GnssLink, IoHandle},
    nmea::{Fix, RawSentence, Sentence, SentenceKind, Talker},
    reader::{GnssReader, StartupReport, StartupStep},
    transport::{MemoryHandle, MemoryTransport, Transport},
    ubx::{assemble, packets::*, ubx_checksum, UbxChecksumCalc, UbxFrame},
};

#[cfg(feature = "serialport")]
pub use crate::serial::{SerialSettings, SerialTransport};

pub mod command;
pub mod config;
pub mod constants;
pub mod error;
pub mod framing;
pub mod io_loop;
pub mod link;
pub mod nmea;
pub mod queue;
pub mod reader;
#[cfg(feature = "serialport")]
pub mod serial;
pub mod transport;
pub mod ubx;
