//! NMEA 0183 sentences as emitted by u-blox receivers (protocol 4.0 and 4.10 field layouts).
//!
//! Decoding is receive-only: a line is validated (`$` start, a single `*`,
//! two hex checksum digits matching the XOR of everything between `$` and `*`),
//! its address split into talker and sentence kind, and its field count checked
//! against the fixed layouts of that kind. Only the GGA fix report is interpreted.
//!
//! The only encoding supported is wrapping a proprietary command body with
//! delimiters and checksum, see [`encode_sentence`].

use chrono::NaiveTime;
use core::fmt;

use crate::{
    constants::{
        NMEA_CHECKSUM_DELIMITER, NMEA_END_CHAR_1, NMEA_END_CHAR_2, NMEA_FIELD_SEPARATOR,
        NMEA_MAX_SENTENCE_LENGTH, NMEA_SYNC_CHAR,
    },
    error::NmeaError,
    ubx::packets::NmeaStdMessage,
};

/// XOR of all bytes. `body` is everything between `$` and `*`.
pub fn nmea_checksum(body: &[u8]) -> u8 {
    body.iter().fold(0, |acc, b| acc ^ b)
}

/// Wrap `body` into a complete sentence: `$<body>*<CS>\r\n`
pub fn encode_sentence(body: &str) -> String {
    format!("${}*{:02X}\r\n", body, nmea_checksum(body.as_bytes()))
}

/// `$PUBX,40` command setting the output rate of a standard message
pub fn pubx_rate_command(message: NmeaStdMessage, rate: u8) -> String {
    encode_sentence(&format!("PUBX,40,{},{},0,0,0", message.name(), rate))
}

/// Validate framing and checksum of one line, returning the body between `$` and `*`.
pub fn split_checksum(line: &[u8]) -> Result<&str, NmeaError> {
    if !line.is_ascii() {
        return Err(NmeaError::NotAscii);
    }
    let line = trim_line_end(line);
    if line.len() + 2 > NMEA_MAX_SENTENCE_LENGTH {
        return Err(NmeaError::TooLong {
            len: line.len() + 2,
        });
    }
    let Some((&NMEA_SYNC_CHAR, rest)) = line.split_first() else {
        return Err(NmeaError::MissingStart);
    };

    let mut parts = rest.split(|b| *b == NMEA_CHECKSUM_DELIMITER);
    let body = parts.next().unwrap_or_default();
    let digits = parts.next().ok_or(NmeaError::MissingChecksum)?;
    if parts.next().is_some() {
        return Err(NmeaError::MultipleChecksumDelimiters);
    }

    let expect = parse_checksum_digits(digits)?;
    let got = nmea_checksum(body);
    if expect != got {
        return Err(NmeaError::ChecksumMismatch { expect, got });
    }
    // ASCII checked above
    core::str::from_utf8(body).map_err(|_| NmeaError::NotAscii)
}

fn trim_line_end(mut line: &[u8]) -> &[u8] {
    while let Some((&last, rest)) = line.split_last() {
        if last == NMEA_END_CHAR_1 || last == NMEA_END_CHAR_2 || last == b' ' {
            line = rest;
        } else {
            break;
        }
    }
    line
}

fn parse_checksum_digits(digits: &[u8]) -> Result<u8, NmeaError> {
    if digits.len() != 2 || !digits.iter().all(u8::is_ascii_hexdigit) {
        return Err(NmeaError::InvalidChecksumDigits);
    }
    let hex = core::str::from_utf8(digits).map_err(|_| NmeaError::InvalidChecksumDigits)?;
    u8::from_str_radix(hex, 16).map_err(|_| NmeaError::InvalidChecksumDigits)
}

/// Two letter talker identifier, e.g. `GP` (GPS), `GN` (combined GNSS)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Talker([u8; 2]);

impl Talker {
    pub const GPS: Talker = Talker(*b"GP");
    pub const GLONASS: Talker = Talker(*b"GL");
    pub const GALILEO: Talker = Talker(*b"GA");
    pub const BEIDOU: Talker = Talker(*b"GB");
    pub const COMBINED: Talker = Talker(*b"GN");

    fn parse(raw: &[u8]) -> Result<Self, NmeaError> {
        match *raw {
            [a, b] if a.is_ascii_uppercase() && b.is_ascii_uppercase() => Ok(Talker([a, b])),
            _ => Err(NmeaError::InvalidTalker),
        }
    }

    pub fn as_str(&self) -> &str {
        // Only constructed from two uppercase ASCII letters
        core::str::from_utf8(&self.0).unwrap_or("??")
    }
}

impl fmt::Display for Talker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Talker {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Number of comma separated fields after the address field.
///
/// Protocol 4.10 appends a field to GLL, GSA, GSV and RMC, both counts are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldLayout {
    /// One of the listed counts, ascending
    Exact(&'static [usize]),
    /// `fixed` fields followed by up to `max_groups` groups of `group` fields,
    /// then at most `trailing` extra fields
    Repeated {
        fixed: usize,
        group: usize,
        max_groups: usize,
        trailing: usize,
    },
}

impl FieldLayout {
    fn accepts(self, count: usize) -> bool {
        match self {
            FieldLayout::Exact(counts) => counts.contains(&count),
            FieldLayout::Repeated {
                fixed,
                group,
                max_groups,
                trailing,
            } => (0..=trailing).any(|extra| {
                count >= fixed + extra
                    && (count - fixed - extra) % group == 0
                    && (count - fixed - extra) / group <= max_groups
            }),
        }
    }

    /// The valid count closest above `count` (or the largest valid one)
    fn nearest(self, count: usize) -> usize {
        match self {
            FieldLayout::Exact(counts) => counts
                .iter()
                .copied()
                .find(|n| *n >= count)
                .or_else(|| counts.last().copied())
                .unwrap_or_default(),
            FieldLayout::Repeated {
                fixed,
                group,
                max_groups,
                ..
            } => {
                let groups = count.saturating_sub(fixed).div_ceil(group).min(max_groups);
                fixed + groups * group
            },
        }
    }
}

/// Recognized sentence types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SentenceKind {
    /// Global positioning system fix data
    Gga,
    /// Latitude and longitude, with time of position fix and status
    Gll,
    /// GNSS DOP and active satellites
    Gsa,
    /// GNSS satellites in view
    Gsv,
    /// Recommended minimum data
    Rmc,
    /// Course over ground and ground speed
    Vtg,
    /// Text transmission
    Txt,
}

impl SentenceKind {
    fn from_formatter(raw: &[u8]) -> Option<Self> {
        Some(match raw {
            b"GGA" => SentenceKind::Gga,
            b"GLL" => SentenceKind::Gll,
            b"GSA" => SentenceKind::Gsa,
            b"GSV" => SentenceKind::Gsv,
            b"RMC" => SentenceKind::Rmc,
            b"VTG" => SentenceKind::Vtg,
            b"TXT" => SentenceKind::Txt,
            _ => return None,
        })
    }

    pub fn formatter(self) -> &'static str {
        match self {
            SentenceKind::Gga => "GGA",
            SentenceKind::Gll => "GLL",
            SentenceKind::Gsa => "GSA",
            SentenceKind::Gsv => "GSV",
            SentenceKind::Rmc => "RMC",
            SentenceKind::Vtg => "VTG",
            SentenceKind::Txt => "TXT",
        }
    }

    fn layout(self) -> FieldLayout {
        match self {
            SentenceKind::Gga => FieldLayout::Exact(&[14]),
            SentenceKind::Gll => FieldLayout::Exact(&[7, 8]),
            SentenceKind::Gsa => FieldLayout::Exact(&[17, 18]),
            SentenceKind::Gsv => FieldLayout::Repeated {
                fixed: 3,
                group: 4,
                max_groups: 4,
                // signal id
                trailing: 1,
            },
            SentenceKind::Rmc => FieldLayout::Exact(&[12, 13]),
            SentenceKind::Vtg => FieldLayout::Exact(&[9]),
            SentenceKind::Txt => FieldLayout::Exact(&[4]),
        }
    }
}

/// A single positioning report
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Fix {
    pub talker: Talker,
    /// UTC time of day of the fix
    pub time: Option<NaiveTime>,
    /// Decimal degrees, negative south
    pub latitude: Option<f64>,
    /// Decimal degrees, negative west
    pub longitude: Option<f64>,
    /// Meters above mean sea level
    pub altitude: Option<f64>,
    pub satellites: u8,
    /// 0 = no fix
    pub quality: u8,
    /// Horizontal dilution of precision
    pub hdop: Option<f32>,
}

impl Fix {
    pub fn is_valid(&self) -> bool {
        self.quality > 0
    }
}

/// A recognized sentence whose fields are kept without interpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSentence {
    pub talker: Talker,
    pub fields: Vec<String>,
}

impl RawSentence {
    fn new(talker: Talker, fields: &[&str]) -> Self {
        Self {
            talker,
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// One decoded NMEA sentence
#[derive(Debug, Clone, PartialEq)]
pub enum Sentence {
    Gga(Fix),
    Gll(RawSentence),
    Gsa(RawSentence),
    Gsv(RawSentence),
    Rmc(RawSentence),
    Vtg(RawSentence),
    Txt(RawSentence),
}

impl Sentence {
    /// Decode one line, with or without its `\r\n` terminator
    pub fn decode(line: &[u8]) -> Result<Self, NmeaError> {
        let body = split_checksum(line)?;
        let mut fields = body.split(NMEA_FIELD_SEPARATOR as char);
        let address = fields.next().unwrap_or_default().as_bytes();
        if address.len() != 5 {
            return Err(NmeaError::UnknownSentence);
        }
        let kind = SentenceKind::from_formatter(&address[2..]).ok_or(NmeaError::UnknownSentence)?;
        let talker = Talker::parse(&address[..2])?;

        let fields: Vec<&str> = fields.collect();
        let layout = kind.layout();
        if !layout.accepts(fields.len()) {
            return Err(NmeaError::FieldCount {
                kind,
                expect: layout.nearest(fields.len()),
                got: fields.len(),
            });
        }

        Ok(match kind {
            SentenceKind::Gga => Sentence::Gga(parse_gga(talker, &fields)?),
            SentenceKind::Gll => Sentence::Gll(RawSentence::new(talker, &fields)),
            SentenceKind::Gsa => Sentence::Gsa(RawSentence::new(talker, &fields)),
            SentenceKind::Gsv => Sentence::Gsv(RawSentence::new(talker, &fields)),
            SentenceKind::Rmc => Sentence::Rmc(RawSentence::new(talker, &fields)),
            SentenceKind::Vtg => Sentence::Vtg(RawSentence::new(talker, &fields)),
            SentenceKind::Txt => Sentence::Txt(RawSentence::new(talker, &fields)),
        })
    }

    pub fn kind(&self) -> SentenceKind {
        match self {
            Sentence::Gga(_) => SentenceKind::Gga,
            Sentence::Gll(_) => SentenceKind::Gll,
            Sentence::Gsa(_) => SentenceKind::Gsa,
            Sentence::Gsv(_) => SentenceKind::Gsv,
            Sentence::Rmc(_) => SentenceKind::Rmc,
            Sentence::Vtg(_) => SentenceKind::Vtg,
            Sentence::Txt(_) => SentenceKind::Txt,
        }
    }

    pub fn talker(&self) -> Talker {
        match self {
            Sentence::Gga(fix) => fix.talker,
            Sentence::Gll(raw)
            | Sentence::Gsa(raw)
            | Sentence::Gsv(raw)
            | Sentence::Rmc(raw)
            | Sentence::Vtg(raw)
            | Sentence::Txt(raw) => raw.talker,
        }
    }

    pub fn fix(&self) -> Option<&Fix> {
        match self {
            Sentence::Gga(fix) => Some(fix),
            _ => None,
        }
    }
}

// GGA field indices
const GGA_TIME: usize = 0;
const GGA_LAT: usize = 1;
const GGA_NS: usize = 2;
const GGA_LON: usize = 3;
const GGA_EW: usize = 4;
const GGA_QUALITY: usize = 5;
const GGA_NUM_SV: usize = 6;
const GGA_HDOP: usize = 7;
const GGA_ALT: usize = 8;

fn parse_gga(talker: Talker, fields: &[&str]) -> Result<Fix, NmeaError> {
    let invalid = |field| NmeaError::InvalidField {
        kind: SentenceKind::Gga,
        field,
    };

    let time = parse_time(fields[GGA_TIME]).ok_or_else(|| invalid("time"))?;
    let quality: u8 = fields[GGA_QUALITY]
        .parse()
        .map_err(|_| invalid("quality"))?;
    let satellites: u8 = parse_optional(fields[GGA_NUM_SV])
        .ok_or_else(|| invalid("num_sv"))?
        .unwrap_or(0);
    let hdop: Option<f32> = parse_optional(fields[GGA_HDOP]).ok_or_else(|| invalid("hdop"))?;

    let mut fix = Fix {
        talker,
        time,
        latitude: None,
        longitude: None,
        altitude: None,
        satellites,
        quality,
        hdop,
    };
    // Without a fix the receiver fills position fields with placeholders
    if quality == 0 {
        return Ok(fix);
    }

    fix.latitude = parse_coordinate(fields[GGA_LAT], fields[GGA_NS], 2, b'N', b'S')
        .ok_or_else(|| invalid("lat"))?;
    fix.longitude = parse_coordinate(fields[GGA_LON], fields[GGA_EW], 3, b'E', b'W')
        .ok_or_else(|| invalid("lon"))?;
    fix.altitude = parse_optional(fields[GGA_ALT]).ok_or_else(|| invalid("alt"))?;
    Ok(fix)
}

/// `None` when the field is malformed, `Some(None)` when it is empty
fn parse_optional<T: core::str::FromStr>(field: &str) -> Option<Option<T>> {
    if field.is_empty() {
        Some(None)
    } else {
        field.parse().ok().map(Some)
    }
}

/// `hhmmss` or `hhmmss.ss`
fn parse_time(field: &str) -> Option<Option<NaiveTime>> {
    if field.is_empty() {
        return Some(None);
    }
    NaiveTime::parse_from_str(field, "%H%M%S%.f")
        .ok()
        .map(Some)
}

/// `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere to signed decimal degrees
fn parse_coordinate(
    value: &str,
    hemisphere: &str,
    degree_digits: usize,
    positive: u8,
    negative: u8,
) -> Option<Option<f64>> {
    if value.is_empty() && hemisphere.is_empty() {
        return Some(None);
    }
    if value.len() < degree_digits + 2 || !value.is_char_boundary(degree_digits) {
        return None;
    }
    let (degrees, minutes) = value.split_at(degree_digits);
    let degrees: u16 = degrees.parse().ok()?;
    let minutes: f64 = minutes.parse().ok()?;
    if !(0.0..60.0).contains(&minutes) {
        return None;
    }
    let magnitude = f64::from(degrees) + minutes / 60.0;
    match hemisphere.as_bytes() {
        [h] if *h == positive => Some(Some(magnitude)),
        [h] if *h == negative => Some(Some(-magnitude)),
        _ => None,
    }
}
