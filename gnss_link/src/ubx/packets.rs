//! Configuration commands sent to the receiver and the acknowledgements it answers with.

use bitflags::bitflags;

use super::{frame_bytes, UbxFrame};
use crate::constants::{
    UBX_CLASS_ACK, UBX_CLASS_CFG, UBX_CLASS_NMEA_STD, UBX_ID_ACK_ACK, UBX_ID_ACK_NAK,
};

/// Information about concrete UBX protocol's packet
pub trait UbxPacketMeta {
    const CLASS: u8;
    const ID: u8;
    const FIXED_PAYLOAD_LEN: Option<u16>;
}

/// A packet that can be serialized into a frame and sent to the device
pub trait UbxPacketCreator: UbxPacketMeta {
    fn payload_bytes(&self) -> Vec<u8>;

    fn into_packet_bytes(&self) -> Vec<u8> {
        frame_bytes(Self::CLASS, Self::ID, &self.payload_bytes())
    }

    fn to_frame(&self) -> UbxFrame {
        UbxFrame::from_checked_parts(Self::CLASS, Self::ID, self.payload_bytes())
    }
}

macro_rules! ubx_meta {
    ($struct:ident, $classid:expr, $msgid:expr, $len:expr) => {
        impl UbxPacketMeta for $struct {
            const CLASS: u8 = $classid;
            const ID: u8 = $msgid;
            const FIXED_PAYLOAD_LEN: Option<u16> = Some($len);
        }
    };
}

/// Messages in this class are sent as a result of a CFG message being
/// received, decoded and processed by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckAck {
    /// Class ID of the Acknowledged Message
    pub class: u8,

    /// Message ID of the Acknowledged Message
    pub msg_id: u8,
}

ubx_meta!(AckAck, UBX_CLASS_ACK, UBX_ID_ACK_ACK, 2);

impl AckAck {
    pub fn for_command<T: UbxPacketMeta>() -> Self {
        Self {
            class: T::CLASS,
            msg_id: T::ID,
        }
    }

    pub fn from_frame(frame: &UbxFrame) -> Option<Self> {
        if frame.class() != Self::CLASS || frame.msg_id() != Self::ID {
            return None;
        }
        match *frame.payload() {
            [class, msg_id] => Some(Self { class, msg_id }),
            _ => None,
        }
    }
}

impl UbxPacketCreator for AckAck {
    fn payload_bytes(&self) -> Vec<u8> {
        vec![self.class, self.msg_id]
    }
}

/// Message Not-Acknowledge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckNak {
    /// Class ID of the rejected Message
    pub class: u8,

    /// Message ID of the rejected Message
    pub msg_id: u8,
}

ubx_meta!(AckNak, UBX_CLASS_ACK, UBX_ID_ACK_NAK, 2);

impl AckNak {
    pub fn for_command<T: UbxPacketMeta>() -> Self {
        Self {
            class: T::CLASS,
            msg_id: T::ID,
        }
    }

    pub fn from_frame(frame: &UbxFrame) -> Option<Self> {
        if frame.class() != Self::CLASS || frame.msg_id() != Self::ID {
            return None;
        }
        match *frame.payload() {
            [class, msg_id] => Some(Self { class, msg_id }),
            _ => None,
        }
    }
}

impl UbxPacketCreator for AckNak {
    fn payload_bytes(&self) -> Vec<u8> {
        vec![self.class, self.msg_id]
    }
}

/// NMEA standard messages that the receiver outputs by default
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NmeaStdMessage {
    Gga = 0x00,
    Gll = 0x01,
    Gsa = 0x02,
    Gsv = 0x03,
    Rmc = 0x04,
    Vtg = 0x05,
}

impl NmeaStdMessage {
    /// Everything except the fix report
    pub const NON_FIX: [NmeaStdMessage; 5] = [
        NmeaStdMessage::Gll,
        NmeaStdMessage::Gsa,
        NmeaStdMessage::Gsv,
        NmeaStdMessage::Rmc,
        NmeaStdMessage::Vtg,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NmeaStdMessage::Gga => "GGA",
            NmeaStdMessage::Gll => "GLL",
            NmeaStdMessage::Gsa => "GSA",
            NmeaStdMessage::Gsv => "GSV",
            NmeaStdMessage::Rmc => "RMC",
            NmeaStdMessage::Vtg => "VTG",
        }
    }
}

/// Set Message Rate(s): output rate of one message on each of the six I/O ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgMsg {
    pub msg_class: u8,
    pub msg_id: u8,
    /// Rate on DDC, UART1, UART2, USB, SPI, reserved port
    pub rates: [u8; 6],
}

ubx_meta!(CfgMsg, UBX_CLASS_CFG, 0x01, 8);

impl CfgMsg {
    /// Off on every port except the last one
    pub const DISABLE_RATES: [u8; 6] = [0, 0, 0, 0, 0, 1];

    pub fn set_rate_for_nmea(message: NmeaStdMessage, rates: [u8; 6]) -> Self {
        Self {
            msg_class: UBX_CLASS_NMEA_STD,
            msg_id: message as u8,
            rates,
        }
    }

    pub fn disable_nmea(message: NmeaStdMessage) -> Self {
        Self::set_rate_for_nmea(message, Self::DISABLE_RATES)
    }
}

impl UbxPacketCreator for CfgMsg {
    fn payload_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8);
        out.push(self.msg_class);
        out.push(self.msg_id);
        out.extend_from_slice(&self.rates);
        out
    }
}

bitflags! {
    /// `CfgNav5` parameters bitmask
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CfgNav5Params: u16 {
        /// Apply dynamic model settings
        const DYN = 1;
        /// Apply minimum elevation settings
        const MIN_EL = 2;
        /// Apply fix mode settings
        const POS_FIX_MODE = 4;
        /// Reserved
        const DR_LIM = 8;
        /// position mask settings
        const POS_MASK_APPLY = 0x10;
        /// Apply time mask settings
        const TIME_MASK = 0x20;
        /// Apply static hold settings
        const STATIC_HOLD_MASK = 0x40;
        /// Apply DGPS settings
        const DGPS_MASK = 0x80;
        /// Apply CNO threshold settings (cnoThresh, cnoThreshNumSVs)
        const CNO_THRESHOLD = 0x100;
        /// Apply UTC settings (not supported in protocol versions less than 16)
        const UTC = 0x400;
    }
}

/// Dynamic platform model
#[repr(u8)]
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum NavDynamicModel {
    #[default]
    Portable = 0,
    Stationary = 2,
    Pedestrian = 3,
    Automotive = 4,
    Sea = 5,
    AirborneWithLess1gAcceleration = 6,
    AirborneWithLess2gAcceleration = 7,
    AirborneWithLess4gAcceleration = 8,
}

/// Position Fixing Mode
#[repr(u8)]
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum NavFixMode {
    /// 2D only
    Only2D = 1,
    /// 3D only
    Only3D = 2,
    #[default]
    /// Auto 2D/3D
    Auto2D3D = 3,
}

/// Navigation Engine Settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgNav5 {
    /// Only the masked parameters will be applied
    pub mask: CfgNav5Params,
    pub dyn_model: NavDynamicModel,
    pub fix_mode: NavFixMode,
    /// Fixed altitude (mean sea level) for 2D fixmode [cm]
    pub fixed_alt: i32,
    /// Fixed altitude variance for 2D mode [0.0001 m^2]
    pub fixed_alt_var: u32,
    /// Minimum Elevation for a GNSS satellite to be used in NAV (deg)
    pub min_elev_degrees: i8,
    pub dr_limit: u8,
    /// Position DOP Mask to use [0.1]
    pub pdop: u16,
    /// Time DOP Mask to use [0.1]
    pub tdop: u16,
    /// Position Accuracy Mask [m]
    pub pacc: u16,
    /// Time Accuracy Mask [m]
    pub tacc: u16,
    /// Static hold threshold [cm/s]
    pub static_hold_thresh: u8,
    /// DGNSS timeout (seconds)
    pub dgps_time_out: u8,
    pub cno_thresh_num_svs: u8,
    /// C/N0 threshold for deciding whether to attempt a fix (dBHz)
    pub cno_thresh: u8,
    pub static_hold_max_dist: u16,
    pub utc_standard: u8,
}

ubx_meta!(CfgNav5, UBX_CLASS_CFG, 0x24, 36);

impl CfgNav5 {
    /// Airborne platform model accepted up to 50 km altitude, every parameter applied.
    pub fn flight_mode() -> Self {
        Self {
            mask: CfgNav5Params::from_bits_retain(0xffff),
            dyn_model: NavDynamicModel::AirborneWithLess1gAcceleration,
            fix_mode: NavFixMode::Auto2D3D,
            fixed_alt: 0,
            fixed_alt_var: 10_000,
            min_elev_degrees: 5,
            dr_limit: 0,
            pdop: 250,
            tdop: 250,
            pacc: 100,
            tacc: 300,
            static_hold_thresh: 0,
            dgps_time_out: 0,
            cno_thresh_num_svs: 0,
            cno_thresh: 0,
            static_hold_max_dist: 0,
            utc_standard: 0,
        }
    }
}

impl UbxPacketCreator for CfgNav5 {
    fn payload_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(36);
        out.extend_from_slice(&self.mask.bits().to_le_bytes());
        out.push(self.dyn_model as u8);
        out.push(self.fix_mode as u8);
        out.extend_from_slice(&self.fixed_alt.to_le_bytes());
        out.extend_from_slice(&self.fixed_alt_var.to_le_bytes());
        out.extend_from_slice(&self.min_elev_degrees.to_le_bytes());
        out.push(self.dr_limit);
        out.extend_from_slice(&self.pdop.to_le_bytes());
        out.extend_from_slice(&self.tdop.to_le_bytes());
        out.extend_from_slice(&self.pacc.to_le_bytes());
        out.extend_from_slice(&self.tacc.to_le_bytes());
        out.push(self.static_hold_thresh);
        out.push(self.dgps_time_out);
        out.push(self.cno_thresh_num_svs);
        out.push(self.cno_thresh);
        out.extend_from_slice(&[0; 2]); // reserved1
        out.extend_from_slice(&self.static_hold_max_dist.to_le_bytes());
        out.push(self.utc_standard);
        out.extend_from_slice(&[0; 5]); // reserved2
        out
    }
}

bitflags! {
    /// Battery backed RAM sections to clear
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NavBbrMask: u16 {
        const EPHEMERIS = 1;
        const ALMANACH = 2;
        const HEALTH = 4;
        const KLOBUCHARD = 8;
        const POSITION = 16;
        const CLOCK_DRIFT = 32;
        const OSCILATOR_PARAMETER = 64;
        const UTC_CORRECTION_PARAMETERS = 0x80;
        const RTC = 0x100;
        const SFDR_PARAMETERS = 0x800;
        const SFDR_VEHICLE_MONITORING_PARAMETERS = 0x1000;
        const TCT_PARAMETERS = 0x2000;
        const AUTONOMOUS_ORBIT_PARAMETERS = 0x8000;
    }
}

/// Reset Type
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetMode {
    /// Hardware reset (Watchdog) immediately
    HardwareResetImmediately = 0,
    ControlledSoftwareReset = 0x1,
    ControlledSoftwareResetGpsOnly = 0x02,
    /// Hardware reset (Watchdog) after shutdown (>=FW6.0)
    HardwareResetAfterShutdown = 0x04,
    ControlledGpsStop = 0x08,
    ControlledGpsStart = 0x09,
}

/// Reset Receiver / Clear Backup Data Structures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgRst {
    /// Battery backed RAM sections to clear
    pub nav_bbr_mask: NavBbrMask,
    pub reset_mode: ResetMode,
}

ubx_meta!(CfgRst, UBX_CLASS_CFG, 0x04, 4);

impl CfgRst {
    /// Watchdog reset clearing most of the battery backed RAM
    pub fn hardware_reset() -> Self {
        Self {
            nav_bbr_mask: NavBbrMask::from_bits_retain(0x87ff),
            reset_mode: ResetMode::HardwareResetImmediately,
        }
    }
}

impl UbxPacketCreator for CfgRst {
    fn payload_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4);
        out.extend_from_slice(&self.nav_bbr_mask.bits().to_le_bytes());
        out.push(self.reset_mode as u8);
        out.push(0); // reserved1
        out
    }
}
