//! Device-side value types.
//!
//! These mirror what the sonar reports and accepts, independent of the wire
//! layout (which belongs to the protocol codec below the driver port).

pub mod flags;

use serde::{Deserialize, Serialize};

pub use flags::ConfigFlags;

// ---------------------------------------------------------------------------
// Named codes
// ---------------------------------------------------------------------------

/// Acoustic frequency mode.  Mode 0 (flexi) is not available to third-party
/// drivers and is never requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrequencyMode {
    /// Wide aperture, navigation.
    Low = 1,
    /// Narrow aperture, target identification.
    High = 2,
}

impl FrequencyMode {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Low),
            2 => Some(Self::High),
            _ => None,
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Maximum ping rate codes understood by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PingRate {
    /// 10 Hz.
    Normal = 0,
    /// 15 Hz.
    High = 1,
    /// 40 Hz.
    Highest = 2,
    /// 5 Hz.
    Low = 3,
    /// 2 Hz.
    Lowest = 4,
    /// Do not ping; the device only sends keepalives.
    Standby = 5,
}

impl PingRate {
    pub const ALL: [Self; 6] = [
        Self::Normal,
        Self::High,
        Self::Highest,
        Self::Low,
        Self::Lowest,
        Self::Standby,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.code() == code)
    }

    pub const fn code(self) -> u8 {
        self as u8
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// A ping configuration as sent to, or confirmed by, the device.
///
/// The node keeps exactly one of these as "confirmed": it only ever changes
/// by adopting device feedback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// 1 = low frequency, 2 = high frequency.
    pub frequency_mode: u8,
    /// See [`PingRate`].
    pub ping_rate: u8,
    /// Link throttling (0 = full speed).  Never changed by this node.
    pub network_speed: u8,
    /// 0 and 255 both mean gamma 1.0; 127 means 0.5.
    pub gamma_correction: u8,
    pub flags: ConfigFlags,
    /// Range demand, meters when `flags.range_as_meters`.
    pub range: f64,
    pub gain_percent: f64,
    /// m/s; 0.0 means "compute from salinity".
    pub speed_of_sound: f64,
    /// Parts per thousand; 0.0 is fresh water.
    pub salinity: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            frequency_mode: FrequencyMode::Low.code(),
            ping_rate: PingRate::Normal.code(),
            network_speed: 0,
            gamma_correction: 127,
            flags: ConfigFlags::from_byte(
                flags::RANGE_AS_METERS | flags::SEND_GAINS | flags::SIMPLE_PING,
            ),
            range: 20.0,
            gain_percent: 50.0,
            speed_of_sound: 0.0,
            salinity: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Push data
// ---------------------------------------------------------------------------

/// Periodic device status broadcast.  Arrives whether or not the device is
/// pinging.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatusSample {
    pub device_id: u32,
    pub part_number: u16,
    pub status: u32,
    /// Board temperature, °C.
    pub temperature: f64,
    /// Absolute pressure, Pa.
    pub pressure: f64,
}

/// One decoded ping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reading {
    pub ping_id: u32,
    pub frequency_mode: u8,
    pub range: f64,
    pub gain_percent: f64,
    pub speed_of_sound_used: f64,
    /// °C.
    pub temperature: f64,
    /// Pa.
    pub pressure: f64,
    pub n_beams: u16,
    pub n_ranges: u16,
    /// Beam bearings in hundredths of a degree.
    pub bearings: Vec<i16>,
    /// Row-major `n_ranges × n_beams` 8-bit intensities.
    pub intensities: Vec<u8>,
}
