//! Ping-configuration flag byte.
//!
//! The device packs eight independent options into one byte.  This module
//! is the only place that knows the bit layout; everything above it works
//! with named booleans.
//!
//! ```text
//!  bit 7  6  5  4  3  2  1  0
//!      │  │  │  │  │  │  │  └─ range interpreted as meters (else percent)
//!      │  │  │  │  │  │  └──── 16-bit samples (else 8-bit)
//!      │  │  │  │  │  └─────── send per-row gains
//!      │  │  │  │  └────────── simple ping return message
//!      │  │  │  └───────────── gain assist
//!      │  │  └──────────────── reserved, unstable
//!      │  └─────────────────── 512 beams (else 256)
//!      └────────────────────── reserved, breaks the link when set
//! ```

use serde::{Deserialize, Serialize};

pub const RANGE_AS_METERS: u8 = 0x01;
pub const DATA_16BIT: u8 = 0x02;
pub const SEND_GAINS: u8 = 0x04;
pub const SIMPLE_PING: u8 = 0x08;
pub const GAIN_ASSIST: u8 = 0x10;
pub const RESERVED_5: u8 = 0x20;
pub const BEAMS_512: u8 = 0x40;
pub const RESERVED_7: u8 = 0x80;

/// Decoded flag byte.  `from_byte(b).to_byte() == b` for every `b`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFlags {
    pub range_as_meters: bool,
    pub data_16bit: bool,
    pub send_gains: bool,
    pub simple_ping: bool,
    pub gain_assist: bool,
    pub reserved_5: bool,
    pub beams_512: bool,
    pub reserved_7: bool,
}

impl ConfigFlags {
    pub const fn from_byte(b: u8) -> Self {
        Self {
            range_as_meters: b & RANGE_AS_METERS != 0,
            data_16bit: b & DATA_16BIT != 0,
            send_gains: b & SEND_GAINS != 0,
            simple_ping: b & SIMPLE_PING != 0,
            gain_assist: b & GAIN_ASSIST != 0,
            reserved_5: b & RESERVED_5 != 0,
            beams_512: b & BEAMS_512 != 0,
            reserved_7: b & RESERVED_7 != 0,
        }
    }

    pub const fn to_byte(self) -> u8 {
        let mut b = 0;
        if self.range_as_meters {
            b |= RANGE_AS_METERS;
        }
        if self.data_16bit {
            b |= DATA_16BIT;
        }
        if self.send_gains {
            b |= SEND_GAINS;
        }
        if self.simple_ping {
            b |= SIMPLE_PING;
        }
        if self.gain_assist {
            b |= GAIN_ASSIST;
        }
        if self.reserved_5 {
            b |= RESERVED_5;
        }
        if self.beams_512 {
            b |= BEAMS_512;
        }
        if self.reserved_7 {
            b |= RESERVED_7;
        }
        b
    }

    /// Beam-count parameter encoding: 0 → 256 beams, 1 → 512 beams.
    pub const fn nbeams_code(self) -> u8 {
        if self.beams_512 { 1 } else { 0 }
    }
}

impl From<u8> for ConfigFlags {
    fn from(b: u8) -> Self {
        Self::from_byte(b)
    }
}

impl From<ConfigFlags> for u8 {
    fn from(f: ConfigFlags) -> Self {
        f.to_byte()
    }
}
