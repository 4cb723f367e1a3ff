//! Externally visible control parameters.
//!
//! The hosting framework stores a typed value per named field; this module
//! defines those names, their types and ranges, and the mirrored
//! [`ControlParameters`] that the node keeps consistent with device truth.
//!
//! ```text
//!   ParameterStore ──ParamChange──▶ Synchronizer ──▶ device
//!         ▲                                            │
//!         └──── ControlParameters::diff ◀── from_device ┘
//! ```

use core::fmt;
use core::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::device::DeviceConfig;
use crate::error::Rejected;

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParamName {
    FrequencyMode,
    PingRate,
    Nbeams,
    GainAssist,
    Range,
    GammaCorrection,
    GainPercent,
    SoundSpeed,
    UseSalinity,
    Salinity,
    Run,
}

impl ParamName {
    pub const COUNT: usize = 11;

    pub const ALL: [Self; Self::COUNT] = [
        Self::FrequencyMode,
        Self::PingRate,
        Self::Nbeams,
        Self::GainAssist,
        Self::Range,
        Self::GammaCorrection,
        Self::GainPercent,
        Self::SoundSpeed,
        Self::UseSalinity,
        Self::Salinity,
        Self::Run,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FrequencyMode => "frequency_mode",
            Self::PingRate => "ping_rate",
            Self::Nbeams => "nbeams",
            Self::GainAssist => "gain_assist",
            Self::Range => "range",
            Self::GammaCorrection => "gamma_correction",
            Self::GainPercent => "gain_percent",
            Self::SoundSpeed => "sound_speed",
            Self::UseSalinity => "use_salinity",
            Self::Salinity => "salinity",
            Self::Run => "run",
        }
    }

    pub fn descriptor(self) -> &'static ParamDescriptor {
        &DESCRIPTORS[self as usize]
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a name that is not a control field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownParam(pub String);

impl fmt::Display for UnknownParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown parameter '{}'", self.0)
    }
}

impl std::error::Error for UnknownParam {}

impl FromStr for ParamName {
    type Err = UnknownParam;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| UnknownParam(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Int,
    Double,
}

/// A typed parameter value as held by the external store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Double(f64),
}

impl ParamValue {
    pub const fn kind(self) -> ParamKind {
        match self {
            Self::Bool(_) => ParamKind::Bool,
            Self::Int(_) => ParamKind::Int,
            Self::Double(_) => ParamKind::Double,
        }
    }

    pub const fn as_bool(self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub const fn as_int(self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(i),
            _ => None,
        }
    }

    pub const fn as_f64(self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(d),
            _ => None,
        }
    }

    /// Numeric view used for range checks (bools map to 0/1).
    fn numeric(self) -> f64 {
        match self {
            Self::Bool(b) => f64::from(u8::from(b)),
            Self::Int(i) => i as f64,
            Self::Double(d) => d,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
        }
    }
}

/// One named change request.  Requests are applied one field at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamChange {
    pub name: ParamName,
    pub value: ParamValue,
}

impl ParamChange {
    pub const fn new(name: ParamName, value: ParamValue) -> Self {
        Self { name, value }
    }
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Declaration metadata for one control field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDescriptor {
    pub name: ParamName,
    pub kind: ParamKind,
    pub description: &'static str,
    /// Inclusive bounds; ignored for `Bool`.
    pub min: f64,
    pub max: f64,
}

impl ParamDescriptor {
    /// Type and range check for a requested value.
    ///
    /// A type mismatch is a hard refusal; an out-of-range value is reported
    /// as [`Rejected::OutOfRange`], which callers treat as a logged no-op.
    pub fn check(&self, value: ParamValue) -> Result<(), Rejected> {
        if value.kind() != self.kind {
            return Err(Rejected::Precondition("parameter type mismatch"));
        }
        if self.kind == ParamKind::Bool {
            return Ok(());
        }
        let v = value.numeric();
        if v.is_nan() || v < self.min || v > self.max {
            return Err(Rejected::OutOfRange(self.name));
        }
        Ok(())
    }
}

/// Indexed by `ParamName as usize`.
pub const DESCRIPTORS: [ParamDescriptor; ParamName::COUNT] = [
    ParamDescriptor {
        name: ParamName::FrequencyMode,
        kind: ParamKind::Int,
        description: "1: low frequency (wide aperture, navigation), 2: high frequency (narrow aperture, identification)",
        min: 1.0,
        max: 2.0,
    },
    ParamDescriptor {
        name: ParamName::PingRate,
        kind: ParamKind::Int,
        description: "0: 10Hz, 1: 15Hz, 2: 40Hz, 3: 5Hz, 4: 2Hz, 5: standby (no ping)",
        min: 0.0,
        max: 5.0,
    },
    ParamDescriptor {
        name: ParamName::Nbeams,
        kind: ParamKind::Int,
        description: "0: 256 beams, 1: 512 beams",
        min: 0.0,
        max: 1.0,
    },
    ParamDescriptor {
        name: ParamName::GainAssist,
        kind: ParamKind::Bool,
        description: "Enable the device gain assist",
        min: 0.0,
        max: 1.0,
    },
    ParamDescriptor {
        name: ParamName::Range,
        kind: ParamKind::Double,
        description: "Sonar range (m)",
        min: 0.1,
        max: 120.0,
    },
    ParamDescriptor {
        name: ParamName::GammaCorrection,
        kind: ParamKind::Int,
        description: "Gamma correction, 0 and 255 both mean 1.0, 127 means 0.5",
        min: 0.0,
        max: 255.0,
    },
    ParamDescriptor {
        name: ParamName::GainPercent,
        kind: ParamKind::Double,
        description: "Gain (%)",
        min: 0.0,
        max: 100.0,
    },
    ParamDescriptor {
        name: ParamName::SoundSpeed,
        kind: ParamKind::Double,
        description: "Speed of sound (m/s), only used when use_salinity is false",
        min: 1400.0,
        max: 1600.0,
    },
    ParamDescriptor {
        name: ParamName::UseSalinity,
        kind: ParamKind::Bool,
        description: "Let the sonar compute the speed of sound from salinity",
        min: 0.0,
        max: 1.0,
    },
    ParamDescriptor {
        name: ParamName::Salinity,
        kind: ParamKind::Double,
        description: "Salinity (ppt), 0 for fresh water",
        min: 0.0,
        max: 100.0,
    },
    ParamDescriptor {
        name: ParamName::Run,
        kind: ParamKind::Bool,
        description: "Actively ping (true) or stay in standby (false)",
        min: 0.0,
        max: 1.0,
    },
];

// ---------------------------------------------------------------------------
// Mirror
// ---------------------------------------------------------------------------

/// The externally visible parameter set, derived from the confirmed device
/// configuration plus the run flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlParameters {
    pub frequency_mode: u8,
    pub ping_rate: u8,
    pub nbeams: u8,
    pub gain_assist: bool,
    pub range: f64,
    pub gamma_correction: u8,
    pub gain_percent: f64,
    pub sound_speed: f64,
    pub use_salinity: bool,
    pub salinity: f64,
    pub run: bool,
}

impl ControlParameters {
    /// Derive every field from device truth.
    ///
    /// The device never reports `use_salinity`; it is inferred from the
    /// zero speed-of-sound sentinel.
    pub fn from_device(cfg: &DeviceConfig, run: bool) -> Self {
        Self {
            frequency_mode: cfg.frequency_mode,
            ping_rate: cfg.ping_rate,
            nbeams: cfg.flags.nbeams_code(),
            gain_assist: cfg.flags.gain_assist,
            range: cfg.range,
            gamma_correction: cfg.gamma_correction,
            gain_percent: cfg.gain_percent,
            sound_speed: cfg.speed_of_sound,
            use_salinity: cfg.speed_of_sound == 0.0,
            salinity: cfg.salinity,
            run,
        }
    }

    pub fn get(&self, name: ParamName) -> ParamValue {
        match name {
            ParamName::FrequencyMode => ParamValue::Int(self.frequency_mode.into()),
            ParamName::PingRate => ParamValue::Int(self.ping_rate.into()),
            ParamName::Nbeams => ParamValue::Int(self.nbeams.into()),
            ParamName::GainAssist => ParamValue::Bool(self.gain_assist),
            ParamName::Range => ParamValue::Double(self.range),
            ParamName::GammaCorrection => ParamValue::Int(self.gamma_correction.into()),
            ParamName::GainPercent => ParamValue::Double(self.gain_percent),
            ParamName::SoundSpeed => ParamValue::Double(self.sound_speed),
            ParamName::UseSalinity => ParamValue::Bool(self.use_salinity),
            ParamName::Salinity => ParamValue::Double(self.salinity),
            ParamName::Run => ParamValue::Bool(self.run),
        }
    }

    /// Fields whose value differs between `self` and `other`.
    pub fn diff(&self, other: &Self) -> heapless::Vec<ParamName, { ParamName::COUNT }> {
        let mut changed = heapless::Vec::new();
        for name in ParamName::ALL {
            if self.get(name) != other.get(name) {
                // Capacity equals the number of names.
                let _ = changed.push(name);
            }
        }
        changed
    }
}

/// Mirror shared between the node loop (writer) and parameter queries
/// (readers).  Guards are held for one copy, never across a device round trip.
#[derive(Debug, Clone)]
pub struct SharedParameters(Arc<RwLock<ControlParameters>>);

impl SharedParameters {
    pub fn new(initial: ControlParameters) -> Self {
        Self(Arc::new(RwLock::new(initial)))
    }

    pub fn snapshot(&self) -> ControlParameters {
        *self.0.read()
    }

    pub fn get(&self, name: ParamName) -> ParamValue {
        self.0.read().get(name)
    }

    /// Replace the mirror and return the previous value.
    pub fn replace(&self, next: ControlParameters) -> ControlParameters {
        let mut guard = self.0.write();
        core::mem::replace(&mut *guard, next)
    }

    pub(crate) fn set_run(&self, run: bool) {
        self.0.write().run = run;
    }
}
