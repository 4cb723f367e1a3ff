//! Unified error types for the sonar node.
//!
//! A single `Error` enum that every subsystem can convert into keeps the
//! binary's error handling uniform.  The domain-facing [`Rejected`] type is
//! what parameter-set and run-mode requests return to their caller; none of
//! its variants alter the confirmed device configuration or the run state.
//! All variants are `Copy` so they can be stored in reports and events
//! without allocation.

use core::fmt;

use crate::params::ParamName;

// ---------------------------------------------------------------------------
// Top-level node error
// ---------------------------------------------------------------------------

/// Every fallible operation in the node funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The device could not be reached or did not answer.
    Device(DeviceError),
    /// A request was refused by a local decision.
    Rejected(Rejected),
    /// Node configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(e) => write!(f, "device: {e}"),
            Self::Rejected(e) => write!(f, "rejected: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Device errors
// ---------------------------------------------------------------------------

/// Failures reported by the device driver port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// The transport is not connected.
    Disconnected,
    /// No feedback arrived before the transport-level timeout.
    Timeout,
    /// Any other transport failure.
    Transport(&'static str),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "device disconnected"),
            Self::Timeout => write!(f, "timed out waiting for device feedback"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
        }
    }
}

impl std::error::Error for DeviceError {}

impl From<DeviceError> for Error {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}

// ---------------------------------------------------------------------------
// Run blockers
// ---------------------------------------------------------------------------

/// A single condition preventing the sonar from being active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunBlocker {
    /// Nobody is subscribed to ping or image output.
    NoSubscribers = 0b0000_0001,
    /// Device temperature is at or above the stop limit.
    Overheating = 0b0000_0010,
    /// The configured ping rate is the standby code.
    StandbyPingRate = 0b0000_0100,
}

impl RunBlocker {
    pub const ALL: [Self; 3] = [Self::NoSubscribers, Self::Overheating, Self::StandbyPingRate];

    /// Return the bitmask for this blocker.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for RunBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSubscribers => write!(f, "no subscriber to the ping or image topics"),
            Self::Overheating => write!(f, "sonar temperature at or above the stop limit"),
            Self::StandbyPingRate => write!(f, "ping_rate is set to the standby code"),
        }
    }
}

/// Set of every [`RunBlocker`] that currently holds.
///
/// Accumulated as a bitfield so that a refusal names every failing
/// condition, not just the first one found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunBlockers(u8);

impl RunBlockers {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, blocker: RunBlocker) {
        self.0 |= blocker.mask();
    }

    pub fn contains(self, blocker: RunBlocker) -> bool {
        self.0 & blocker.mask() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = RunBlocker> {
        RunBlocker::ALL.into_iter().filter(move |b| self.contains(*b))
    }
}

impl fmt::Display for RunBlockers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        for (i, blocker) in self.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{blocker}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Local refusal of a parameter-set or run-mode request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// More (or fewer) than one parameter was changed in one request.
    BatchNotSupported,
    /// A firmware ordering rule or type check refused the change.
    Precondition(&'static str),
    /// The run conditions for entering Active do not hold.
    NotPermitted(RunBlockers),
    /// The value lies outside the field's valid range; the change was a no-op.
    OutOfRange(ParamName),
    /// The device did not answer the request.
    DeviceUnreachable(DeviceError),
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BatchNotSupported => write!(f, "parameters must be set one by one"),
            Self::Precondition(msg) => write!(f, "precondition failed: {msg}"),
            Self::NotPermitted(blockers) => {
                write!(f, "run conditions not met: {blockers}")
            }
            Self::OutOfRange(name) => write!(f, "{name} out of range, ignored"),
            Self::DeviceUnreachable(e) => write!(f, "device unreachable: {e}"),
        }
    }
}

impl std::error::Error for Rejected {}

impl From<Rejected> for Error {
    fn from(e: Rejected) -> Self {
        Self::Rejected(e)
    }
}

impl From<DeviceError> for Rejected {
    fn from(e: DeviceError) -> Self {
        Self::DeviceUnreachable(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from loading or validating [`NodeConfig`](crate::config::NodeConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// The config file could not be parsed.
    Corrupted,
    /// Generic I/O error reading the config file.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Node-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
