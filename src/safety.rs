//! Safety monitor.
//!
//! Two independent checks:
//!
//! 1. **Thermal**: every temperature sample is classified against the
//!    warn and stop limits.  Only the stop limit affects the run state;
//!    there is no hysteresis and equality counts as overheating.
//! 2. **Flag sanity**: every configuration feedback is checked for the
//!    mandatory bits the decoder relies on.  Violations are diagnostics
//!    only: the device may run firmware with different defaults and the
//!    node keeps operating.
//!
//! Neither check mutates device state or aborts processing.

use core::fmt;
use core::time::Duration;

use burster::Limiter;
use log::{error, info, warn};

use crate::config::NodeConfig;
use crate::device::ConfigFlags;

// ---------------------------------------------------------------------------
// Thermal
// ---------------------------------------------------------------------------

/// Classification of the latest temperature sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThermalState {
    #[default]
    Nominal,
    /// At or above the warn limit; advisory only.
    Warning,
    /// At or above the stop limit.
    Overheating,
}

impl ThermalState {
    pub fn is_overheating(self) -> bool {
        self == Self::Overheating
    }
}

// ---------------------------------------------------------------------------
// Flag sanity
// ---------------------------------------------------------------------------

/// A mandatory configuration bit missing from device feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagViolation {
    RangeAsPercent,
    GainsNotSent,
    FullPingMessage,
}

impl fmt::Display for FlagViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RangeAsPercent => write!(
                f,
                "range is interpreted as percent while the node assumes meters"
            ),
            Self::GainsNotSent => write!(
                f,
                "the sonar does not send gains while the node assumes it does, data is incomplete"
            ),
            Self::FullPingMessage => write!(
                f,
                "the sonar sends full ping messages while the node assumes simple pings"
            ),
        }
    }
}

pub type FlagViolations = heapless::Vec<FlagViolation, 3>;

/// Verify the mandatory bits.  One entry per violated invariant.
pub fn check_flags(flags: ConfigFlags) -> FlagViolations {
    let mut out = FlagViolations::new();
    // Capacity matches the number of checks below.
    if !flags.range_as_meters {
        let _ = out.push(FlagViolation::RangeAsPercent);
    }
    if !flags.send_gains {
        let _ = out.push(FlagViolation::GainsNotSent);
    }
    if !flags.simple_ping {
        let _ = out.push(FlagViolation::FullPingMessage);
    }
    out
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

pub struct SafetyMonitor {
    warn_c: f64,
    stop_c: f64,
    /// Latest classification; not persisted beyond the newest sample.
    thermal: ThermalState,
    last_temperature: Option<f64>,
    diag_limiter: burster::TokenBucket<fn() -> Duration>,
    suppressed: u32,
}

impl SafetyMonitor {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            warn_c: config.temperature_warn_c,
            stop_c: config.temperature_stop_c,
            thermal: ThermalState::Nominal,
            last_temperature: None,
            diag_limiter: burster::TokenBucket::new_with_time_provider(
                config.flag_diag_per_sec,
                config.flag_diag_burst,
                platform_now as fn() -> Duration,
            ),
            suppressed: 0,
        }
    }

    /// Pure classification against the configured limits.
    ///
    /// A non-finite sample is treated as overheating: an unreadable
    /// temperature must never permit pinging.
    pub fn evaluate(&self, temperature: f64) -> ThermalState {
        if !temperature.is_finite() || temperature >= self.stop_c {
            ThermalState::Overheating
        } else if temperature >= self.warn_c {
            ThermalState::Warning
        } else {
            ThermalState::Nominal
        }
    }

    /// Classify a new sample and make it the current thermal state.
    pub fn observe(&mut self, temperature: f64) -> ThermalState {
        let next = self.evaluate(temperature);
        if next != self.thermal {
            match next {
                ThermalState::Overheating => error!(
                    "Temperature of sonar is too high ({temperature:.1}°C). Make sure the sonar is \
                     underwater. Security limit set at {:.1}°C",
                    self.stop_c
                ),
                ThermalState::Warning => warn!(
                    "Temperature of sonar is high ({temperature:.1}°C). Make sure the sonar is \
                     underwater. Security limit set at {:.1}°C",
                    self.stop_c
                ),
                ThermalState::Nominal => {
                    info!("Temperature of sonar back to nominal ({temperature:.1}°C)");
                }
            }
        }
        self.thermal = next;
        self.last_temperature = Some(temperature);
        next
    }

    pub fn thermal(&self) -> ThermalState {
        self.thermal
    }

    pub fn is_overheating(&self) -> bool {
        self.thermal.is_overheating()
    }

    pub fn last_temperature(&self) -> Option<f64> {
        self.last_temperature
    }

    /// Log flag violations found on feedback, throttled so a firmware with
    /// different defaults cannot flood the log.
    pub fn report_flags(&mut self, violations: &[FlagViolation]) {
        for v in violations {
            if self.diag_limiter.try_consume(1).is_ok() {
                if self.suppressed > 0 {
                    warn!("{} flag diagnostics suppressed", self.suppressed);
                    self.suppressed = 0;
                }
                error!("{v}");
            } else {
                self.suppressed = self.suppressed.saturating_add(1);
            }
        }
    }

    pub fn suppressed_diagnostics(&self) -> u32 {
        self.suppressed
    }
}

fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}
