//! Configuration synchronizer.
//!
//! Translates one external parameter change into a candidate device
//! configuration, exchanges it for device feedback, and adopts the
//! feedback as the new confirmed configuration.
//!
//! ```text
//!  ParamChange ──▶ build_candidate ──▶ stamp_minimal_flags ──▶ request_config
//!                                                                   │
//!   ReconciliationReport ◀── compare(candidate, feedback) ◀── reconcile
//! ```
//!
//! The confirmed configuration is never asserted speculatively: the only
//! write to it is [`ConfigSynchronizer::reconcile`], and a failed exchange
//! leaves it at the last known-good value.

use log::{info, warn};

use crate::device::{DeviceConfig, FrequencyMode};
use crate::error::Rejected;
use crate::params::{ParamChange, ParamName, ParamValue};
use crate::safety::{FlagViolations, check_flags};

use super::ports::DeviceDriver;

/// Speed of sound restored when leaving salinity mode before any manual
/// value has been confirmed (m/s).
pub const DEFAULT_SOUND_SPEED: f64 = 1500.0;

/// Absolute tolerance when comparing floating-point feedback fields.
const FLOAT_TOLERANCE: f64 = 1e-6;

/// Number of device-backed fields.
pub const DEVICE_FIELD_COUNT: usize = 9;

/// Fields the device echoes back and that a report compares.
pub const DEVICE_FIELDS: [ParamName; DEVICE_FIELD_COUNT] = [
    ParamName::FrequencyMode,
    ParamName::PingRate,
    ParamName::Nbeams,
    ParamName::GainAssist,
    ParamName::Range,
    ParamName::GammaCorrection,
    ParamName::GainPercent,
    ParamName::SoundSpeed,
    ParamName::Salinity,
];

// ───────────────────────────────────────────────────────────────
// Firmware quirks
// ───────────────────────────────────────────────────────────────

/// Force the bits the decoder and consumers assume, whatever was requested.
///
/// Sets range-in-meters, send-gains and simple-ping.  Clears 16-bit data
/// (0x02) and the two unstable reserved bits (0x20, 0x80); 0x80 in
/// particular breaks the link until the sonar is power-cycled.
pub fn stamp_minimal_flags(config: &mut DeviceConfig) {
    let flags = &mut config.flags;
    flags.range_as_meters = true;
    flags.send_gains = true;
    flags.simple_ping = true;
    flags.data_16bit = false;
    flags.reserved_5 = false;
    flags.reserved_7 = false;

    if !gain_assist_allowed(config.frequency_mode) {
        config.flags.gain_assist = false;
    }
}

/// Gain assist misbehaves on high-frequency firmware.
pub fn gain_assist_allowed(frequency_mode: u8) -> bool {
    FrequencyMode::from_code(frequency_mode) != Some(FrequencyMode::High)
}

/// Frequency changes are refused while gain assist is enabled; the
/// firmware loses the gain setting when the two change together.
fn check_frequency_order(confirmed: &DeviceConfig, name: ParamName) -> Result<(), Rejected> {
    if confirmed.flags.gain_assist && name == ParamName::FrequencyMode {
        return Err(Rejected::Precondition(
            "gain_assist requires frequency unset first",
        ));
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Field access
// ───────────────────────────────────────────────────────────────

/// Read a device-backed field as the parameter value it maps to.
pub fn device_field(cfg: &DeviceConfig, name: ParamName) -> Option<ParamValue> {
    let v = match name {
        ParamName::FrequencyMode => ParamValue::Int(cfg.frequency_mode.into()),
        ParamName::PingRate => ParamValue::Int(cfg.ping_rate.into()),
        ParamName::Nbeams => ParamValue::Int(cfg.flags.nbeams_code().into()),
        ParamName::GainAssist => ParamValue::Bool(cfg.flags.gain_assist),
        ParamName::Range => ParamValue::Double(cfg.range),
        ParamName::GammaCorrection => ParamValue::Int(cfg.gamma_correction.into()),
        ParamName::GainPercent => ParamValue::Double(cfg.gain_percent),
        ParamName::SoundSpeed => ParamValue::Double(cfg.speed_of_sound),
        ParamName::UseSalinity => ParamValue::Bool(cfg.speed_of_sound == 0.0),
        ParamName::Salinity => ParamValue::Double(cfg.salinity),
        ParamName::Run => return None,
    };
    Some(v)
}

fn same_value(name: ParamName, a: ParamValue, b: ParamValue) -> bool {
    match (a, b) {
        (ParamValue::Double(x), ParamValue::Double(y)) => (x - y).abs() <= FLOAT_TOLERANCE,
        (ParamValue::Int(x), ParamValue::Int(y)) if name == ParamName::GammaCorrection => {
            // 0 and 255 both encode gamma 1.0
            let unity = |g: i64| if g == 255 { 0 } else { g };
            unity(x) == unity(y)
        }
        _ => a == b,
    }
}

// ───────────────────────────────────────────────────────────────
// Candidate and report
// ───────────────────────────────────────────────────────────────

/// A proposed configuration: the confirmed one plus exactly one change.
/// Discarded once the exchange completes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateConfig {
    pub config: DeviceConfig,
    pub change: ParamChange,
}

/// What `build_candidate` decided to do with a change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Plan {
    /// Send this candidate to the device.
    Send(CandidateConfig),
    /// Nothing to send; the change is dropped with a diagnostic.
    NoOp(Rejected),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldOutcome {
    Accepted,
    /// The device answered with a different value.
    Rejected {
        requested: ParamValue,
        device: ParamValue,
    },
    /// The change was not forwarded.
    Ignored(Rejected),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldReport {
    pub name: ParamName,
    pub outcome: FieldOutcome,
}

/// Per-field comparison of a candidate against device feedback.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationReport {
    /// Outcome for the field the caller asked to change.
    pub requested: FieldReport,
    /// Every device-backed field, candidate vs. feedback.  Empty when the
    /// change was not forwarded.
    pub fields: heapless::Vec<FieldReport, DEVICE_FIELD_COUNT>,
    /// Mandatory bits missing from the feedback.
    pub flag_violations: FlagViolations,
    /// The configuration confirmed after the request.
    pub confirmed: DeviceConfig,
}

impl ReconciliationReport {
    fn ignored(change: ParamChange, reason: Rejected, confirmed: DeviceConfig) -> Self {
        Self {
            requested: FieldReport {
                name: change.name,
                outcome: FieldOutcome::Ignored(reason),
            },
            fields: heapless::Vec::new(),
            flag_violations: FlagViolations::new(),
            confirmed,
        }
    }

    fn compare(
        candidate: &CandidateConfig,
        feedback: &DeviceConfig,
        flag_violations: FlagViolations,
    ) -> Self {
        let mut fields = heapless::Vec::new();
        for name in DEVICE_FIELDS {
            if let (Some(sent), Some(got)) = (
                device_field(&candidate.config, name),
                device_field(feedback, name),
            ) {
                let outcome = if same_value(name, sent, got) {
                    FieldOutcome::Accepted
                } else {
                    FieldOutcome::Rejected {
                        requested: sent,
                        device: got,
                    }
                };
                // Capacity equals DEVICE_FIELD_COUNT.
                let _ = fields.push(FieldReport { name, outcome });
            }
        }

        let change = candidate.change;
        let outcome = match device_field(feedback, change.name) {
            Some(got) if same_value(change.name, change.value, got) => FieldOutcome::Accepted,
            Some(got) => FieldOutcome::Rejected {
                requested: change.value,
                device: got,
            },
            None => FieldOutcome::Accepted,
        };

        Self {
            requested: FieldReport {
                name: change.name,
                outcome,
            },
            fields,
            flag_violations,
            confirmed: *feedback,
        }
    }

    /// Whether the device honoured the caller's change.
    pub fn is_accepted(&self) -> bool {
        self.requested.outcome == FieldOutcome::Accepted
    }

    /// Fields (including ones the caller did not touch) the device answered
    /// differently from the candidate.
    pub fn rejected_fields(&self) -> impl Iterator<Item = &FieldReport> {
        self.fields
            .iter()
            .filter(|f| matches!(f.outcome, FieldOutcome::Rejected { .. }))
    }
}

// ───────────────────────────────────────────────────────────────
// Synchronizer
// ───────────────────────────────────────────────────────────────

pub struct ConfigSynchronizer {
    confirmed: DeviceConfig,
    /// Last non-zero speed of sound the device confirmed.
    manual_sound_speed: f64,
}

impl ConfigSynchronizer {
    /// Start from the configuration the device reported at start-up.
    pub fn new(confirmed: DeviceConfig) -> Self {
        let mut sync = Self {
            confirmed,
            manual_sound_speed: DEFAULT_SOUND_SPEED,
        };
        sync.reconcile(confirmed);
        sync
    }

    pub fn confirmed(&self) -> &DeviceConfig {
        &self.confirmed
    }

    /// Salinity mode is not reported by the device; it is inferred from the
    /// zero speed-of-sound sentinel.
    pub fn use_salinity(&self) -> bool {
        self.confirmed.speed_of_sound == 0.0
    }

    /// Build what would be sent for `change`, without touching the device.
    pub fn build_candidate(&self, change: &ParamChange) -> Result<Plan, Rejected> {
        let name = change.name;
        if name == ParamName::Run {
            return Err(Rejected::Precondition(
                "run is handled by the run-mode controller",
            ));
        }

        match name.descriptor().check(change.value) {
            Ok(()) => {}
            Err(Rejected::OutOfRange(n)) => {
                check_frequency_order(&self.confirmed, name)?;
                if n == ParamName::SoundSpeed {
                    info!("Speed of sound must be between 1400.0 and 1600.0.");
                } else {
                    info!("{n} = {} is out of range, ignored", change.value);
                }
                return Ok(Plan::NoOp(Rejected::OutOfRange(n)));
            }
            Err(other) => return Err(other),
        }
        check_frequency_order(&self.confirmed, name)?;

        let mut next = self.confirmed;
        match (name, change.value) {
            (ParamName::FrequencyMode, ParamValue::Int(v)) => next.frequency_mode = v as u8,
            (ParamName::PingRate, ParamValue::Int(v)) => next.ping_rate = v as u8,
            (ParamName::Nbeams, ParamValue::Int(v)) => next.flags.beams_512 = v != 0,
            (ParamName::GainAssist, ParamValue::Bool(b)) => next.flags.gain_assist = b,
            (ParamName::Range, ParamValue::Double(v)) => next.range = v,
            (ParamName::GammaCorrection, ParamValue::Int(v)) => next.gamma_correction = v as u8,
            (ParamName::GainPercent, ParamValue::Double(v)) => next.gain_percent = v,
            (ParamName::Salinity, ParamValue::Double(v)) => next.salinity = v,
            (ParamName::UseSalinity, ParamValue::Bool(true)) => next.speed_of_sound = 0.0,
            (ParamName::UseSalinity, ParamValue::Bool(false)) => {
                if self.use_salinity() {
                    next.speed_of_sound = self.manual_sound_speed;
                }
            }
            (ParamName::SoundSpeed, ParamValue::Double(v)) => {
                if self.use_salinity() {
                    info!("sound_speed ignored while use_salinity is true");
                    return Ok(Plan::NoOp(Rejected::Precondition(
                        "sound_speed is ignored while use_salinity is true",
                    )));
                }
                next.speed_of_sound = v;
            }
            _ => return Err(Rejected::Precondition("parameter type mismatch")),
        }

        stamp_minimal_flags(&mut next);
        Ok(Plan::Send(CandidateConfig {
            config: next,
            change: *change,
        }))
    }

    /// Apply a single change through the device.
    ///
    /// A request carrying anything but exactly one change is refused with
    /// [`Rejected::BatchNotSupported`] before anything is built.
    pub fn propose(
        &mut self,
        changes: &[ParamChange],
        dev: &mut impl DeviceDriver,
    ) -> Result<ReconciliationReport, Rejected> {
        let [change] = changes else {
            warn!("You should set parameters one by one ({} given)", changes.len());
            return Err(Rejected::BatchNotSupported);
        };

        let candidate = match self.build_candidate(change)? {
            Plan::Send(candidate) => candidate,
            Plan::NoOp(reason) => {
                return Ok(ReconciliationReport::ignored(*change, reason, self.confirmed));
            }
        };

        info!("Updating {} to {}", change.name, change.value);
        let feedback = dev.request_config(&candidate.config).map_err(|e| {
            warn!("No feedback for {} update: {e}", change.name);
            Rejected::DeviceUnreachable(e)
        })?;

        let violations = self.reconcile(feedback);
        let report = ReconciliationReport::compare(&candidate, &feedback, violations);
        if let FieldOutcome::Rejected { requested, device } = report.requested.outcome {
            warn!(
                "Sonar kept {} = {device} (requested {requested})",
                change.name
            );
        }
        Ok(report)
    }

    /// Adopt device feedback unconditionally and return its flag violations.
    pub fn reconcile(&mut self, feedback: DeviceConfig) -> FlagViolations {
        if feedback.speed_of_sound != 0.0 {
            self.manual_sound_speed = feedback.speed_of_sound;
        }
        self.confirmed = feedback;
        check_flags(feedback.flags)
    }
}
