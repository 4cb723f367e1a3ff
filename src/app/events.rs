//! Outbound application events.
//!
//! The [`SonarService`](super::service::SonarService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: publish on a topic, log, record.

use crate::device::StatusSample;
use crate::error::Rejected;
use crate::params::ParamChange;

use super::run_mode::RunState;
use super::service::SetOutcome;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The service has reconciled the device and settled its run state.
    Started(RunState),

    /// Raw device status, republished as received.
    Status(StatusSample),

    /// Processed fields of one ping.
    Ping(PingTelemetry),

    /// Fan-shaped image payload of one ping.
    Fan(FanPayload),

    /// Device temperature (°C).
    Temperature(ScalarTelemetry),

    /// Device absolute pressure (Pa).
    Pressure(ScalarTelemetry),

    /// The run state changed.
    RunStateChanged { from: RunState, to: RunState },

    /// Outcome of a queued parameter-set request.
    ParameterResult {
        change: Option<ParamChange>,
        result: Result<SetOutcome, Rejected>,
    },
}

/// Per-ping processed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct PingTelemetry {
    pub frame_id: String,
    pub ping_id: u32,
    pub temperature: f64,
    pub pressure: f64,
    pub frequency_mode: u8,
    pub range: f64,
    pub gain_percent: f64,
    pub sound_speed: f64,
    pub n_beams: u16,
    pub n_ranges: u16,
}

/// Image payload laid out for a polar (fan) display.
#[derive(Debug, Clone, PartialEq)]
pub struct FanPayload {
    pub frame_id: String,
    pub ping_id: u32,
    pub n_beams: u16,
    pub n_ranges: u16,
    pub range: f64,
    /// Beam bearings in radians.
    pub bearings: Vec<f32>,
    /// Row-major `n_ranges × n_beams` intensities.
    pub intensities: Vec<u8>,
}

/// A single scalar measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarTelemetry {
    pub frame_id: String,
    pub value: f64,
    /// 0 is interpreted as variance unknown.
    pub variance: f64,
}
