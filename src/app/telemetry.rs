//! Telemetry gate and message builders.
//!
//! Temperature and pressure come from two sources: the periodic status
//! broadcast and every ping.  While Active the ping stream carries them, so
//! the status-derived copies are suppressed to avoid duplicate samples.

use core::f32::consts::PI;

use crate::device::Reading;

use super::events::{FanPayload, PingTelemetry, ScalarTelemetry};
use super::run_mode::RunState;

pub struct TelemetryGate {
    frame_id: String,
}

impl TelemetryGate {
    pub fn new(frame_id: impl Into<String>) -> Self {
        Self {
            frame_id: frame_id.into(),
        }
    }

    /// Status-derived temperature and pressure are published in Standby only.
    pub fn should_publish_passive_telemetry(&self, state: RunState) -> bool {
        state == RunState::Standby
    }

    pub fn ping(&self, reading: &Reading) -> PingTelemetry {
        PingTelemetry {
            frame_id: self.frame_id.clone(),
            ping_id: reading.ping_id,
            temperature: reading.temperature,
            pressure: reading.pressure,
            frequency_mode: reading.frequency_mode,
            range: reading.range,
            gain_percent: reading.gain_percent,
            sound_speed: reading.speed_of_sound_used,
            n_beams: reading.n_beams,
            n_ranges: reading.n_ranges,
        }
    }

    pub fn fan(&self, reading: &Reading) -> FanPayload {
        FanPayload {
            frame_id: self.frame_id.clone(),
            ping_id: reading.ping_id,
            n_beams: reading.n_beams,
            n_ranges: reading.n_ranges,
            range: reading.range,
            bearings: reading
                .bearings
                .iter()
                .map(|&b| bearing_to_radians(b))
                .collect(),
            intensities: reading.intensities.clone(),
        }
    }

    pub fn temperature(&self, celsius: f64) -> ScalarTelemetry {
        self.scalar(celsius)
    }

    pub fn pressure(&self, pascal: f64) -> ScalarTelemetry {
        self.scalar(pascal)
    }

    fn scalar(&self, value: f64) -> ScalarTelemetry {
        ScalarTelemetry {
            frame_id: self.frame_id.clone(),
            value,
            variance: 0.0,
        }
    }
}

/// Device bearings are hundredths of a degree.
pub fn bearing_to_radians(hundredths: i16) -> f32 {
    f32::from(hundredths) * 0.01 * PI / 180.0
}
