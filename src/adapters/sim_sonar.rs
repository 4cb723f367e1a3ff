//! Simulated sonar.
//!
//! [`SimSonar`] implements [`DeviceDriver`] against an in-process model of
//! the firmware, including the quirks the node has to live with: the
//! unstable bit 0x80 is dropped, gain and range are clamped, gain assist is
//! refused in high-frequency mode and unknown codes keep their old value.
//!
//! [`SimFeed`] shares the same model and produces the push side (status,
//! pings, keepalives) into an [`EventQueue`].  The board heats up while
//! pinging and cools down in standby.

use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;

use crate::app::ports::DeviceDriver;
use crate::device::{DeviceConfig, FrequencyMode, PingRate, Reading, StatusSample};
use crate::error::DeviceError;
use crate::events::{EventQueue, NodeEvent};

const DEVICE_ID: u32 = 0x0000_2a1c;
const PART_NUMBER: u16 = 1042;

/// Maximum range per frequency mode (m).
const MAX_RANGE_LOW: f64 = 120.0;
const MAX_RANGE_HIGH: f64 = 40.0;

/// Aperture edge, hundredths of a degree.
const HALF_APERTURE_LOW: i16 = 6500;
const HALF_APERTURE_HIGH: i16 = 3500;

/// Range samples per simulated ping.
const N_RANGES: u16 = 16;

/// Surface pressure (Pa).
const ATMOSPHERE_PA: f64 = 101_325.0;

const HEAT_PER_PING_C: f64 = 0.05;
const COOL_PER_TICK_C: f64 = 0.1;

#[derive(Debug)]
struct SimState {
    config: DeviceConfig,
    connected: bool,
    standby: bool,
    temperature: f64,
    ambient: f64,
    depth_m: f64,
    ping_id: u32,
    requests: u32,
}

impl SimState {
    fn pinging(&self) -> bool {
        self.connected && !self.standby && self.config.ping_rate != PingRate::Standby.code()
    }

    fn pressure(&self) -> f64 {
        ATMOSPHERE_PA + self.depth_m * 1025.0 * 9.81
    }

    fn sound_speed(&self) -> f64 {
        if self.config.speed_of_sound == 0.0 {
            // Rough salinity correction around fresh water.
            1482.0 + 1.3 * self.config.salinity
        } else {
            self.config.speed_of_sound
        }
    }
}

/// What the firmware actually keeps from a requested configuration.
fn firmware_accept(current: &DeviceConfig, requested: &DeviceConfig) -> DeviceConfig {
    let mut out = *requested;

    if FrequencyMode::from_code(out.frequency_mode).is_none() {
        out.frequency_mode = current.frequency_mode;
    }
    if PingRate::from_code(out.ping_rate).is_none() {
        out.ping_rate = current.ping_rate;
    }

    let max_range = match FrequencyMode::from_code(out.frequency_mode) {
        Some(FrequencyMode::High) => {
            out.flags.gain_assist = false;
            MAX_RANGE_HIGH
        }
        _ => MAX_RANGE_LOW,
    };
    out.range = out.range.clamp(0.1, max_range);
    out.gain_percent = out.gain_percent.clamp(0.0, 100.0);

    if out.speed_of_sound != 0.0 && !(1400.0..=1600.0).contains(&out.speed_of_sound) {
        out.speed_of_sound = current.speed_of_sound;
    }

    out.flags.reserved_7 = false;
    out
}

/// Driver half of the simulated sonar.
pub struct SimSonar {
    state: Arc<Mutex<SimState>>,
}

impl SimSonar {
    /// A connected, standing-by sonar in water at `ambient` °C.
    pub fn new(initial: DeviceConfig, ambient: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                config: initial,
                connected: true,
                standby: true,
                temperature: ambient,
                ambient,
                depth_m: 5.0,
                ping_id: 0,
                requests: 0,
            })),
        }
    }

    /// Push half sharing this sonar's model.
    pub fn feed(&self) -> SimFeed {
        SimFeed {
            state: Arc::clone(&self.state),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }

    /// Override board temperature (e.g. sonar lifted out of the water).
    pub fn set_temperature(&self, celsius: f64) {
        self.state.lock().temperature = celsius;
    }

    pub fn is_standby(&self) -> bool {
        self.state.lock().standby
    }

    /// Configuration requests answered so far.
    pub fn requests(&self) -> u32 {
        self.state.lock().requests
    }
}

impl DeviceDriver for SimSonar {
    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn current_config(&mut self) -> Result<DeviceConfig, DeviceError> {
        let s = self.state.lock();
        if !s.connected {
            return Err(DeviceError::Disconnected);
        }
        Ok(s.config)
    }

    fn request_config(&mut self, candidate: &DeviceConfig) -> Result<DeviceConfig, DeviceError> {
        let mut s = self.state.lock();
        if !s.connected {
            return Err(DeviceError::Disconnected);
        }
        let accepted = firmware_accept(&s.config, candidate);
        s.config = accepted;
        s.requests += 1;
        debug!("SimSonar: request #{} accepted", s.requests);
        Ok(accepted)
    }

    fn resume(&mut self) -> Result<(), DeviceError> {
        let mut s = self.state.lock();
        if !s.connected {
            return Err(DeviceError::Disconnected);
        }
        s.standby = false;
        info!("SimSonar: pinging");
        Ok(())
    }

    fn standby(&mut self) -> Result<(), DeviceError> {
        let mut s = self.state.lock();
        if !s.connected {
            return Err(DeviceError::Disconnected);
        }
        s.standby = true;
        info!("SimSonar: standby");
        Ok(())
    }
}

/// Push half of the simulated sonar.
pub struct SimFeed {
    state: Arc<Mutex<SimState>>,
}

impl SimFeed {
    /// Advance the model by one tick and enqueue what the device would send:
    /// a status, then a ping when pinging or a keepalive when idle.
    /// Returns the number of events accepted by the queue.
    pub fn step(&self, queue: &EventQueue) -> usize {
        let (status, ping) = {
            let mut s = self.state.lock();
            if !s.connected {
                return 0;
            }
            if s.pinging() {
                s.temperature += HEAT_PER_PING_C;
                s.ping_id = s.ping_id.wrapping_add(1);
            } else if s.temperature > s.ambient {
                s.temperature = (s.temperature - COOL_PER_TICK_C).max(s.ambient);
            }
            let status = StatusSample {
                device_id: DEVICE_ID,
                part_number: PART_NUMBER,
                status: u32::from(!s.standby),
                temperature: s.temperature,
                pressure: s.pressure(),
            };
            let ping = s.pinging().then(|| build_reading(&s));
            (status, ping)
        };

        let mut sent = usize::from(queue.push(NodeEvent::Status(status)));
        let next = match ping {
            Some(reading) => NodeEvent::reading(reading),
            None => NodeEvent::Keepalive,
        };
        sent += usize::from(queue.push(next));
        sent
    }
}

fn build_reading(s: &SimState) -> Reading {
    let cfg = &s.config;
    let n_beams: u16 = if cfg.flags.beams_512 { 512 } else { 256 };
    let half = if cfg.frequency_mode == FrequencyMode::High.code() {
        HALF_APERTURE_HIGH
    } else {
        HALF_APERTURE_LOW
    };
    let step = f32::from(half) * 2.0 / f32::from(n_beams - 1);
    let bearings = (0..n_beams)
        .map(|i| (-f32::from(half) + step * f32::from(i)).round() as i16)
        .collect();
    let intensities = (0..usize::from(N_RANGES) * usize::from(n_beams))
        .map(|i| ((i * 7 + s.ping_id as usize) % 256) as u8)
        .collect();

    Reading {
        ping_id: s.ping_id,
        frequency_mode: cfg.frequency_mode,
        range: cfg.range,
        gain_percent: cfg.gain_percent,
        speed_of_sound_used: s.sound_speed(),
        temperature: s.temperature,
        pressure: s.pressure(),
        n_beams,
        n_ranges: N_RANGES,
        bearings,
        intensities,
    }
}
