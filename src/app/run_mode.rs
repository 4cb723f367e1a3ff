//! Run-mode controller.
//!
//! Two states, no others:
//!
//! ```text
//!       request_active (no blockers) / on_idle_signal (run wanted)
//!   Standby ────────────────────────────────────────────────▶ Active
//!      ▲                                                        │
//!      └──── request_standby / on_reading with a blocker ───────┘
//! ```
//!
//! Every transition runs the device command first, then updates the
//! internal state, then the mirrored `run` flag.  A failed device command
//! leaves state and mirror untouched.
//!
//! The operator's run intent is kept apart from the state.  An explicit run
//! request sets it and only an explicit standby request clears it.  Standby
//! forced by an interlock keeps it, so the sonar resumes on its own once the
//! interlocks clear.

use core::fmt;

use log::{info, warn};

use crate::error::{Rejected, RunBlocker, RunBlockers};
use crate::params::{ParamName, ParamValue, SharedParameters};

use super::ports::{DeviceDriver, ParameterStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RunState {
    #[default]
    Standby,
    Active,
}

impl RunState {
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standby => write!(f, "standby"),
            Self::Active => write!(f, "active"),
        }
    }
}

/// Snapshot of everything the run interlocks look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConditions {
    /// Consumers of ping or image output.
    pub subscribers: usize,
    /// Latest thermal classification is at or above the stop limit.
    pub overheating: bool,
    /// Ping-rate code of the confirmed device configuration.
    pub ping_rate: u8,
}

impl RunConditions {
    /// Every condition currently preventing Active.
    pub fn blockers(&self, standby_ping_rate: u8) -> RunBlockers {
        let mut b = RunBlockers::empty();
        if self.subscribers == 0 {
            b.insert(RunBlocker::NoSubscribers);
        }
        if self.overheating {
            b.insert(RunBlocker::Overheating);
        }
        if self.ping_rate == standby_ping_rate {
            b.insert(RunBlocker::StandbyPingRate);
        }
        b
    }
}

pub struct RunController {
    state: RunState,
    run_wanted: bool,
    standby_ping_rate: u8,
    mirror: SharedParameters,
}

impl RunController {
    /// The node always starts in Standby; the start-up sequence decides
    /// whether to leave it.
    pub fn new(standby_ping_rate: u8, mirror: SharedParameters) -> Self {
        Self {
            state: RunState::Standby,
            run_wanted: false,
            standby_ping_rate,
            mirror,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Whether the operator last asked to run.
    pub fn run_wanted(&self) -> bool {
        self.run_wanted
    }

    pub fn blockers(&self, cond: &RunConditions) -> RunBlockers {
        cond.blockers(self.standby_ping_rate)
    }

    /// Enter Active if every run condition holds.
    ///
    /// Already Active is not an error and sends nothing to the device.
    /// The run intent is recorded even when refused.
    pub fn request_active(
        &mut self,
        cond: &RunConditions,
        dev: &mut impl DeviceDriver,
        store: &mut impl ParameterStore,
    ) -> Result<(), Rejected> {
        self.run_wanted = true;
        let blockers = self.blockers(cond);
        if !blockers.is_empty() {
            for b in blockers.iter() {
                warn!("Cannot run: {b}");
            }
            return Err(Rejected::NotPermitted(blockers));
        }
        if self.state.is_active() {
            return Ok(());
        }
        self.enter_active(dev, store)
    }

    /// Operator standby: clears the run intent, then commands standby.
    pub fn request_standby(
        &mut self,
        dev: &mut impl DeviceDriver,
        store: &mut impl ParameterStore,
    ) -> Result<(), Rejected> {
        self.run_wanted = false;
        self.enforce_standby(dev, store)
    }

    /// Command standby without touching the run intent.  Always issued,
    /// whatever the current state.
    pub fn enforce_standby(
        &mut self,
        dev: &mut impl DeviceDriver,
        store: &mut impl ParameterStore,
    ) -> Result<(), Rejected> {
        dev.standby().map_err(|e| {
            warn!("Standby command failed: {e}");
            Rejected::from(e)
        })?;
        if self.state.is_active() {
            info!("Going to standby mode");
        }
        self.state = RunState::Standby;
        self.publish_run(false, store);
        Ok(())
    }

    /// Re-check the interlocks while Active and leave Active if any fails.
    ///
    /// Returns the blockers that forced the exit.  If the standby command
    /// itself fails the state stays Active and the blockers are still
    /// returned.
    pub fn revalidate(
        &mut self,
        cond: &RunConditions,
        dev: &mut impl DeviceDriver,
        store: &mut impl ParameterStore,
    ) -> Option<RunBlockers> {
        if !self.state.is_active() {
            return None;
        }
        let blockers = self.blockers(cond);
        if blockers.is_empty() {
            return None;
        }
        for b in blockers.iter() {
            info!("Leaving active mode: {b}");
        }
        // Failure is logged by enforce_standby; the next reading retries.
        let _ = self.enforce_standby(dev, store);
        Some(blockers)
    }

    /// A ping arrived while Active.  Conditions must already reflect the
    /// temperature carried by the ping.
    pub fn on_reading(
        &mut self,
        cond: &RunConditions,
        dev: &mut impl DeviceDriver,
        store: &mut impl ParameterStore,
    ) -> Option<RunBlockers> {
        self.revalidate(cond, dev, store)
    }

    /// The device is idle (keepalive, or a dummy message).  Resume if
    /// Standby, the operator wants to run and every condition holds.
    /// Returns whether Active was entered.
    pub fn on_idle_signal(
        &mut self,
        cond: &RunConditions,
        dev: &mut impl DeviceDriver,
        store: &mut impl ParameterStore,
    ) -> bool {
        if self.state.is_active() || !self.run_wanted || !self.blockers(cond).is_empty() {
            return false;
        }
        self.enter_active(dev, store).is_ok()
    }

    fn enter_active(
        &mut self,
        dev: &mut impl DeviceDriver,
        store: &mut impl ParameterStore,
    ) -> Result<(), Rejected> {
        dev.resume().map_err(|e| {
            warn!("Resume command failed: {e}");
            Rejected::from(e)
        })?;
        info!("Exiting standby mode");
        self.state = RunState::Active;
        self.publish_run(true, store);
        Ok(())
    }

    fn publish_run(&self, run: bool, store: &mut impl ParameterStore) {
        self.mirror.set_run(run);
        store.set(ParamName::Run, ParamValue::Bool(run));
    }
}
