//! Application service, the hexagonal core.
//!
//! [`SonarService`] owns the synchronizer, run controller, safety monitor
//! and telemetry gate.  All I/O flows through port traits injected at call
//! sites, so the whole service is testable with mock adapters.
//!
//! ```text
//!  DeviceDriver ◀──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                    │         SonarService          │
//! ParameterStore ◀──▶│ Sync · RunMode · Safety · Gate│
//!                    └──────────────────────────────┘
//! ```
//!
//! Every handler runs to completion on the node loop; nothing here blocks
//! except the device round trips behind the driver port.

use core::slice;

use log::{debug, error, info, warn};

use crate::config::NodeConfig;
use crate::device::{DeviceConfig, Reading, StatusSample};
use crate::error::Rejected;
use crate::params::{ControlParameters, ParamChange, ParamName, ParamValue, SharedParameters};
use crate::safety::{SafetyMonitor, ThermalState, check_flags};

use super::events::AppEvent;
use super::ports::{DeviceDriver, EventSink, ParameterStore};
use super::run_mode::{RunConditions, RunController, RunState};
use super::synchronizer::{ConfigSynchronizer, ReconciliationReport};
use super::telemetry::TelemetryGate;

/// Order in which persisted values are pushed to the device at start-up.
/// Gain assist goes first so a frequency change is not refused, and
/// salinity mode is settled before a manual speed of sound.
const REPLAY_ORDER: [ParamName; 10] = [
    ParamName::GainAssist,
    ParamName::FrequencyMode,
    ParamName::PingRate,
    ParamName::Nbeams,
    ParamName::Range,
    ParamName::GammaCorrection,
    ParamName::GainPercent,
    ParamName::UseSalinity,
    ParamName::SoundSpeed,
    ParamName::Salinity,
];

/// Successful outcome of a parameter-set request.
#[derive(Debug, Clone, PartialEq)]
pub enum SetOutcome {
    /// A device-backed field went through the synchronizer.
    Reconciled(ReconciliationReport),
    /// The `run` field was handled by the run controller.
    Run(RunState),
}

// ───────────────────────────────────────────────────────────────
// SonarService
// ───────────────────────────────────────────────────────────────

pub struct SonarService {
    config: NodeConfig,
    sync: ConfigSynchronizer,
    run: RunController,
    safety: SafetyMonitor,
    gate: TelemetryGate,
    params: SharedParameters,
}

impl SonarService {
    // ── Lifecycle ─────────────────────────────────────────────

    /// Build the service from the device's present configuration.
    ///
    /// Queries the device (never assumes defaults), replays persisted
    /// parameter values that differ from it, then settles the run state from
    /// the persisted `run` flag, falling back to `config.run`.
    pub fn start(
        config: NodeConfig,
        dev: &mut impl DeviceDriver,
        store: &mut impl ParameterStore,
        sink: &mut impl EventSink,
    ) -> crate::error::Result<Self> {
        let confirmed = dev.current_config()?;
        info!(
            "Sonar configuration: freq={} rate={} range={} gain={} flags=0x{:02x}",
            confirmed.frequency_mode,
            confirmed.ping_rate,
            confirmed.range,
            confirmed.gain_percent,
            confirmed.flags.to_byte()
        );

        let mut safety = SafetyMonitor::new(&config);
        safety.report_flags(&check_flags(confirmed.flags));

        let params = SharedParameters::new(ControlParameters::from_device(&confirmed, false));
        let mut svc = Self {
            sync: ConfigSynchronizer::new(confirmed),
            run: RunController::new(config.standby_ping_rate, params.clone()),
            safety,
            gate: TelemetryGate::new(config.frame_id.clone()),
            params,
            config,
        };

        let want_run = store
            .get(ParamName::Run)
            .and_then(ParamValue::as_bool)
            .unwrap_or(svc.config.run);

        svc.replay_persisted(dev, store);
        svc.publish_mirror(store);
        svc.settle_run(want_run, dev, store, &*sink);

        sink.emit(&AppEvent::Started(svc.run.state()));
        info!("SonarService started in {}", svc.run.state());
        Ok(svc)
    }

    fn replay_persisted(&mut self, dev: &mut impl DeviceDriver, store: &mut impl ParameterStore) {
        for name in REPLAY_ORDER {
            let Some(stored) = store.get(name) else {
                continue;
            };
            if stored == self.params.get(name) {
                continue;
            }
            let change = ParamChange::new(name, stored);
            match self.sync.propose(slice::from_ref(&change), dev) {
                Ok(report) => {
                    self.safety.report_flags(&report.flag_violations);
                    self.refresh_mirror(store);
                }
                Err(e) => warn!("Persisted {name} = {stored} not applied: {e}"),
            }
        }
    }

    fn settle_run(
        &mut self,
        want_run: bool,
        dev: &mut impl DeviceDriver,
        store: &mut impl ParameterStore,
        sink: &impl EventSink,
    ) {
        if want_run {
            let cond = self.conditions(sink);
            match self.run.request_active(&cond, dev, store) {
                Ok(()) => return,
                Err(e) => info!("Run requested at start-up but refused: {e}"),
            }
        }
        if let Err(e) = self.run.enforce_standby(dev, store) {
            error!("Could not put the sonar in standby: {e}");
        }
        store.set(ParamName::Run, ParamValue::Bool(self.run.state().is_active()));
    }

    // ── Parameter requests ────────────────────────────────────

    /// Apply one externally requested change.
    ///
    /// On return the store holds device truth for the requested field,
    /// whether the request succeeded or not.
    pub fn set_parameters(
        &mut self,
        changes: &[ParamChange],
        dev: &mut impl DeviceDriver,
        store: &mut impl ParameterStore,
        sink: &mut impl EventSink,
    ) -> Result<SetOutcome, Rejected> {
        let [change] = changes else {
            warn!("You should set parameters one by one ({} given)", changes.len());
            return Err(Rejected::BatchNotSupported);
        };

        if change.name == ParamName::Run {
            return self.set_run(change.value, dev, store, sink);
        }

        let result = self.sync.propose(slice::from_ref(change), dev);
        if let Ok(report) = &result {
            self.safety.report_flags(&report.flag_violations);
            self.refresh_mirror(store);
            self.revalidate(dev, store, sink);
        }
        store.set(change.name, self.params.get(change.name));
        result.map(SetOutcome::Reconciled)
    }

    fn set_run(
        &mut self,
        value: ParamValue,
        dev: &mut impl DeviceDriver,
        store: &mut impl ParameterStore,
        sink: &mut impl EventSink,
    ) -> Result<SetOutcome, Rejected> {
        let before = self.run.state();
        let result = match value.as_bool() {
            Some(true) => {
                let cond = self.conditions(&*sink);
                self.run.request_active(&cond, dev, store)
            }
            Some(false) => self.run.request_standby(dev, store),
            None => Err(Rejected::Precondition("parameter type mismatch")),
        };
        if result.is_err() {
            store.set(ParamName::Run, ParamValue::Bool(before.is_active()));
        }
        self.emit_transition(before, sink);
        result.map(|()| SetOutcome::Run(self.run.state()))
    }

    // ── Device push data ──────────────────────────────────────

    /// Periodic status.  Always republished; in Standby it also drives the
    /// thermal state and the temperature/pressure telemetry.
    pub fn on_status(&mut self, status: &StatusSample, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Status(*status));
        if self.gate.should_publish_passive_telemetry(self.run.state()) {
            self.safety.observe(status.temperature);
            sink.emit(&AppEvent::Temperature(self.gate.temperature(status.temperature)));
            sink.emit(&AppEvent::Pressure(self.gate.pressure(status.pressure)));
        }
    }

    /// One ping.  Refreshes thermal state and mirror, re-checks the run
    /// interlocks, then publishes.
    pub fn on_reading(
        &mut self,
        reading: &Reading,
        dev: &mut impl DeviceDriver,
        store: &mut impl ParameterStore,
        sink: &mut impl EventSink,
    ) {
        let arrived_in = self.run.state();
        self.safety.observe(reading.temperature);
        self.refresh_from_reading(reading, store);

        match arrived_in {
            RunState::Active => self.revalidate(dev, store, sink),
            RunState::Standby => {
                debug!("Ping {} received in standby, repeating standby", reading.ping_id);
                // Failure is already logged; the next stray ping retries.
                let _ = self.run.enforce_standby(dev, store);
            }
        }

        sink.emit(&AppEvent::Ping(self.gate.ping(reading)));
        if !self.gate.should_publish_passive_telemetry(arrived_in) {
            sink.emit(&AppEvent::Temperature(self.gate.temperature(reading.temperature)));
            sink.emit(&AppEvent::Pressure(self.gate.pressure(reading.pressure)));
        }
        sink.emit(&AppEvent::Fan(self.gate.fan(reading)));
    }

    /// The device is idle and waiting.  Resume if the operator wants to run
    /// and every interlock allows it.
    pub fn on_keepalive(
        &mut self,
        dev: &mut impl DeviceDriver,
        store: &mut impl ParameterStore,
        sink: &mut impl EventSink,
    ) {
        let before = self.run.state();
        let cond = self.conditions(&*sink);
        if self.run.on_idle_signal(&cond, dev, store) {
            self.emit_transition(before, sink);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Handle on the mirrored parameters; cheap to clone, safe to read from
    /// any thread.
    pub fn parameters(&self) -> SharedParameters {
        self.params.clone()
    }

    pub fn run_state(&self) -> RunState {
        self.run.state()
    }

    pub fn confirmed_config(&self) -> DeviceConfig {
        *self.sync.confirmed()
    }

    pub fn thermal(&self) -> ThermalState {
        self.safety.thermal()
    }

    // ── Internal ──────────────────────────────────────────────

    fn conditions(&self, sink: &impl EventSink) -> RunConditions {
        RunConditions {
            subscribers: sink.subscriber_count(),
            overheating: self.safety.is_overheating(),
            ping_rate: self.sync.confirmed().ping_rate,
        }
    }

    fn revalidate(
        &mut self,
        dev: &mut impl DeviceDriver,
        store: &mut impl ParameterStore,
        sink: &mut impl EventSink,
    ) {
        let before = self.run.state();
        let cond = self.conditions(&*sink);
        if let Some(blockers) = self.run.revalidate(&cond, dev, store) {
            debug!("Run interlocks failed: {blockers}");
        }
        self.emit_transition(before, sink);
    }

    fn emit_transition(&self, before: RunState, sink: &mut impl EventSink) {
        let after = self.run.state();
        if before != after {
            sink.emit(&AppEvent::RunStateChanged {
                from: before,
                to: after,
            });
        }
    }

    /// Re-derive the mirror from the confirmed configuration.
    fn refresh_mirror(&mut self, store: &mut impl ParameterStore) {
        let run = self.params.snapshot().run;
        self.replace_mirror(ControlParameters::from_device(self.sync.confirmed(), run), store);
    }

    /// The ping header reports what the device actually used.  In salinity
    /// mode the computed speed of sound is not mirrored, so the zero
    /// sentinel stays visible.
    fn refresh_from_reading(&mut self, reading: &Reading, store: &mut impl ParameterStore) {
        let mut next = self.params.snapshot();
        next.frequency_mode = reading.frequency_mode;
        next.range = reading.range;
        next.gain_percent = reading.gain_percent;
        if !next.use_salinity {
            next.sound_speed = reading.speed_of_sound_used;
        }
        self.replace_mirror(next, store);
    }

    fn replace_mirror(&mut self, next: ControlParameters, store: &mut impl ParameterStore) {
        let prev = self.params.replace(next);
        for name in prev.diff(&next) {
            store.set(name, next.get(name));
        }
    }

    /// Write every device-backed field to the store.
    fn publish_mirror(&self, store: &mut impl ParameterStore) {
        let snap = self.params.snapshot();
        for name in ParamName::ALL {
            if name != ParamName::Run {
                store.set(name, snap.get(name));
            }
        }
    }
}
