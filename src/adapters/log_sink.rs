//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to the
//! `log` facade.  A publishing adapter for a message bus would implement the
//! same trait.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::app::service::SetOutcome;

/// Adapter that logs every [`AppEvent`].
///
/// There are no real subscribers behind a log, so the subscriber count is
/// whatever the owner sets.
pub struct LogEventSink {
    subscribers: usize,
    emitted: u64,
}

impl LogEventSink {
    pub fn new(subscribers: usize) -> Self {
        Self {
            subscribers,
            emitted: 0,
        }
    }

    pub fn set_subscribers(&mut self, n: usize) {
        if n != self.subscribers {
            info!("SUBS  | {} -> {}", self.subscribers, n);
        }
        self.subscribers = n;
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        self.emitted += 1;
        match event {
            AppEvent::Started(state) => {
                info!("START | run_state={}", state);
            }
            AppEvent::Status(s) => {
                debug!(
                    "STATUS| id={} part={} status=0x{:08x} T={:.1}\u{00b0}C P={:.0}Pa",
                    s.device_id, s.part_number, s.status, s.temperature, s.pressure
                );
            }
            AppEvent::Ping(p) => {
                debug!(
                    "PING  | #{} freq={} range={:.1}m gain={:.0}% c={:.1}m/s {}x{} T={:.1}\u{00b0}C",
                    p.ping_id,
                    p.frequency_mode,
                    p.range,
                    p.gain_percent,
                    p.sound_speed,
                    p.n_beams,
                    p.n_ranges,
                    p.temperature,
                );
            }
            AppEvent::Fan(f) => {
                debug!(
                    "FAN   | #{} {} bearings, {} samples",
                    f.ping_id,
                    f.bearings.len(),
                    f.intensities.len()
                );
            }
            AppEvent::Temperature(t) => debug!("TEMP  | {:.2}\u{00b0}C", t.value),
            AppEvent::Pressure(p) => debug!("PRESS | {:.0}Pa", p.value),
            AppEvent::RunStateChanged { from, to } => {
                info!("RUN   | {} -> {}", from, to);
            }
            AppEvent::ParameterResult { change, result } => {
                let what = change.map_or_else(
                    || "batch".to_owned(),
                    |c| format!("{}={}", c.name, c.value),
                );
                match result {
                    Ok(SetOutcome::Reconciled(report)) if report.is_accepted() => {
                        info!("PARAM | {} accepted", what);
                    }
                    Ok(SetOutcome::Reconciled(report)) => {
                        warn!("PARAM | {} not honoured: {:?}", what, report.requested.outcome);
                    }
                    Ok(SetOutcome::Run(state)) => info!("PARAM | {} -> {}", what, state),
                    Err(e) => warn!("PARAM | {} rejected: {}", what, e),
                }
            }
        }
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers
    }
}
