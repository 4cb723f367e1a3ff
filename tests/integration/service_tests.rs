//! Integration tests for the SonarService → synchronizer / run-mode pipeline.
//!
//! Every test drives the service through mock ports and asserts on what the
//! device was asked to do, what the store ended up holding, and what was
//! published.

use sonarnode::app::events::AppEvent;
use sonarnode::app::run_mode::RunState;
use sonarnode::app::service::{SetOutcome, SonarService};
use sonarnode::app::synchronizer::FieldOutcome;
use sonarnode::config::NodeConfig;
use sonarnode::device::{DeviceConfig, Reading, StatusSample};
use sonarnode::error::{DeviceError, Rejected, RunBlocker};
use sonarnode::params::{ParamChange, ParamName, ParamValue};
use sonarnode::safety::{FlagViolation, ThermalState};

use crate::mock_ports::{DeviceCall, MockSonar, MockStore, RecordingSink, manual_config, rig};

fn start(config: DeviceConfig, subscribers: usize) -> (SonarService, MockSonar, MockStore, RecordingSink) {
    let (mut dev, mut store, mut sink, _) = rig(config, subscribers);
    let svc = SonarService::start(NodeConfig::default(), &mut dev, &mut store, &mut sink)
        .expect("service starts");
    dev.clear();
    sink.clear();
    (svc, dev, store, sink)
}

fn start_active() -> (SonarService, MockSonar, MockStore, RecordingSink) {
    let (mut svc, mut dev, mut store, mut sink) = start(manual_config(), 1);
    set(&mut svc, &mut dev, &mut store, &mut sink, ParamName::Run, ParamValue::Bool(true))
        .expect("run accepted");
    dev.clear();
    sink.clear();
    (svc, dev, store, sink)
}

fn set(
    svc: &mut SonarService,
    dev: &mut MockSonar,
    store: &mut MockStore,
    sink: &mut RecordingSink,
    name: ParamName,
    value: ParamValue,
) -> Result<SetOutcome, Rejected> {
    store.host_write(name, value);
    svc.set_parameters(&[ParamChange::new(name, value)], dev, store, sink)
}

fn reading(temperature: f64) -> Reading {
    Reading {
        ping_id: 7,
        frequency_mode: 1,
        range: 20.0,
        gain_percent: 50.0,
        speed_of_sound_used: 1480.0,
        temperature,
        pressure: 150_000.0,
        n_beams: 2,
        n_ranges: 1,
        bearings: vec![-100, 100],
        intensities: vec![10, 20],
    }
}

fn status(temperature: f64) -> StatusSample {
    StatusSample {
        temperature,
        pressure: 101_325.0,
        ..StatusSample::default()
    }
}

// ── Start-up ──────────────────────────────────────────────────

#[test]
fn start_reads_device_not_defaults() {
    let cfg = DeviceConfig {
        range: 33.0,
        gain_percent: 12.0,
        ..manual_config()
    };
    let (mut dev, mut store, mut sink, _) = rig(cfg, 0);
    let svc = SonarService::start(NodeConfig::default(), &mut dev, &mut store, &mut sink).unwrap();

    assert_eq!(dev.calls[0], DeviceCall::CurrentConfig);
    let p = svc.parameters().snapshot();
    assert_eq!(p.range, 33.0);
    assert_eq!(p.gain_percent, 12.0);
    assert!(!p.use_salinity);
    assert_eq!(store.values[&ParamName::Range], ParamValue::Double(33.0));
}

#[test]
fn persisted_run_is_refused_without_subscribers() {
    let (mut dev, mut store, mut sink, _) = rig(manual_config(), 0);
    store.host_write(ParamName::Run, ParamValue::Bool(true));
    let svc = SonarService::start(NodeConfig::default(), &mut dev, &mut store, &mut sink).unwrap();

    assert_eq!(svc.run_state(), RunState::Standby);
    assert_eq!(dev.resumes(), 0);
    assert_eq!(dev.standbys(), 1);
    assert_eq!(store.values[&ParamName::Run], ParamValue::Bool(false));
}

#[test]
fn config_run_used_when_store_is_empty() {
    let (mut dev, mut store, mut sink, _) = rig(manual_config(), 1);
    let config = NodeConfig {
        run: true,
        ..NodeConfig::default()
    };
    let svc = SonarService::start(config, &mut dev, &mut store, &mut sink).unwrap();
    assert_eq!(svc.run_state(), RunState::Active);
    assert!(matches!(sink.events.last(), Some(AppEvent::Started(RunState::Active))));
}

// ── Parameter requests ────────────────────────────────────────

#[test]
fn accepted_change_is_written_back() {
    let (mut svc, mut dev, mut store, mut sink) = start(manual_config(), 0);
    let out = set(&mut svc, &mut dev, &mut store, &mut sink, ParamName::Range, ParamValue::Double(42.5))
        .unwrap();

    let SetOutcome::Reconciled(report) = out else {
        panic!("expected a reconciliation");
    };
    assert!(report.is_accepted());
    assert_eq!(store.values[&ParamName::Range], ParamValue::Double(42.5));
    assert_eq!(svc.confirmed_config().range, 42.5);

    let sent = dev.requests();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].flags.range_as_meters && sent[0].flags.send_gains && sent[0].flags.simple_ping);
    assert!(!sent[0].flags.data_16bit && !sent[0].flags.reserved_7);
}

#[test]
fn device_truth_wins_over_request() {
    let (mut svc, mut dev, mut store, mut sink) = start(manual_config(), 0);
    dev.quirk = Some(|c: &mut DeviceConfig| c.gain_percent = c.gain_percent.min(80.0));

    let out = set(&mut svc, &mut dev, &mut store, &mut sink, ParamName::GainPercent, ParamValue::Double(90.0))
        .unwrap();
    let SetOutcome::Reconciled(report) = out else {
        panic!("expected a reconciliation");
    };
    assert_eq!(
        report.requested.outcome,
        FieldOutcome::Rejected {
            requested: ParamValue::Double(90.0),
            device: ParamValue::Double(80.0),
        }
    );
    let rejected: Vec<_> = report.rejected_fields().map(|f| f.name).collect();
    assert_eq!(rejected, vec![ParamName::GainPercent]);
    assert_eq!(store.values[&ParamName::GainPercent], ParamValue::Double(80.0));
    assert_eq!(svc.parameters().snapshot().gain_percent, 80.0);
}

#[test]
fn batch_is_rejected_and_nothing_sent() {
    let (mut svc, mut dev, mut store, mut sink) = start(manual_config(), 0);
    let before = svc.confirmed_config();
    let r = svc.set_parameters(
        &[
            ParamChange::new(ParamName::Range, ParamValue::Double(5.0)),
            ParamChange::new(ParamName::Salinity, ParamValue::Double(35.0)),
        ],
        &mut dev,
        &mut store,
        &mut sink,
    );
    assert_eq!(r, Err(Rejected::BatchNotSupported));
    assert!(dev.calls.is_empty());
    assert_eq!(svc.confirmed_config(), before);
}

#[test]
fn sound_speed_ignored_in_salinity_mode() {
    let (mut svc, mut dev, mut store, mut sink) = start(DeviceConfig::default(), 0);
    let out = set(&mut svc, &mut dev, &mut store, &mut sink, ParamName::SoundSpeed, ParamValue::Double(1500.0))
        .unwrap();
    let SetOutcome::Reconciled(report) = out else {
        panic!("expected a reconciliation");
    };
    assert!(matches!(report.requested.outcome, FieldOutcome::Ignored(_)));
    assert!(dev.requests().is_empty());
    // Host wrote 1500; the store is put back to the mirrored sentinel.
    assert_eq!(store.values[&ParamName::SoundSpeed], ParamValue::Double(0.0));
}

#[test]
fn out_of_range_sound_speed_is_a_noop() {
    let (mut svc, mut dev, mut store, mut sink) = start(manual_config(), 0);
    let out = set(&mut svc, &mut dev, &mut store, &mut sink, ParamName::SoundSpeed, ParamValue::Double(1399.0));
    assert!(out.is_ok());
    assert!(dev.requests().is_empty());
    assert_eq!(svc.confirmed_config().speed_of_sound, 1480.0);
    assert_eq!(store.values[&ParamName::SoundSpeed], ParamValue::Double(1480.0));
}

#[test]
fn use_salinity_sends_zero_and_mirrors_flag() {
    let (mut svc, mut dev, mut store, mut sink) = start(manual_config(), 0);
    set(&mut svc, &mut dev, &mut store, &mut sink, ParamName::UseSalinity, ParamValue::Bool(true)).unwrap();
    assert_eq!(dev.requests()[0].speed_of_sound, 0.0);
    let p = svc.parameters().snapshot();
    assert!(p.use_salinity);
    assert_eq!(p.sound_speed, 0.0);
    assert_eq!(store.values[&ParamName::UseSalinity], ParamValue::Bool(true));

    // Later requests keep the device computing the speed of sound.
    set(&mut svc, &mut dev, &mut store, &mut sink, ParamName::Range, ParamValue::Double(30.0)).unwrap();
    assert_eq!(dev.requests().len(), 2);
    assert_eq!(dev.requests()[1].speed_of_sound, 0.0);
    assert!(svc.parameters().snapshot().use_salinity);
}

#[test]
fn frequency_change_refused_while_gain_assist_on() {
    let mut cfg = manual_config();
    cfg.flags.gain_assist = true;
    let (mut svc, mut dev, mut store, mut sink) = start(cfg, 0);
    let r = set(&mut svc, &mut dev, &mut store, &mut sink, ParamName::FrequencyMode, ParamValue::Int(2));
    assert!(matches!(r, Err(Rejected::Precondition(_))));
    assert!(dev.requests().is_empty());
    assert_eq!(store.values[&ParamName::FrequencyMode], ParamValue::Int(1));
}

#[test]
fn high_frequency_request_drops_gain_assist() {
    let (mut svc, mut dev, mut store, mut sink) = start(manual_config(), 0);
    set(&mut svc, &mut dev, &mut store, &mut sink, ParamName::FrequencyMode, ParamValue::Int(2)).unwrap();
    let out = set(&mut svc, &mut dev, &mut store, &mut sink, ParamName::GainAssist, ParamValue::Bool(true))
        .unwrap();
    assert!(!dev.requests()[1].flags.gain_assist);
    let SetOutcome::Reconciled(report) = out else {
        panic!("expected a reconciliation");
    };
    assert!(!report.is_accepted());
    assert_eq!(store.values[&ParamName::GainAssist], ParamValue::Bool(false));
}

#[test]
fn timeout_keeps_last_known_good() {
    let (mut svc, mut dev, mut store, mut sink) = start(manual_config(), 0);
    dev.fail_requests = Some(DeviceError::Timeout);
    let r = set(&mut svc, &mut dev, &mut store, &mut sink, ParamName::Range, ParamValue::Double(60.0));
    assert_eq!(r, Err(Rejected::DeviceUnreachable(DeviceError::Timeout)));
    assert_eq!(svc.confirmed_config().range, 20.0);
    assert_eq!(store.values[&ParamName::Range], ParamValue::Double(20.0));
}

#[test]
fn flag_violations_are_reported_not_fatal() {
    let (mut svc, mut dev, mut store, mut sink) = start(manual_config(), 0);
    dev.quirk = Some(|c: &mut DeviceConfig| c.flags.send_gains = false);
    let out = set(&mut svc, &mut dev, &mut store, &mut sink, ParamName::Range, ParamValue::Double(10.0))
        .unwrap();
    let SetOutcome::Reconciled(report) = out else {
        panic!("expected a reconciliation");
    };
    assert_eq!(report.flag_violations.as_slice(), &[FlagViolation::GainsNotSent]);
    assert!(report.is_accepted());
    assert_eq!(svc.confirmed_config().range, 10.0);
}

#[test]
fn wrong_type_for_run_is_refused() {
    let (mut svc, mut dev, mut store, mut sink) = start(manual_config(), 1);
    let r = set(&mut svc, &mut dev, &mut store, &mut sink, ParamName::Run, ParamValue::Int(1));
    assert!(matches!(r, Err(Rejected::Precondition(_))));
    assert_eq!(store.values[&ParamName::Run], ParamValue::Bool(false));
    assert_eq!(dev.resumes(), 0);
}

// ── Run mode ──────────────────────────────────────────────────

#[test]
fn run_request_lists_every_blocker() {
    let mut cfg = manual_config();
    cfg.ping_rate = 5;
    let (mut svc, mut dev, mut store, mut sink) = start(cfg, 0);
    let r = set(&mut svc, &mut dev, &mut store, &mut sink, ParamName::Run, ParamValue::Bool(true));
    let Err(Rejected::NotPermitted(b)) = r else {
        panic!("expected NotPermitted");
    };
    assert!(b.contains(RunBlocker::NoSubscribers));
    assert!(b.contains(RunBlocker::StandbyPingRate));
    assert!(!b.contains(RunBlocker::Overheating));
}

#[test]
fn standby_ping_rate_forces_standby() {
    let (mut svc, mut dev, mut store, mut sink) = start_active();
    set(&mut svc, &mut dev, &mut store, &mut sink, ParamName::PingRate, ParamValue::Int(5)).unwrap();

    assert_eq!(svc.run_state(), RunState::Standby);
    assert_eq!(dev.standbys(), 1);
    assert_eq!(store.values[&ParamName::Run], ParamValue::Bool(false));
    assert!(sink.events.iter().any(|e| matches!(
        e,
        AppEvent::RunStateChanged {
            from: RunState::Active,
            to: RunState::Standby
        }
    )));
}

#[test]
fn overheating_reading_stops_pinging_before_publishing() {
    let (mut svc, mut dev, mut store, mut sink) = start_active();
    svc.on_reading(&reading(35.0), &mut dev, &mut store, &mut sink);

    assert_eq!(svc.run_state(), RunState::Standby);
    assert_eq!(svc.thermal(), ThermalState::Overheating);
    let changed = sink
        .events
        .iter()
        .position(|e| matches!(e, AppEvent::RunStateChanged { .. }))
        .unwrap();
    let ping = sink.events.iter().position(|e| matches!(e, AppEvent::Ping(_))).unwrap();
    assert!(changed < ping);
}

#[test]
fn failed_standby_keeps_active() {
    let (mut svc, mut dev, mut store, mut sink) = start_active();
    dev.fail_standby = Some(DeviceError::Timeout);
    sink.subscribers = 0;
    svc.on_reading(&reading(20.0), &mut dev, &mut store, &mut sink);
    assert_eq!(svc.run_state(), RunState::Active);
    assert_eq!(store.values[&ParamName::Run], ParamValue::Bool(true));
}

#[test]
fn active_reading_publishes_ping_fan_and_scalars() {
    let (mut svc, mut dev, mut store, mut sink) = start_active();
    svc.on_reading(&reading(20.0), &mut dev, &mut store, &mut sink);

    assert_eq!(svc.run_state(), RunState::Active);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Ping(_))), 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Fan(_))), 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Temperature(_))), 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Pressure(_))), 1);
}

#[test]
fn reading_refreshes_mirror_from_ping_header() {
    let (mut svc, mut dev, mut store, mut sink) = start_active();
    let r = Reading {
        range: 18.5,
        gain_percent: 47.0,
        speed_of_sound_used: 1490.0,
        ..reading(20.0)
    };
    svc.on_reading(&r, &mut dev, &mut store, &mut sink);
    assert_eq!(store.values[&ParamName::Range], ParamValue::Double(18.5));
    assert_eq!(store.values[&ParamName::GainPercent], ParamValue::Double(47.0));
    assert_eq!(store.values[&ParamName::SoundSpeed], ParamValue::Double(1490.0));
}

#[test]
fn stray_reading_in_standby_repeats_standby() {
    let (mut svc, mut dev, mut store, mut sink) = start(manual_config(), 1);
    svc.on_reading(&reading(20.0), &mut dev, &mut store, &mut sink);

    assert_eq!(dev.standbys(), 1);
    assert_eq!(svc.run_state(), RunState::Standby);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Ping(_))), 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Temperature(_))), 0);
}

#[test]
fn status_feeds_telemetry_only_in_standby() {
    let (mut svc, _dev, _store, mut sink) = start(manual_config(), 1);
    svc.on_status(&status(22.0), &mut sink);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Status(_))), 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Temperature(_))), 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Pressure(_))), 1);

    let (mut svc, _dev, _store, mut sink) = start_active();
    svc.on_status(&status(22.0), &mut sink);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Status(_))), 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Temperature(_))), 0);
}

#[test]
fn keepalive_resumes_when_conditions_hold() {
    let (mut dev, mut store, mut sink, _) = rig(manual_config(), 0);
    store.host_write(ParamName::Run, ParamValue::Bool(true));
    let mut svc = SonarService::start(NodeConfig::default(), &mut dev, &mut store, &mut sink).unwrap();
    dev.clear();

    svc.on_keepalive(&mut dev, &mut store, &mut sink);
    assert_eq!(svc.run_state(), RunState::Standby);
    assert_eq!(dev.resumes(), 0);

    sink.subscribers = 1;
    svc.on_keepalive(&mut dev, &mut store, &mut sink);
    assert_eq!(svc.run_state(), RunState::Active);
    assert_eq!(dev.resumes(), 1);
    assert_eq!(store.values[&ParamName::Run], ParamValue::Bool(true));
}

#[test]
fn keepalive_without_run_request_stays_standby() {
    let (mut svc, mut dev, mut store, mut sink) = start(manual_config(), 1);
    svc.on_keepalive(&mut dev, &mut store, &mut sink);
    assert_eq!(svc.run_state(), RunState::Standby);
    assert_eq!(dev.resumes(), 0);
}

#[test]
fn explicit_standby_survives_keepalive() {
    let (mut svc, mut dev, mut store, mut sink) = start_active();
    set(&mut svc, &mut dev, &mut store, &mut sink, ParamName::Run, ParamValue::Bool(false)).unwrap();
    assert_eq!(svc.run_state(), RunState::Standby);

    svc.on_status(&status(20.0), &mut sink);
    svc.on_keepalive(&mut dev, &mut store, &mut sink);
    svc.on_keepalive(&mut dev, &mut store, &mut sink);

    assert_eq!(svc.run_state(), RunState::Standby);
    assert_eq!(dev.resumes(), 0);
    assert_eq!(store.values[&ParamName::Run], ParamValue::Bool(false));
}

#[test]
fn refused_run_request_resumes_once_subscribed() {
    let (mut svc, mut dev, mut store, mut sink) = start(manual_config(), 0);
    let r = set(&mut svc, &mut dev, &mut store, &mut sink, ParamName::Run, ParamValue::Bool(true));
    assert!(matches!(r, Err(Rejected::NotPermitted(_))));
    assert_eq!(store.values[&ParamName::Run], ParamValue::Bool(false));

    sink.subscribers = 1;
    svc.on_keepalive(&mut dev, &mut store, &mut sink);
    assert_eq!(svc.run_state(), RunState::Active);
    assert_eq!(store.values[&ParamName::Run], ParamValue::Bool(true));
}

#[test]
fn hot_status_blocks_keepalive_resume() {
    let (mut svc, mut dev, mut store, mut sink) = start_active();
    svc.on_reading(&reading(36.0), &mut dev, &mut store, &mut sink);
    assert_eq!(svc.run_state(), RunState::Standby);

    svc.on_status(&status(36.0), &mut sink);
    svc.on_keepalive(&mut dev, &mut store, &mut sink);
    assert_eq!(svc.run_state(), RunState::Standby);

    svc.on_status(&status(25.0), &mut sink);
    svc.on_keepalive(&mut dev, &mut store, &mut sink);
    assert_eq!(svc.run_state(), RunState::Active);
}

#[test]
fn failed_resume_stays_standby() {
    let (mut svc, mut dev, mut store, mut sink) = start(manual_config(), 1);
    dev.fail_resume = Some(DeviceError::Disconnected);
    store.host_write(ParamName::Run, ParamValue::Bool(true));
    let r = svc.set_parameters(
        &[ParamChange::new(ParamName::Run, ParamValue::Bool(true))],
        &mut dev,
        &mut store,
        &mut sink,
    );
    assert_eq!(r, Err(Rejected::DeviceUnreachable(DeviceError::Disconnected)));
    assert_eq!(svc.run_state(), RunState::Standby);
    assert_eq!(store.values[&ParamName::Run], ParamValue::Bool(false));
}
