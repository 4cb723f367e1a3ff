//! End-to-end tests against the simulated sonar.
//!
//! SimSonar + SimFeed produce real event traffic through the queue; the
//! store is the postcard-backed MemoryParamStore used by the binary.

use sonarnode::adapters::param_store::MemoryParamStore;
use sonarnode::adapters::sim_sonar::{SimFeed, SimSonar};
use sonarnode::app::dispatcher::Dispatcher;
use sonarnode::app::ports::ParameterStore;
use sonarnode::app::run_mode::RunState;
use sonarnode::app::service::SonarService;
use sonarnode::config::NodeConfig;
use sonarnode::device::DeviceConfig;
use sonarnode::events::{EventQueue, NodeEvent};
use sonarnode::params::{ParamChange, ParamName, ParamValue};
use sonarnode::safety::ThermalState;

use crate::mock_ports::{RecordingSink, manual_config};

fn node(store: MemoryParamStore) -> (Dispatcher<SimSonar, MemoryParamStore, RecordingSink>, SimFeed) {
    let mut sonar = SimSonar::new(manual_config(), 15.0);
    let mut store = store;
    let mut sink = RecordingSink::new(1);
    let svc = SonarService::start(NodeConfig::default(), &mut sonar, &mut store, &mut sink)
        .expect("service starts");
    let feed = sonar.feed();
    (Dispatcher::new(svc, sonar, store, sink), feed)
}

fn step(d: &mut Dispatcher<SimSonar, MemoryParamStore, RecordingSink>, feed: &SimFeed, queue: &EventQueue) {
    feed.step(queue);
    let _ = d.drain(queue);
}

fn request(d: &mut Dispatcher<SimSonar, MemoryParamStore, RecordingSink>, queue: &EventQueue, name: ParamName, value: ParamValue) {
    queue.push(NodeEvent::set_parameters(&[ParamChange::new(name, value)]));
    let _ = d.drain(queue);
}

#[test]
fn lifted_sonar_stops_and_resumes_after_cooling() {
    let (mut d, feed) = node(MemoryParamStore::new());
    let queue = EventQueue::new();

    request(&mut d, &queue, ParamName::Run, ParamValue::Bool(true));
    assert_eq!(d.service().run_state(), RunState::Active);
    step(&mut d, &feed, &queue);
    assert_eq!(d.service().run_state(), RunState::Active);

    // Out of the water.
    d.device().set_temperature(40.0);
    step(&mut d, &feed, &queue);
    assert_eq!(d.service().run_state(), RunState::Standby);
    assert!(d.device().is_standby());

    // Keepalives while hot do not resume.
    step(&mut d, &feed, &queue);
    assert_eq!(d.service().thermal(), ThermalState::Overheating);
    assert_eq!(d.service().run_state(), RunState::Standby);

    // Back in the water: status refreshes the thermal state, the next
    // keepalive resumes.
    d.device().set_temperature(18.0);
    step(&mut d, &feed, &queue);
    assert_eq!(d.service().thermal(), ThermalState::Nominal);
    assert_eq!(d.service().run_state(), RunState::Active);
    assert_eq!(d.store().get(ParamName::Run), Some(ParamValue::Bool(true)));
}

#[test]
fn firmware_clamp_is_mirrored() {
    let (mut d, _feed) = node(MemoryParamStore::new());
    let queue = EventQueue::new();

    request(&mut d, &queue, ParamName::FrequencyMode, ParamValue::Int(2));
    request(&mut d, &queue, ParamName::Range, ParamValue::Double(100.0));

    assert_eq!(d.service().confirmed_config().range, 40.0);
    assert_eq!(d.store().get(ParamName::Range), Some(ParamValue::Double(40.0)));
}

#[test]
fn persisted_settings_are_replayed_on_restart() {
    let mut first = MemoryParamStore::new();
    first.set(ParamName::GainPercent, ParamValue::Double(65.0));
    first.set(ParamName::Run, ParamValue::Bool(true));
    let bytes = first.snapshot().unwrap();

    let (d, _feed) = node(MemoryParamStore::restore(&bytes).unwrap());
    assert_eq!(d.service().confirmed_config().gain_percent, 65.0);
    assert_eq!(d.service().run_state(), RunState::Active);
    assert!(!d.device().is_standby());
}

#[test]
fn disconnected_sonar_fails_start() {
    let mut sonar = SimSonar::new(DeviceConfig::default(), 15.0);
    sonar.set_connected(false);
    let r = SonarService::start(
        NodeConfig::default(),
        &mut sonar,
        &mut MemoryParamStore::new(),
        &mut RecordingSink::new(1),
    );
    assert!(r.is_err());
}
