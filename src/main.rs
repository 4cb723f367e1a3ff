//! Sonar node: main entry point.
//!
//! Hexagonal architecture with a single event-driven node loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimSonar          LogEventSink     MemoryParamStore           │
//! │  (DeviceDriver)    (EventSink)      (ParameterStore)           │
//! │  SimFeed ──▶ EventQueue                                        │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              SonarService (pure logic)                 │    │
//! │  │  Synchronizer · RunMode · Safety · TelemetryGate       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `sonarnode [config.json] [params.bin]`
#![deny(unused_must_use)]

use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use log::{info, warn};

use sonarnode::adapters::log_sink::LogEventSink;
use sonarnode::adapters::param_store::MemoryParamStore;
use sonarnode::adapters::sim_sonar::SimSonar;
use sonarnode::app::dispatcher::Dispatcher;
use sonarnode::app::ports::DeviceDriver;
use sonarnode::app::service::SonarService;
use sonarnode::config::NodeConfig;
use sonarnode::device::DeviceConfig;
use sonarnode::events::{EventQueue, NodeEvent};
use sonarnode::params::{ParamChange, ParamName, ParamValue};

/// Device and parameter-host events, consumed by the node loop.
static EVENTS: EventQueue = EventQueue::new();

const DEFAULT_CONFIG_PATH: &str = "sonarnode.json";
const DEFAULT_PARAMS_PATH: &str = "sonarnode-params.bin";

/// Simulated device ticks before the node shuts down.
const FEED_TICKS: u32 = 200;
const FEED_PERIOD: Duration = Duration::from_millis(50);

/// Water temperature of the simulated sonar (°C).
const SIM_AMBIENT_C: f64 = 15.0;

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("sonarnode v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Configuration and parameter store ──────────────────
    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_owned());
    let params_path = args.next().unwrap_or_else(|| DEFAULT_PARAMS_PATH.to_owned());

    let config = NodeConfig::load(Path::new(&config_path))
        .with_context(|| format!("loading node config {config_path}"))?;
    let mut store = MemoryParamStore::open(params_path.clone())
        .with_context(|| format!("opening parameter store {params_path}"))?;

    // ── 3. Device link ────────────────────────────────────────
    let mut sonar = SimSonar::new(DeviceConfig::default(), SIM_AMBIENT_C);
    wait_for_link(&sonar, &config)?;

    // ── 4. Service ────────────────────────────────────────────
    let mut sink = LogEventSink::new(1);
    let service = SonarService::start(config, &mut sonar, &mut store, &mut sink)
        .context("starting sonar service")?;

    // ── 5. Device feed ────────────────────────────────────────
    let feed = sonar.feed();
    let producer = thread::Builder::new()
        .name("sonar-feed".to_owned())
        .spawn(move || {
            for _ in 0..FEED_TICKS {
                feed.step(&EVENTS);
                thread::sleep(FEED_PERIOD);
            }
            while !EVENTS.push(NodeEvent::Shutdown) {
                thread::sleep(FEED_PERIOD);
            }
        })
        .context("spawning feed thread")?;

    // Operator asks for pinging once the node is up.
    if !EVENTS.push(NodeEvent::set_parameters(&[ParamChange::new(
        ParamName::Run,
        ParamValue::Bool(true),
    )])) {
        warn!("Initial run request dropped");
    }

    // ── 6. Node loop ──────────────────────────────────────────
    info!("Node ready. Entering event loop.");
    let mut dispatcher = Dispatcher::new(service, sonar, store, sink);
    futures_lite::future::block_on(dispatcher.run(&EVENTS));

    producer
        .join()
        .map_err(|_| anyhow!("feed thread panicked"))?;

    // ── 7. Shutdown ───────────────────────────────────────────
    let handled = dispatcher.handled();
    let (service, _sonar, mut store, sink) = dispatcher.into_parts();
    store.flush().context("flushing parameter store")?;
    info!(
        "Stopped in {} after {} events ({} emitted, {} dropped, thermal {:?})",
        service.run_state(),
        handled,
        sink.emitted(),
        EVENTS.dropped(),
        service.thermal()
    );
    Ok(())
}

/// Poll the device link until it comes up or the attempts run out.
fn wait_for_link(dev: &impl DeviceDriver, config: &NodeConfig) -> Result<()> {
    for attempt in 1..=config.connect_attempts {
        if dev.is_connected() {
            return Ok(());
        }
        info!(
            "Waiting for the sonar to connect ({attempt}/{})",
            config.connect_attempts
        );
        thread::sleep(Duration::from_millis(config.connect_retry_ms));
    }
    bail!(
        "sonar not connected after {} attempts",
        config.connect_attempts
    )
}
