//! Application core: pure domain logic, no I/O of its own.
//!
//! Configuration synchronisation, run/standby supervision and telemetry
//! gating for the sonar.  All interaction with the device, the parameter
//! host and subscribers happens through the **port traits** in [`ports`],
//! keeping this layer fully testable without a sonar.

pub mod dispatcher;
pub mod events;
pub mod ports;
pub mod run_mode;
pub mod service;
pub mod synchronizer;
pub mod telemetry;
