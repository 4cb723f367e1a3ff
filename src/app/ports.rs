//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SonarService (domain)
//! ```
//!
//! Driven adapters (device transport, parameter storage, publication)
//! implement these traits.  The [`SonarService`](super::service::SonarService)
//! consumes them via generics, so the domain core never touches a socket
//! or a topic directly.

use crate::device::DeviceConfig;
use crate::error::DeviceError;
use crate::params::{ParamName, ParamValue};

// ───────────────────────────────────────────────────────────────
// Device port (driven adapter: domain ↔ sonar)
// ───────────────────────────────────────────────────────────────

/// Request/feedback access to the sonar.
///
/// Push data (status, pings, keepalives) does not come through this trait;
/// the transport delivers it as [`NodeEvent`](crate::events::NodeEvent)s.
pub trait DeviceDriver {
    /// Whether the transport currently holds a link to the device.
    fn is_connected(&self) -> bool;

    /// Ask the device for its present configuration.
    fn current_config(&mut self) -> Result<DeviceConfig, DeviceError>;

    /// Send a configuration and block until the device answers with the
    /// configuration it actually accepted.
    ///
    /// Implementations MUST fail with [`DeviceError::Timeout`] or
    /// [`DeviceError::Disconnected`] rather than block forever.
    fn request_config(&mut self, candidate: &DeviceConfig) -> Result<DeviceConfig, DeviceError>;

    /// Leave standby and resume pinging.
    fn resume(&mut self) -> Result<(), DeviceError>;

    /// Stop pinging; the device keeps sending status and keepalives.
    fn standby(&mut self) -> Result<(), DeviceError>;
}

// ───────────────────────────────────────────────────────────────
// Parameter store port (driven adapter: domain ↔ external parameters)
// ───────────────────────────────────────────────────────────────

/// The externally visible, persisted parameter values.
///
/// The node writes device truth back here after every reconciliation so
/// operators never see a value the device did not accept.
pub trait ParameterStore {
    /// Current stored value, if any.
    fn get(&self, name: ParamName) -> Option<ParamValue>;

    /// Overwrite the stored value.
    fn set(&mut self, name: ParamName, value: ParamValue);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → messaging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (topics, log, test
/// recorder).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);

    /// Number of consumers interested in ping or image output.
    fn subscriber_count(&self) -> usize;
}
