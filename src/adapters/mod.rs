//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements      | Connects to                    |
//! |---------------|-----------------|--------------------------------|
//! | `log_sink`    | EventSink       | `log` output                   |
//! | `param_store` | ParameterStore  | In-memory map, postcard file   |
//! | `sim_sonar`   | DeviceDriver    | Simulated sonar firmware       |

pub mod log_sink;
pub mod param_store;
pub mod sim_sonar;
