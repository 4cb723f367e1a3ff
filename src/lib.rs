//! Sonar node core.
//!
//! Keeps an imaging sonar's configuration in sync with externally visible
//! control parameters, decides when the sonar may ping, and watches its
//! temperature and configuration flags.  The pure-logic modules live under
//! [`app`]; [`adapters`] holds the concrete port implementations used by the
//! binary and the integration tests.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod params;
pub mod safety;
