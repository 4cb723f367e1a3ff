//! Fuzz target: candidate configuration builder
//!
//! Starts from an arbitrary confirmed device configuration and applies one
//! arbitrary parameter change, verifying:
//! - No panics under arbitrary inputs
//! - Every candidate sent carries the minimal flag set
//! - Gain assist is never requested outside low-frequency mode
//!
//! cargo fuzz run fuzz_candidate

#![no_main]

use libfuzzer_sys::fuzz_target;
use sonarnode::app::synchronizer::{ConfigSynchronizer, Plan, gain_assist_allowed};
use sonarnode::device::{ConfigFlags, DeviceConfig};
use sonarnode::params::{ParamChange, ParamName, ParamValue};

fn f64_at(data: &[u8], at: usize) -> f64 {
    data.get(at..at + 8)
        .and_then(|s| s.try_into().ok())
        .map(f64::from_le_bytes)
        .unwrap_or(0.0)
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 6 {
        return;
    }

    let confirmed = DeviceConfig {
        frequency_mode: data[0],
        ping_rate: data[1],
        gamma_correction: data[2],
        flags: ConfigFlags::from_byte(data[3]),
        speed_of_sound: if data[4] & 1 == 0 { 0.0 } else { 1480.0 },
        ..DeviceConfig::default()
    };
    let sync = ConfigSynchronizer::new(confirmed);

    let name = ParamName::ALL[usize::from(data[5]) % ParamName::ALL.len()];
    let value = match data.get(6).copied().unwrap_or(0) % 3 {
        0 => ParamValue::Bool(data.get(7).is_some_and(|b| b & 1 == 1)),
        1 => ParamValue::Int(i64::from(data.get(7).copied().unwrap_or(0)) - 8),
        _ => ParamValue::Double(f64_at(data, 7)),
    };

    let Ok(Plan::Send(candidate)) = sync.build_candidate(&ParamChange::new(name, value)) else {
        return;
    };

    let flags = candidate.config.flags.to_byte();
    assert_eq!(flags & 0x0d, 0x0d, "minimal flags missing: 0x{flags:02x}");
    assert_eq!(flags & 0xa2, 0, "forbidden flags set: 0x{flags:02x}");
    if candidate.config.flags.gain_assist {
        assert!(
            gain_assist_allowed(candidate.config.frequency_mode),
            "gain assist requested in mode {}",
            candidate.config.frequency_mode
        );
    }
});
