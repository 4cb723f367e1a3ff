//! Fuzz target: persisted parameter store
//!
//! Feeds arbitrary bytes to `MemoryParamStore::restore`, verifying:
//! - No panics on corrupt or truncated input
//! - Anything that restores survives a snapshot/restore cycle unchanged
//!
//! cargo fuzz run fuzz_param_store

#![no_main]

use libfuzzer_sys::fuzz_target;
use sonarnode::adapters::param_store::MemoryParamStore;
use sonarnode::app::ports::ParameterStore;
use sonarnode::params::ParamName;

fuzz_target!(|data: &[u8]| {
    let Ok(store) = MemoryParamStore::restore(data) else {
        return;
    };

    let bytes = store.snapshot().expect("restored store must snapshot");
    let again = MemoryParamStore::restore(&bytes).expect("snapshot must restore");

    assert_eq!(store.len(), again.len());
    for name in ParamName::ALL {
        let (a, b) = (store.get(name), again.get(name));
        // NaN doubles are preserved bit-for-bit but never compare equal.
        assert_eq!(format!("{a:?}"), format!("{b:?}"), "{name} changed across a cycle");
    }
});
