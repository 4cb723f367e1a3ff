//! Parameter store adapter.
//!
//! Implements [`ParameterStore`] with an in-memory map.  The map can be
//! snapshotted with postcard and, when opened from a path, flushed to a file
//! so the `run` flag and operator settings survive a restart.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::ParameterStore;
use crate::error::ConfigError;
use crate::params::{ParamName, ParamValue};

#[derive(Debug, Default)]
pub struct MemoryParamStore {
    values: BTreeMap<ParamName, ParamValue>,
    path: Option<PathBuf>,
    dirty: bool,
}

impl MemoryParamStore {
    /// Empty, not backed by a file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a file-backed store.  A missing file yields an empty store; a
    /// corrupted one is refused rather than silently discarded.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let mut store = match std::fs::read(&path) {
            Ok(bytes) => {
                let store = Self::restore(&bytes)?;
                info!(
                    "MemoryParamStore: loaded {} values from {}",
                    store.values.len(),
                    path.display()
                );
                store
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("MemoryParamStore: {} not found, starting empty", path.display());
                Self::new()
            }
            Err(_) => return Err(ConfigError::IoError),
        };
        store.path = Some(path);
        Ok(store)
    }

    /// Serialise every stored value.
    pub fn snapshot(&self) -> Result<Vec<u8>, ConfigError> {
        postcard::to_allocvec(&self.values).map_err(|_| ConfigError::IoError)
    }

    /// Rebuild a store from [`snapshot`](Self::snapshot) bytes.
    pub fn restore(bytes: &[u8]) -> Result<Self, ConfigError> {
        let values: BTreeMap<ParamName, ParamValue> =
            postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
        Ok(Self {
            values,
            path: None,
            dirty: false,
        })
    }

    /// Write to the backing file if anything changed.  No-op for a store
    /// without a path.
    pub fn flush(&mut self) -> Result<(), ConfigError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        let bytes = self.snapshot()?;
        write_atomic(path, &bytes)?;
        self.dirty = false;
        info!("MemoryParamStore: {} bytes flushed to {}", bytes.len(), path.display());
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Write through a temporary file so a crash never leaves a torn snapshot.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ConfigError> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).map_err(|e| {
        warn!("MemoryParamStore: write {} failed: {e}", tmp.display());
        ConfigError::IoError
    })?;
    std::fs::rename(&tmp, path).map_err(|e| {
        warn!("MemoryParamStore: rename to {} failed: {e}", path.display());
        ConfigError::IoError
    })
}

impl ParameterStore for MemoryParamStore {
    fn get(&self, name: ParamName) -> Option<ParamValue> {
        self.values.get(&name).copied()
    }

    fn set(&mut self, name: ParamName, value: ParamValue) {
        if self.values.insert(name, value) != Some(value) {
            self.dirty = true;
        }
    }
}
