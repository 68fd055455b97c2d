//! Atomically swappable configuration snapshot.
//!
//! Readers load the current `Arc<Configuration>` without locking; a reload
//! prepares a complete new snapshot and installs it in one store. There is no
//! per-field mutation.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::Configuration;
use crate::errors::ConfigError;
use crate::ports::ConfigProvider;

/// Shared handle to the live configuration. Cloning shares the same cell.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<ArcSwap<Configuration>>,
}

impl SharedConfig {
    /// Wraps an already prepared configuration.
    pub fn new(config: Configuration) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Returns the current snapshot.
    pub fn load(&self) -> Arc<Configuration> {
        self.inner.load_full()
    }

    /// Prepares `config` and, if it is valid, installs it as the new
    /// snapshot. On error the previous snapshot stays live.
    pub fn replace(&self, config: Configuration) -> Result<(), ConfigError> {
        let prepared = config.prepare()?;
        self.inner.store(Arc::new(prepared));
        Ok(())
    }
}

impl ConfigProvider for SharedConfig {
    fn current(&self) -> Result<Arc<Configuration>, ConfigError> {
        Ok(self.load())
    }
}
