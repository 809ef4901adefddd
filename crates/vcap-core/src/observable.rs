//! Observable driver parameters.
//!
//! Each user-visible control (picture adjustments, pixel rate, link
//! frequency) is an [`Observable`]: a current value held in a
//! `tokio::sync::watch` channel plus a small block of metadata. Clones share
//! both, so the driver and any number of subscribers see the same value.
//!
//! ```rust,ignore
//! let brightness = Observable::new("brightness", 0x80)
//!     .with_range(0, 255);
//!
//! let mut rx = brightness.subscribe();
//! brightness.set(0x90)?;
//! rx.changed().await?;
//! ```
//!
//! Read-only parameters reject [`Observable::set`]; the owning driver
//! updates them with [`Observable::publish`].

use crate::error::{VcapError, VcapResult};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;

/// Descriptive metadata for a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterMetadata {
    /// Parameter name.
    pub name: String,
    /// Unit label, e.g. `"Hz"`.
    pub units: Option<String>,
    /// Rejects [`Observable::set`] when true.
    pub read_only: bool,
    /// Inclusive lower bound.
    pub min_value: Option<i64>,
    /// Inclusive upper bound.
    pub max_value: Option<i64>,
    /// Value restored by a control reset.
    pub default_value: Option<i64>,
}

/// A shared, integer-valued parameter with change notification.
#[derive(Debug, Clone)]
pub struct Observable {
    sender: watch::Sender<i64>,
    metadata: Arc<RwLock<ParameterMetadata>>,
}

impl Observable {
    /// New writable parameter whose default is `initial`.
    pub fn new(name: impl Into<String>, initial: i64) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender,
            metadata: Arc::new(RwLock::new(ParameterMetadata {
                name: name.into(),
                units: None,
                read_only: false,
                min_value: None,
                max_value: None,
                default_value: Some(initial),
            })),
        }
    }

    /// Attach a unit label.
    pub fn with_units(self, units: impl Into<String>) -> Self {
        self.metadata.write().units = Some(units.into());
        self
    }

    /// Inclusive bounds enforced by [`Observable::set`].
    pub fn with_range(self, min: i64, max: i64) -> Self {
        {
            let mut meta = self.metadata.write();
            meta.min_value = Some(min.min(max));
            meta.max_value = Some(min.max(max));
        }
        self
    }

    /// Mark the parameter read-only.
    pub fn read_only(self) -> Self {
        self.metadata.write().read_only = true;
        self
    }

    /// Current value.
    pub fn get(&self) -> i64 {
        *self.sender.borrow()
    }

    /// Parameter name.
    pub fn name(&self) -> String {
        self.metadata.read().name.clone()
    }

    /// Snapshot of the metadata.
    pub fn metadata(&self) -> ParameterMetadata {
        self.metadata.read().clone()
    }

    /// Check `value` against the read-only flag and the range.
    pub fn validate(&self, value: i64) -> VcapResult<()> {
        let meta = self.metadata.read();
        if meta.read_only {
            return Err(VcapError::ParameterReadOnly(meta.name.clone()));
        }
        if let (Some(min), Some(max)) = (meta.min_value, meta.max_value) {
            if value < min || value > max {
                return Err(VcapError::ParameterOutOfRange {
                    name: meta.name.clone(),
                    value,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }

    /// Validate and store a new value, notifying subscribers.
    pub fn set(&self, value: i64) -> VcapResult<()> {
        self.validate(value)?;
        self.sender.send_replace(value);
        Ok(())
    }

    /// Store a value without validation. Used by the owning driver to update
    /// read-only parameters.
    pub fn publish(&self, value: i64) {
        self.sender.send_replace(value);
    }

    /// Receiver notified on every store.
    pub fn subscribe(&self) -> watch::Receiver<i64> {
        self.sender.subscribe()
    }

    /// Number of live receivers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
