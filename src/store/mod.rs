//! Device/session store.

mod memory;

pub use memory::MemoryStore;

use crate::types::{DeviceInfo, Jid};
use async_trait::async_trait;
use std::sync::Arc;

/// One linked device as persisted by the client's store.
#[derive(Clone, Debug, Default)]
pub struct Device {
    /// Our JID after pairing (None if not paired).
    pub id: Option<Jid>,
    pub push_name: Option<String>,
    pub business_name: Option<String>,
    pub platform: Option<String>,
}

impl Device {
    pub fn is_logged_in(&self) -> bool {
        self.id.is_some()
    }

    /// Push name when set, business name otherwise.
    pub fn display_name(&self) -> &str {
        match self.push_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => self.business_name.as_deref().unwrap_or_default(),
        }
    }

    pub fn to_info(&self) -> DeviceInfo {
        DeviceInfo {
            device: self.id.as_ref().map(Jid::to_string).unwrap_or_default(),
            name: self.display_name().to_string(),
        }
    }
}

/// Store trait: persist and load device state.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Get the first (or only) device.
    async fn get_first_device(&self) -> crate::Result<Option<Device>>;

    /// Get all paired devices, in pairing order.
    async fn get_all_devices(&self) -> crate::Result<Vec<Device>>;

    /// Save device state (after pairing).
    async fn save(&self, device: &Device) -> crate::Result<()>;

    /// Delete device (logout).
    async fn delete(&self, jid: &Jid) -> crate::Result<()>;
}

/// Alias for boxed store (common usage).
pub type Store = Arc<dyn DeviceStore>;
