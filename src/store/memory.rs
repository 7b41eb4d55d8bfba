use super::{Device, DeviceStore};
use crate::types::Jid;
use crate::{error::StoreError, Result};
use async_trait::async_trait;
use std::sync::RwLock;

/// In-memory device store (for testing or single-run; not persistent).
///
/// Only paired devices (with an id) are kept; devices are returned in the
/// order they were first saved.
pub struct MemoryStore {
    devices: RwLock<Vec<Device>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(Vec::new()),
        }
    }

    /// Store pre-seeded with the given devices.
    pub fn with_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        Self {
            devices: RwLock::new(devices.into_iter().filter(Device::is_logged_in).collect()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn get_first_device(&self) -> Result<Option<Device>> {
        let devices = self
            .devices
            .read()
            .map_err(|e| StoreError::Load(e.to_string()))?;
        Ok(devices.first().cloned())
    }

    async fn get_all_devices(&self) -> Result<Vec<Device>> {
        let devices = self
            .devices
            .read()
            .map_err(|e| StoreError::Load(e.to_string()))?;
        Ok(devices.clone())
    }

    async fn save(&self, device: &Device) -> Result<()> {
        let Some(jid) = device.id.as_ref() else {
            return Err(StoreError::Save("device has no id".into()).into());
        };
        let mut devices = self
            .devices
            .write()
            .map_err(|e| StoreError::Save(e.to_string()))?;
        match devices.iter_mut().find(|d| d.id.as_ref() == Some(jid)) {
            Some(existing) => *existing = device.clone(),
            None => devices.push(device.clone()),
        }
        Ok(())
    }

    async fn delete(&self, jid: &Jid) -> Result<()> {
        self.devices
            .write()
            .map_err(|e| StoreError::Save(e.to_string()))?
            .retain(|d| d.id.as_ref() != Some(jid));
        Ok(())
    }
}
