use super::AppService;
use crate::error::{Result, StoreError};
use crate::store::Device;
use crate::types::DeviceInfo;

impl AppService {
    /// The first paired device.
    pub async fn first_device(&self) -> Result<DeviceInfo> {
        self.client()?;
        let device = self
            .store
            .get_first_device()
            .await?
            .ok_or(StoreError::IdentityNotFound)?;
        Ok(device.to_info())
    }

    /// All paired devices. On a store error no partial list is returned.
    pub async fn fetch_devices(&self) -> Result<Vec<DeviceInfo>> {
        self.client()?;
        let devices = self.store.get_all_devices().await?;
        Ok(devices.iter().map(Device::to_info).collect())
    }
}
