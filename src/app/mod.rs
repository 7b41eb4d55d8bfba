//! Login, logout and device use-cases on top of a [`WaClient`](crate::client::WaClient).

mod devices;
mod listener;
mod login;
mod logout;
mod pair_code;

pub use login::{LoginOptions, ResetMode};

use crate::client::SharedClient;
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::store::Store;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Application service: orchestrates the client, the device store and local files.
pub struct AppService {
    client: Option<SharedClient>,
    store: Store,
    config: AppConfig,
    /// Listener of the last QR login that handed off an image.
    qr_listener: Mutex<Option<CancellationToken>>,
}

impl AppService {
    /// `client` may be absent until the WhatsApp client has been initialized;
    /// every call needing it then fails with [`Error::ClientUnavailable`].
    pub fn new(client: Option<SharedClient>, store: Store, config: AppConfig) -> Self {
        Self {
            client,
            store,
            config,
            qr_listener: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn client(&self) -> Result<&SharedClient> {
        self.client.as_ref().ok_or(Error::ClientUnavailable)
    }

    /// Stop the pairing stream listener left running by a previous login.
    async fn stop_qr_listener(&self) {
        if let Some(cancel) = self.qr_listener.lock().await.take() {
            debug!("stopping previous QR listener");
            cancel.cancel();
        }
    }

    /// Drop the current connection and connect again. No retry.
    pub async fn reconnect(&self) -> Result<()> {
        let client = self.client()?;
        client.disconnect().await;
        client.connect().await?;
        info!("reconnected to WhatsApp");
        Ok(())
    }
}
