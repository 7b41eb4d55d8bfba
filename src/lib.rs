//! # whatsapp-app
//!
//! Use-case layer for a WhatsApp web multidevice client.
//!
//! ## Features
//!
//! - QR login: the pairing stream is turned into a PNG on disk that expires
//!   with the code
//! - Fresh and force-clear QR login variants with bounded waits
//! - Login with an 8-character pairing code
//! - Logout with local cleanup of history exports, QR images and staged uploads
//! - Reconnect
//! - Paired device listing
//!
//! The protocol client is consumed through [`WaClient`]; [`MemoryClient`]
//! is an in-process implementation for tests and demos.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use whatsapp_app::{AppConfig, AppService, MemoryClient, store::MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let client = Arc::new(MemoryClient::new(store.clone()));
//!     let service = AppService::new(Some(client), store, AppConfig::load(None)?);
//!     let qr = service.login().await?;
//!     println!("scan {} within {:?}", qr.image_path.display(), qr.duration);
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod artifact;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod store;
pub mod types;
pub mod validation;

pub use app::{AppService, LoginOptions, ResetMode};
pub use artifact::QrArtifactWriter;
pub use client::{MemoryClient, PairClientType, PairPhoneRequest, QrScript, SharedClient, WaClient};
pub use config::AppConfig;
pub use error::{ArtifactError, ClientError, Error, Result, StoreError};
pub use events::{QrEvent, QrEventKind, QrEventStream};
pub use store::{Device, DeviceStore, Store};
pub use types::{DeviceInfo, Jid, LoginResponse};
