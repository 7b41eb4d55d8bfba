//! The WhatsApp client capability consumed by the use-cases.
//!
//! The multidevice protocol itself (Noise handshake, websocket framing, Signal
//! sessions) lives behind [`WaClient`]. [`MemoryClient`] is an in-process
//! implementation backed by a [`DeviceStore`](crate::store::DeviceStore).

mod memory;
mod pair;

pub use memory::{MemoryClient, QrScript};
pub use pair::{PairClientType, PairPhoneRequest};

use crate::error::ClientError;
use crate::events::QrEventStream;
use crate::types::Jid;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result type for client calls.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Operations the use-cases need from a WhatsApp web client.
#[async_trait]
pub trait WaClient: Send + Sync {
    /// Open the websocket. With no stored session this starts QR pairing.
    async fn connect(&self) -> ClientResult<()>;

    /// Close the websocket. No-op when not connected.
    async fn disconnect(&self);

    fn is_connected(&self) -> bool;

    /// Connected and authenticated.
    fn is_logged_in(&self) -> bool;

    /// JID of the stored session, if any.
    async fn own_id(&self) -> Option<Jid>;

    /// Drop the in-memory session identity so a new QR channel can be opened.
    /// Persisted credentials are left alone.
    async fn forget_session(&self);

    /// Subscribe to pairing events. Must be called before [`connect`](Self::connect).
    ///
    /// Fails with [`ClientError::QrStoreContainsId`] when a session identity exists.
    /// The stream stops once `cancel` fires.
    async fn qr_channel(&self, cancel: CancellationToken) -> ClientResult<QrEventStream>;

    /// Request an 8-character linking code for `phone`.
    async fn pair_phone(&self, request: PairPhoneRequest<'_>) -> ClientResult<String>;

    /// Unlink this device and delete its credentials.
    async fn logout(&self) -> ClientResult<()>;
}

/// Shared handle to a client.
pub type SharedClient = Arc<dyn WaClient>;
