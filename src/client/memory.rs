use super::{ClientResult, PairPhoneRequest, WaClient};
use crate::error::ClientError;
use crate::events::{QrEvent, QrEventStream};
use crate::store::{Device, Store};
use crate::types::Jid;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// Events a [`MemoryClient`] plays back on each QR subscription once connected.
#[derive(Clone, Debug, Default)]
pub struct QrScript {
    pub events: Vec<QrEvent>,
    /// Keep the channel open after the last event until the subscriber cancels.
    pub hold_open: bool,
}

/// In-process client (for testing or demos; no network).
///
/// Session state comes from the store: after [`load_device`](Self::load_device)
/// a stored device makes the client log in on connect. QR subscriptions replay
/// the configured [`QrScript`].
pub struct MemoryClient {
    store: Store,
    own_id: RwLock<Option<Jid>>,
    connected: watch::Sender<bool>,
    logged_in: AtomicBool,
    script: Mutex<QrScript>,
    connect_failure: Mutex<Option<String>>,
    pair_outcome: Mutex<Result<String, String>>,
    stall_qr_channel: AtomicBool,
    qr_refusals: AtomicUsize,
    last_qr_cancel: Mutex<Option<CancellationToken>>,
    connect_calls: AtomicUsize,
    pair_calls: AtomicUsize,
    qr_calls: AtomicUsize,
}

impl MemoryClient {
    /// Create a client over the given device store. No session is loaded yet.
    pub fn new(store: Store) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            store,
            own_id: RwLock::new(None),
            connected,
            logged_in: AtomicBool::new(false),
            script: Mutex::new(QrScript::default()),
            connect_failure: Mutex::new(None),
            pair_outcome: Mutex::new(Ok("ABCD-EFGH".to_string())),
            stall_qr_channel: AtomicBool::new(false),
            qr_refusals: AtomicUsize::new(0),
            last_qr_cancel: Mutex::new(None),
            connect_calls: AtomicUsize::new(0),
            pair_calls: AtomicUsize::new(0),
            qr_calls: AtomicUsize::new(0),
        }
    }

    /// Pick up the session identity of the first stored device.
    pub async fn load_device(&self) -> crate::Result<()> {
        let device = self.store.get_first_device().await?;
        *self.own_id.write().await = device.and_then(|d| d.id);
        Ok(())
    }

    pub async fn set_qr_script(&self, script: QrScript) {
        *self.script.lock().await = script;
    }

    /// Make every following `connect` fail with `reason` (None clears it).
    pub async fn set_connect_failure(&self, reason: Option<&str>) {
        *self.connect_failure.lock().await = reason.map(str::to_string);
    }

    /// Outcome of following `pair_phone` calls: the code, or a pairing error message.
    pub async fn set_pair_outcome(&self, outcome: Result<&str, &str>) {
        *self.pair_outcome.lock().await = outcome.map(str::to_string).map_err(str::to_string);
    }

    /// Hold following QR subscriptions open without answering until they are cancelled.
    pub fn set_qr_channel_stalled(&self, stalled: bool) {
        self.stall_qr_channel.store(stalled, Ordering::SeqCst);
    }

    /// Refuse the next `count` QR subscriptions as if a session identity were stored.
    pub fn refuse_qr_channels(&self, count: usize) {
        self.qr_refusals.store(count, Ordering::SeqCst);
    }

    /// Cancellation token handed to the most recent QR subscription.
    pub async fn last_qr_cancel(&self) -> Option<CancellationToken> {
        self.last_qr_cancel.lock().await.clone()
    }

    /// Persist `device` and log in as it, as if a QR or phone code had been accepted.
    pub async fn complete_pairing(&self, device: Device) -> crate::Result<()> {
        self.store.save(&device).await?;
        *self.own_id.write().await = device.id.clone();
        self.logged_in.store(self.is_connected(), Ordering::SeqCst);
        Ok(())
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn pair_calls(&self) -> usize {
        self.pair_calls.load(Ordering::SeqCst)
    }

    pub fn qr_calls(&self) -> usize {
        self.qr_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WaClient for MemoryClient {
    async fn connect(&self) -> ClientResult<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.connect_failure.lock().await.clone() {
            return Err(ClientError::Connection(reason));
        }
        let has_session = self.own_id.read().await.is_some();
        self.connected.send_replace(true);
        self.logged_in.store(has_session, Ordering::SeqCst);
        tracing::debug!(has_session, "memory client connected");
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.send_replace(false);
        self.logged_in.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    async fn own_id(&self) -> Option<Jid> {
        self.own_id.read().await.clone()
    }

    async fn forget_session(&self) {
        *self.own_id.write().await = None;
        self.logged_in.store(false, Ordering::SeqCst);
    }

    async fn qr_channel(&self, cancel: CancellationToken) -> ClientResult<QrEventStream> {
        self.qr_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_qr_cancel.lock().await = Some(cancel.clone());
        let refused = self
            .qr_refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused || self.own_id.read().await.is_some() {
            return Err(ClientError::QrStoreContainsId);
        }
        if self.is_connected() {
            return Err(ClientError::Connection(
                "QR channel must be requested before connecting".into(),
            ));
        }
        if self.stall_qr_channel.load(Ordering::SeqCst) {
            cancel.cancelled().await;
            return Err(ClientError::Connection("QR subscription cancelled".into()));
        }
        let script = self.script.lock().await.clone();
        let mut connected = self.connected.subscribe();
        let (tx, rx) = mpsc::channel(script.events.len().max(1));
        tokio::spawn(async move {
            let ready = async { connected.wait_for(|c| *c).await.is_ok() };
            tokio::select! {
                _ = cancel.cancelled() => return,
                ok = ready => if !ok { return },
            }
            for evt in script.events {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    sent = tx.send(evt) => if sent.is_err() { return },
                }
            }
            if script.hold_open {
                cancel.cancelled().await;
            }
        });
        let events = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|evt| (evt, rx))
        });
        Ok(events.boxed())
    }

    async fn pair_phone(&self, request: PairPhoneRequest<'_>) -> ClientResult<String> {
        self.pair_calls.fetch_add(1, Ordering::SeqCst);
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        tracing::debug!(
            phone = request.phone,
            client = request.client_display_name,
            "pair phone requested"
        );
        self.pair_outcome
            .lock()
            .await
            .clone()
            .map_err(ClientError::Pairing)
    }

    async fn logout(&self) -> ClientResult<()> {
        let Some(jid) = self.own_id.read().await.clone() else {
            return Err(ClientError::Logout("not logged in".into()));
        };
        self.store
            .delete(&jid)
            .await
            .map_err(|e| ClientError::Logout(e.to_string()))?;
        *self.own_id.write().await = None;
        self.disconnect().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::QrEventKind;
    use crate::store::{DeviceStore, MemoryStore};
    use std::sync::Arc;
    use std::time::Duration;

    fn paired_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_devices([Device {
            id: Some(Jid::user("628123")),
            ..Default::default()
        }]))
    }

    #[tokio::test]
    async fn connect_without_session_is_not_logged_in() {
        let client = MemoryClient::new(Arc::new(MemoryStore::new()));
        client.load_device().await.unwrap();
        client.connect().await.unwrap();
        assert!(client.is_connected());
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn connect_with_stored_session_logs_in() {
        let client = MemoryClient::new(paired_store());
        client.load_device().await.unwrap();
        client.connect().await.unwrap();
        assert!(client.is_logged_in());
        client.disconnect().await;
        assert!(!client.is_connected());
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn qr_channel_refused_when_session_exists() {
        let client = MemoryClient::new(paired_store());
        client.load_device().await.unwrap();
        let res = client.qr_channel(CancellationToken::new()).await;
        assert!(matches!(res, Err(ClientError::QrStoreContainsId)));
        client.forget_session().await;
        assert!(client.qr_channel(CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn qr_events_start_after_connect() {
        let client = MemoryClient::new(Arc::new(MemoryStore::new()));
        client
            .set_qr_script(QrScript {
                events: vec![
                    QrEvent::code("2@abc", Duration::from_secs(60)),
                    QrEvent::other(QrEventKind::Timeout),
                ],
                hold_open: false,
            })
            .await;
        let events = client.qr_channel(CancellationToken::new()).await.unwrap();
        client.connect().await.unwrap();
        let kinds: Vec<_> = events.map(|e| e.kind).collect().await;
        assert_eq!(kinds, vec![QrEventKind::Code, QrEventKind::Timeout]);
    }

    #[tokio::test]
    async fn refused_qr_channels_run_out() {
        let client = MemoryClient::new(Arc::new(MemoryStore::new()));
        client.refuse_qr_channels(1);
        let res = client.qr_channel(CancellationToken::new()).await;
        assert!(matches!(res, Err(ClientError::QrStoreContainsId)));
        assert!(client.qr_channel(CancellationToken::new()).await.is_ok());
        assert_eq!(client.qr_calls(), 2);
    }

    #[tokio::test]
    async fn stalled_qr_channel_answers_on_cancel() {
        let client = Arc::new(MemoryClient::new(Arc::new(MemoryStore::new())));
        client.set_qr_channel_stalled(true);
        let cancel = CancellationToken::new();
        let pending = tokio::spawn({
            let client = client.clone();
            let cancel = cancel.clone();
            async move { client.qr_channel(cancel).await.map(|_| ()) }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());
        cancel.cancel();
        assert!(matches!(
            pending.await.unwrap(),
            Err(ClientError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn pair_phone_requires_connection() {
        let client = MemoryClient::new(Arc::new(MemoryStore::new()));
        let req = PairPhoneRequest {
            phone: "6281234567890",
            show_push_notification: true,
            client_type: Default::default(),
            client_display_name: "Chrome (Linux)",
        };
        let res = client.pair_phone(req.clone()).await;
        assert!(matches!(res, Err(ClientError::NotConnected)));
        client.connect().await.unwrap();
        assert_eq!(client.pair_phone(req).await.unwrap(), "ABCD-EFGH");
        assert_eq!(client.pair_calls(), 2);
    }

    #[tokio::test]
    async fn logout_deletes_stored_device() {
        let store = paired_store();
        let client = MemoryClient::new(store.clone());
        client.load_device().await.unwrap();
        client.connect().await.unwrap();
        client.logout().await.unwrap();
        assert!(client.own_id().await.is_none());
        assert!(!client.is_connected());
        assert!(store.get_all_devices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn complete_pairing_persists_device() {
        let store = Arc::new(MemoryStore::new());
        let client = MemoryClient::new(store.clone());
        client.connect().await.unwrap();
        client
            .complete_pairing(Device {
                id: Some(Jid::user("628999")),
                push_name: Some("Kasir".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(client.is_logged_in());
        assert_eq!(client.own_id().await, Some(Jid::user("628999")));
        assert_eq!(store.get_all_devices().await.unwrap().len(), 1);
    }
}
