//! QR login: bridges the client's pairing stream to a single image path.

use super::listener::QrListener;
use super::AppService;
use crate::artifact::{QrArtifactWriter, FRESH_PREFIX, STANDARD_PREFIX};
use crate::client::SharedClient;
use crate::config::AppConfig;
use crate::error::{ClientError, Error, Result};
use crate::events::QrEventStream;
use crate::types::LoginResponse;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// How the existing session is treated before a new QR channel is requested.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResetMode {
    /// Leave the connection as it is.
    None,
    /// Disconnect; a stored session is kept and reported as such.
    #[default]
    DisconnectOnly,
    /// Disconnect, delete stale QR images and drop the session identity so a
    /// new QR code is issued even when a session is stored.
    ForceClear,
}

/// Knobs for [`AppService::login_with`].
#[derive(Clone, Debug)]
pub struct LoginOptions {
    pub reset: ResetMode,
    /// File name prefix of the QR image.
    pub artifact_prefix: String,
    /// Delete leftover QR images in the background before subscribing.
    pub sweep_stale_artifacts: bool,
    /// Report an image write failure to the caller instead of waiting for the next code.
    pub fail_on_write_error: bool,
    /// Deadline for the client to open the QR channel.
    pub subscribe_timeout: Duration,
    /// Deadline for the first QR image once connected.
    pub wait_timeout: Duration,
}

impl LoginOptions {
    /// Plain login: disconnect, then wait for the first code.
    pub fn standard(config: &AppConfig) -> Self {
        Self {
            reset: ResetMode::DisconnectOnly,
            artifact_prefix: STANDARD_PREFIX.to_string(),
            sweep_stale_artifacts: false,
            fail_on_write_error: false,
            subscribe_timeout: config.qr_subscribe_timeout(),
            wait_timeout: config.qr_wait_timeout(),
        }
    }

    /// Fresh login: also clears old QR images and fails fast on write errors.
    pub fn fresh(config: &AppConfig) -> Self {
        Self {
            artifact_prefix: FRESH_PREFIX.to_string(),
            sweep_stale_artifacts: true,
            fail_on_write_error: true,
            ..Self::standard(config)
        }
    }
}

impl AppService {
    /// Start a QR login and return the image to show once the first code arrives.
    ///
    /// The pairing stream keeps being consumed in the background until the
    /// client closes it, or until the next login or [`logout`](Self::logout).
    pub async fn login(&self) -> Result<LoginResponse> {
        self.login_with(LoginOptions::standard(&self.config)).await
    }

    /// Like [`login`](Self::login) but starts from a clean QR directory.
    pub async fn login_fresh(&self) -> Result<LoginResponse> {
        self.login_with(LoginOptions::fresh(&self.config)).await
    }

    pub async fn login_with(&self, options: LoginOptions) -> Result<LoginResponse> {
        let client = self.client()?.clone();
        let request_id = Uuid::new_v4().simple().to_string();
        let span = info_span!("qr_login", request_id = &request_id[..8], reset = ?options.reset);
        self.run_login(client, options).instrument(span).await
    }

    async fn run_login(&self, client: SharedClient, options: LoginOptions) -> Result<LoginResponse> {
        let started = Instant::now();
        info!("starting QR login");
        self.stop_qr_listener().await;
        let writer = QrArtifactWriter::new(&self.config.qr_dir, options.artifact_prefix.as_str());
        // Matches both standard and fresh images.
        let stale = QrArtifactWriter::new(&self.config.qr_dir, STANDARD_PREFIX);

        match options.reset {
            ResetMode::None => {}
            ResetMode::DisconnectOnly => client.disconnect().await,
            ResetMode::ForceClear => {
                client.disconnect().await;
                let removed = stale.sweep().await;
                debug!(removed, "cleared stale QR images");
            }
        }
        let sweep = options
            .sweep_stale_artifacts
            .then(|| tokio::spawn(async move { stale.sweep().await }.in_current_span()));
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "reset done");

        let cancel = CancellationToken::new();
        let events = self.subscribe(&client, &options, &cancel).await?;

        // The sweep must not catch the image this call is about to write.
        if let Some(sweep) = sweep {
            let removed = sweep.await.unwrap_or_default();
            debug!(removed, "cleared stale QR images");
        }

        let mut handoff = QrListener {
            writer,
            fail_on_write_error: options.fail_on_write_error,
            cancel: cancel.clone(),
        }
        .spawn(events);

        let connect_started = Instant::now();
        if let Err(e) = client.connect().await {
            cancel.cancel();
            error!(error = %e, "failed to connect for QR login");
            return Err(Error::Reconnect(e));
        }
        debug!(
            elapsed_ms = connect_started.elapsed().as_millis() as u64,
            "connected, waiting for QR code"
        );

        let outcome = tokio::time::timeout(options.wait_timeout, &mut handoff).await;
        let handoff = match outcome {
            Ok(Ok(Ok(handoff))) => handoff,
            Ok(Ok(Err(e))) => {
                cancel.cancel();
                error!(error = %e, "QR login failed");
                return Err(e);
            }
            Ok(Err(_)) => {
                cancel.cancel();
                return Err(Error::QrChannel("QR listener stopped without a result".into()));
            }
            Err(_) => {
                cancel.cancel();
                // A cancelled listener still reports a failed image write.
                if let Ok(Err(e)) = handoff.await {
                    error!(error = %e, "QR login failed");
                    return Err(e);
                }
                error!(
                    timeout_secs = options.wait_timeout.as_secs(),
                    "timed out waiting for QR code"
                );
                return Err(Error::QrChannel(format!(
                    "no QR code within {}s",
                    options.wait_timeout.as_secs()
                )));
            }
        };
        if let Some(previous) = self.qr_listener.lock().await.replace(cancel) {
            previous.cancel();
        }
        info!(
            path = %handoff.path.display(),
            total_ms = started.elapsed().as_millis() as u64,
            "QR login ready"
        );
        Ok(LoginResponse {
            image_path: handoff.path,
            code: handoff.code,
            duration: handoff.duration,
        })
    }

    /// Open the QR channel, classifying an already stored session.
    async fn subscribe(
        &self,
        client: &SharedClient,
        options: &LoginOptions,
        cancel: &CancellationToken,
    ) -> Result<QrEventStream> {
        let mut forgot_session = false;
        loop {
            let started = Instant::now();
            let attempt =
                tokio::time::timeout(options.subscribe_timeout, client.qr_channel(cancel.clone()))
                    .await;
            match attempt {
                Ok(Ok(events)) => {
                    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "QR channel open");
                    return Ok(events);
                }
                Ok(Err(ClientError::QrStoreContainsId))
                    if options.reset == ResetMode::ForceClear && !forgot_session =>
                {
                    info!("session identity stored, dropping it for a fresh QR code");
                    client.forget_session().await;
                    forgot_session = true;
                }
                Ok(Err(ClientError::QrStoreContainsId)) if options.reset != ResetMode::ForceClear => {
                    return Err(stored_session_state(client).await);
                }
                Ok(Err(e)) => {
                    error!(error = %e, "failed to open QR channel");
                    return Err(Error::QrChannel(e.to_string()));
                }
                Err(_) => {
                    cancel.cancel();
                    warn!(
                        timeout_secs = options.subscribe_timeout.as_secs(),
                        "QR channel not ready in time"
                    );
                    return Err(Error::QrChannel(format!(
                        "QR channel not ready within {}s",
                        options.subscribe_timeout.as_secs()
                    )));
                }
            }
        }
    }
}

/// A session is stored: connect and tell whether it is usable.
async fn stored_session_state(client: &SharedClient) -> Error {
    if let Err(e) = client.connect().await {
        debug!(error = %e, "connect with stored session failed");
    }
    if client.is_logged_in() {
        info!("already logged in");
        Error::AlreadyLoggedIn
    } else {
        info!("session saved but not logged in");
        Error::SessionSaved
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::client::{MemoryClient, QrScript, WaClient};
    use crate::events::{QrEvent, QrEventKind};
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn one_code() -> QrScript {
        QrScript {
            events: vec![QrEvent::code("2@pairing-ref,noise,identity,adv", Duration::from_secs(60))],
            hold_open: true,
        }
    }

    fn qr_files(fx: &Fixture) -> usize {
        std::fs::read_dir(&fx.service.config().qr_dir)
            .map(|d| d.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn login_returns_existing_artifact() {
        let fx = fixture(vec![]).await;
        fx.client.set_qr_script(one_code()).await;
        let res = fx.service.login().await.unwrap();
        assert!(res.image_path.exists());
        assert!(res.image_path.starts_with(&fx.service.config().qr_dir));
        assert!(res
            .image_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("scan-qr-"));
        assert_eq!(res.code, "2@pairing-ref,noise,identity,adv");
        assert_eq!(res.duration, Duration::from_secs(30));
        assert!(fx.client.is_connected());
        assert!(!fx.client.is_logged_in());
    }

    #[tokio::test]
    async fn artifact_removed_after_validity_window() {
        let fx = fixture(vec![]).await;
        fx.client
            .set_qr_script(QrScript {
                events: vec![QrEvent::code("2@short", Duration::from_secs(2))],
                hold_open: true,
            })
            .await;
        let res = fx.service.login().await.unwrap();
        assert_eq!(res.duration, Duration::from_secs(1));
        assert!(res.image_path.exists());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(res.image_path.exists());
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(!res.image_path.exists());
    }

    #[tokio::test]
    async fn login_when_logged_in_reports_already_logged_in() {
        let fx = fixture(vec![paired_device("628111")]).await;
        fx.client.set_qr_script(one_code()).await;
        let err = fx.service.login().await.unwrap_err();
        assert!(matches!(err, Error::AlreadyLoggedIn));
        assert_eq!(qr_files(&fx), 0);
    }

    #[tokio::test]
    async fn stored_session_that_cannot_connect_is_session_saved() {
        let fx = fixture(vec![paired_device("628111")]).await;
        fx.client.set_connect_failure(Some("stream error")).await;
        let err = fx.service.login().await.unwrap_err();
        assert!(matches!(err, Error::SessionSaved));
        assert_eq!(fx.client.connect_calls(), 1);
        assert_eq!(qr_files(&fx), 0);
    }

    #[tokio::test]
    async fn connect_failure_is_reconnect_error() {
        let fx = fixture(vec![]).await;
        fx.client.set_qr_script(one_code()).await;
        fx.client.set_connect_failure(Some("dial tcp: timeout")).await;
        let err = fx.service.login().await.unwrap_err();
        assert!(matches!(err, Error::Reconnect(_)));
    }

    #[tokio::test]
    async fn subscription_error_is_qr_channel_error() {
        let fx = fixture(vec![]).await;
        fx.client.connect().await.unwrap();
        // without a reset the client is still connected and refuses a channel
        let options = LoginOptions {
            reset: ResetMode::None,
            ..LoginOptions::standard(fx.service.config())
        };
        let err = fx.service.login_with(options).await.unwrap_err();
        assert!(matches!(err, Error::QrChannel(_)));
    }

    #[tokio::test]
    async fn no_code_within_deadline_is_qr_channel_error() {
        let fx = fixture(vec![]).await;
        fx.client
            .set_qr_script(QrScript {
                events: vec![QrEvent::other(QrEventKind::Timeout)],
                hold_open: true,
            })
            .await;
        let options = LoginOptions {
            wait_timeout: Duration::from_millis(200),
            ..LoginOptions::standard(fx.service.config())
        };
        let err = fx.service.login_with(options).await.unwrap_err();
        match err {
            Error::QrChannel(msg) => assert!(msg.contains("no QR code")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn channel_closed_without_code() {
        let fx = fixture(vec![]).await;
        fx.client
            .set_qr_script(QrScript {
                events: vec![QrEvent::other(QrEventKind::ScannedWithoutMultidevice)],
                hold_open: false,
            })
            .await;
        let err = fx.service.login().await.unwrap_err();
        assert!(matches!(err, Error::QrChannel(_)));
    }

    #[tokio::test]
    async fn write_failure_is_reported_at_the_deadline() {
        let fx = fixture(vec![]).await;
        fx.client
            .set_qr_script(QrScript {
                events: vec![QrEvent::code("x".repeat(8000), Duration::from_secs(60))],
                hold_open: true,
            })
            .await;
        let options = LoginOptions {
            wait_timeout: Duration::from_millis(300),
            ..LoginOptions::standard(fx.service.config())
        };
        let err = fx.service.login_with(options).await.unwrap_err();
        assert!(matches!(err, Error::ArtifactWrite(_)), "{err:?}");
        assert_eq!(err.code(), "QR_WRITE_ERROR");
        assert_eq!(qr_files(&fx), 0);
    }

    #[tokio::test]
    async fn subscription_deadline_cancels_without_connecting() {
        let fx = fixture(vec![]).await;
        fx.client.set_qr_channel_stalled(true);
        let options = LoginOptions {
            subscribe_timeout: Duration::from_millis(200),
            ..LoginOptions::standard(fx.service.config())
        };
        let started = Instant::now();
        let err = fx.service.login_with(options).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(1));
        match err {
            Error::QrChannel(msg) => assert!(msg.contains("not ready")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fx.client.connect_calls(), 0);
        assert!(fx.client.last_qr_cancel().await.unwrap().is_cancelled());
    }

    #[tokio::test]
    async fn force_clear_retries_subscription_once() {
        let fx = fixture(vec![]).await;
        fx.client.set_qr_script(one_code()).await;
        fx.client.refuse_qr_channels(2);
        let options = LoginOptions {
            reset: ResetMode::ForceClear,
            ..LoginOptions::fresh(fx.service.config())
        };
        let err = fx.service.login_with(options).await.unwrap_err();
        assert!(matches!(err, Error::QrChannel(_)), "{err:?}");
        assert_eq!(fx.client.qr_calls(), 2);
        assert_eq!(fx.client.connect_calls(), 0);
        assert_eq!(qr_files(&fx), 0);
    }

    #[tokio::test]
    async fn next_login_and_logout_stop_the_listener() {
        let fx = fixture(vec![]).await;
        fx.client.set_qr_script(one_code()).await;
        fx.service.login().await.unwrap();
        let first = fx.client.last_qr_cancel().await.unwrap();
        assert!(!first.is_cancelled());

        fx.service.login().await.unwrap();
        let second = fx.client.last_qr_cancel().await.unwrap();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        // no session is stored, so the client logout itself fails
        assert!(fx.service.logout().await.is_err());
        assert!(second.is_cancelled());
    }

    #[tokio::test]
    async fn fresh_login_sweeps_old_images() {
        let fx = fixture(vec![]).await;
        let qr_dir = fx.service.config().qr_dir.clone();
        std::fs::create_dir_all(&qr_dir).unwrap();
        std::fs::write(qr_dir.join("scan-qr-old.png"), b"stale").unwrap();
        fx.client.set_qr_script(one_code()).await;
        let res = fx.service.login_fresh().await.unwrap();
        assert!(res
            .image_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("scan-qr-fresh-"));
        assert!(!qr_dir.join("scan-qr-old.png").exists());
        assert!(res.image_path.exists());
    }

    #[tokio::test]
    async fn fresh_login_reports_write_failure() {
        let fx = fixture(vec![]).await;
        fx.client
            .set_qr_script(QrScript {
                events: vec![
                    QrEvent::code("x".repeat(8000), Duration::from_secs(60)),
                    QrEvent::code("2@ok", Duration::from_secs(60)),
                ],
                hold_open: true,
            })
            .await;
        let err = fx.service.login_fresh().await.unwrap_err();
        assert!(matches!(err, Error::ArtifactWrite(_)));
        assert_eq!(err.code(), "QR_WRITE_ERROR");
    }

    #[tokio::test]
    async fn force_clear_issues_qr_despite_stored_session() {
        let fx = fixture(vec![paired_device("628111")]).await;
        fx.client.set_qr_script(one_code()).await;
        let options = LoginOptions {
            reset: ResetMode::ForceClear,
            ..LoginOptions::fresh(fx.service.config())
        };
        let res = fx.service.login_with(options).await.unwrap();
        assert!(res.image_path.exists());
        assert!(fx.client.own_id().await.is_none());
    }

    #[tokio::test]
    async fn concurrent_logins_get_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        let mut logins = Vec::new();
        for _ in 0..4 {
            let store = Arc::new(MemoryStore::new());
            let client = Arc::new(MemoryClient::new(store.clone()));
            client.set_qr_script(one_code()).await;
            let service = AppService::new(Some(client), store, config.clone());
            logins.push(tokio::spawn(async move { service.login().await }));
        }
        let mut paths = Vec::new();
        for login in logins {
            paths.push(login.await.unwrap().unwrap().image_path);
        }
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 4);
        assert!(paths.iter().all(|p| p.exists()));
    }

    #[tokio::test]
    async fn login_without_client() {
        let dir = tempfile::tempdir().unwrap();
        let service = AppService::new(None, Arc::new(MemoryStore::new()), config_in(&dir));
        assert!(matches!(service.login().await, Err(Error::ClientUnavailable)));
        assert!(matches!(
            service.login_fresh().await,
            Err(Error::ClientUnavailable)
        ));
    }
}
