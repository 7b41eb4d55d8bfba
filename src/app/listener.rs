//! Background consumer of the QR pairing stream.

use crate::artifact::QrArtifactWriter;
use crate::error::{ArtifactError, Error, Result};
use crate::events::{QrEventKind, QrEventStream};
use futures::{FutureExt, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

/// Artifact handed from the listener to the waiting login call.
#[derive(Debug)]
pub(super) struct Handoff {
    pub path: PathBuf,
    pub code: String,
    pub duration: Duration,
}

type HandoffSender = oneshot::Sender<Result<Handoff>>;

pub(super) struct QrListener {
    pub writer: QrArtifactWriter,
    /// Resolve the login with the write error instead of waiting for the next code.
    pub fail_on_write_error: bool,
    pub cancel: CancellationToken,
}

impl QrListener {
    /// Consume `events` on a new task. The receiver yields the first written
    /// artifact, or the reason none will come.
    pub fn spawn(self, events: QrEventStream) -> oneshot::Receiver<Result<Handoff>> {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(
            async move {
                let mut slot = Some(tx);
                let run = AssertUnwindSafe(self.run(events, &mut slot)).catch_unwind();
                if let Err(panic) = run.await {
                    let reason = panic_message(&*panic);
                    error!(panic = %reason, "QR listener panicked");
                    if let Some(tx) = slot.take() {
                        let _ = tx.send(Err(Error::QrChannel(format!(
                            "QR generation panicked: {reason}"
                        ))));
                    }
                }
            }
            .in_current_span(),
        );
        rx
    }

    async fn run(&self, mut events: QrEventStream, slot: &mut Option<HandoffSender>) {
        let started = Instant::now();
        // Reported if no later code makes it to disk.
        let mut write_error: Option<ArtifactError> = None;
        loop {
            let evt = tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("QR listener cancelled");
                    if let (Some(tx), Some(e)) = (slot.take(), write_error.take()) {
                        let _ = tx.send(Err(e.into()));
                    }
                    return;
                }
                evt = events.next() => match evt {
                    Some(evt) => evt,
                    None => break,
                },
            };
            let duration = validity_window(evt.timeout);
            debug!(
                event = evt.kind.as_str(),
                duration_secs = duration.as_secs(),
                "received QR event"
            );
            match evt.kind {
                QrEventKind::Code => {}
                QrEventKind::Success => {
                    info!("QR pairing succeeded");
                    continue;
                }
                other => {
                    warn!(event = %other, "unexpected QR event");
                    continue;
                }
            }
            // Only the first code becomes an artifact; later refreshes are drained.
            let Some(tx) = slot.take() else {
                debug!("QR code refreshed after handoff");
                continue;
            };
            let write_started = Instant::now();
            match self.writer.write(&evt.code).await {
                Ok(path) => {
                    QrArtifactWriter::schedule_removal(path.clone(), duration);
                    info!(
                        path = %path.display(),
                        write_ms = write_started.elapsed().as_millis() as u64,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "QR artifact ready"
                    );
                    let _ = tx.send(Ok(Handoff {
                        path,
                        code: evt.code,
                        duration,
                    }));
                }
                Err(e) => {
                    error!(error = %e, "failed to write QR artifact");
                    if self.fail_on_write_error {
                        let _ = tx.send(Err(e.into()));
                    } else {
                        write_error = Some(e);
                        *slot = Some(tx);
                    }
                }
            }
        }
        if let Some(tx) = slot.take() {
            error!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "QR channel closed without generating code"
            );
            let err = match write_error {
                Some(e) => e.into(),
                None => Error::QrChannel("QR channel closed without generating code".into()),
            };
            let _ = tx.send(Err(err));
        }
    }
}

/// Half of the server-side code timeout, whole seconds, never below one second.
pub(super) fn validity_window(timeout: Duration) -> Duration {
    Duration::from_secs((timeout / 2).as_secs().max(1))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
