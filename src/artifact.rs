//! QR artifacts: pairing payloads rendered to PNG files with a limited lifetime.

use crate::error::ArtifactError;
use image::{imageops, GrayImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

/// Side of the rendered square image, in pixels.
pub const QR_IMAGE_SIZE: u32 = 512;

/// File name prefix of QR images from the standard login.
pub const STANDARD_PREFIX: &str = "scan-qr";
/// File name prefix of QR images from the fresh login.
pub const FRESH_PREFIX: &str = "scan-qr-fresh";

/// Writes QR images as `<dir>/<prefix>-<uuid>.png`.
#[derive(Clone, Debug)]
pub struct QrArtifactWriter {
    dir: PathBuf,
    prefix: String,
}

impl QrArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Fresh path for the next artifact. The random suffix keeps concurrent
    /// logins from sharing a file.
    pub fn next_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}-{}.png", self.prefix, Uuid::new_v4()))
    }

    /// Render `payload` and return the path of the new image.
    pub async fn write(&self, payload: &str) -> Result<PathBuf, ArtifactError> {
        let path = self.next_path();
        let dir = self.dir.clone();
        let target = path.clone();
        let payload = payload.to_owned();
        tokio::task::spawn_blocking(move || -> Result<(), ArtifactError> {
            std::fs::create_dir_all(&dir)?;
            render_png(&payload, &target)
        })
        .await
        .map_err(|e| ArtifactError::Task(e.to_string()))??;
        Ok(path)
    }

    /// Delete `path` once `after` has elapsed. Failures are only logged.
    pub fn schedule_removal(path: PathBuf, after: Duration) -> JoinHandle<()> {
        debug!(path = %path.display(), after_secs = after.as_secs(), "scheduled QR cleanup");
        tokio::spawn(
            async move {
                tokio::time::sleep(after).await;
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => debug!(path = %path.display(), "QR artifact removed"),
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        debug!(path = %path.display(), "QR artifact already gone")
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to remove QR artifact")
                    }
                }
            }
            .in_current_span(),
        )
    }

    /// Remove leftover `<dir>/<prefix>*.png` files. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let pattern = format!(
            "{}/{}*.png",
            glob::Pattern::escape(&self.dir.to_string_lossy()),
            glob::Pattern::escape(&self.prefix)
        );
        let swept = tokio::task::spawn_blocking(move || {
            let Ok(paths) = glob::glob(&pattern) else {
                return 0;
            };
            let mut removed = 0;
            for path in paths.flatten() {
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to remove stale QR artifact")
                    }
                }
            }
            removed
        })
        .await;
        swept.unwrap_or_default()
    }
}

/// Encode `payload` with medium error correction into a centered
/// [`QR_IMAGE_SIZE`] square PNG at `path`.
pub fn render_png(payload: &str, path: &Path) -> Result<(), ArtifactError> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)?;
    let modules = code
        .render::<Luma<u8>>()
        .max_dimensions(QR_IMAGE_SIZE, QR_IMAGE_SIZE)
        .build();
    let mut canvas = GrayImage::from_pixel(QR_IMAGE_SIZE, QR_IMAGE_SIZE, Luma([255]));
    let x = QR_IMAGE_SIZE.saturating_sub(modules.width()) / 2;
    let y = QR_IMAGE_SIZE.saturating_sub(modules.height()) / 2;
    imageops::overlay(&mut canvas, &modules, i64::from(x), i64::from(y));
    canvas.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
