use super::AppService;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Kept when emptying the send-items directory.
const PLACEHOLDER: &str = ".gitignore";

impl AppService {
    /// Remove local history exports, QR images and staged uploads, then log the
    /// client out. The first filesystem error aborts; nothing is restored.
    pub async fn logout(&self) -> Result<()> {
        self.stop_qr_listener().await;
        let groups = [
            (self.config.storage_dir.clone(), "history-*", None),
            (self.config.qr_dir.clone(), "scan-*", None),
            (self.config.send_items_dir.clone(), "*", Some(PLACEHOLDER)),
        ];
        let removed = tokio::task::spawn_blocking(move || -> Result<usize> {
            let mut removed = 0;
            for (dir, pattern, keep) in &groups {
                removed += remove_matching(dir, pattern, *keep)?;
            }
            Ok(removed)
        })
        .await
        .map_err(anyhow::Error::from)??;
        debug!(removed, "local session files removed");

        self.client()?.logout().await?;
        info!("logged out");
        Ok(())
    }
}

/// Remove entries of `dir` matching `pattern`, except one named exactly `keep`.
fn remove_matching(dir: &Path, pattern: &str, keep: Option<&str>) -> Result<usize> {
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        pattern
    );
    let mut removed = 0;
    for entry in glob::glob(&full)? {
        let path: PathBuf = entry.map_err(|e| Error::Io(e.into_error()))?;
        if keep.is_some() && path.file_name().and_then(|n| n.to_str()) == keep {
            continue;
        }
        if path.is_dir() {
            std::fs::remove_dir(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        removed += 1;
    }
    Ok(removed)
}
