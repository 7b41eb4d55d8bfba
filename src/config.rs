//! Application configuration.
//!
//! Read from a TOML file, then environment variables override individual
//! values. Missing files fall back to defaults.

use crate::error::Error;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Env var naming the config file.
pub const CONFIG_PATH_ENV: &str = "WA_APP_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "whatsapp-app.toml";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Where QR images are written.
    pub qr_dir: PathBuf,
    /// Session storage; `history-*` exports are removed on logout.
    pub storage_dir: PathBuf,
    /// Staging area for outgoing media; emptied on logout.
    pub send_items_dir: PathBuf,
    /// Upper bound on waiting for the first QR code, in seconds.
    pub qr_wait_timeout_secs: u64,
    /// Upper bound on opening the QR channel, in seconds.
    pub qr_subscribe_timeout_secs: u64,
    /// Shown on the phone when linking with a pairing code.
    pub pair_client_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            qr_dir: PathBuf::from("statics/qrcode"),
            storage_dir: PathBuf::from("storages"),
            send_items_dir: PathBuf::from("statics/senditems"),
            qr_wait_timeout_secs: 15,
            qr_subscribe_timeout_secs: 10,
            pair_client_name: "Chrome (Linux)".to_string(),
        }
    }
}

impl AppConfig {
    /// Resolve the config path: explicit path > `WA_APP_CONFIG` > `./whatsapp-app.toml`.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Load the config from disk, falling back to defaults, then apply env overrides.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&raw)
                .map_err(|e| Error::Config(format!("{}: {e}", config_path.display())))?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            Self::default()
        };
        config.with_env_overrides(|key| std::env::var(key).ok()).validate()
    }

    pub fn from_toml(raw: &str) -> crate::Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    /// Apply `WA_PATH_QRCODE`, `WA_PATH_STORAGES`, `WA_PATH_SEND_ITEMS` and
    /// `WA_PAIR_CLIENT_NAME` as looked up by `var`.
    pub fn with_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = var("WA_PATH_QRCODE") {
            self.qr_dir = v.into();
        }
        if let Some(v) = var("WA_PATH_STORAGES") {
            self.storage_dir = v.into();
        }
        if let Some(v) = var("WA_PATH_SEND_ITEMS") {
            self.send_items_dir = v.into();
        }
        if let Some(v) = var("WA_PAIR_CLIENT_NAME") {
            self.pair_client_name = v;
        }
        self
    }

    pub fn validate(self) -> crate::Result<Self> {
        if self.qr_wait_timeout_secs == 0 || self.qr_subscribe_timeout_secs == 0 {
            return Err(Error::Config("QR timeouts must be at least one second".into()));
        }
        if self.pair_client_name.trim().is_empty() {
            return Err(Error::Config("pair_client_name must not be empty".into()));
        }
        Ok(self)
    }

    pub fn qr_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.qr_wait_timeout_secs)
    }

    pub fn qr_subscribe_timeout(&self) -> Duration {
        Duration::from_secs(self.qr_subscribe_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_server_layout() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.qr_dir, PathBuf::from("statics/qrcode"));
        assert_eq!(cfg.send_items_dir, PathBuf::from("statics/senditems"));
        assert_eq!(cfg.qr_wait_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.qr_subscribe_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.pair_client_name, "Chrome (Linux)");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            qr_dir = "/var/lib/wa/qr"
            qr_wait_timeout_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(cfg.qr_dir, PathBuf::from("/var/lib/wa/qr"));
        assert_eq!(cfg.qr_wait_timeout_secs, 30);
        assert_eq!(cfg.storage_dir, PathBuf::from("storages"));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = AppConfig::from_toml("qr_dir = [").unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn env_overrides_replace_paths() {
        let cfg = AppConfig::default().with_env_overrides(|key| match key {
            "WA_PATH_QRCODE" => Some("/tmp/qr".into()),
            "WA_PAIR_CLIENT_NAME" => Some("Firefox (Mac OS)".into()),
            _ => None,
        });
        assert_eq!(cfg.qr_dir, PathBuf::from("/tmp/qr"));
        assert_eq!(cfg.pair_client_name, "Firefox (Mac OS)");
        assert_eq!(cfg.storage_dir, PathBuf::from("storages"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let cfg = AppConfig {
            qr_wait_timeout_secs: 0,
            ..AppConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(cfg.qr_wait_timeout_secs, 15);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.toml");
        std::fs::write(&path, "storage_dir = \"data\"\n").unwrap();
        let cfg = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.storage_dir, PathBuf::from("data"));
    }
}
