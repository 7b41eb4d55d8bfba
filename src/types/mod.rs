mod jid;

pub use jid::{Jid, JidParseError, DEFAULT_USER_SERVER, HIDDEN_USER_SERVER};

use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::time::Duration;

/// Result of a successful QR login.
#[derive(Clone, Debug, Serialize)]
pub struct LoginResponse {
    /// Rendered QR image; deleted once `duration` has elapsed.
    pub image_path: PathBuf,
    /// Raw pairing payload encoded in the image.
    pub code: String,
    /// How long the QR stays valid. Serialized as whole seconds.
    #[serde(serialize_with = "as_secs")]
    pub duration: Duration,
}

/// Display form of a paired device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub device: String,
    pub name: String,
}

fn as_secs<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}
