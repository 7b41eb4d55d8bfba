//! Pairing events emitted by the client while a QR login is in progress.

use futures::stream::BoxStream;
use std::time::Duration;

/// Lazily produced pairing events. Ends when the client closes the channel.
pub type QrEventStream = BoxStream<'static, QrEvent>;

/// One item from the QR pairing channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QrEvent {
    pub kind: QrEventKind,
    /// QR payload; only meaningful for [`QrEventKind::Code`].
    pub code: String,
    /// How long the server keeps this code valid.
    pub timeout: Duration,
}

impl QrEvent {
    pub fn code(code: impl Into<String>, timeout: Duration) -> Self {
        Self {
            kind: QrEventKind::Code,
            code: code.into(),
            timeout,
        }
    }

    pub fn other(kind: QrEventKind) -> Self {
        Self {
            kind,
            code: String::new(),
            timeout: Duration::ZERO,
        }
    }
}

/// Kind of a pairing event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QrEventKind {
    /// A new QR payload to show (first ~60s, later ones ~20s).
    Code,
    /// No code was scanned before the last one expired.
    Timeout,
    /// The QR was scanned and pairing succeeded.
    Success,
    ClientOutdated,
    /// QR scanned but the phone has no multidevice support.
    ScannedWithoutMultidevice,
    Error(String),
    UnexpectedState,
}

impl QrEventKind {
    /// Wire name of the event.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Code => "code",
            Self::Timeout => "timeout",
            Self::Success => "success",
            Self::ClientOutdated => "err-client-outdated",
            Self::ScannedWithoutMultidevice => "err-scanned-without-multidevice",
            Self::Error(_) => "error",
            Self::UnexpectedState => "err-unexpected-state",
        }
    }
}

impl std::fmt::Display for QrEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(msg) => write!(f, "error: {msg}"),
            other => f.write_str(other.as_str()),
        }
    }
}
