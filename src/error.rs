use thiserror::Error;

/// Library result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the application use-cases.
#[derive(Error, Debug)]
pub enum Error {
    #[error("your WhatsApp client is invalid or empty")]
    ClientUnavailable,

    #[error("you are already logged in")]
    AlreadyLoggedIn,

    #[error("your session has been saved, please wait for it to connect and try again")]
    SessionSaved,

    #[error("QR channel error: {0}")]
    QrChannel(String),

    #[error("reconnect error: {0}")]
    Reconnect(#[source] ClientError),

    #[error("QR artifact: {0}")]
    ArtifactWrite(#[from] ArtifactError),

    #[error("validation: {0}")]
    Validation(String),

    #[error("client: {0}")]
    Client(#[from] ClientError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Stable application code for the error kind, handed to the HTTP layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ClientUnavailable => "INVALID_WA_CLI",
            Self::AlreadyLoggedIn => "ALREADY_LOGGED_IN",
            Self::SessionSaved => "SESSION_SAVED",
            Self::QrChannel(_) => "QR_CHANNEL_ERROR",
            Self::Reconnect(_) => "RECONNECT_ERROR",
            Self::ArtifactWrite(_) => "QR_WRITE_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Client(_) => "CLIENT_ERROR",
            Self::Store(_) => "STORE_ERROR",
            Self::Io(_) | Self::Pattern(_) => "FILESYSTEM_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Other(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

/// Errors reported by the underlying WhatsApp client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The store already holds a session identity, so no QR channel can be opened.
    #[error("store already contains a session identity")]
    QrStoreContainsId,

    #[error("not connected")]
    NotConnected,

    #[error("connection: {0}")]
    Connection(String),

    #[error("pairing: {0}")]
    Pairing(String),

    #[error("logout: {0}")]
    Logout(String),

    #[error("store: {0}")]
    Store(#[from] StoreError),
}

/// Store (device/session) errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("save failed: {0}")]
    Save(String),

    #[error("load failed: {0}")]
    Load(String),

    #[error("identity not found")]
    IdentityNotFound,
}

/// Failures while rendering or persisting a QR artifact.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("encode: {0}")]
    Encode(#[from] qrcode::types::QrError),

    #[error("image: {0}")]
    Image(#[from] image::ImageError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("render task: {0}")]
    Task(String),
}
