use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected locally before any request was made.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The server answered with a non-2xx status.
    #[error("server returned {status}: {detail}")]
    Server { status: u16, detail: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("not signed in")]
    NotSignedIn,

    #[error("config error: {0}")]
    Config(String),
}

/// Returned by [`ChannelManager::send`](crate::channel::ChannelManager::send)
/// when there is no open channel to write to.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("channel is not open")]
pub struct NotOpenError;
