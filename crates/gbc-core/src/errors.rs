/// Core error type for the connector.
///
/// Adapter crates should map their specific errors into this type so callers
/// see one taxonomy regardless of which transport is underneath.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// A login line could not be written; carries the write error.
    #[error("connection error: handshake failed: {0}")]
    Handshake(#[source] Box<Error>),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
