use thiserror::Error;

/// Maximum size of a single framed JSON message (16MiB), mirroring the
/// size cap every length-prefixed wire protocol in the corpus carries to
/// avoid unbounded allocation from a hostile or corrupt peer.
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("message serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("message of {0} bytes exceeds the {max} byte limit", max = MAX_MESSAGE_BYTES)]
    MessageTooLarge(usize),

    #[error("connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
