use thiserror::Error;

// ---

#[derive(Debug, Error)]
pub enum RelayError {
    // ---
    #[error("connection error: {0}")]
    Connection(String),

    #[error("session closed")]
    SessionClosed,

    #[error("event queue closed")]
    QueueClosed,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// ---

pub type Result<T> = std::result::Result<T, RelayError>;
