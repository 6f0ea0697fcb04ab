use thiserror::Error;

pub type IlockResult<T> = Result<T, IlockError>;

#[derive(Debug, Error)]
pub enum IlockError {
    #[error("config error: {0}")]
    Config(String),

    #[error("cipher error: {0}")]
    Cipher(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("invalid request: {0}")]
    Request(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
