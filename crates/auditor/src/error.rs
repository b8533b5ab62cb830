use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuditorError>;

#[derive(Error, Debug)]
pub enum AuditorError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    StoreError(#[from] svc_store::StoreError),
}
