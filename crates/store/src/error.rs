use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Contact not found: {0}")]
    ContactNotFound(u64),

    #[error("Unsupported {file} schema_version {found} (expected {expected})")]
    SchemaVersion {
        file: &'static str,
        found: u32,
        expected: u32,
    },

    #[error("Store lock error: {0}")]
    LockError(String),

    #[error("{0}")]
    Other(String),
}
