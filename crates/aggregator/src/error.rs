use thiserror::Error;

pub type Result<T> = std::result::Result<T, AggregatorError>;

#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("Store error: {0}")]
    StoreError(#[from] svc_store::StoreError),
}
