use thiserror::Error;

/// Result type for service-fact operations
pub type Result<T> = std::result::Result<T, FactsError>;

/// Errors raised while building the catalog or validating facts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FactsError {
    /// Catalog failed validation and cannot be used
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    /// Month outside 1..=12
    #[error("Invalid month: {0}. Must be between 1 and 12.")]
    InvalidMonth(u32),

    /// Year outside the supported window
    #[error("Invalid year: {0}. Must be between 1900 and 2099.")]
    InvalidYear(i32),

    /// Period string did not parse as `YYYY-MM`
    #[error("Invalid period '{0}': expected YYYY-MM")]
    InvalidPeriod(String),

    /// Flag column outside {0, 1}
    #[error("Invalid flag value {value} for column {column}")]
    InvalidFlag { column: String, value: i64 },

    /// Unknown flag column in a persisted flag row
    #[error("Unknown flag column: {0}")]
    UnknownColumn(String),
}

impl FactsError {
    /// Create an invalid catalog error
    pub fn invalid_catalog(msg: impl Into<String>) -> Self {
        Self::InvalidCatalog(msg.into())
    }
}
