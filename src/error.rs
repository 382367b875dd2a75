//! Error types for Health Metrics Core

use thiserror::Error;

/// Errors that can occur while preparing or shipping a metrics batch
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Unsupported metric type: {0}")]
    UnsupportedMetric(String),

    #[error("Platform query failed: {0}")]
    QueryError(String),

    #[error("Backend send failed: {0}")]
    SendError(String),

    #[error("Key-value store failure: {0}")]
    StoreError(String),
}
