//! Error handling module
//!
//! Provides the error taxonomy shared by every drift-detection component.
//! Each variant carries its own propagation policy:
//!
//! - `TableAccess`: fatal to the current validation, always propagated
//! - `StoreLoad`: softened to an empty history by the stores themselves
//! - `StoreSave`: propagated so the pipeline knows its baseline did not persist
//! - `Notify`: swallowed by the detector after a console fallback
//! - `Config`: raised eagerly while building stores and notifiers

use crate::config::ConfigError;
use thiserror::Error;

/// Library-wide error type
#[derive(Error, Debug)]
pub enum DriftError {
    #[error("Table access error: {0}")]
    TableAccess(String),

    #[error("Snapshot store load error: {0}")]
    StoreLoad(String),

    #[error("Snapshot store save error: {0}")]
    StoreSave(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DriftError {
    /// Short machine-readable code, used in structured log fields
    pub fn code(&self) -> &'static str {
        match self {
            DriftError::TableAccess(_) => "TABLE_ACCESS_ERROR",
            DriftError::StoreLoad(_) => "STORE_LOAD_ERROR",
            DriftError::StoreSave(_) => "STORE_SAVE_ERROR",
            DriftError::Notify(_) => "NOTIFY_ERROR",
            DriftError::Config(_) => "CONFIG_ERROR",
        }
    }
}

/// Result type alias for drift operations
pub type DriftResult<T> = Result<T, DriftError>;

/// Helper function to create a table access error
pub fn table_error(msg: impl Into<String>) -> DriftError {
    DriftError::TableAccess(msg.into())
}

/// Helper function to create a store load error
pub fn load_error(msg: impl Into<String>) -> DriftError {
    DriftError::StoreLoad(msg.into())
}

/// Helper function to create a store save error
pub fn save_error(msg: impl Into<String>) -> DriftError {
    DriftError::StoreSave(msg.into())
}

/// Helper function to create a notification error
pub fn notify_error(msg: impl Into<String>) -> DriftError {
    DriftError::Notify(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(table_error("bad csv").code(), "TABLE_ACCESS_ERROR");
        assert_eq!(save_error("disk full").code(), "STORE_SAVE_ERROR");
        assert_eq!(
            DriftError::from(ConfigError::MissingVar("DFDRIFT_GCS_BUCKET".into())).code(),
            "CONFIG_ERROR"
        );
    }

    #[test]
    fn test_error_display() {
        let err = notify_error("webhook returned 500");
        assert_eq!(err.to_string(), "Notification error: webhook returned 500");
    }
}
