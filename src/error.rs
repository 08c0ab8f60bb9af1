//! Error types shared by the store, the engines and the job.

use thiserror::Error;

use crate::models::consolidation_type::ConsolidationType;

/// Failures raised by a record store
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// A required table does not exist. Never reported as "no data".
    #[error("storage not provisioned: table '{0}' does not exist")]
    NotProvisioned(String),
    /// Connection-level failure that may succeed on retry
    #[error("transient storage error: {0}")]
    Transient(String),
    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Failures of a single numeric computation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ArithmeticError {
    #[error("cannot interpolate between two samples at the same x ({0})")]
    ZeroInterval(f64),
    #[error("interpolation produced a non-finite value")]
    NonFinite,
}

#[derive(Debug, Error)]
pub enum ConsolidationError {
    #[error("configuration error in mapping '{mapping}': {reason}")]
    Configuration { mapping: String, reason: String },
    #[error("cannot {operation} into consolidation type {target}")]
    UnsupportedTarget {
        operation: &'static str,
        target: ConsolidationType,
    },
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl ConsolidationError {
    pub fn configuration(mapping: impl Into<String>, reason: impl Into<String>) -> Self {
        ConsolidationError::Configuration {
            mapping: mapping.into(),
            reason: reason.into(),
        }
    }
}

/// Invalid or missing environment configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}
