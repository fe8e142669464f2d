//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Every contract operation surfaces one of [`EmptyPath`](ErrorKind::EmptyPath),
/// [`NotFound`](ErrorKind::NotFound) or [`Update`](ErrorKind::Update), no matter
/// which backend produced the failure. [`Connection`](ErrorKind::Connection) is
/// reserved for adapter construction and never crosses the operation boundary.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A resource was constructed from an empty path
    #[display("empty resource path")]
    EmptyPath,
    /// No resource exists at the resolved address
    #[display("resource not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The backend rejected a mutation (auth, conflict, quota, network)
    #[display("update rejected at {_0}: {_1}")]
    Update(#[error(not(source))] String, #[error(not(source))] String),
    /// A backend could not be constructed from its configuration
    #[display("connection error: {_0}")]
    Connection(#[error(not(source))] String),
}

impl ErrorKind {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Wrap a backend's own failure message, keeping the canonical path
    /// for diagnostics.
    pub fn update(path: impl Into<String>, cause: impl ToString) -> Self {
        Self::Update(path.into(), cause.to_string())
    }
}
