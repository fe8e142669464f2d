//! Configuration Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Profile file or environment could not be read into settings
    #[display("configuration error")]
    Config(figment::Error),
    /// Connection identifier did not parse
    #[display("invalid connection identifier: {_0}")]
    InvalidUri(#[error(not(source))] String),
    /// Connection identifier names a scheme with no adapter
    #[display("unsupported backend scheme: {_0}")]
    UnsupportedScheme(#[error(not(source))] String),
    /// A required connection value is missing
    #[display("missing connection value: {_0}")]
    MissingValue(#[error(not(source))] String),
    /// No backend profile under this name
    #[display("unknown backend profile: {_0}")]
    UnknownBackend(#[error(not(source))] String),
    /// No profile name given and no default configured
    #[display("no default backend profile configured")]
    NoDefault,
    /// The selected backend failed to construct
    #[display("backend construction failed: {_0}")]
    Backend(#[error(not(source))] String),
}
