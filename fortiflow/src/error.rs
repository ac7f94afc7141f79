//! Error types for fortiflow.

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for fortiflow operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad filter input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Session could not be established
    #[error("Connect error: {0}")]
    Connect(#[from] ConnectError),

    /// SSH transport errors after the session is up
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid session configuration
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Artifact I/O
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Report serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which part of a filter request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Kind,
    Option1,
    Option2,
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterField::Kind => f.write_str("filter type"),
            FilterField::Option1 => f.write_str("filter option 1"),
            FilterField::Option2 => f.write_str("filter option 2"),
        }
    }
}

/// A filter request failed validation. Raised before any session is opened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: FilterField,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: FilterField, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Coarse classification of a [`ConnectError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectErrorKind {
    NoTransport,
    AuthRejected,
    Unclassified,
}

/// Failure to bring up a session with the device.
///
/// The three variants need different operator guidance, see
/// [`ConnectError::guidance`].
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Nothing is answering SSH on the target, or it hung up during the
    /// handshake.
    #[error("SSH not available on {host}: {reason}")]
    NoTransport { host: String, reason: String },

    /// The device rejected the credentials.
    #[error("Authentication failed for user '{user}' on {host}")]
    AuthRejected { host: String, user: String },

    /// Anything else (timeouts, host key mismatch, protocol errors).
    #[error("Unhandled error connecting to {host}: {reason}")]
    Unclassified { host: String, reason: String },
}

impl ConnectError {
    pub fn kind(&self) -> ConnectErrorKind {
        match self {
            ConnectError::NoTransport { .. } => ConnectErrorKind::NoTransport,
            ConnectError::AuthRejected { .. } => ConnectErrorKind::AuthRejected,
            ConnectError::Unclassified { .. } => ConnectErrorKind::Unclassified,
        }
    }

    /// A one-line hint for the operator.
    pub fn guidance(&self) -> &'static str {
        match self.kind() {
            ConnectErrorKind::NoTransport => {
                "enable SSH administrative access on the target interface"
            }
            ConnectErrorKind::AuthRejected => "check the username and password",
            ConnectErrorKind::Unclassified => "see the log for details",
        }
    }
}

/// Transport layer errors on an established session.
#[derive(Error, Debug)]
pub enum TransportError {
    /// SSH protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Prompt not seen in time
    #[error("Prompt not found within {0:?}")]
    Timeout(Duration),

    /// Channel closed by the peer
    #[error("Channel closed")]
    Closed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Session configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Host must not be empty")]
    EmptyHost,

    #[error("Password is required")]
    MissingPassword,

    #[error("Filter is required")]
    MissingFilter,

    #[error("Poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("Trace count must be greater than zero")]
    ZeroTraceCount,
}

/// Header fields that must be present on a group's first record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderField {
    Timestamp,
    Endpoints,
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderField::Timestamp => f.write_str("timestamp"),
            HeaderField::Endpoints => f.write_str("endpoints"),
        }
    }
}

/// A trace group whose first record does not carry a derivable header.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[error("trace_id={trace_id}: no {missing} on first record")]
pub struct MalformedGroupError {
    pub trace_id: String,
    pub missing: HeaderField,
}

/// Result type alias using fortiflow's Error.
pub type Result<T> = std::result::Result<T, Error>;
