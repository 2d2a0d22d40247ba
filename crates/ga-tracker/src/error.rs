//! Tracker error types

use thiserror::Error;

/// Errors surfaced synchronously to the caller of a tracking method.
///
/// Dispatch failures (bad status codes, DNS errors, timeouts) are never
/// represented here: they are logged and counted by the dispatcher only.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// A required argument of a convenience method was missing or empty
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The request data cannot be encoded into a well-formed beacon
    #[error("invalid tracking request: {0}")]
    InvalidRequest(String),

    /// The tracker cannot dispatch anymore (e.g. after `shutdown`)
    #[error("tracker not initialized: {0}")]
    NotInitialized(&'static str),

    /// The background dispatch runtime could not be started
    #[error("failed to start dispatch runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// The default HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, TrackerError>;
