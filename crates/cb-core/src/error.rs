//! Errors raised by the domain types themselves. Storage and archive
//! failures have their own enums in the crates that produce them.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AppError {
    /// Input breaking a domain rule (malformed board tag, unknown restore mode)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A record named by the caller does not exist, e.g. ("account", "42")
    #[error("{0} {1} not found")]
    NotFound(&'static str, String),
}
