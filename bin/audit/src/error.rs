//! Domain error types for the audit tool.

use std::fmt;

/// Audit tool errors.
#[derive(Debug)]
pub enum AuditError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// A database operation failed.
    Database { details: String },
    /// No person with this email exists.
    UserNotFound { email: String },
    /// Reading the confirmation or writing output failed.
    Io { details: String },
    /// The report could not be serialized.
    Render { details: String },
    /// Some accounts could not be updated.
    PartialFailure { failed: usize },
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "configuration error: {}", details),
            Self::Database { details } => write!(f, "database error: {}", details),
            Self::UserNotFound { email } => write!(f, "user not found: {}", email),
            Self::Io { details } => write!(f, "i/o error: {}", details),
            Self::Render { details } => write!(f, "failed to render report: {}", details),
            Self::PartialFailure { failed } => {
                write!(f, "{} account(s) could not be updated", failed)
            }
        }
    }
}

impl std::error::Error for AuditError {}

impl From<sqlx::Error> for AuditError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            details: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AuditError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            details: err.to_string(),
        }
    }
}
