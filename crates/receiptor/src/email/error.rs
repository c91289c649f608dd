//! Mail source error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or labelling mail.
#[derive(Error, Debug)]
pub enum EmailError {
    /// Failed to parse email message.
    #[error("Failed to parse email: {0}")]
    ParseError(String),

    /// The message no longer exists in the mailbox.
    #[error("Message '{0}' not found")]
    NotFound(String),

    /// The label is already on the message (HTTP 409 style).
    #[error("Label '{label}' already applied to message '{message_id}'")]
    LabelConflict { message_id: String, label: String },

    /// IO error while reading the mailbox.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The mailbox could not be reached.
    #[error("Mailbox unavailable: {0}")]
    Unavailable(String),
}

/// Result type for email operations.
pub type Result<T> = std::result::Result<T, EmailError>;
