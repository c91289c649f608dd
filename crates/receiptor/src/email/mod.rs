//! Mailbox access.
//!
//! The pipeline talks to a mailbox only through [`MailSource`]. The
//! bundled [`DirectoryMailSource`] reads `.eml` files from disk, which is
//! enough for local use and for tests.

pub mod directory;
pub mod error;
pub mod parser;
pub mod source;

pub use directory::DirectoryMailSource;
pub use error::EmailError;
pub use parser::parse_message;
pub use source::{
    apply_label_idempotent, label_for_status, LabelOutcome, MailSource, LABEL_FAILED,
    LABEL_NEEDS_REVIEW, LABEL_PROCESSED,
};
