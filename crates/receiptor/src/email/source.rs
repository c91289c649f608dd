use crate::model::{Message, ReceiptStatus};

use super::error::{EmailError, Result};

pub const LABEL_PROCESSED: &str = "receipt/processed";
pub const LABEL_NEEDS_REVIEW: &str = "receipt/needs-review";
pub const LABEL_FAILED: &str = "receipt/failed";

/// Outcome of a successful label request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOutcome {
    Applied,
    AlreadyApplied,
}

/// A mailbox the pipeline reads receipts from.
pub trait MailSource: Send + Sync {
    /// Messages that have not been labelled by the pipeline yet.
    fn fetch_new_messages(&self) -> Result<Vec<Message>>;

    /// Re-fetches one message. `Ok(None)` means it is gone.
    fn fetch_message(&self, message_id: &str) -> Result<Option<Message>>;

    /// Adds a label to a message. Sources may report an existing label
    /// either as [`LabelOutcome::AlreadyApplied`] or as
    /// [`EmailError::LabelConflict`].
    fn apply_label(&self, message_id: &str, label: &str) -> Result<LabelOutcome>;
}

/// Applies a label, treating "already exists" as success.
pub fn apply_label_idempotent(
    source: &dyn MailSource,
    message_id: &str,
    label: &str,
) -> Result<LabelOutcome> {
    match source.apply_label(message_id, label) {
        Err(EmailError::LabelConflict { .. }) => Ok(LabelOutcome::AlreadyApplied),
        other => other,
    }
}

/// Mailbox label mirroring a receipt status. `pending` has none.
pub fn label_for_status(status: ReceiptStatus) -> Option<&'static str> {
    match status {
        ReceiptStatus::Pending => None,
        ReceiptStatus::Processed => Some(LABEL_PROCESSED),
        ReceiptStatus::NeedsReview => Some(LABEL_NEEDS_REVIEW),
        ReceiptStatus::Failed => Some(LABEL_FAILED),
    }
}
