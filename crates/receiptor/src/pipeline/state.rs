//! Receipt status transitions and the review gate.

use crate::cards::CardResolution;
use crate::model::{ReceiptStatus, ReviewReason};
use crate::storage::UploadError;

/// Whether `from → to` is an allowed status change.
///
/// `pending` moves to any terminal status, `needs_review` may be promoted to
/// `processed`, and every status may be reset to `pending` by a reprocess.
pub fn can_transition(from: ReceiptStatus, to: ReceiptStatus) -> bool {
    use ReceiptStatus::*;
    matches!(
        (from, to),
        (Pending, Processed | NeedsReview | Failed)
            | (NeedsReview, Processed)
            | (_, Pending)
    )
}

/// Checks the gates that come before any upload attempt, in order.
///
/// Returns the review reason for the first gate that fails, or `None` when
/// the receipt may be uploaded.
pub fn review_gate(
    confidence: f64,
    threshold: f64,
    resolution: &CardResolution,
    storage_connected: bool,
) -> Option<ReviewReason> {
    if confidence < threshold {
        return Some(ReviewReason::LowConfidence);
    }
    match resolution {
        CardResolution::Ambiguous(_) => return Some(ReviewReason::CardAmbiguous),
        CardResolution::NoMatch => return Some(ReviewReason::CardNoMatch),
        CardResolution::Resolved(_) | CardResolution::NoHint => {}
    }
    if !storage_connected {
        return Some(ReviewReason::DriveNotConnected);
    }
    None
}

/// Final status of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub status: ReceiptStatus,
    pub reason: Option<ReviewReason>,
    pub detail: Option<String>,
    pub remote_file_id: Option<String>,
}

impl Verdict {
    pub fn review(reason: ReviewReason) -> Self {
        Self {
            status: ReceiptStatus::NeedsReview,
            reason: Some(reason),
            detail: None,
            remote_file_id: None,
        }
    }

    pub fn failed(reason: ReviewReason, detail: impl Into<String>) -> Self {
        Self {
            status: ReceiptStatus::Failed,
            reason: Some(reason),
            detail: Some(detail.into()),
            remote_file_id: None,
        }
    }

    /// Maps an upload attempt to a verdict.
    ///
    /// A store that turns out to be disconnected defers the receipt; any
    /// other upload error fails it with the upstream message.
    pub fn from_upload(result: Result<String, UploadError>) -> Self {
        match result {
            Ok(remote_file_id) => Self {
                status: ReceiptStatus::Processed,
                reason: None,
                detail: None,
                remote_file_id: Some(remote_file_id),
            },
            Err(UploadError::NotConnected(detail)) => Self {
                detail: Some(detail),
                ..Self::review(ReviewReason::DriveNotConnected)
            },
            Err(UploadError::Failed(detail)) => Self::failed(ReviewReason::UploadFailed, detail),
        }
    }
}
