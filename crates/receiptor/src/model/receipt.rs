use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Receipt lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Pending,
    Processed,
    NeedsReview,
    Failed,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Pending => "pending",
            ReceiptStatus::Processed => "processed",
            ReceiptStatus::NeedsReview => "needs_review",
            ReceiptStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReceiptStatus::Pending),
            "processed" => Some(ReceiptStatus::Processed),
            "needs_review" => Some(ReceiptStatus::NeedsReview),
            "failed" => Some(ReceiptStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReceiptStatus::Pending)
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a receipt ended up in `needs_review` or `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    LowConfidence,
    CardAmbiguous,
    CardNoMatch,
    DriveNotConnected,
    UploadFailed,
    MessageUnavailable,
}

impl ReviewReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewReason::LowConfidence => "low_confidence",
            ReviewReason::CardAmbiguous => "card_ambiguous",
            ReviewReason::CardNoMatch => "card_no_match",
            ReviewReason::DriveNotConnected => "drive_not_connected",
            ReviewReason::UploadFailed => "upload_failed",
            ReviewReason::MessageUnavailable => "message_unavailable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low_confidence" => Some(ReviewReason::LowConfidence),
            "card_ambiguous" => Some(ReviewReason::CardAmbiguous),
            "card_no_match" => Some(ReviewReason::CardNoMatch),
            "drive_not_connected" => Some(ReviewReason::DriveNotConnected),
            "upload_failed" => Some(ReviewReason::UploadFailed),
            "message_unavailable" => Some(ReviewReason::MessageUnavailable),
            _ => None,
        }
    }
}

impl fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed purchase data pulled out of a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub merchant: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    /// ISO 4217 code.
    pub currency: Option<String>,
    /// Four digits, e.g. "4242".
    pub card_last4_seen: Option<String>,
    /// Normalized network/issuer name, e.g. "Visa".
    pub card_issuer_seen: Option<String>,
}

impl ExtractedFields {
    /// Fills every empty field from `other`, keeping values already set.
    pub fn fill_missing_from(&mut self, other: &ExtractedFields) {
        if self.merchant.is_none() {
            self.merchant = other.merchant.clone();
        }
        if self.purchase_date.is_none() {
            self.purchase_date = other.purchase_date;
        }
        if self.amount.is_none() {
            self.amount = other.amount;
        }
        if self.currency.is_none() {
            self.currency = other.currency.clone();
        }
        if self.card_last4_seen.is_none() {
            self.card_last4_seen = other.card_last4_seen.clone();
        }
        if self.card_issuer_seen.is_none() {
            self.card_issuer_seen = other.card_issuer_seen.clone();
        }
    }
}

/// Persisted outcome of processing one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: i64,
    /// Source message id. Unique across receipts.
    pub message_id: String,
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub fields: ExtractedFields,
    /// Extraction quality in [0, 1].
    pub confidence: f64,
    pub status: ReceiptStatus,
    pub review_reason: Option<ReviewReason>,
    /// Human-readable detail for the current status (upstream error text, etc).
    pub status_detail: Option<String>,
    pub resolved_card_id: Option<i64>,
    /// Set when an operator bound the card by hand; alias lookup is skipped afterwards.
    pub card_pinned: bool,
    pub remote_file_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the receipt last reached a terminal status.
    pub processed_at: Option<DateTime<Utc>>,
    /// Incremented by every reprocess; doubles as the run token.
    pub retry_count: u32,
    /// Set when an operator corrected extracted fields.
    pub edited_at: Option<DateTime<Utc>>,
}

impl Receipt {
    /// A freshly claimed receipt for `message_id`.
    pub fn pending(message_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            message_id: message_id.into(),
            sender: None,
            subject: None,
            received_at: None,
            fields: ExtractedFields::default(),
            confidence: 0.0,
            status: ReceiptStatus::Pending,
            review_reason: None,
            status_detail: None,
            resolved_card_id: None,
            card_pinned: false,
            remote_file_id: None,
            created_at: now,
            updated_at: now,
            processed_at: None,
            retry_count: 0,
            edited_at: None,
        }
    }
}
