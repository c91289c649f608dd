use thiserror::Error;

use crate::model::ReceiptStatus;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Mail source error: {0}")]
    Email(#[from] crate::email::EmailError),

    #[error("Job recorder error: {0}")]
    Job(#[from] crate::jobs::JobError),

    #[error("Receipt {0} not found")]
    ReceiptNotFound(i64),

    #[error("Card {0} not found")]
    CardNotFound(i64),

    #[error("Receipt {receipt_id} cannot {action} while {status}")]
    InvalidState {
        receipt_id: i64,
        status: ReceiptStatus,
        action: &'static str,
    },

    #[error("Invalid {field} '{value}': {expected}")]
    InvalidField {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Receipt {receipt_id} cannot move from {from} to {to}")]
    InvalidTransition {
        receipt_id: i64,
        from: ReceiptStatus,
        to: ReceiptStatus,
    },
}
