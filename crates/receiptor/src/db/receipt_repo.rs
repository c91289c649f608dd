//! Receipt repository: the durable record of every processed message.
//!
//! `message_id` is unique, so [`claim`] doubles as the dedup check: the
//! insert either wins or reports the existing row. Outcome writes are
//! conditional on `retry_count`, which makes a stale run's write a no-op
//! once a reprocess has started.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, ErrorCode, OptionalExtension, Row};
use rust_decimal::Decimal;

use super::{
    format_date, format_timestamp, parse_date, parse_opt_timestamp, parse_timestamp, Database,
    DatabaseError,
};
use crate::attachment::{AttachmentDecision, AttachmentScore};
use crate::model::{ExtractedFields, Message, Receipt, ReceiptStatus, ReviewReason};

/// A raw receipt row from the database.
#[derive(Debug, Clone)]
struct ReceiptRow {
    id: i64,
    message_id: String,
    sender: Option<String>,
    subject: Option<String>,
    received_at: Option<String>,
    merchant: Option<String>,
    purchase_date: Option<String>,
    amount: Option<String>,
    currency: Option<String>,
    card_last4_seen: Option<String>,
    card_issuer_seen: Option<String>,
    confidence: f64,
    status: String,
    review_reason: Option<String>,
    status_detail: Option<String>,
    resolved_card_id: Option<i64>,
    card_pinned: bool,
    remote_file_id: Option<String>,
    created_at: String,
    updated_at: String,
    processed_at: Option<String>,
    retry_count: u32,
    edited_at: Option<String>,
}

impl ReceiptRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            message_id: row.get("message_id")?,
            sender: row.get("sender")?,
            subject: row.get("subject")?,
            received_at: row.get("received_at")?,
            merchant: row.get("merchant")?,
            purchase_date: row.get("purchase_date")?,
            amount: row.get("amount")?,
            currency: row.get("currency")?,
            card_last4_seen: row.get("card_last4_seen")?,
            card_issuer_seen: row.get("card_issuer_seen")?,
            confidence: row.get("confidence")?,
            status: row.get("status")?,
            review_reason: row.get("review_reason")?,
            status_detail: row.get("status_detail")?,
            resolved_card_id: row.get("resolved_card_id")?,
            card_pinned: row.get("card_pinned")?,
            remote_file_id: row.get("remote_file_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            processed_at: row.get("processed_at")?,
            retry_count: row.get("retry_count")?,
            edited_at: row.get("edited_at")?,
        })
    }

    fn into_receipt(self) -> Result<Receipt, DatabaseError> {
        let status = ReceiptStatus::parse(&self.status).ok_or(DatabaseError::InvalidData {
            column: "status",
            value: self.status.clone(),
        })?;
        let review_reason = self
            .review_reason
            .map(|r| {
                ReviewReason::parse(&r).ok_or(DatabaseError::InvalidData {
                    column: "review_reason",
                    value: r.clone(),
                })
            })
            .transpose()?;
        let amount = self
            .amount
            .map(|a| {
                Decimal::from_str(&a).map_err(|_| DatabaseError::InvalidData {
                    column: "amount",
                    value: a.clone(),
                })
            })
            .transpose()?;
        let purchase_date = self
            .purchase_date
            .map(|d| parse_date("purchase_date", &d))
            .transpose()?;

        Ok(Receipt {
            id: self.id,
            message_id: self.message_id,
            sender: self.sender,
            subject: self.subject,
            received_at: parse_opt_timestamp("received_at", self.received_at)?,
            fields: ExtractedFields {
                merchant: self.merchant,
                purchase_date,
                amount,
                currency: self.currency,
                card_last4_seen: self.card_last4_seen,
                card_issuer_seen: self.card_issuer_seen,
            },
            confidence: self.confidence,
            status,
            review_reason,
            status_detail: self.status_detail,
            resolved_card_id: self.resolved_card_id,
            card_pinned: self.card_pinned,
            remote_file_id: self.remote_file_id,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
            processed_at: parse_opt_timestamp("processed_at", self.processed_at)?,
            retry_count: self.retry_count,
            edited_at: parse_opt_timestamp("edited_at", self.edited_at)?,
        })
    }
}

/// A persisted attachment decision.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentLogRow {
    pub receipt_id: i64,
    pub position: usize,
    pub filename: String,
    pub score: i32,
    pub decision: AttachmentDecision,
    pub reason: String,
}

/// Result of [`claim`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// A new `pending` receipt was inserted for this run.
    Claimed(Receipt),
    /// A receipt already exists for the message.
    AlreadyExists(i64),
}

/// Result of a conditional outcome write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The receipt was reprocessed (or deleted) after this run started.
    Superseded,
}

/// Query filter parameters for receipt listing.
#[derive(Debug, Default, Clone)]
pub struct ReceiptFilter {
    pub status: Option<ReceiptStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

fn fetch_one(
    conn: &rusqlite::Connection,
    sql: &str,
    param: &dyn rusqlite::types::ToSql,
) -> Result<Option<Receipt>, DatabaseError> {
    let row = conn
        .query_row(sql, [param], ReceiptRow::from_row)
        .optional()?;
    row.map(ReceiptRow::into_receipt).transpose()
}

/// Inserts a `pending` receipt for the message unless one already exists.
pub fn claim(
    db: &Database,
    message: &Message,
    now: DateTime<Utc>,
) -> Result<ClaimOutcome, DatabaseError> {
    db.with_conn(|conn| {
        let ts = format_timestamp(&now);
        let inserted = conn.execute(
            "INSERT INTO receipts (message_id, sender, subject, received_at, status,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?5)",
            params![
                message.id,
                message.sender,
                message.subject,
                message.received_at.as_ref().map(format_timestamp),
                ts,
            ],
        );

        match inserted {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                let receipt = fetch_one(conn, "SELECT * FROM receipts WHERE id = ?1", &id)?
                    .ok_or(DatabaseError::InvalidData {
                        column: "id",
                        value: id.to_string(),
                    })?;
                Ok(ClaimOutcome::Claimed(receipt))
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                let id: i64 = conn.query_row(
                    "SELECT id FROM receipts WHERE message_id = ?1",
                    params![message.id],
                    |r| r.get(0),
                )?;
                Ok(ClaimOutcome::AlreadyExists(id))
            }
            Err(e) => Err(e.into()),
        }
    })
}

/// Finds a receipt by its ID.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<Receipt>, DatabaseError> {
    db.with_conn(|conn| fetch_one(conn, "SELECT * FROM receipts WHERE id = ?1", &id))
}

/// Finds the receipt for a source message.
pub fn find_by_message_id(
    db: &Database,
    message_id: &str,
) -> Result<Option<Receipt>, DatabaseError> {
    db.with_conn(|conn| {
        fetch_one(
            conn,
            "SELECT * FROM receipts WHERE message_id = ?1",
            &message_id,
        )
    })
}

/// Moves a receipt back to `pending` and bumps its run token.
///
/// Returns the receipt as the new run sees it, or `None` if it does not exist.
pub fn begin_reprocess(
    db: &Database,
    id: i64,
    now: DateTime<Utc>,
) -> Result<Option<Receipt>, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE receipts SET status = 'pending', review_reason = NULL, status_detail = NULL,
             retry_count = retry_count + 1, updated_at = ?2
             WHERE id = ?1",
            params![id, format_timestamp(&now)],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        let receipt = fetch_one(&tx, "SELECT * FROM receipts WHERE id = ?1", &id)?;
        tx.commit()?;
        Ok(receipt)
    })
}

/// Writes the outcome of a run if `run_token` still matches `retry_count`.
///
/// When `attachments` is `Some`, the attachment log is replaced in the
/// same transaction.
pub fn save_outcome(
    db: &Database,
    receipt: &Receipt,
    run_token: u32,
    attachments: Option<&[AttachmentScore]>,
) -> Result<SaveOutcome, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let fields = &receipt.fields;
        let changed = tx.execute(
            "UPDATE receipts SET merchant = ?3, purchase_date = ?4, amount = ?5, currency = ?6,
             card_last4_seen = ?7, card_issuer_seen = ?8, confidence = ?9, status = ?10,
             review_reason = ?11, status_detail = ?12, resolved_card_id = ?13, card_pinned = ?14,
             remote_file_id = ?15, updated_at = ?16, processed_at = ?17, edited_at = ?18
             WHERE id = ?1 AND retry_count = ?2",
            params![
                receipt.id,
                run_token,
                fields.merchant,
                fields.purchase_date.as_ref().map(format_date),
                fields.amount.map(|a| a.to_string()),
                fields.currency,
                fields.card_last4_seen,
                fields.card_issuer_seen,
                receipt.confidence,
                receipt.status.as_str(),
                receipt.review_reason.map(|r| r.as_str()),
                receipt.status_detail,
                receipt.resolved_card_id,
                receipt.card_pinned,
                receipt.remote_file_id,
                format_timestamp(&receipt.updated_at),
                receipt.processed_at.as_ref().map(format_timestamp),
                receipt.edited_at.as_ref().map(format_timestamp),
            ],
        )?;
        if changed == 0 {
            return Ok(SaveOutcome::Superseded);
        }

        if let Some(scores) = attachments {
            tx.execute(
                "DELETE FROM attachment_logs WHERE receipt_id = ?1",
                params![receipt.id],
            )?;
            let mut stmt = tx.prepare(
                "INSERT INTO attachment_logs (receipt_id, position, filename, score, decision, reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for score in scores {
                stmt.execute(params![
                    receipt.id,
                    score.index as i64,
                    score.filename,
                    score.score,
                    score.decision.as_str(),
                    score.reason,
                ])?;
            }
        }

        tx.commit()?;
        Ok(SaveOutcome::Saved)
    })
}

/// Overwrites extracted fields of a `needs_review` receipt.
///
/// Returns `false` when the receipt is missing or not in `needs_review`.
pub fn apply_edit(
    db: &Database,
    id: i64,
    fields: &ExtractedFields,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let ts = format_timestamp(&now);
        let changed = conn.execute(
            "UPDATE receipts SET merchant = ?2, purchase_date = ?3, amount = ?4, currency = ?5,
             card_last4_seen = ?6, card_issuer_seen = ?7, edited_at = ?8, updated_at = ?8
             WHERE id = ?1 AND status = 'needs_review'",
            params![
                id,
                fields.merchant,
                fields.purchase_date.as_ref().map(format_date),
                fields.amount.map(|a| a.to_string()),
                fields.currency,
                fields.card_last4_seen,
                fields.card_issuer_seen,
                ts,
            ],
        )?;
        Ok(changed > 0)
    })
}

/// Binds a card chosen by an operator. Only `needs_review` receipts change.
pub fn pin_card(
    db: &Database,
    id: i64,
    card_id: i64,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE receipts SET resolved_card_id = ?2, card_pinned = 1, updated_at = ?3
             WHERE id = ?1 AND status = 'needs_review'",
            params![id, card_id, format_timestamp(&now)],
        )?;
        Ok(changed > 0)
    })
}

/// Lists the attachment decisions recorded for a receipt, in message order.
pub fn attachment_logs(
    db: &Database,
    receipt_id: i64,
) -> Result<Vec<AttachmentLogRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT receipt_id, position, filename, score, decision, reason
             FROM attachment_logs WHERE receipt_id = ?1 ORDER BY position",
        )?;
        let raw = stmt
            .query_map(params![receipt_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(receipt_id, position, filename, score, decision, reason)| {
                let decision =
                    AttachmentDecision::parse(&decision).ok_or(DatabaseError::InvalidData {
                        column: "decision",
                        value: decision.clone(),
                    })?;
                Ok(AttachmentLogRow {
                    receipt_id,
                    position: position as usize,
                    filename,
                    score,
                    decision,
                    reason,
                })
            })
            .collect()
    })
}

/// Queries receipts with filters, returning (rows, total_count).
pub fn query(
    db: &Database,
    filter: &ReceiptFilter,
) -> Result<(Vec<Receipt>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.as_str()));
        }
        if let Some(ref from) = filter.from {
            conditions.push(format!("created_at >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(format_timestamp(from)));
        }
        if let Some(ref to) = filter.to {
            conditions.push(format!("created_at <= ?{}", param_values.len() + 1));
            param_values.push(Box::new(format_timestamp(to)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM receipts {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM receipts {} ORDER BY created_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), ReceiptRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let receipts = rows
            .into_iter()
            .map(ReceiptRow::into_receipt)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((receipts, total))
    })
}

/// Deletes up to `batch_size` receipts in `status` whose `processed_at`
/// is strictly before `cutoff`. Returns the number deleted.
pub fn delete_expired_batch(
    db: &Database,
    status: ReceiptStatus,
    cutoff: DateTime<Utc>,
    batch_size: usize,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let deleted = conn.execute(
            "DELETE FROM receipts WHERE id IN (
                SELECT id FROM receipts
                WHERE status = ?1 AND processed_at IS NOT NULL AND processed_at < ?2
                ORDER BY processed_at
                LIMIT ?3
             )",
            params![status.as_str(), format_timestamp(&cutoff), batch_size as i64],
        )?;
        Ok(deleted)
    })
}

/// Lists `pending` receipts not touched since `cutoff`, oldest first.
pub fn find_stale_pending(
    db: &Database,
    cutoff: DateTime<Utc>,
) -> Result<Vec<Receipt>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM receipts WHERE status = 'pending' AND updated_at < ?1
             ORDER BY updated_at",
        )?;
        let rows = stmt
            .query_map(params![format_timestamp(&cutoff)], ReceiptRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ReceiptRow::into_receipt).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn message(id: &str) -> Message {
        Message {
            sender: Some("Shop <orders@shop.com>".to_string()),
            subject: Some("Your receipt".to_string()),
            received_at: Some(now()),
            ..Message::new(id)
        }
    }

    fn claimed(db: &Database, id: &str) -> Receipt {
        match claim(db, &message(id), now()).unwrap() {
            ClaimOutcome::Claimed(r) => r,
            other => panic!("expected claim, got {:?}", other),
        }
    }

    fn finish(db: &Database, receipt: &Receipt, status: ReceiptStatus, at: DateTime<Utc>) {
        let mut done = receipt.clone();
        done.status = status;
        done.updated_at = at;
        done.processed_at = Some(at);
        if status == ReceiptStatus::Processed {
            done.remote_file_id = Some("file-1".to_string());
        } else {
            done.review_reason = Some(ReviewReason::LowConfidence);
        }
        assert_eq!(
            save_outcome(db, &done, done.retry_count, None).unwrap(),
            SaveOutcome::Saved
        );
    }

    #[test]
    fn test_claim_inserts_pending() {
        let db = Database::open_in_memory().unwrap();
        let receipt = claimed(&db, "m1");
        assert!(receipt.id > 0);
        assert_eq!(receipt.status, ReceiptStatus::Pending);
        assert_eq!(receipt.sender.as_deref(), Some("Shop <orders@shop.com>"));
        assert_eq!(receipt.received_at, Some(now()));
        assert_eq!(receipt.retry_count, 0);
    }

    #[test]
    fn test_second_claim_reports_existing() {
        let db = Database::open_in_memory().unwrap();
        let first = claimed(&db, "m1");
        let second = claim(&db, &message("m1"), now()).unwrap();
        assert_eq!(second, ClaimOutcome::AlreadyExists(first.id));
    }

    #[test]
    fn test_save_outcome_round_trips_fields() {
        let db = Database::open_in_memory().unwrap();
        let mut receipt = claimed(&db, "m1");
        receipt.fields = ExtractedFields {
            merchant: Some("Target".to_string()),
            purchase_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            amount: Some(dec!(42.17)),
            currency: Some("USD".to_string()),
            card_last4_seen: Some("4242".to_string()),
            card_issuer_seen: Some("Visa".to_string()),
        };
        receipt.confidence = 0.95;
        receipt.status = ReceiptStatus::NeedsReview;
        receipt.review_reason = Some(ReviewReason::CardNoMatch);
        receipt.processed_at = Some(now());

        let scores = vec![AttachmentScore {
            index: 0,
            filename: "receipt.pdf".to_string(),
            score: 110,
            decision: AttachmentDecision::Selected,
            reason: "keyword:receipt".to_string(),
        }];
        let outcome = save_outcome(&db, &receipt, 0, Some(&scores)).unwrap();
        assert_eq!(outcome, SaveOutcome::Saved);

        let stored = find_by_id(&db, receipt.id).unwrap().unwrap();
        assert_eq!(stored.fields, receipt.fields);
        assert_eq!(stored.status, ReceiptStatus::NeedsReview);
        assert_eq!(stored.review_reason, Some(ReviewReason::CardNoMatch));
        assert_eq!(stored.processed_at, Some(now()));

        let logs = attachment_logs(&db, receipt.id).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].decision, AttachmentDecision::Selected);
        assert_eq!(logs[0].score, 110);
    }

    #[test]
    fn test_stale_run_is_superseded_by_reprocess() {
        let db = Database::open_in_memory().unwrap();
        let receipt = claimed(&db, "m1");

        let restarted = begin_reprocess(&db, receipt.id, now()).unwrap().unwrap();
        assert_eq!(restarted.retry_count, 1);

        // The first run finishes late with the old token.
        let mut late = receipt.clone();
        late.status = ReceiptStatus::Failed;
        late.review_reason = Some(ReviewReason::UploadFailed);
        assert_eq!(
            save_outcome(&db, &late, 0, None).unwrap(),
            SaveOutcome::Superseded
        );

        let stored = find_by_id(&db, receipt.id).unwrap().unwrap();
        assert_eq!(stored.status, ReceiptStatus::Pending);
    }

    #[test]
    fn test_begin_reprocess_clears_reason() {
        let db = Database::open_in_memory().unwrap();
        let receipt = claimed(&db, "m1");
        finish(&db, &receipt, ReceiptStatus::NeedsReview, now());

        let restarted = begin_reprocess(&db, receipt.id, now()).unwrap().unwrap();
        assert_eq!(restarted.status, ReceiptStatus::Pending);
        assert_eq!(restarted.review_reason, None);
        assert!(begin_reprocess(&db, 9999, now()).unwrap().is_none());
    }

    #[test]
    fn test_apply_edit_requires_needs_review() {
        let db = Database::open_in_memory().unwrap();
        let receipt = claimed(&db, "m1");
        let fields = ExtractedFields {
            merchant: Some("Corner Shop".to_string()),
            ..Default::default()
        };

        assert!(!apply_edit(&db, receipt.id, &fields, now()).unwrap());

        finish(&db, &receipt, ReceiptStatus::NeedsReview, now());
        assert!(apply_edit(&db, receipt.id, &fields, now()).unwrap());

        let stored = find_by_id(&db, receipt.id).unwrap().unwrap();
        assert_eq!(stored.fields.merchant.as_deref(), Some("Corner Shop"));
        assert_eq!(stored.edited_at, Some(now()));
    }

    #[test]
    fn test_pin_card_requires_needs_review() {
        let db = Database::open_in_memory().unwrap();
        let card = crate::db::card_repo::insert_card(
            &db,
            &crate::model::NewCard {
                display_name: "Sapphire".to_string(),
                ..Default::default()
            },
            now(),
        )
        .unwrap();
        let receipt = claimed(&db, "m1");

        assert!(!pin_card(&db, receipt.id, card.id, now()).unwrap());

        finish(&db, &receipt, ReceiptStatus::NeedsReview, now());
        assert!(pin_card(&db, receipt.id, card.id, now()).unwrap());

        let stored = find_by_id(&db, receipt.id).unwrap().unwrap();
        assert_eq!(stored.resolved_card_id, Some(card.id));
        assert!(stored.card_pinned);
    }

    #[test]
    fn test_delete_expired_batch_is_strict_and_bounded() {
        let db = Database::open_in_memory().unwrap();
        let cutoff = now() - Duration::days(45);

        let on_boundary = claimed(&db, "boundary");
        finish(&db, &on_boundary, ReceiptStatus::Processed, cutoff);
        for i in 0..3 {
            let r = claimed(&db, &format!("old-{}", i));
            finish(&db, &r, ReceiptStatus::Processed, cutoff - Duration::days(1));
        }
        let review = claimed(&db, "review");
        finish(&db, &review, ReceiptStatus::NeedsReview, cutoff - Duration::days(1));

        assert_eq!(
            delete_expired_batch(&db, ReceiptStatus::Processed, cutoff, 2).unwrap(),
            2
        );
        assert_eq!(
            delete_expired_batch(&db, ReceiptStatus::Processed, cutoff, 2).unwrap(),
            1
        );
        assert_eq!(
            delete_expired_batch(&db, ReceiptStatus::Processed, cutoff, 2).unwrap(),
            0
        );

        assert!(find_by_id(&db, on_boundary.id).unwrap().is_some());
        assert!(find_by_id(&db, review.id).unwrap().is_some());
    }

    #[test]
    fn test_delete_cascades_attachment_logs() {
        let db = Database::open_in_memory().unwrap();
        let mut receipt = claimed(&db, "m1");
        receipt.status = ReceiptStatus::Processed;
        receipt.remote_file_id = Some("f".to_string());
        receipt.processed_at = Some(now() - Duration::days(100));
        let scores = vec![AttachmentScore {
            index: 0,
            filename: "a.pdf".to_string(),
            score: 1,
            decision: AttachmentDecision::Selected,
            reason: "only_candidate".to_string(),
        }];
        save_outcome(&db, &receipt, 0, Some(&scores)).unwrap();

        delete_expired_batch(&db, ReceiptStatus::Processed, now(), 10).unwrap();
        assert!(attachment_logs(&db, receipt.id).unwrap().is_empty());
    }

    #[test]
    fn test_find_stale_pending() {
        let db = Database::open_in_memory().unwrap();
        let stuck = claimed(&db, "stuck");
        let done = claimed(&db, "done");
        finish(&db, &done, ReceiptStatus::Processed, now());

        let stale = find_stale_pending(&db, now() + Duration::minutes(61)).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, stuck.id);
        assert!(find_stale_pending(&db, now()).unwrap().is_empty());
    }

    #[test]
    fn test_query_filters_by_status() {
        let db = Database::open_in_memory().unwrap();
        let a = claimed(&db, "a");
        claimed(&db, "b");
        finish(&db, &a, ReceiptStatus::NeedsReview, now());

        let filter = ReceiptFilter {
            status: Some(ReceiptStatus::NeedsReview),
            ..Default::default()
        };
        let (rows, total) = query(&db, &filter).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].message_id, "a");

        let (_, all) = query(&db, &ReceiptFilter::default()).unwrap();
        assert_eq!(all, 2);
    }
}
