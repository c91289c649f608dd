use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};

use crate::db::{receipt_repo, Database, DatabaseError};
use crate::model::ReceiptStatus;
use crate::pipeline::PipelineConfig;

/// Counts from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted_processed: usize,
    pub deleted_needs_review: usize,
    pub deleted_failed: usize,
    /// `pending` receipts older than the staleness limit. Never deleted.
    pub stale_pending: Vec<i64>,
}

impl SweepReport {
    pub fn total_deleted(&self) -> usize {
        self.deleted_processed + self.deleted_needs_review + self.deleted_failed
    }
}

/// Deletes terminal receipts past their retention window.
///
/// A receipt is deleted when its `processed_at` is strictly older than
/// `now - window`. Deletes run in batches of `sweep_batch_size` so that
/// pipeline writes are never blocked for long.
pub struct RetentionSweeper {
    db: Database,
    config: Arc<PipelineConfig>,
}

impl RetentionSweeper {
    pub fn new(db: Database, config: Arc<PipelineConfig>) -> Self {
        Self { db, config }
    }

    pub fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, DatabaseError> {
        let _span = tracing::info_span!("retention.sweep").entered();

        let processed_cutoff = now - Duration::days(self.config.retention_days_processed.into());
        let review_cutoff = now - Duration::days(self.config.retention_days_review.into());

        let mut report = SweepReport {
            deleted_processed: self.purge(ReceiptStatus::Processed, processed_cutoff)?,
            deleted_needs_review: self.purge(ReceiptStatus::NeedsReview, review_cutoff)?,
            deleted_failed: self.purge(ReceiptStatus::Failed, review_cutoff)?,
            stale_pending: Vec::new(),
        };

        let stale_cutoff = now - Duration::minutes(self.config.stale_pending_minutes);
        report.stale_pending = receipt_repo::find_stale_pending(&self.db, stale_cutoff)?
            .into_iter()
            .map(|r| r.id)
            .collect();

        if !report.stale_pending.is_empty() {
            warn!(
                "{} receipt(s) stuck in pending for over {} minutes: {:?}",
                report.stale_pending.len(),
                self.config.stale_pending_minutes,
                report.stale_pending
            );
        }

        info!(
            "Retention sweep deleted {} receipt(s) (processed: {}, needs_review: {}, failed: {})",
            report.total_deleted(),
            report.deleted_processed,
            report.deleted_needs_review,
            report.deleted_failed
        );
        Ok(report)
    }

    fn purge(&self, status: ReceiptStatus, cutoff: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let batch_size = self.config.sweep_batch_size.max(1);
        let mut total = 0;
        loop {
            let deleted = receipt_repo::delete_expired_batch(&self.db, status, cutoff, batch_size)?;
            total += deleted;
            debug!("Deleted batch of {} {} receipt(s)", deleted, status);
            if deleted < batch_size {
                break;
            }
        }
        Ok(total)
    }
}
