use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, info_span, warn};

use crate::attachment::AttachmentScorer;
use crate::cards::{CardResolution, CardResolver};
use crate::db::receipt_repo::{self, ClaimOutcome, SaveOutcome};
use crate::db::{card_repo, Database};
use crate::email::{apply_label_idempotent, label_for_status, MailSource};
use crate::extractor::{extract_pdf_text, FieldExtractor};
use crate::jobs::JobRecorder;
use crate::model::{
    normalize_alias, ExtractedFields, JobOutcome, JobType, Message, Receipt, ReceiptStatus,
    ReviewReason,
};
use crate::sanitize;
use crate::storage::{render_text_pdf, upload_filename, upload_folder, FileStore};

use super::config::PipelineConfig;
use super::context::RunContext;
use super::error::PipelineError;
use super::state::{can_transition, review_gate, Verdict};

/// How a single run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The receipt reached a terminal status and was saved.
    Finished(Receipt),
    /// Another run already claimed this message.
    AlreadyClaimed { receipt_id: i64 },
    /// A newer reprocess started while this run was in flight; its write was dropped.
    Superseded { receipt_id: i64 },
}

impl RunOutcome {
    pub fn receipt(&self) -> Option<&Receipt> {
        match self {
            RunOutcome::Finished(r) => Some(r),
            _ => None,
        }
    }
}

/// Counts from one [`ReceiptPipeline::sync_mailbox`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub job_id: String,
    pub fetched: usize,
    /// Messages that produced a new receipt.
    pub claimed: usize,
    /// Messages that already had a receipt.
    pub skipped: usize,
    /// Messages from senders outside the allow list.
    pub filtered: usize,
    pub errors: usize,
    pub processed: usize,
    pub needs_review: usize,
    pub failed: usize,
}

impl SyncReport {
    fn details(&self) -> String {
        format!(
            "fetched={} claimed={} skipped={} filtered={} errors={} processed={} needs_review={} failed={}",
            self.fetched,
            self.claimed,
            self.skipped,
            self.filtered,
            self.errors,
            self.processed,
            self.needs_review,
            self.failed
        )
    }
}

/// What happened to the alias offered by [`ReceiptPipeline::resolve_card`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasMemo {
    NotRequested,
    /// The receipt carries no card text to remember.
    NoHint,
    Created(String),
    AlreadyKnown(String),
    /// Another card owns the text; remembering it would make lookups ambiguous.
    OwnedByOtherCard { alias: String, card_ids: Vec<i64> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolveCardOutcome {
    pub alias: AliasMemo,
    pub run: RunOutcome,
}

/// Runs receipts from message to terminal status.
pub struct ReceiptPipeline {
    config: Arc<PipelineConfig>,
    db: Database,
    mail: Arc<dyn MailSource>,
    store: Arc<dyn FileStore>,
    jobs: Arc<dyn JobRecorder>,
    scorer: AttachmentScorer,
    extractor: FieldExtractor,
    resolver: CardResolver,
}

impl ReceiptPipeline {
    pub fn new(
        config: Arc<PipelineConfig>,
        db: Database,
        mail: Arc<dyn MailSource>,
        store: Arc<dyn FileStore>,
        jobs: Arc<dyn JobRecorder>,
    ) -> Self {
        let scorer = AttachmentScorer::new(config.max_attachment_size_mb);
        let extractor = FieldExtractor::new(
            config.confidence_weights.clone(),
            config.default_currency.clone(),
            &config.extra_patterns,
        );
        let resolver = CardResolver::new(db.clone());

        Self {
            config,
            db,
            mail,
            store,
            jobs,
            scorer,
            extractor,
            resolver,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Fetches unlabelled messages and processes each one.
    ///
    /// Per-message failures are counted and logged; only a failed fetch
    /// fails the sync.
    pub fn sync_mailbox(&self) -> Result<SyncReport, PipelineError> {
        let _span = info_span!("pipeline.sync").entered();
        let job_id = self.jobs.start(JobType::GmailSync, None)?;

        let messages = match self.mail.fetch_new_messages() {
            Ok(messages) => messages,
            Err(e) => {
                self.finish_job(&job_id, JobOutcome::failed(format!("fetch failed: {}", e)));
                return Err(e.into());
            }
        };

        let mut report = SyncReport {
            job_id: job_id.clone(),
            fetched: messages.len(),
            ..SyncReport::default()
        };

        for message in &messages {
            if !self.config.accepts_sender(message.sender.as_deref()) {
                debug!(
                    sender = %message.sender.as_deref().map(sanitize::redact_email).unwrap_or_default(),
                    "Sender not in allow list"
                );
                report.filtered += 1;
                continue;
            }

            match self.process_message(message) {
                Ok(RunOutcome::Finished(receipt)) => {
                    report.claimed += 1;
                    match receipt.status {
                        ReceiptStatus::Processed => report.processed += 1,
                        ReceiptStatus::NeedsReview => report.needs_review += 1,
                        ReceiptStatus::Failed => report.failed += 1,
                        ReceiptStatus::Pending => {}
                    }
                }
                Ok(RunOutcome::AlreadyClaimed { receipt_id }) => {
                    report.skipped += 1;
                    self.relabel_existing(receipt_id, &message.id);
                }
                Ok(RunOutcome::Superseded { .. }) => report.claimed += 1,
                Err(e) => {
                    warn!(
                        message_id = %sanitize::hash_id(&message.id),
                        "Failed to process message: {}",
                        e
                    );
                    report.errors += 1;
                }
            }
        }

        info!("Mailbox sync finished: {}", report.details());
        self.finish_job(&job_id, JobOutcome::completed(report.details()));
        Ok(report)
    }

    /// Claims and processes one message. A message that already has a
    /// receipt is skipped.
    pub fn process_message(&self, message: &Message) -> Result<RunOutcome, PipelineError> {
        let receipt = match receipt_repo::claim(&self.db, message, Utc::now())? {
            ClaimOutcome::Claimed(receipt) => receipt,
            ClaimOutcome::AlreadyExists(receipt_id) => {
                debug!(receipt_id, "Message already claimed");
                return Ok(RunOutcome::AlreadyClaimed { receipt_id });
            }
        };

        let details = format!("receipt_id={}", receipt.id);
        let job_id = self.jobs.start(JobType::ProcessReceipt, Some(&details))?;
        let result = self.run(RunContext::new(message.clone(), receipt));
        self.finish_run_job(&job_id, &result);
        result
    }

    /// Re-runs a receipt against its re-fetched message, bumping its run token.
    pub fn reprocess(&self, receipt_id: i64) -> Result<RunOutcome, PipelineError> {
        let details = format!("receipt_id={}", receipt_id);
        let job_id = self.jobs.start(JobType::ReprocessReceipt, Some(&details))?;
        let result = self.reprocess_inner(receipt_id);
        self.finish_run_job(&job_id, &result);
        result
    }

    fn reprocess_inner(&self, receipt_id: i64) -> Result<RunOutcome, PipelineError> {
        let existing = receipt_repo::find_by_id(&self.db, receipt_id)?
            .ok_or(PipelineError::ReceiptNotFound(receipt_id))?;

        // Fetch first so a mail outage leaves the receipt untouched.
        let message = self.mail.fetch_message(&existing.message_id)?;

        let receipt = receipt_repo::begin_reprocess(&self.db, receipt_id, Utc::now())?
            .ok_or(PipelineError::ReceiptNotFound(receipt_id))?;

        match message {
            Some(message) => self.run(RunContext::new(message, receipt)),
            None => {
                warn!(receipt_id, "Source message is no longer available");
                let verdict = Verdict::failed(
                    ReviewReason::MessageUnavailable,
                    "source message could not be fetched",
                );
                let token = receipt.retry_count;
                self.save(receipt, token, verdict, None, None)
            }
        }
    }

    /// Replaces extracted fields on a receipt under review.
    ///
    /// Confidence and status are left alone; a later reprocess or
    /// resolve-card picks the corrected values up.
    pub fn edit(&self, receipt_id: i64, fields: &ExtractedFields) -> Result<Receipt, PipelineError> {
        let receipt = receipt_repo::find_by_id(&self.db, receipt_id)?
            .ok_or(PipelineError::ReceiptNotFound(receipt_id))?;
        if receipt.status != ReceiptStatus::NeedsReview {
            return Err(PipelineError::InvalidState {
                receipt_id,
                status: receipt.status,
                action: "be edited",
            });
        }

        let normalized = normalize_edit(fields)?;

        if !receipt_repo::apply_edit(&self.db, receipt_id, &normalized, Utc::now())? {
            let current = receipt_repo::find_by_id(&self.db, receipt_id)?
                .ok_or(PipelineError::ReceiptNotFound(receipt_id))?;
            return Err(PipelineError::InvalidState {
                receipt_id,
                status: current.status,
                action: "be edited",
            });
        }

        info!(receipt_id, "Receipt fields edited");
        receipt_repo::find_by_id(&self.db, receipt_id)?
            .ok_or(PipelineError::ReceiptNotFound(receipt_id))
    }

    /// Binds a receipt under review to `card_id`, optionally remembers its
    /// card text as an alias, then decides again on the stored fields.
    ///
    /// The receipt ends `processed` or back in `needs_review`; it never fails.
    /// The source message is only needed for the document bytes, and a
    /// message that cannot be fetched keeps the receipt in review.
    pub fn resolve_card(
        &self,
        receipt_id: i64,
        card_id: i64,
        remember_alias: bool,
    ) -> Result<ResolveCardOutcome, PipelineError> {
        let _span = info_span!("pipeline.resolve_card", receipt_id, card_id).entered();

        let receipt = receipt_repo::find_by_id(&self.db, receipt_id)?
            .ok_or(PipelineError::ReceiptNotFound(receipt_id))?;
        if card_repo::find_card(&self.db, card_id)?.is_none() {
            return Err(PipelineError::CardNotFound(card_id));
        }
        if receipt.status != ReceiptStatus::NeedsReview {
            return Err(PipelineError::InvalidState {
                receipt_id,
                status: receipt.status,
                action: "have its card resolved",
            });
        }

        // Fetched before any write so a mail outage cannot leave a half-applied resolve.
        let message = match self.mail.fetch_message(&receipt.message_id) {
            Ok(message) => message,
            Err(e) => {
                warn!(receipt_id, "Could not fetch source message: {}", e);
                None
            }
        };

        let now = Utc::now();
        if !receipt_repo::pin_card(&self.db, receipt_id, card_id, now)? {
            return Err(PipelineError::InvalidState {
                receipt_id,
                status: receipt.status,
                action: "have its card resolved",
            });
        }

        let alias = if remember_alias {
            self.remember_alias(&receipt, card_id, now)?
        } else {
            AliasMemo::NotRequested
        };

        let details = format!("receipt_id={} card_id={}", receipt_id, card_id);
        let job_id = self.jobs.start(JobType::ReprocessReceipt, Some(&details))?;
        let result = receipt_repo::begin_reprocess(&self.db, receipt_id, Utc::now())
            .map_err(PipelineError::from)
            .and_then(|r| r.ok_or(PipelineError::ReceiptNotFound(receipt_id)))
            .and_then(|r| self.redecide(r, message));
        self.finish_run_job(&job_id, &result);

        Ok(ResolveCardOutcome { alias, run: result? })
    }

    /// Re-runs card resolution, the decision and the upload on the fields
    /// already stored on `receipt`.
    fn redecide(
        &self,
        receipt: Receipt,
        message: Option<Message>,
    ) -> Result<RunOutcome, PipelineError> {
        let available = message.is_some();
        let message = message.unwrap_or_else(|| Message {
            sender: receipt.sender.clone(),
            subject: receipt.subject.clone(),
            received_at: receipt.received_at,
            ..Message::new(receipt.message_id.clone())
        });
        let mut ctx = RunContext::new(message, receipt);
        let _span = info_span!("pipeline.redecide",
            receipt_id = ctx.receipt.id,
            run = ctx.run_token,
            message_available = available,
        )
        .entered();

        if available {
            self.step_select_attachment(&mut ctx);
        }

        let fields = ctx.receipt.fields.clone();
        ctx.extraction.confidence = if ctx.receipt.edited_at.is_some() {
            self.extractor.score(&fields, fields.currency.is_some())
        } else {
            ctx.receipt.confidence
        };
        ctx.extraction.currency_explicit = fields.currency.is_some();
        ctx.extraction.fields = fields;

        self.step_resolve_card(&mut ctx)?;

        let gate = review_gate(
            ctx.extraction.confidence,
            self.config.confidence_threshold,
            &ctx.resolution,
            self.store.is_connected(),
        );
        let verdict = match gate {
            Some(reason) => Verdict::review(reason),
            None if !available => Verdict {
                detail: Some("source message could not be fetched".to_string()),
                ..Verdict::review(ReviewReason::MessageUnavailable)
            },
            None => {
                let _upload = info_span!("upload").entered();
                let verdict = self.upload(&ctx);
                if verdict.status == ReceiptStatus::Failed {
                    // An upload error leaves the operator's receipt in review.
                    Verdict {
                        status: ReceiptStatus::NeedsReview,
                        ..verdict
                    }
                } else {
                    verdict
                }
            }
        };

        let mut receipt = ctx.receipt.clone();
        receipt.confidence = ctx.extraction.confidence;
        let scores = available.then_some(ctx.selection.scores.as_slice());
        self.save(receipt, ctx.run_token, verdict, scores, None)
    }

    fn remember_alias(
        &self,
        receipt: &Receipt,
        card_id: i64,
        now: DateTime<Utc>,
    ) -> Result<AliasMemo, PipelineError> {
        let Some(hint) = CardResolver::hint(&receipt.fields) else {
            return Ok(AliasMemo::NoHint);
        };
        let alias = normalize_alias(hint);

        let owners = card_repo::card_ids_for_alias(&self.db, &alias)?;
        if owners.iter().any(|id| *id != card_id) {
            warn!(
                card_id,
                "Not remembering alias already owned by another card"
            );
            return Ok(AliasMemo::OwnedByOtherCard {
                alias,
                card_ids: owners,
            });
        }

        match card_repo::insert_alias(&self.db, card_id, &alias, now)? {
            card_repo::AliasInsert::Created(a) => {
                info!(card_id, "Remembered new card alias");
                Ok(AliasMemo::Created(a.alias))
            }
            card_repo::AliasInsert::Existing(a) => Ok(AliasMemo::AlreadyKnown(a.alias)),
        }
    }

    /// Reprocesses receipts stuck in `pending` longer than the configured age.
    pub fn reclaim_stale(&self, now: DateTime<Utc>) -> Result<Vec<RunOutcome>, PipelineError> {
        let cutoff = now - Duration::minutes(self.config.stale_pending_minutes);
        let stale = receipt_repo::find_stale_pending(&self.db, cutoff)?;
        let mut outcomes = Vec::with_capacity(stale.len());

        for receipt in stale {
            match self.reprocess(receipt.id) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(receipt_id = receipt.id, "Failed to reclaim receipt: {}", e),
            }
        }
        Ok(outcomes)
    }

    /// Runs steps 2 to 6 for a claimed (or reset) receipt.
    fn run(&self, mut ctx: RunContext) -> Result<RunOutcome, PipelineError> {
        let sender = ctx
            .message
            .sender
            .as_deref()
            .map(sanitize::redact_email)
            .unwrap_or_default();
        let _pipeline_span = info_span!("pipeline",
            message_id = %sanitize::hash_id(&ctx.message.id),
            receipt_id = ctx.receipt.id,
            run = ctx.run_token,
            sender = %sender,
        )
        .entered();

        {
            let _step = info_span!("select_attachment").entered();
            self.step_select_attachment(&mut ctx);
        }

        {
            let _step = info_span!("extract_fields").entered();
            self.step_extract_fields(&mut ctx);
        }

        {
            let _step = info_span!("resolve_card").entered();
            self.step_resolve_card(&mut ctx)?;
        }

        {
            let _step = info_span!("decide").entered();
            self.step_decide(&mut ctx);
        }

        let _step = info_span!("persist").entered();
        let verdict = ctx
            .verdict
            .take()
            .unwrap_or_else(|| Verdict::review(ReviewReason::LowConfidence));
        let mut receipt = ctx.receipt.clone();
        receipt.fields = ctx.extraction.fields.clone();
        receipt.confidence = ctx.extraction.confidence;
        if !receipt.card_pinned {
            receipt.resolved_card_id = ctx.resolution.card_id();
        }
        self.save(
            receipt,
            ctx.run_token,
            verdict,
            Some(ctx.selection.scores.as_slice()),
            Some(ctx.message.id.as_str()),
        )
    }

    fn step_select_attachment(&self, ctx: &mut RunContext) {
        ctx.selection = self.scorer.select(&ctx.message.attachments);
        ctx.document_text = ctx.chosen_document().and_then(extract_pdf_text);
        debug!(
            attachments = ctx.message.attachments.len(),
            chosen = ?ctx.selection.chosen,
            has_text = ctx.document_text.is_some(),
            "Attachment selection finished"
        );
    }

    fn step_extract_fields(&self, ctx: &mut RunContext) {
        let mut extraction = self
            .extractor
            .extract(&ctx.message.body_text, ctx.document_text.as_deref());

        // Operator corrections win over fresh extraction.
        if ctx.receipt.edited_at.is_some() {
            let mut fields = ctx.receipt.fields.clone();
            fields.fill_missing_from(&extraction.fields);
            let explicit = fields.currency.is_some();
            extraction.confidence = self.extractor.score(&fields, explicit);
            extraction.currency_explicit = explicit;
            extraction.fields = fields;
        }

        ctx.extraction = extraction;
    }

    fn step_resolve_card(&self, ctx: &mut RunContext) -> Result<(), PipelineError> {
        ctx.resolution = match (ctx.receipt.card_pinned, ctx.receipt.resolved_card_id) {
            (true, Some(card_id)) => CardResolution::Resolved(card_id),
            _ => self.resolver.resolve(&ctx.extraction.fields)?,
        };

        if let Some(card_id) = ctx.resolution.card_id() {
            ctx.card_name = card_repo::find_card(&self.db, card_id)?.map(|c| c.display_name);
        }
        Ok(())
    }

    fn step_decide(&self, ctx: &mut RunContext) {
        let gate = review_gate(
            ctx.extraction.confidence,
            self.config.confidence_threshold,
            &ctx.resolution,
            self.store.is_connected(),
        );

        ctx.verdict = Some(match gate {
            Some(reason) => {
                debug!(reason = reason.as_str(), "Routed to review");
                Verdict::review(reason)
            }
            None => {
                let _upload = info_span!("upload").entered();
                self.upload(ctx)
            }
        });
    }

    fn upload(&self, ctx: &RunContext) -> Verdict {
        let document = match ctx.chosen_document() {
            Some(bytes) => bytes.to_vec(),
            None => match render_text_pdf(&ctx.message.body_text) {
                Ok(bytes) => bytes,
                Err(e) => return Verdict::failed(ReviewReason::UploadFailed, e.to_string()),
            },
        };

        let fields = &ctx.extraction.fields;
        let date = fields
            .purchase_date
            .or_else(|| ctx.message.received_at.map(|t| t.date_naive()))
            .unwrap_or_else(|| Utc::now().date_naive());
        let folder = upload_folder(
            &self.config.drive_root_folder,
            ctx.card_name.as_deref(),
            date,
        );
        let filename = upload_filename(fields, &self.config.default_currency, &ctx.message.id);

        let verdict = Verdict::from_upload(self.store.upload(&document, &folder, &filename));
        match verdict.status {
            ReceiptStatus::Processed => debug!(bytes = document.len(), "Receipt document uploaded"),
            _ => warn!(
                "Upload did not complete: {}",
                verdict.detail.as_deref().unwrap_or("unknown error")
            ),
        }
        verdict
    }

    /// Writes the terminal state and, once saved, labels the message.
    fn save(
        &self,
        mut receipt: Receipt,
        run_token: u32,
        verdict: Verdict,
        scores: Option<&[crate::attachment::AttachmentScore]>,
        message_id: Option<&str>,
    ) -> Result<RunOutcome, PipelineError> {
        if !can_transition(receipt.status, verdict.status) {
            return Err(PipelineError::InvalidTransition {
                receipt_id: receipt.id,
                from: receipt.status,
                to: verdict.status,
            });
        }

        let now = Utc::now();
        receipt.status = verdict.status;
        receipt.review_reason = verdict.reason;
        receipt.status_detail = verdict.detail;
        if verdict.remote_file_id.is_some() {
            receipt.remote_file_id = verdict.remote_file_id;
        }
        receipt.updated_at = now;
        receipt.processed_at = Some(now);

        match receipt_repo::save_outcome(&self.db, &receipt, run_token, scores)? {
            SaveOutcome::Saved => {}
            SaveOutcome::Superseded => {
                info!(
                    receipt_id = receipt.id,
                    run = run_token,
                    "Run superseded by a newer reprocess; result discarded"
                );
                return Ok(RunOutcome::Superseded {
                    receipt_id: receipt.id,
                });
            }
        }

        info!(
            receipt_id = receipt.id,
            status = receipt.status.as_str(),
            reason = receipt.review_reason.map(|r| r.as_str()).unwrap_or("-"),
            confidence = receipt.confidence,
            "Receipt finished"
        );

        self.label_message(message_id.unwrap_or(&receipt.message_id), receipt.status);
        Ok(RunOutcome::Finished(receipt))
    }

    /// Best effort: a label failure never affects the saved receipt.
    fn label_message(&self, message_id: &str, status: ReceiptStatus) {
        let Some(label) = label_for_status(status) else {
            return;
        };
        if let Err(e) = apply_label_idempotent(self.mail.as_ref(), message_id, label) {
            warn!(
                message_id = %sanitize::hash_id(message_id),
                label,
                "Failed to label message: {}",
                e
            );
        }
    }

    /// Re-applies the status label for a message that was claimed before but
    /// still shows up as unlabelled.
    fn relabel_existing(&self, receipt_id: i64, message_id: &str) {
        match receipt_repo::find_by_id(&self.db, receipt_id) {
            Ok(Some(receipt)) => self.label_message(message_id, receipt.status),
            Ok(None) => {}
            Err(e) => warn!(receipt_id, "Could not load claimed receipt: {}", e),
        }
    }

    fn finish_run_job(&self, job_id: &str, result: &Result<RunOutcome, PipelineError>) {
        let outcome = match result {
            Ok(RunOutcome::Finished(receipt)) => {
                let detail = format!(
                    "receipt_id={} status={} reason={}",
                    receipt.id,
                    receipt.status,
                    receipt.review_reason.map(|r| r.as_str()).unwrap_or("-")
                );
                match receipt.status {
                    ReceiptStatus::Failed => JobOutcome::failed(format!(
                        "{} detail={}",
                        detail,
                        receipt.status_detail.as_deref().unwrap_or("-")
                    )),
                    _ => JobOutcome::completed(detail),
                }
            }
            Ok(RunOutcome::AlreadyClaimed { receipt_id }) => {
                JobOutcome::completed(format!("receipt_id={} already claimed", receipt_id))
            }
            Ok(RunOutcome::Superseded { receipt_id }) => JobOutcome::completed(format!(
                "receipt_id={} superseded by a newer run",
                receipt_id
            )),
            Err(e) => JobOutcome::failed(e.to_string()),
        };
        self.finish_job(job_id, outcome);
    }

    fn finish_job(&self, job_id: &str, outcome: JobOutcome) {
        if let Err(e) = self.jobs.finish(job_id, &outcome) {
            warn!(job_id, "Failed to record job outcome: {}", e);
        }
    }
}

/// Trims operator input and rejects values the rest of the pipeline cannot use.
fn normalize_edit(fields: &ExtractedFields) -> Result<ExtractedFields, PipelineError> {
    fn trimmed(value: &Option<String>) -> Option<String> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    let mut normalized = fields.clone();
    normalized.merchant = trimmed(&fields.merchant);
    normalized.card_issuer_seen = trimmed(&fields.card_issuer_seen);
    normalized.currency = trimmed(&fields.currency).map(|c| c.to_ascii_uppercase());
    normalized.card_last4_seen = trimmed(&fields.card_last4_seen);

    if let Some(currency) = &normalized.currency {
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PipelineError::InvalidField {
                field: "currency",
                value: currency.clone(),
                expected: "a three-letter currency code",
            });
        }
    }
    if let Some(last4) = &normalized.card_last4_seen {
        if last4.len() != 4 || !last4.chars().all(|c| c.is_ascii_digit()) {
            return Err(PipelineError::InvalidField {
                field: "card_last4_seen",
                value: last4.clone(),
                expected: "exactly four digits",
            });
        }
    }
    if let Some(amount) = normalized.amount {
        if amount.is_sign_negative() {
            return Err(PipelineError::InvalidField {
                field: "amount",
                value: amount.to_string(),
                expected: "a non-negative amount",
            });
        }
    }

    Ok(normalized)
}
