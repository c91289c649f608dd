//! End-to-end runs of the receipt pipeline against the in-memory harness.

mod common;

use rust_decimal_macros::dec;

use common::{blank_scan_pdf, target_receipt_message, MessageBuilder, TestHarness};
use receiptor::email::{LABEL_NEEDS_REVIEW, LABEL_PROCESSED};
use receiptor::model::{ExtractedFields, JobStatus, JobType, ReceiptStatus, ReviewReason};
use receiptor::pipeline::{AliasMemo, PipelineConfig, PipelineError, RunOutcome};

fn finished(outcome: RunOutcome) -> receiptor::model::Receipt {
    match outcome {
        RunOutcome::Finished(receipt) => receipt,
        other => panic!("expected a finished run, got {:?}", other),
    }
}

#[test]
fn known_card_alias_is_processed() {
    let harness = TestHarness::new();
    let card_id = harness.add_card("Sapphire", Some("4242"));
    let message = target_receipt_message("msg-a");
    harness.mailbox.put(message.clone());

    let receipt = finished(harness.pipeline.process_message(&message).unwrap());

    assert_eq!(receipt.status, ReceiptStatus::Processed);
    assert_eq!(receipt.review_reason, None);
    assert_eq!(receipt.fields.merchant.as_deref(), Some("Target"));
    assert_eq!(receipt.fields.amount, Some(dec!(42.17)));
    assert_eq!(receipt.fields.currency.as_deref(), Some("USD"));
    assert_eq!(receipt.resolved_card_id, Some(card_id));
    assert!(receipt.confidence >= 0.75);

    let remote_id = receipt.remote_file_id.clone().unwrap();
    assert_eq!(
        remote_id,
        "Receipts/Sapphire/2024/2024-03/2024-03-01_Target_42.17_USD_msg-a.pdf"
    );
    assert_eq!(harness.uploaded(&remote_id), message.attachments[0].content);
    assert_eq!(harness.mailbox.labels_of("msg-a"), vec![LABEL_PROCESSED]);

    let stored = harness.receipt(receipt.id);
    assert_eq!(stored.status, ReceiptStatus::Processed);
    assert_eq!(stored.resolved_card_id, Some(card_id));
}

#[test]
fn unknown_card_needs_review() {
    let harness = TestHarness::new();
    harness.add_card("Sapphire", None);
    let message = target_receipt_message("msg-b");

    let receipt = finished(harness.pipeline.process_message(&message).unwrap());

    assert_eq!(receipt.status, ReceiptStatus::NeedsReview);
    assert_eq!(receipt.review_reason, Some(ReviewReason::CardNoMatch));
    assert_eq!(receipt.resolved_card_id, None);
    assert_eq!(receipt.remote_file_id, None);
    assert_eq!(receipt.fields.amount, Some(dec!(42.17)));
}

#[test]
fn shared_alias_is_ambiguous() {
    let harness = TestHarness::new();
    harness.add_card("Personal", Some("4242"));
    harness.add_card("Business", Some("4242"));
    let message = target_receipt_message("msg-b2");

    let receipt = finished(harness.pipeline.process_message(&message).unwrap());

    assert_eq!(receipt.status, ReceiptStatus::NeedsReview);
    assert_eq!(receipt.review_reason, Some(ReviewReason::CardAmbiguous));
    assert_eq!(receipt.resolved_card_id, None);
}

#[test]
fn disconnected_storage_defers_until_reprocess() {
    let harness = TestHarness::new();
    let card_id = harness.add_card("Sapphire", Some("4242"));
    let message = target_receipt_message("msg-c");
    harness.mailbox.put(message.clone());
    harness.set_storage_connected(false);

    let deferred = finished(harness.pipeline.process_message(&message).unwrap());
    assert_eq!(deferred.status, ReceiptStatus::NeedsReview);
    assert_eq!(deferred.review_reason, Some(ReviewReason::DriveNotConnected));
    assert_eq!(deferred.fields.amount, Some(dec!(42.17)));
    assert_eq!(deferred.fields.merchant.as_deref(), Some("Target"));
    assert_eq!(harness.mailbox.labels_of("msg-c"), vec![LABEL_NEEDS_REVIEW]);

    harness.set_storage_connected(true);
    let processed = finished(harness.pipeline.reprocess(deferred.id).unwrap());

    assert_eq!(processed.id, deferred.id);
    assert_eq!(processed.status, ReceiptStatus::Processed);
    assert_eq!(processed.review_reason, None);
    assert_eq!(processed.resolved_card_id, Some(card_id));
    assert_eq!(processed.retry_count, 1);
    assert!(processed.remote_file_id.is_some());
    assert_eq!(harness.receipt_count(), 1);
}

#[test]
fn blank_scan_is_low_confidence() {
    let harness = TestHarness::new();
    let message = MessageBuilder::new("msg-d")
        .pdf("scan.pdf", blank_scan_pdf(300 * 1024))
        .build();

    let receipt = finished(harness.pipeline.process_message(&message).unwrap());

    assert_eq!(receipt.confidence, 0.0);
    assert_eq!(receipt.status, ReceiptStatus::NeedsReview);
    assert_eq!(receipt.review_reason, Some(ReviewReason::LowConfidence));
    assert_eq!(receipt.fields, ExtractedFields::default());
}

#[test]
fn duplicate_message_is_skipped() {
    let harness = TestHarness::new();
    let message = target_receipt_message("msg-dup");

    let first = finished(harness.pipeline.process_message(&message).unwrap());
    let second = harness.pipeline.process_message(&message).unwrap();

    assert_eq!(
        second,
        RunOutcome::AlreadyClaimed {
            receipt_id: first.id
        }
    );
    assert_eq!(harness.receipt_count(), 1);
}

#[test]
fn resolve_card_remembers_alias_for_next_receipt() {
    let harness = TestHarness::new();
    let card_id = harness.add_card("Sapphire", None);
    let first = target_receipt_message("msg-r1");
    harness.mailbox.put(first.clone());

    let review = finished(harness.pipeline.process_message(&first).unwrap());
    assert_eq!(review.review_reason, Some(ReviewReason::CardNoMatch));

    let outcome = harness
        .pipeline
        .resolve_card(review.id, card_id, true)
        .unwrap();
    assert_eq!(outcome.alias, AliasMemo::Created("4242".to_string()));
    let resolved = finished(outcome.run);
    assert_eq!(resolved.status, ReceiptStatus::Processed);
    assert_eq!(resolved.resolved_card_id, Some(card_id));
    assert!(resolved.card_pinned);

    // The remembered alias resolves the next receipt on its own.
    let second = target_receipt_message("msg-r2");
    let next = finished(harness.pipeline.process_message(&second).unwrap());
    assert_eq!(next.status, ReceiptStatus::Processed);
    assert_eq!(next.resolved_card_id, Some(card_id));
}

#[test]
fn card_last4_resolves_without_alias() {
    let harness = TestHarness::new();
    let card_id = harness.add_card_with_last4("Sapphire", "4242");
    let message = target_receipt_message("msg-last4");

    let receipt = finished(harness.pipeline.process_message(&message).unwrap());

    assert_eq!(receipt.status, ReceiptStatus::Processed);
    assert_eq!(receipt.resolved_card_id, Some(card_id));
}

#[test]
fn resolve_card_after_message_is_gone_stays_in_review() {
    let harness = TestHarness::new();
    let card_id = harness.add_card("Sapphire", None);
    let message = target_receipt_message("msg-vanished");
    harness.mailbox.put(message.clone());

    let review = finished(harness.pipeline.process_message(&message).unwrap());
    assert_eq!(review.review_reason, Some(ReviewReason::CardNoMatch));
    harness.mailbox.remove("msg-vanished");

    let outcome = harness
        .pipeline
        .resolve_card(review.id, card_id, true)
        .unwrap();
    assert_eq!(outcome.alias, AliasMemo::Created("4242".to_string()));
    let after = finished(outcome.run);
    assert_eq!(after.status, ReceiptStatus::NeedsReview);
    assert_eq!(after.review_reason, Some(ReviewReason::MessageUnavailable));
    assert_eq!(after.resolved_card_id, Some(card_id));
    assert_eq!(after.fields.amount, Some(dec!(42.17)));

    // Once the message is back, resolving again files the original PDF.
    harness.mailbox.put(message.clone());
    let outcome = harness
        .pipeline
        .resolve_card(review.id, card_id, false)
        .unwrap();
    let processed = finished(outcome.run);
    assert_eq!(processed.status, ReceiptStatus::Processed);
    assert_eq!(processed.retry_count, 2);
    assert_eq!(
        harness.uploaded(processed.remote_file_id.as_ref().unwrap()),
        message.attachments[0].content
    );
}

#[test]
fn resolve_card_does_not_create_ambiguity() {
    let harness = TestHarness::new();
    let personal = harness.add_card("Personal", Some("4242"));
    let business = harness.add_card("Business", Some("4242"));
    let message = target_receipt_message("msg-amb");
    harness.mailbox.put(message.clone());

    let review = finished(harness.pipeline.process_message(&message).unwrap());
    assert_eq!(review.review_reason, Some(ReviewReason::CardAmbiguous));

    let outcome = harness
        .pipeline
        .resolve_card(review.id, business, true)
        .unwrap();
    match outcome.alias {
        AliasMemo::OwnedByOtherCard { alias, card_ids } => {
            assert_eq!(alias, "4242");
            assert!(card_ids.contains(&personal));
        }
        other => panic!("expected OwnedByOtherCard, got {:?}", other),
    }
    assert_eq!(finished(outcome.run).resolved_card_id, Some(business));
}

#[test]
fn resolve_card_rejects_processed_receipt() {
    let harness = TestHarness::new();
    let card_id = harness.add_card("Sapphire", Some("4242"));
    let message = target_receipt_message("msg-done");

    let receipt = finished(harness.pipeline.process_message(&message).unwrap());
    let err = harness
        .pipeline
        .resolve_card(receipt.id, card_id, false)
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidState { .. }));
    assert!(matches!(
        harness.pipeline.resolve_card(receipt.id, 9999, false),
        Err(PipelineError::CardNotFound(9999))
    ));
}

#[test]
fn edited_fields_survive_reprocess() {
    let harness = TestHarness::new();
    let message = MessageBuilder::new("msg-edit")
        .body("Date: 2024-05-02\nTotal: $7.50")
        .build();
    harness.mailbox.put(message.clone());

    let review = finished(harness.pipeline.process_message(&message).unwrap());
    assert_eq!(review.review_reason, Some(ReviewReason::LowConfidence));
    assert!(review.confidence < 0.75);

    let fields = ExtractedFields {
        merchant: Some("  Corner Bakery ".to_string()),
        ..review.fields.clone()
    };
    let edited = harness.pipeline.edit(review.id, &fields).unwrap();
    assert_eq!(edited.fields.merchant.as_deref(), Some("Corner Bakery"));
    assert_eq!(edited.status, ReceiptStatus::NeedsReview);

    let processed = finished(harness.pipeline.reprocess(review.id).unwrap());
    assert_eq!(processed.status, ReceiptStatus::Processed);
    assert_eq!(processed.fields.merchant.as_deref(), Some("Corner Bakery"));
    assert_eq!(processed.fields.amount, Some(dec!(7.50)));

    // Body-only receipts are filed as a rendered PDF.
    let remote_id = processed.remote_file_id.unwrap();
    assert!(remote_id.starts_with("Receipts/Unmapped_Card/2024/2024-05/"));
    assert!(harness.uploaded(&remote_id).starts_with(b"%PDF"));
}

#[test]
fn missing_source_message_fails_reprocess() {
    let harness = TestHarness::new();
    let message = target_receipt_message("msg-gone");
    harness.mailbox.put(message.clone());

    let review = finished(harness.pipeline.process_message(&message).unwrap());
    harness.mailbox.remove("msg-gone");

    let failed = finished(harness.pipeline.reprocess(review.id).unwrap());
    assert_eq!(failed.status, ReceiptStatus::Failed);
    assert_eq!(failed.review_reason, Some(ReviewReason::MessageUnavailable));

    let jobs = harness.jobs.recent(10).unwrap();
    let reprocess_job = jobs
        .iter()
        .find(|j| j.job_type == JobType::ReprocessReceipt)
        .unwrap();
    assert_eq!(reprocess_job.status, JobStatus::Failed);
}

#[test]
fn unknown_receipt_reprocess_is_an_error_recorded_as_job() {
    let harness = TestHarness::new();

    let err = harness.pipeline.reprocess(4242).unwrap_err();
    assert!(matches!(err, PipelineError::ReceiptNotFound(4242)));

    let jobs = harness.jobs.recent(10).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Failed);
    assert!(jobs[0].error_message.as_deref().unwrap().contains("4242"));
}

#[test]
fn sync_filters_senders_and_counts_outcomes() {
    let harness = TestHarness::with_config(PipelineConfig {
        allowed_senders: vec!["orders@target.com".to_string()],
        ..PipelineConfig::default()
    });
    harness.add_card("Sapphire", Some("4242"));
    harness.mailbox.put(target_receipt_message("msg-1"));
    harness.mailbox.put(
        MessageBuilder::new("msg-2")
            .sender("Spam <deals@spam.example>")
            .body("Total: $1.00")
            .build(),
    );

    let report = harness.pipeline.sync_mailbox().unwrap();
    assert_eq!(report.fetched, 2);
    assert_eq!(report.claimed, 1);
    assert_eq!(report.filtered, 1);
    assert_eq!(report.processed, 1);
    assert!(harness.receipt_for("msg-2").is_none());

    let job = harness.jobs.get(&report.job_id).unwrap().unwrap();
    assert_eq!(job.job_type, JobType::GmailSync);
    assert_eq!(job.status, JobStatus::Completed);

    // Labelled messages are not fetched again.
    let again = harness.pipeline.sync_mailbox().unwrap();
    assert_eq!(again.fetched, 1);
    assert_eq!(again.claimed, 0);
}
