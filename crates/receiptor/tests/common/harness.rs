//! Test harness for isolated pipeline runs.
//!
//! The `TestHarness` struct wires a complete environment:
//! - In-memory SQLite database with all migrations applied
//! - `FakeMailbox` holding messages and labels in memory
//! - `LocalFileStore` under a temp directory that can be unlinked
//! - `JobStore` and the `ReceiptPipeline` on top

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tempfile::TempDir;

use receiptor::db::{card_repo, receipt_repo, Database};
use receiptor::email::{EmailError, LabelOutcome, MailSource};
use receiptor::jobs::JobStore;
use receiptor::model::{Message, NewCard, Receipt};
use receiptor::pipeline::{PipelineConfig, ReceiptPipeline};
use receiptor::storage::LocalFileStore;

/// In-memory mailbox. Re-applying a label answers with a conflict, the way
/// a remote label API does.
#[derive(Default)]
pub struct FakeMailbox {
    messages: Mutex<HashMap<String, Message>>,
    labels: Mutex<HashMap<String, HashSet<String>>>,
}

impl FakeMailbox {
    pub fn put(&self, message: Message) {
        self.messages
            .lock()
            .unwrap()
            .insert(message.id.clone(), message);
    }

    pub fn remove(&self, message_id: &str) {
        self.messages.lock().unwrap().remove(message_id);
    }

    pub fn labels_of(&self, message_id: &str) -> Vec<String> {
        let mut labels: Vec<String> = self
            .labels
            .lock()
            .unwrap()
            .get(message_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        labels.sort();
        labels
    }
}

impl MailSource for FakeMailbox {
    fn fetch_new_messages(&self) -> Result<Vec<Message>, EmailError> {
        let labels = self.labels.lock().unwrap();
        let mut fresh: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .values()
            .filter(|m| labels.get(&m.id).map(|l| l.is_empty()).unwrap_or(true))
            .cloned()
            .collect();
        fresh.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(fresh)
    }

    fn fetch_message(&self, message_id: &str) -> Result<Option<Message>, EmailError> {
        Ok(self.messages.lock().unwrap().get(message_id).cloned())
    }

    fn apply_label(&self, message_id: &str, label: &str) -> Result<LabelOutcome, EmailError> {
        let mut labels = self.labels.lock().unwrap();
        if !labels
            .entry(message_id.to_string())
            .or_default()
            .insert(label.to_string())
        {
            return Err(EmailError::LabelConflict {
                message_id: message_id.to_string(),
                label: label.to_string(),
            });
        }
        Ok(LabelOutcome::Applied)
    }
}

/// Test harness providing an isolated pipeline for integration tests.
pub struct TestHarness {
    /// Upload root for the file store.
    temp_dir: TempDir,
    pub db: Database,
    pub mailbox: Arc<FakeMailbox>,
    pub store: Arc<LocalFileStore>,
    pub jobs: Arc<JobStore>,
    pub pipeline: Arc<ReceiptPipeline>,
}

impl TestHarness {
    /// Harness with the default pipeline configuration.
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open_in_memory().expect("Failed to open database");
        let mailbox = Arc::new(FakeMailbox::default());
        let store = Arc::new(LocalFileStore::new(temp_dir.path()));
        let jobs = Arc::new(JobStore::new(db.clone()));
        let pipeline = Arc::new(ReceiptPipeline::new(
            Arc::new(config),
            db.clone(),
            mailbox.clone(),
            store.clone(),
            jobs.clone(),
        ));

        Self {
            temp_dir,
            db,
            mailbox,
            store,
            jobs,
            pipeline,
        }
    }

    /// Creates a card, optionally with one alias, and returns its id.
    pub fn add_card(&self, display_name: &str, alias: Option<&str>) -> i64 {
        let now = Utc::now();
        let card = card_repo::insert_card(
            &self.db,
            &NewCard {
                display_name: display_name.to_string(),
                ..Default::default()
            },
            now,
        )
        .expect("Failed to insert card");
        if let Some(alias) = alias {
            card_repo::insert_alias(&self.db, card.id, alias, now).expect("Failed to add alias");
        }
        card.id
    }

    /// Creates a card whose own last-4 identifies it, without any alias.
    pub fn add_card_with_last4(&self, display_name: &str, last4: &str) -> i64 {
        card_repo::insert_card(
            &self.db,
            &NewCard {
                display_name: display_name.to_string(),
                last4: Some(last4.to_string()),
                ..Default::default()
            },
            Utc::now(),
        )
        .expect("Failed to insert card")
        .id
    }

    /// Links or unlinks the file store.
    pub fn set_storage_connected(&self, connected: bool) {
        self.store.set_connected(connected);
    }

    pub fn receipt(&self, id: i64) -> Receipt {
        receipt_repo::find_by_id(&self.db, id)
            .expect("Failed to load receipt")
            .expect("Receipt not found")
    }

    pub fn receipt_for(&self, message_id: &str) -> Option<Receipt> {
        receipt_repo::find_by_message_id(&self.db, message_id).expect("Failed to load receipt")
    }

    /// Number of receipt rows in the database.
    pub fn receipt_count(&self) -> i64 {
        self.db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM receipts", [], |r| r.get(0))?)
            })
            .expect("Failed to count receipts")
    }

    /// Reads back an uploaded file by its remote id.
    pub fn uploaded(&self, remote_id: &str) -> Vec<u8> {
        std::fs::read(self.store.path_of(remote_id)).expect("Failed to read uploaded file")
    }
}
