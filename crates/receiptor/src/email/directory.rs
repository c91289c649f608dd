//! A [`MailSource`] over a directory of `.eml` files.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, warn};
use walkdir::WalkDir;

use crate::model::Message;
use crate::sanitize::redact_path;

use super::error::{EmailError, Result};
use super::parser::parse_message;
use super::source::{LabelOutcome, MailSource};

/// Reads every `*.eml` file under a root directory.
///
/// Labels are kept in memory. A message counts as new until the pipeline
/// labels it. Re-applying a label reports [`EmailError::LabelConflict`], the
/// way a remote API answers 409.
pub struct DirectoryMailSource {
    root: PathBuf,
    /// message id → file it was read from.
    index: Mutex<HashMap<String, PathBuf>>,
    labels: Mutex<HashMap<String, HashSet<String>>>,
}

impl DirectoryMailSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: Mutex::new(HashMap::new()),
            labels: Mutex::new(HashMap::new()),
        }
    }

    /// Labels currently applied to a message.
    pub fn labels_of(&self, message_id: &str) -> Vec<String> {
        let labels = match self.labels.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut found: Vec<String> = labels
            .get(message_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        found.sort();
        found
    }

    fn scan(&self) -> Result<Vec<(PathBuf, Message)>> {
        if !self.root.is_dir() {
            return Err(EmailError::Unavailable(format!(
                "mail directory '{}' does not exist",
                self.root.display()
            )));
        }

        let mut messages = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !is_eml(path) {
                continue;
            }
            match read_message(path) {
                Ok(message) => messages.push((path.to_path_buf(), message)),
                Err(e) => warn!("Skipping unreadable message {}: {}", redact_path(path), e),
            }
        }

        let mut index = self
            .index
            .lock()
            .map_err(|_| EmailError::Unavailable("mail index lock poisoned".to_string()))?;
        for (path, message) in &messages {
            index.insert(message.id.clone(), path.clone());
        }

        Ok(messages)
    }
}

fn is_eml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("eml"))
        .unwrap_or(false)
}

fn read_message(path: &Path) -> Result<Message> {
    let raw = std::fs::read(path).map_err(|e| EmailError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let fallback_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("message");
    parse_message(&raw, fallback_id)
}

impl MailSource for DirectoryMailSource {
    fn fetch_new_messages(&self) -> Result<Vec<Message>> {
        let scanned = self.scan()?;
        let labels = self
            .labels
            .lock()
            .map_err(|_| EmailError::Unavailable("label lock poisoned".to_string()))?;

        let fresh: Vec<Message> = scanned
            .into_iter()
            .map(|(_, m)| m)
            .filter(|m| labels.get(&m.id).map(|l| l.is_empty()).unwrap_or(true))
            .collect();

        debug!(
            "Found {} unlabelled messages in {}",
            fresh.len(),
            redact_path(&self.root)
        );
        Ok(fresh)
    }

    fn fetch_message(&self, message_id: &str) -> Result<Option<Message>> {
        let known = self
            .index
            .lock()
            .map_err(|_| EmailError::Unavailable("mail index lock poisoned".to_string()))?
            .get(message_id)
            .cloned();

        if let Some(path) = known {
            if path.is_file() {
                let message = read_message(&path)?;
                if message.id == message_id {
                    return Ok(Some(message));
                }
            }
        }

        // File moved or never indexed: rescan.
        Ok(self
            .scan()?
            .into_iter()
            .map(|(_, m)| m)
            .find(|m| m.id == message_id))
    }

    fn apply_label(&self, message_id: &str, label: &str) -> Result<LabelOutcome> {
        let known = self
            .index
            .lock()
            .map_err(|_| EmailError::Unavailable("mail index lock poisoned".to_string()))?
            .contains_key(message_id);
        if !known {
            return Err(EmailError::NotFound(message_id.to_string()));
        }

        let mut labels = self
            .labels
            .lock()
            .map_err(|_| EmailError::Unavailable("label lock poisoned".to_string()))?;
        let set = labels.entry(message_id.to_string()).or_default();
        if !set.insert(label.to_string()) {
            return Err(EmailError::LabelConflict {
                message_id: message_id.to_string(),
                label: label.to_string(),
            });
        }
        Ok(LabelOutcome::Applied)
    }
}
