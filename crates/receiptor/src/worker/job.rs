use crate::model::Message;
use crate::pipeline::{PipelineError, RunOutcome};

/// A unit of work for the [`WorkerPool`](super::WorkerPool).
#[derive(Debug, Clone)]
pub enum WorkItem {
    /// Claim and process a freshly fetched message.
    Process(Message),
    /// Re-run an existing receipt.
    Reprocess { receipt_id: i64 },
}

impl WorkItem {
    /// Short label for logs.
    pub fn describe(&self) -> String {
        match self {
            WorkItem::Process(message) => {
                format!("process message {}", crate::sanitize::hash_id(&message.id))
            }
            WorkItem::Reprocess { receipt_id } => format!("reprocess receipt {}", receipt_id),
        }
    }
}

/// Result of one [`WorkItem`].
#[derive(Debug)]
pub struct WorkResult {
    pub item: WorkItem,
    pub outcome: Result<RunOutcome, PipelineError>,
}

impl WorkResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}
