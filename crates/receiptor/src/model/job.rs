use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    GmailSync,
    ProcessReceipt,
    ReprocessReceipt,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::GmailSync => "gmail_sync",
            JobType::ProcessReceipt => "process_receipt",
            JobType::ReprocessReceipt => "reprocess_receipt",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "gmail_sync" => Some(JobType::GmailSync),
            "process_receipt" => Some(JobType::ProcessReceipt),
            "reprocess_receipt" => Some(JobType::ReprocessReceipt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

/// Durable record of one job run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub details: Option<String>,
    pub error_message: Option<String>,
}

/// Final state reported for a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed { details: String },
    Failed { error: String },
}

impl JobOutcome {
    pub fn completed(details: impl Into<String>) -> Self {
        JobOutcome::Completed {
            details: details.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        JobOutcome::Failed {
            error: error.into(),
        }
    }

    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed { .. } => JobStatus::Completed,
            JobOutcome::Failed { .. } => JobStatus::Failed,
        }
    }
}
