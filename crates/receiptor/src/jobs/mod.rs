//! Job records: one durable row per sync, process or reprocess run.

use chrono::Utc;
use thiserror::Error;

use crate::db::job_repo;
use crate::db::{Database, DatabaseError};
use crate::model::{JobOutcome, JobRecord, JobStatus, JobType};

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job store error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Unknown job: {0}")]
    UnknownJob(String),
}

/// Records the start and end of every unit of pipeline work.
pub trait JobRecorder: Send + Sync {
    /// Opens a `running` job and returns its id.
    fn start(&self, job_type: JobType, details: Option<&str>) -> Result<String, JobError>;

    /// Closes the job with its final status.
    fn finish(&self, job_id: &str, outcome: &JobOutcome) -> Result<(), JobError>;
}

/// [`JobRecorder`] backed by the `jobs` table.
#[derive(Clone)]
pub struct JobStore {
    db: Database,
}

impl JobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn get(&self, job_id: &str) -> Result<Option<JobRecord>, JobError> {
        Ok(job_repo::find_by_id(&self.db, job_id)?)
    }

    /// Most recently started jobs, newest first.
    pub fn recent(&self, limit: u64) -> Result<Vec<JobRecord>, JobError> {
        Ok(job_repo::list_recent(&self.db, limit)?)
    }
}

impl JobRecorder for JobStore {
    fn start(&self, job_type: JobType, details: Option<&str>) -> Result<String, JobError> {
        let record = JobRecord {
            id: uuid::Uuid::new_v4().to_string(),
            job_type,
            status: JobStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            details: details.map(str::to_string),
            error_message: None,
        };
        job_repo::insert(&self.db, &record)?;
        log::debug!("Started {} job {}", job_type.as_str(), record.id);
        Ok(record.id)
    }

    fn finish(&self, job_id: &str, outcome: &JobOutcome) -> Result<(), JobError> {
        let (details, error) = match outcome {
            JobOutcome::Completed { details } => (Some(details.as_str()), None),
            JobOutcome::Failed { error } => (None, Some(error.as_str())),
        };
        let found = job_repo::finish(
            &self.db,
            job_id,
            outcome.status(),
            details,
            error,
            Utc::now(),
        )?;
        if !found {
            return Err(JobError::UnknownJob(job_id.to_string()));
        }
        if let Some(error) = error {
            log::warn!("Job {} failed: {}", job_id, error);
        }
        Ok(())
    }
}
