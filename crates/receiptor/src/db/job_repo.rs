//! Job repository: CRUD operations for the `jobs` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{format_timestamp, parse_opt_timestamp, parse_timestamp, Database, DatabaseError};
use crate::model::{JobRecord, JobStatus, JobType};

/// A raw job row from the database.
#[derive(Debug, Clone)]
struct JobRow {
    id: String,
    job_type: String,
    status: String,
    started_at: String,
    completed_at: Option<String>,
    details: Option<String>,
    error_message: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_type: row.get("job_type")?,
            status: row.get("status")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
            details: row.get("details")?,
            error_message: row.get("error_message")?,
        })
    }

    fn into_record(self) -> Result<JobRecord, DatabaseError> {
        let job_type = JobType::parse(&self.job_type).ok_or(DatabaseError::InvalidData {
            column: "job_type",
            value: self.job_type.clone(),
        })?;
        let status = JobStatus::parse(&self.status).ok_or(DatabaseError::InvalidData {
            column: "status",
            value: self.status.clone(),
        })?;
        Ok(JobRecord {
            id: self.id,
            job_type,
            status,
            started_at: parse_timestamp("started_at", &self.started_at)?,
            completed_at: parse_opt_timestamp("completed_at", self.completed_at)?,
            details: self.details,
            error_message: self.error_message,
        })
    }
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRecord) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, job_type, status, started_at, completed_at, details, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                job.id,
                job.job_type.as_str(),
                job.status.as_str(),
                format_timestamp(&job.started_at),
                job.completed_at.as_ref().map(format_timestamp),
                job.details,
                job.error_message,
            ],
        )?;
        Ok(())
    })
}

/// Marks a job finished. Returns `false` if no such job exists.
pub fn finish(
    db: &Database,
    id: &str,
    status: JobStatus,
    details: Option<&str>,
    error_message: Option<&str>,
    completed_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = ?2, completed_at = ?3,
             details = COALESCE(?4, details), error_message = ?5
             WHERE id = ?1",
            params![
                id,
                status.as_str(),
                format_timestamp(&completed_at),
                details,
                error_message,
            ],
        )?;
        Ok(changed > 0)
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRecord>, DatabaseError> {
    db.with_conn(|conn| {
        conn.query_row("SELECT * FROM jobs WHERE id = ?1", params![id], JobRow::from_row)
            .optional()?
            .map(JobRow::into_record)
            .transpose()
    })
}

/// Lists the most recently started jobs.
pub fn list_recent(db: &Database, limit: u64) -> Result<Vec<JobRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM jobs ORDER BY started_at DESC, rowid DESC LIMIT ?1")?;
        let rows = stmt
            .query_map(params![limit as i64], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(JobRow::into_record).collect()
    })
}
