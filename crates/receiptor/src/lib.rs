pub mod attachment;
pub mod cards;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod extractor;
pub mod jobs;
pub mod model;
pub mod pipeline;
pub mod retention;
pub mod sanitize;
pub mod storage;
pub mod telemetry;
pub mod worker;

pub use attachment::{AttachmentDecision, AttachmentScore, AttachmentScorer};
pub use cards::{CardResolution, CardResolver};
pub use config::{load_config, load_config_from_str, Config};
pub use db::{Database, DatabaseError};
pub use email::{DirectoryMailSource, EmailError, MailSource};
pub use error::{ConfigError, ReceiptorError, Result, WorkerError};
pub use extractor::{Extraction, FieldExtractor};
pub use jobs::{JobRecorder, JobStore};
pub use model::{
    Attachment, Card, CardAlias, ExtractedFields, Message, Receipt, ReceiptStatus, ReviewReason,
};
pub use pipeline::{
    AliasMemo, PipelineConfig, PipelineError, ReceiptPipeline, ResolveCardOutcome, RunOutcome,
    SyncReport,
};
pub use retention::{RetentionSweeper, SweepReport};
pub use storage::{FileStore, LocalFileStore, UploadError};
pub use telemetry::{init_tracing, LogFormat, TelemetryError};
pub use worker::{WorkItem, WorkResult, WorkerPool};
