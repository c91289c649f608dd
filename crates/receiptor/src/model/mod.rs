//! Domain types shared by the pipeline, the store and the collaborators.

pub mod card;
pub mod job;
pub mod message;
pub mod receipt;

pub use card::{normalize_alias, Card, CardAlias, NewCard};
pub use job::{JobOutcome, JobRecord, JobStatus, JobType};
pub use message::{bare_address, Attachment, Message};
pub use receipt::{ExtractedFields, Receipt, ReceiptStatus, ReviewReason};
