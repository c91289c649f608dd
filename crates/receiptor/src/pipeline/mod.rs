//! Receipt state machine and the runner that drives it.

pub mod config;
pub mod context;
pub mod error;
pub mod runner;
pub mod state;

pub use config::PipelineConfig;
pub use context::RunContext;
pub use error::PipelineError;
pub use runner::{AliasMemo, ReceiptPipeline, ResolveCardOutcome, RunOutcome, SyncReport};
pub use state::{can_transition, review_gate, Verdict};
