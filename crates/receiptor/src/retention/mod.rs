//! Time-based purge of finished receipts.

pub mod sweeper;

pub use sweeper::{RetentionSweeper, SweepReport};
