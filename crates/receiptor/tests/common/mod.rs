//! Shared test utilities for receiptor integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring an in-memory database, a fake mailbox, a local
//!   file store that can be unlinked, and the pipeline on top
//! - Builders for receipt PDFs and messages

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{FakeMailbox, TestHarness};
