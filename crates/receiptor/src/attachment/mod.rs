//! Picks the attachment most likely to be the receipt.

pub mod scorer;

pub use scorer::{AttachmentDecision, AttachmentScore, AttachmentScorer, Selection};
