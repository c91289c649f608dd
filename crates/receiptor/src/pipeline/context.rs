use crate::attachment::Selection;
use crate::cards::CardResolution;
use crate::extractor::Extraction;
use crate::model::{Message, Receipt};

use super::state::Verdict;

/// State carried through one pipeline run.
pub struct RunContext {
    // Input
    pub message: Message,
    /// The `pending` receipt this run owns.
    pub receipt: Receipt,
    /// `retry_count` at the start of the run; the final write is conditional on it.
    pub run_token: u32,

    // Attachment selection
    pub selection: Selection,
    pub document_text: Option<String>,

    // Extraction
    pub extraction: Extraction,

    // Card resolution
    pub resolution: CardResolution,
    pub card_name: Option<String>,

    // Decision and upload
    pub verdict: Option<Verdict>,
}

impl RunContext {
    pub fn new(message: Message, receipt: Receipt) -> Self {
        let run_token = receipt.retry_count;
        Self {
            message,
            receipt,
            run_token,
            selection: Selection::default(),
            document_text: None,
            extraction: Extraction::default(),
            resolution: CardResolution::NoHint,
            card_name: None,
            verdict: None,
        }
    }

    /// Bytes of the chosen attachment, if one was selected.
    pub fn chosen_document(&self) -> Option<&[u8]> {
        self.selection
            .chosen(&self.message.attachments)
            .map(|a| a.content.as_slice())
    }
}
