use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::Attachment;

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;

/// Filename keywords and the score they add. Matched as whole words against
/// the normalized name.
const KEYWORDS: &[(&str, i32)] = &[
    ("receipt", 100),
    ("payment receipt", 40),
    ("order receipt", 40),
    ("purchase receipt", 40),
    ("transaction receipt", 40),
    ("invoice", 60),
    ("purchase", 20),
    ("order", 20),
    ("payment", 20),
    ("transaction", 20),
    ("statement", -60),
    ("quote", -60),
    ("estimate", -60),
    ("packing slip", -60),
    ("proforma", -60),
];

/// What happened to one attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentDecision {
    Selected,
    /// Eligible but outscored.
    CandidateRejected,
    /// Not a PDF, or over the size limit.
    Ineligible,
}

impl AttachmentDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentDecision::Selected => "selected",
            AttachmentDecision::CandidateRejected => "candidate_rejected",
            AttachmentDecision::Ineligible => "ineligible",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "selected" => Some(AttachmentDecision::Selected),
            "candidate_rejected" => Some(AttachmentDecision::CandidateRejected),
            "ineligible" => Some(AttachmentDecision::Ineligible),
            _ => None,
        }
    }
}

/// Audit entry for one attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentScore {
    /// Position in the message.
    pub index: usize,
    pub filename: String,
    pub score: i32,
    pub decision: AttachmentDecision,
    pub reason: String,
}

/// Result of [`AttachmentScorer::select`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Index of the chosen attachment; `None` when nothing was eligible.
    pub chosen: Option<usize>,
    /// One entry per attachment, in message order.
    pub scores: Vec<AttachmentScore>,
}

impl Selection {
    pub fn chosen<'a>(&self, attachments: &'a [Attachment]) -> Option<&'a Attachment> {
        self.chosen.and_then(|i| attachments.get(i))
    }
}

pub struct AttachmentScorer {
    max_size_bytes: u64,
    keywords: Vec<(Regex, i32, &'static str)>,
}

impl AttachmentScorer {
    pub fn new(max_attachment_size_mb: u64) -> Self {
        let keywords = KEYWORDS
            .iter()
            .filter_map(|(word, weight)| {
                let pattern = format!(r"\b{}\b", regex::escape(word));
                Regex::new(&pattern).ok().map(|re| (re, *weight, *word))
            })
            .collect();

        Self {
            max_size_bytes: max_attachment_size_mb.saturating_mul(MB),
            keywords,
        }
    }

    /// Scores every attachment and picks the highest-scoring eligible one.
    /// Ties go to the earliest attachment.
    pub fn select(&self, attachments: &[Attachment]) -> Selection {
        let mut scores = Vec::with_capacity(attachments.len());
        let mut best: Option<(usize, i32)> = None;

        for (index, attachment) in attachments.iter().enumerate() {
            if let Some(why) = self.ineligibility(attachment) {
                scores.push(AttachmentScore {
                    index,
                    filename: attachment.filename.clone(),
                    score: 0,
                    decision: AttachmentDecision::Ineligible,
                    reason: why,
                });
                continue;
            }

            let (score, reasons) = self.score(attachment);
            if best.map(|(_, top)| score > top).unwrap_or(true) {
                best = Some((index, score));
            }
            scores.push(AttachmentScore {
                index,
                filename: attachment.filename.clone(),
                score,
                decision: AttachmentDecision::CandidateRejected,
                reason: reasons.join("; "),
            });
        }

        let chosen = best.map(|(index, _)| index);
        for entry in scores.iter_mut() {
            if entry.decision == AttachmentDecision::Ineligible {
                continue;
            }
            if Some(entry.index) == chosen {
                entry.decision = AttachmentDecision::Selected;
                entry.reason.push_str(" | selected as best receipt PDF");
            } else {
                entry.reason.push_str(" | lower score than selected");
            }
        }

        debug!(
            "Scored {} attachments, chosen: {:?}",
            attachments.len(),
            chosen
        );
        Selection { chosen, scores }
    }

    fn ineligibility(&self, attachment: &Attachment) -> Option<String> {
        if !attachment.is_pdf() {
            return Some(format!("not a PDF ({})", attachment.mime_type));
        }
        if attachment.size > self.max_size_bytes {
            return Some(format!(
                "exceeds size limit ({} > {} bytes)",
                attachment.size, self.max_size_bytes
            ));
        }
        None
    }

    fn score(&self, attachment: &Attachment) -> (i32, Vec<String>) {
        let normalized = normalize_filename(&attachment.filename);
        let mut score = 0;
        let mut reasons = Vec::new();

        for (re, weight, word) in &self.keywords {
            if re.is_match(&normalized) {
                score += weight;
                reasons.push(format!("{:+} keyword '{}'", weight, word));
            }
        }
        if reasons.is_empty() {
            reasons.push("no keywords matched".to_string());
        }

        let (size_score, size_reason) = size_signal(attachment.size);
        score += size_score;
        reasons.push(size_reason);

        (score, reasons)
    }
}

/// Lowercase, strip extension, replace `_` and `-` with spaces.
fn normalize_filename(filename: &str) -> String {
    let stem = match filename.rfind('.') {
        Some(dot) if dot > 0 => &filename[..dot],
        _ => filename,
    };
    stem.to_lowercase()
        .replace(['_', '-'], " ")
        .trim()
        .to_string()
}

/// Tiny files are usually logos or blank pages; past a typical receipt
/// size, extra bytes stop adding confidence.
fn size_signal(size: u64) -> (i32, String) {
    let score = match size {
        s if s < KB => -50,
        s if s < 10 * KB => -20,
        s if s <= 2 * MB => 20,
        s if s <= 10 * MB => 10,
        _ => 0,
    };
    (score, format!("{:+} size {} bytes", score, size))
}
