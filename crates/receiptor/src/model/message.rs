use chrono::{DateTime, Utc};

const PDF_MIME: &str = "application/pdf";

/// A fetched email message. Immutable once fetched.
#[derive(Debug, Clone, Default)]
pub struct Message {
    /// Provider message id (Gmail id, Message-ID header, file stem...).
    pub id: String,
    /// The From header, e.g. "Target <orders@target.com>".
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    /// Plain-text body, empty when the message had none.
    pub body_text: String,
    /// Attachments in the order they appear in the message.
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Bare address of the sender, lowercased ("orders@target.com").
    pub fn sender_address(&self) -> Option<String> {
        self.sender.as_deref().map(bare_address)
    }
}

/// Extracts the address part of a From header value.
pub fn bare_address(from: &str) -> String {
    let trimmed = from.trim();
    let addr = match (trimmed.rfind('<'), trimmed.rfind('>')) {
        (Some(start), Some(end)) if start < end => &trimmed[start + 1..end],
        _ => trimmed,
    };
    addr.trim().to_lowercase()
}

/// An attachment of a [`Message`]. Never persisted on its own.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub mime_type: String,
    /// Declared size in bytes. May differ from `content.len()` when the
    /// provider reports the size before the body is fetched.
    pub size: u64,
    pub content: Vec<u8>,
}

impl Attachment {
    /// Builds an attachment whose size is the content length.
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, content: Vec<u8>) -> Self {
        let size = content.len() as u64;
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            size,
            content,
        }
    }

    /// True when either the declared MIME type or the filename says PDF.
    ///
    /// Generic declared types (`application/octet-stream`) fall back to
    /// guessing from the filename.
    pub fn is_pdf(&self) -> bool {
        let declared = self.mime_type.to_ascii_lowercase();
        if declared == PDF_MIME || declared == "application/x-pdf" {
            return true;
        }
        if self.filename.to_ascii_lowercase().ends_with(".pdf") {
            return true;
        }
        if declared.is_empty() || declared == "application/octet-stream" {
            return mime_guess::from_path(&self.filename)
                .first()
                .map(|m| m.essence_str() == PDF_MIME)
                .unwrap_or(false);
        }
        false
    }
}
