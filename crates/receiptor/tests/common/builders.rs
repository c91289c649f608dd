//! Builders for test messages and receipt documents.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use lopdf::{dictionary, Document, Stream};

use receiptor::model::{Attachment, Message};
use receiptor::storage::render_text_pdf;

/// Text layer of the reference receipt used by the end-to-end tests.
pub const TARGET_RECEIPT_TEXT: &str =
    "MERCHANT: Target\nDATE: 2024-03-01\nTOTAL: $42.17\nCARD ENDING IN 4242";

/// Renders `text` into a PDF and pads it with an unreferenced stream until it
/// is at least `min_size` bytes. The padding carries no text.
pub fn receipt_pdf(text: &str, min_size: usize) -> Vec<u8> {
    let rendered = render_text_pdf(text).expect("render receipt pdf");
    if rendered.len() >= min_size {
        return rendered;
    }

    let mut doc = Document::load_mem(&rendered).expect("reload rendered pdf");
    let padding = vec![b' '; min_size - rendered.len()];
    doc.add_object(Stream::new(dictionary! {}, padding));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("save padded pdf");
    assert!(buffer.len() >= min_size);
    buffer
}

/// A scanned page: valid PDF, no text layer.
pub fn blank_scan_pdf(min_size: usize) -> Vec<u8> {
    receipt_pdf("", min_size)
}

/// Builder for [`Message`] values.
pub struct MessageBuilder {
    message: Message,
}

impl MessageBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            message: Message {
                sender: Some("Target <orders@target.com>".to_string()),
                subject: Some("Your Target receipt".to_string()),
                received_at: Utc.with_ymd_and_hms(2024, 3, 2, 9, 30, 0).single(),
                ..Message::new(id)
            },
        }
    }

    pub fn sender(mut self, sender: &str) -> Self {
        self.message.sender = Some(sender.to_string());
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.message.body_text = body.to_string();
        self
    }

    pub fn pdf(mut self, filename: &str, content: Vec<u8>) -> Self {
        self.message
            .attachments
            .push(Attachment::new(filename, "application/pdf", content));
        self
    }

    pub fn attachment(mut self, filename: &str, mime_type: &str, content: Vec<u8>) -> Self {
        self.message
            .attachments
            .push(Attachment::new(filename, mime_type, content));
        self
    }

    pub fn build(self) -> Message {
        self.message
    }
}

/// A Target receipt: `invoice_target.pdf` of about 1.2 MB.
pub fn target_receipt_message(id: &str) -> Message {
    MessageBuilder::new(id)
        .body("Thanks for shopping with us.")
        .pdf("invoice_target.pdf", receipt_pdf(TARGET_RECEIPT_TEXT, 1_200_000))
        .build()
}

/// Raw RFC 822 text for a body-only receipt, as stored in an `.eml` file.
pub fn receipt_eml(message_id: &str, sender: &str, body: &str) -> String {
    format!(
        "From: {}\r\nTo: me@example.com\r\nSubject: Your receipt\r\nMessage-ID: <{}>\r\nDate: Sat, 2 Mar 2024 09:30:00 +0000\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
        sender,
        message_id,
        body.replace('\n', "\r\n")
    )
}
