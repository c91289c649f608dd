//! Email parsing: raw RFC 822 bytes into a [`Message`].

use chrono::DateTime;
use log::debug;
use mail_parser::{MessageParser, MimeHeaders, PartType};

use crate::model::{Attachment, Message};

use super::error::{EmailError, Result};

/// Parses a raw email. `fallback_id` is used when there is no Message-ID.
pub fn parse_message(raw_email: &[u8], fallback_id: &str) -> Result<Message> {
    let parsed = MessageParser::default()
        .parse(raw_email)
        .ok_or_else(|| EmailError::ParseError("Failed to parse email message".to_string()))?;

    let id = parsed
        .message_id()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback_id.to_string());

    let sender = parsed
        .from()
        .and_then(|addr| addr.first().map(format_address));
    let subject = parsed.subject().map(|s| s.to_string());
    let received_at = parsed
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0));
    let body_text = parsed
        .body_text(0)
        .map(|t| t.into_owned())
        .unwrap_or_default();

    let mut attachments = Vec::new();
    for part in parsed.parts.iter() {
        if !is_attachment(part) {
            continue;
        }

        let content = match &part.body {
            PartType::Binary(data) | PartType::InlineBinary(data) => data.to_vec(),
            PartType::Text(text) => text.as_bytes().to_vec(),
            PartType::Html(html) => html.as_bytes().to_vec(),
            _ => continue,
        };

        let mime_type = part
            .content_type()
            .map(|ct| {
                if let Some(subtype) = ct.subtype() {
                    format!("{}/{}", ct.ctype(), subtype)
                } else {
                    ct.ctype().to_string()
                }
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let filename = attachment_filename(part, &mime_type);

        debug!(
            "Found attachment: {} ({}, {} bytes)",
            filename,
            mime_type,
            content.len()
        );
        attachments.push(Attachment::new(filename, mime_type, content));
    }

    Ok(Message {
        id,
        sender,
        subject,
        received_at,
        body_text,
        attachments,
    })
}

/// Checks if a message part is an attachment.
fn is_attachment(part: &mail_parser::MessagePart) -> bool {
    if let Some(disposition) = part.content_disposition() {
        if disposition.ctype() == "attachment" {
            return true;
        }
    }

    if part.attachment_name().is_some() {
        return true;
    }

    // Non-text leaf parts (application/pdf without a disposition, etc).
    if let Some(content_type) = part.content_type() {
        let ctype = content_type.ctype();
        if ctype != "text"
            && ctype != "multipart"
            && ctype != "message"
            && content_type.subtype().is_some()
        {
            return true;
        }
    }

    false
}

fn attachment_filename(part: &mail_parser::MessagePart, mime_type: &str) -> String {
    let raw_filename = part
        .attachment_name()
        .or_else(|| part.content_type().and_then(|ct| ct.attribute("name")))
        .map(|s| s.to_string());

    match raw_filename {
        Some(name) if !name.trim().is_empty() => {
            crate::sanitize::sanitize_path_component(&name, "attachment")
        }
        _ => {
            let extension = mime_guess::get_mime_extensions_str(mime_type)
                .and_then(|exts| exts.first())
                .copied()
                .unwrap_or("bin");
            format!("attachment.{}", extension)
        }
    }
}

/// Formats an email address for display.
/// If the address has a display name, formats as "Name <email@example.com>".
/// Otherwise, returns just the email address.
fn format_address(addr: &mail_parser::Addr) -> String {
    if let Some(name) = addr.name() {
        format!("{} <{}>", name, addr.address().unwrap_or_default())
    } else {
        addr.address().unwrap_or_default().to_string()
    }
}
