/// Marker lopdf emits for CID fonts it cannot decode.
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Text shorter than this is accepted regardless of composition.
const MIN_TOTAL_CHARS: usize = 50;

/// Below this alphanumeric share the text is treated as garbage.
const MIN_ALPHANUMERIC_PERCENT: usize = 10;

/// Extracts the text layer of a PDF.
///
/// Returns `None` when the document cannot be parsed or its text layer is
/// empty or garbled. Scanned receipts land here; they are not OCR'd.
pub fn extract_pdf_text(pdf_bytes: &[u8]) -> Option<String> {
    let _span = tracing::debug_span!("extractor.pdf_text", bytes = pdf_bytes.len()).entered();

    let doc = match lopdf::Document::load_mem(pdf_bytes) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!("Could not parse PDF attachment: {}", e);
            return None;
        }
    };

    let mut text = String::new();
    for (page_num, _) in doc.get_pages() {
        if let Ok(page_text) = doc.extract_text(&[page_num]) {
            text.push_str(&page_text);
            text.push('\n');
        }
    }

    if is_usable_text(&text) {
        Some(text)
    } else {
        tracing::debug!("PDF text layer is empty or unreadable");
        None
    }
}

/// False for empty text, text that is only font-decoding markers, or text
/// with a very low share of alphanumeric characters.
pub fn is_usable_text(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }

    let cleaned = trimmed
        .replace(IDENTITY_H_PATTERN, "")
        .replace(['\n', ' '], "");
    if cleaned.is_empty() {
        return false;
    }

    let total_chars = trimmed.chars().count();
    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();

    !(total_chars > MIN_TOTAL_CHARS
        && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT)
}
