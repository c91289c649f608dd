//! Renders plain text into a minimal PDF so body-only receipts can be filed.

use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use thiserror::Error;

const LINES_PER_PAGE: usize = 60;
const TOP_Y: i64 = 742;
const LEADING: i64 = 12;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to render PDF: {0}")]
    Pdf(String),
}

/// Builds a Letter-sized PDF with one line of text per output line.
///
/// Characters outside WinAnsi are replaced with `?`.
pub fn render_text_pdf(text: &str) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let font_id = doc.new_object_id();
    let resources_id = doc.new_object_id();

    doc.objects.insert(
        font_id,
        Object::Dictionary(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        }),
    );

    doc.objects.insert(
        resources_id,
        Object::Dictionary(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        }),
    );

    let lines: Vec<&str> = text.lines().collect();
    let chunks: Vec<&[&str]> = if lines.is_empty() {
        vec![&[][..]]
    } else {
        lines.chunks(LINES_PER_PAGE).collect()
    };

    let mut page_ids: Vec<ObjectId> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let content_id = doc.add_object(Stream::new(dictionary! {}, page_content(chunk)));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    let count = page_ids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.into_iter().map(Object::from).collect::<Vec<_>>(),
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;

    Ok(buffer)
}

/// Each line gets its own text object so extractors see line breaks.
fn page_content(lines: &[&str]) -> Vec<u8> {
    let mut content = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let y = TOP_Y - (i as i64) * LEADING;
        content.extend_from_slice(format!("BT\n/F1 10 Tf\n50 {} Td\n(", y).as_bytes());
        content.extend(encode_pdf_string(line));
        content.extend_from_slice(b") Tj\nET\n");
    }
    content
}

fn encode_pdf_string(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(c as u8);
            }
            '\t' => out.push(b' '),
            c if c.is_ascii() && !c.is_control() => out.push(c as u8),
            '€' => out.push(0x80),
            c if ('\u{a0}'..='\u{ff}').contains(&c) => out.push(c as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out
}
