//! Upload layout: `{root}/{card}/{YYYY}/{YYYY-MM}/{date}_{merchant}_{amount}_{currency}_{message}.pdf`.

use chrono::NaiveDate;

use crate::model::ExtractedFields;
use crate::sanitize::sanitize_path_component;

/// Folder used when a receipt has no resolved card.
pub const UNMAPPED_CARD_FOLDER: &str = "Unmapped_Card";

/// Folder for a receipt, relative to the store root.
///
/// `date` is the purchase date, or the best fallback the caller has.
pub fn upload_folder(root: &str, card_name: Option<&str>, date: NaiveDate) -> String {
    let root = root
        .split('/')
        .filter(|s| !s.trim().is_empty())
        .map(|s| sanitize_path_component(s, "Receipts"))
        .collect::<Vec<_>>()
        .join("/");
    let card = card_name
        .map(|c| sanitize_path_component(c, UNMAPPED_CARD_FOLDER))
        .unwrap_or_else(|| UNMAPPED_CARD_FOLDER.to_string());

    format!(
        "{}/{}/{}/{}",
        root,
        card,
        date.format("%Y"),
        date.format("%Y-%m")
    )
}

/// File name for a receipt document.
pub fn upload_filename(fields: &ExtractedFields, default_currency: &str, message_id: &str) -> String {
    let date = fields
        .purchase_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "0000-00-00".to_string());
    let merchant = fields
        .merchant
        .as_deref()
        .map(|m| truncate(sanitize_path_component(m, "Unknown"), 40))
        .unwrap_or_else(|| "Unknown".to_string());
    let amount = fields
        .amount
        .map(|a| format!("{:.2}", a))
        .unwrap_or_else(|| "0.00".to_string());
    let currency = sanitize_path_component(
        fields.currency.as_deref().unwrap_or(default_currency),
        default_currency,
    );
    let message = truncate(sanitize_path_component(message_id, "message"), 80);

    format!("{}_{}_{}_{}_{}.pdf", date, merchant, amount, currency, message)
}

fn truncate(value: String, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value
    } else {
        value.chars().take(max_chars).collect()
    }
}
