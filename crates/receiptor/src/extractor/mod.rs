//! Turns message and document text into typed receipt fields.

pub mod confidence;
pub mod patterns;
pub mod pdf;

pub use confidence::has_mandatory_fields;
pub use patterns::{FieldValue, PatternTable};
pub use pdf::{extract_pdf_text, is_usable_text};

use crate::config::{ConfidenceWeights, CustomPattern, PatternField};
use crate::model::ExtractedFields;

/// Number of non-empty document lines searched for a letterhead merchant.
const DOCUMENT_HEAD_LINES: usize = 5;

/// Output of [`FieldExtractor::extract`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub fields: ExtractedFields,
    pub confidence: f64,
    /// True when the currency came from the text rather than the default.
    pub currency_explicit: bool,
}

pub struct FieldExtractor {
    table: PatternTable,
    weights: ConfidenceWeights,
    default_currency: String,
}

impl FieldExtractor {
    pub fn new(
        weights: ConfidenceWeights,
        default_currency: impl Into<String>,
        extra_patterns: &[CustomPattern],
    ) -> Self {
        Self {
            table: PatternTable::new(extra_patterns),
            weights,
            default_currency: default_currency.into(),
        }
    }

    /// Extracts fields from the document text (if any) followed by the body.
    ///
    /// Never fails: missing values stay `None` and lower the confidence.
    pub fn extract(&self, body_text: &str, document_text: Option<&str>) -> Extraction {
        let _span = tracing::debug_span!("extractor.extract").entered();

        let document = document_text.unwrap_or("");
        let combined = if document.is_empty() {
            body_text.to_string()
        } else {
            format!("{}\n{}", document, body_text)
        };
        let head = document_head(document);

        let mut fields = ExtractedFields::default();
        let mut currency_explicit = false;

        for field in [
            PatternField::Merchant,
            PatternField::PurchaseDate,
            PatternField::Amount,
            PatternField::CardLast4,
            PatternField::CardIssuer,
        ] {
            let Some((value, rule)) = self.table.first_match(field, &combined, &head) else {
                continue;
            };
            tracing::trace!(field = field.as_str(), rule, "Pattern matched");

            match (field, value) {
                (PatternField::Merchant, FieldValue::Text(s)) => fields.merchant = Some(s),
                (PatternField::PurchaseDate, FieldValue::Date(d)) => fields.purchase_date = Some(d),
                (PatternField::Amount, FieldValue::Amount { value, currency }) => {
                    fields.amount = Some(value);
                    currency_explicit = currency.is_some();
                    fields.currency =
                        Some(currency.unwrap_or_else(|| self.default_currency.clone()));
                }
                (PatternField::CardLast4, FieldValue::Text(s)) => fields.card_last4_seen = Some(s),
                (PatternField::CardIssuer, FieldValue::Text(s)) => {
                    fields.card_issuer_seen = Some(s)
                }
                _ => {}
            }
        }

        let confidence = self.score(&fields, currency_explicit);
        tracing::debug!(
            confidence,
            merchant = fields.merchant.is_some(),
            date = fields.purchase_date.is_some(),
            amount = fields.amount.is_some(),
            "Extraction finished"
        );

        Extraction {
            fields,
            confidence,
            currency_explicit,
        }
    }

    pub fn score(&self, fields: &ExtractedFields, currency_explicit: bool) -> f64 {
        confidence::score(fields, currency_explicit, &self.weights)
    }

    pub fn default_currency(&self) -> &str {
        &self.default_currency
    }
}

fn document_head(document: &str) -> String {
    document
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(DOCUMENT_HEAD_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}
