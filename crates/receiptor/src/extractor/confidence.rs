use crate::config::ConfidenceWeights;
use crate::model::ExtractedFields;

/// Scores how complete an extraction is, in [0, 1].
///
/// Each populated field adds its weight. Currency only counts when it was
/// stated in the text. If merchant, date or amount is missing the score is
/// capped at `weights.missing_mandatory_cap`.
pub fn score(fields: &ExtractedFields, currency_explicit: bool, weights: &ConfidenceWeights) -> f64 {
    let mut total = 0.0;

    if fields.merchant.is_some() {
        total += weights.merchant;
    }
    if fields.purchase_date.is_some() {
        total += weights.purchase_date;
    }
    if fields.amount.is_some() {
        total += weights.amount;
    }
    if currency_explicit && fields.currency.is_some() {
        total += weights.currency;
    }
    if fields.card_last4_seen.is_some() || fields.card_issuer_seen.is_some() {
        total += weights.card;
    }

    if !has_mandatory_fields(fields) {
        total = total.min(weights.missing_mandatory_cap);
    }

    round4(total.clamp(0.0, 1.0))
}

pub fn has_mandatory_fields(fields: &ExtractedFields) -> bool {
    fields.merchant.is_some() && fields.purchase_date.is_some() && fields.amount.is_some()
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
