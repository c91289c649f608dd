use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A physical payment card. Created by an operator, never by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub display_name: String,
    pub last4: Option<String>,
    pub issuer: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a [`Card`].
#[derive(Debug, Clone, Default)]
pub struct NewCard {
    pub display_name: String,
    pub last4: Option<String>,
    pub issuer: Option<String>,
}

/// Text fragment that identifies a card when it appears in a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardAlias {
    pub id: i64,
    pub card_id: i64,
    /// Normalized alias text (trimmed, lowercased).
    pub alias: String,
    pub created_at: DateTime<Utc>,
}

/// Normalizes alias text so lookups are exact but case-insensitive.
pub fn normalize_alias(text: &str) -> String {
    text.trim().to_lowercase()
}
