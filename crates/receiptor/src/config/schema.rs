use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Minimum confidence for automatic acceptance.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Attachments larger than this are never considered.
    #[serde(default = "default_max_attachment_size_mb")]
    pub max_attachment_size_mb: u64,
    /// Top-level upload folder.
    #[serde(default = "default_drive_root_folder")]
    pub drive_root_folder: String,
    #[serde(default = "default_retention_days_processed")]
    pub retention_days_processed: u32,
    /// Window for `needs_review` and `failed` receipts.
    #[serde(default = "default_retention_days_review")]
    pub retention_days_review: u32,
    /// Currency assumed when an amount carries no symbol or code.
    #[serde(default = "default_currency")]
    pub default_currency: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Bare sender addresses to accept. Empty accepts everyone.
    #[serde(default)]
    pub allowed_senders: Vec<String>,
    #[serde(default)]
    pub confidence_weights: ConfidenceWeights,
    /// Site-specific patterns tried before the built-in table.
    #[serde(default)]
    pub extra_patterns: Vec<CustomPattern>,
    /// Maximum rows removed per retention delete statement.
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: usize,
    /// Age after which a `pending` receipt is reported as stuck.
    #[serde(default = "default_stale_pending_minutes")]
    pub stale_pending_minutes: i64,
    #[serde(default)]
    pub database_path: Option<String>,
}

fn default_confidence_threshold() -> f64 {
    0.75
}

fn default_max_attachment_size_mb() -> u64 {
    25
}

fn default_drive_root_folder() -> String {
    "Receipts".to_string()
}

fn default_retention_days_processed() -> u32 {
    45
}

fn default_retention_days_review() -> u32 {
    90
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_sweep_batch_size() -> usize {
    500
}

fn default_stale_pending_minutes() -> i64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            max_attachment_size_mb: default_max_attachment_size_mb(),
            drive_root_folder: default_drive_root_folder(),
            retention_days_processed: default_retention_days_processed(),
            retention_days_review: default_retention_days_review(),
            default_currency: default_currency(),
            worker_count: default_worker_count(),
            allowed_senders: Vec::new(),
            confidence_weights: ConfidenceWeights::default(),
            extra_patterns: Vec::new(),
            sweep_batch_size: default_sweep_batch_size(),
            stale_pending_minutes: default_stale_pending_minutes(),
            database_path: None,
        }
    }
}

impl Config {
    /// Defaults plus overrides from the process environment.
    pub fn from_env() -> Result<Self, crate::error::ConfigError> {
        super::loader::load_config_from_env()
    }
}

/// Weight each populated field contributes to the confidence score.
///
/// `merchant`, `purchase_date` and `amount` are mandatory. When any of them is
/// missing the score is capped at `missing_mandatory_cap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    #[serde(default = "default_merchant_weight")]
    pub merchant: f64,
    #[serde(default = "default_purchase_date_weight")]
    pub purchase_date: f64,
    #[serde(default = "default_amount_weight")]
    pub amount: f64,
    /// Only counted when the currency was stated, not defaulted.
    #[serde(default = "default_currency_weight")]
    pub currency: f64,
    #[serde(default = "default_card_weight")]
    pub card: f64,
    #[serde(default = "default_missing_mandatory_cap")]
    pub missing_mandatory_cap: f64,
}

fn default_merchant_weight() -> f64 {
    0.25
}

fn default_purchase_date_weight() -> f64 {
    0.25
}

fn default_amount_weight() -> f64 {
    0.30
}

fn default_currency_weight() -> f64 {
    0.05
}

fn default_card_weight() -> f64 {
    0.15
}

fn default_missing_mandatory_cap() -> f64 {
    0.60
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            merchant: default_merchant_weight(),
            purchase_date: default_purchase_date_weight(),
            amount: default_amount_weight(),
            currency: default_currency_weight(),
            card: default_card_weight(),
            missing_mandatory_cap: default_missing_mandatory_cap(),
        }
    }
}

impl ConfidenceWeights {
    pub fn mandatory_total(&self) -> f64 {
        self.merchant + self.purchase_date + self.amount
    }
}

/// Field an extraction pattern populates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternField {
    Merchant,
    PurchaseDate,
    Amount,
    CardLast4,
    CardIssuer,
}

impl PatternField {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternField::Merchant => "merchant",
            PatternField::PurchaseDate => "purchase_date",
            PatternField::Amount => "amount",
            PatternField::CardLast4 => "card_last4",
            PatternField::CardIssuer => "card_issuer",
        }
    }
}

/// User-supplied regex. Must capture `(?P<value>...)`; amount patterns may
/// also capture `(?P<currency>...)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomPattern {
    pub field: PatternField,
    pub pattern: String,
}
