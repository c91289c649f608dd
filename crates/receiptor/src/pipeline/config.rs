use crate::config::{ConfidenceWeights, Config, CustomPattern};
use crate::model::bare_address;

/// Immutable settings shared by the pipeline, the sweeper and the workers.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub confidence_threshold: f64,
    pub max_attachment_size_mb: u64,
    pub drive_root_folder: String,
    pub default_currency: String,
    /// Normalized bare addresses. Empty accepts every sender.
    pub allowed_senders: Vec<String>,
    pub confidence_weights: ConfidenceWeights,
    pub extra_patterns: Vec<CustomPattern>,
    pub retention_days_processed: u32,
    pub retention_days_review: u32,
    pub sweep_batch_size: usize,
    pub stale_pending_minutes: i64,
    pub worker_count: usize,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            max_attachment_size_mb: config.max_attachment_size_mb,
            drive_root_folder: config.drive_root_folder.clone(),
            default_currency: config.default_currency.clone(),
            allowed_senders: config
                .allowed_senders
                .iter()
                .map(|s| bare_address(s))
                .filter(|s| !s.is_empty())
                .collect(),
            confidence_weights: config.confidence_weights.clone(),
            extra_patterns: config.extra_patterns.clone(),
            retention_days_processed: config.retention_days_processed,
            retention_days_review: config.retention_days_review,
            sweep_batch_size: config.sweep_batch_size.max(1),
            stale_pending_minutes: config.stale_pending_minutes,
            worker_count: config.worker_count.max(1),
        }
    }

    /// Whether a message from `sender` (a From header value) may be claimed.
    pub fn accepts_sender(&self, sender: Option<&str>) -> bool {
        if self.allowed_senders.is_empty() {
            return true;
        }
        match sender.map(bare_address) {
            Some(addr) => self.allowed_senders.iter().any(|a| *a == addr),
            None => false,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
