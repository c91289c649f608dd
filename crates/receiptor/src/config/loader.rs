use std::path::Path;
use std::str::FromStr;

use crate::config::schema::{Config, PatternField};
use crate::error::ConfigError;

/// Environment names recognized by [`apply_env_overrides`].
pub const ENV_CONFIDENCE_THRESHOLD: &str = "CONFIDENCE_THRESHOLD";
pub const ENV_MAX_ATTACHMENT_SIZE_MB: &str = "MAX_ATTACHMENT_SIZE_MB";
pub const ENV_DRIVE_ROOT_FOLDER: &str = "DRIVE_ROOT_FOLDER";
pub const ENV_RETENTION_DAYS_PROCESSED: &str = "RETENTION_DAYS_PROCESSED";
pub const ENV_RETENTION_DAYS_REVIEW: &str = "RETENTION_DAYS_REVIEW";
pub const ENV_DEFAULT_CURRENCY: &str = "DEFAULT_CURRENCY";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

/// Builds a config from defaults plus the process environment.
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    apply_env_overrides(Config::default(), |name| std::env::var(name).ok())
}

/// Layers environment-style overrides on top of `config` and re-validates.
///
/// `lookup` maps a variable name to its value; pass `std::env::var` in
/// production and a map in tests.
pub fn apply_env_overrides<F>(mut config: Config, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup(ENV_CONFIDENCE_THRESHOLD) {
        config.confidence_threshold = parse_override(ENV_CONFIDENCE_THRESHOLD, &v)?;
    }
    if let Some(v) = lookup(ENV_MAX_ATTACHMENT_SIZE_MB) {
        config.max_attachment_size_mb = parse_override(ENV_MAX_ATTACHMENT_SIZE_MB, &v)?;
    }
    if let Some(v) = lookup(ENV_DRIVE_ROOT_FOLDER) {
        config.drive_root_folder = v.trim().to_string();
    }
    if let Some(v) = lookup(ENV_RETENTION_DAYS_PROCESSED) {
        config.retention_days_processed = parse_override(ENV_RETENTION_DAYS_PROCESSED, &v)?;
    }
    if let Some(v) = lookup(ENV_RETENTION_DAYS_REVIEW) {
        config.retention_days_review = parse_override(ENV_RETENTION_DAYS_REVIEW, &v)?;
    }
    if let Some(v) = lookup(ENV_DEFAULT_CURRENCY) {
        config.default_currency = v.trim().to_uppercase();
    }

    validate_config(&config)?;
    Ok(config)
}

fn parse_override<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidOverride {
            name: name.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if !(config.confidence_threshold > 0.0 && config.confidence_threshold <= 1.0) {
        return Err(ConfigError::Validation {
            message: format!(
                "confidence_threshold must be in (0, 1], got {}",
                config.confidence_threshold
            ),
        });
    }

    if config.max_attachment_size_mb == 0 {
        return Err(ConfigError::Validation {
            message: "max_attachment_size_mb must be greater than 0".to_string(),
        });
    }

    if config.retention_days_processed == 0 || config.retention_days_review == 0 {
        return Err(ConfigError::Validation {
            message: "retention windows must be at least one day".to_string(),
        });
    }

    if config.drive_root_folder.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "drive_root_folder must not be empty".to_string(),
        });
    }

    let currency = &config.default_currency;
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ConfigError::Validation {
            message: format!("default_currency must be a 3-letter code, got '{}'", currency),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be greater than 0".to_string(),
        });
    }

    if config.sweep_batch_size == 0 {
        return Err(ConfigError::Validation {
            message: "sweep_batch_size must be greater than 0".to_string(),
        });
    }

    let weights = &config.confidence_weights;
    let all = [
        weights.merchant,
        weights.purchase_date,
        weights.amount,
        weights.currency,
        weights.card,
        weights.missing_mandatory_cap,
    ];
    if all.iter().any(|w| !(0.0..=1.0).contains(w)) {
        return Err(ConfigError::Validation {
            message: "confidence weights must be within [0, 1]".to_string(),
        });
    }
    if weights.mandatory_total() < config.confidence_threshold {
        return Err(ConfigError::Validation {
            message: format!(
                "mandatory field weights sum to {:.2}, below confidence_threshold {:.2}",
                weights.mandatory_total(),
                config.confidence_threshold
            ),
        });
    }
    if weights.missing_mandatory_cap >= config.confidence_threshold {
        return Err(ConfigError::Validation {
            message: format!(
                "missing_mandatory_cap {:.2} must be below confidence_threshold {:.2}",
                weights.missing_mandatory_cap, config.confidence_threshold
            ),
        });
    }

    for custom in &config.extra_patterns {
        validate_pattern(custom.field, &custom.pattern)?;
    }

    Ok(())
}

fn validate_pattern(field: PatternField, pattern: &str) -> Result<(), ConfigError> {
    let regex = regex::Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        field: field.as_str().to_string(),
        reason: e.to_string(),
    })?;

    if !regex.capture_names().flatten().any(|name| name == "value") {
        return Err(ConfigError::InvalidPattern {
            field: field.as_str().to_string(),
            reason: "pattern must contain a named capture group 'value'".to_string(),
        });
    }

    Ok(())
}
