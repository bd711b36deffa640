use crate::config::types::{lexical, Config, CrawlerConfig, EngineKind, Target};
use crate::ConfigError;
use std::collections::{HashMap, HashSet};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;

    if config.targets.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[target]] must be configured".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for target in &config.targets {
        validate_target(target)?;
        if !names.insert(target.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate target name '{}'",
                target.name
            )));
        }
    }

    validate_output_dirs(config)
}

/// Two sub-runs may never share an output directory (and its metadata file)
fn validate_output_dirs(config: &Config) -> Result<(), ConfigError> {
    let mut owners: HashMap<std::path::PathBuf, &str> = HashMap::new();
    for target in &config.targets {
        let dir = lexical(&config.default_output_dir(target));
        if let Some(other) = owners.insert(dir.clone(), target.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "targets '{}' and '{}' both write to {}",
                other,
                target.name,
                dir.display()
            )));
        }
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1".to_string(),
        ));
    }

    if config.retry_count < 1 {
        return Err(ConfigError::Validation(format!(
            "retry-count must be >= 1, got {}",
            config.retry_count
        )));
    }

    if config.fetch_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.checkpoint_every < 1 {
        return Err(ConfigError::Validation(
            "checkpoint-every must be >= 1".to_string(),
        ));
    }

    if config.recycle_every < 1 {
        return Err(ConfigError::Validation(
            "recycle-every must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates a single target entry
///
/// The start URL is left to the sub-run, which fails on its own with
/// `InvalidStartUrl` without taking its siblings down.
fn validate_target(target: &Target) -> Result<(), ConfigError> {
    validate_target_name(&target.name)?;

    for prefix in &target.allowed_prefixes {
        validate_http_url(prefix).map_err(|e| {
            ConfigError::InvalidUrl(format!("allowed prefix of '{}': {}", target.name, e))
        })?;
    }

    if target.max_pages == Some(0) {
        return Err(ConfigError::Validation(format!(
            "max-pages of '{}' must be >= 1",
            target.name
        )));
    }

    if target.kind == EngineKind::Api
        && target.api_path_prefix.is_empty()
        && target.api_suffix.is_empty()
    {
        return Err(ConfigError::Validation(format!(
            "api target '{}' needs api-path-prefix or api-suffix",
            target.name
        )));
    }

    Ok(())
}

/// Target names become directory names
fn validate_target_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "target name cannot be empty".to_string(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "target name must contain only [a-z0-9-_], got '{}'",
            name
        )));
    }

    Ok(())
}

fn validate_http_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("'{}': {}", raw, e))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("'{}' must use http or https", raw));
    }

    if url.host_str().is_none() {
        return Err(format!("'{}' has no host", raw));
    }

    Ok(())
}
