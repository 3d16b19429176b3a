//! Configuration validation

use crate::{RuleConfig, RulesFile};
use refract_core::{Error, Result};
use regex::Regex;

/// Validate a rules file
pub fn validate_config(config: &RulesFile) -> Result<()> {
    validate_pipeline(config)?;

    for (index, rule) in config.rules.iter().enumerate() {
        validate_rule(rule, index)?;
    }

    Ok(())
}

fn validate_pipeline(config: &RulesFile) -> Result<()> {
    let pipeline = &config.pipeline;

    if pipeline.channel_capacity == 0 {
        return Err(Error::Config("channel_capacity must be > 0".to_string()));
    }

    if pipeline.max_body_size == Some(0) {
        return Err(Error::Config("max_body_size must be > 0 when set".to_string()));
    }

    if pipeline.compression.level > 9 {
        return Err(Error::Config(format!(
            "Invalid compression level: {} (must be 0-9)",
            pipeline.compression.level
        )));
    }

    Ok(())
}

fn validate_rule(rule: &RuleConfig, index: usize) -> Result<()> {
    let name = rule.display_name(index);

    if rule.replace.is_empty() && rule.json.is_empty() {
        return Err(Error::configuration(
            name,
            "rule needs at least one `replace` or `json` entry",
        ));
    }

    if rule.replace.iter().any(|r| r.from.is_empty()) {
        return Err(Error::configuration(name, "replace `from` cannot be empty"));
    }

    if let Some(when) = &rule.when {
        if let Some(pattern) = &when.path_regex {
            Regex::new(pattern).map_err(|e| {
                Error::configuration(name.clone(), format!("invalid path_regex: {e}"))
            })?;
        }

        if let Some(status) = when.status {
            if !(100..=999).contains(&status) {
                return Err(Error::configuration(
                    name,
                    format!("invalid status code: {status}"),
                ));
            }
        }

        if let Some(method) = &when.method {
            if http_method_is_invalid(method) {
                return Err(Error::configuration(
                    name,
                    format!("invalid method: {method}"),
                ));
            }
        }
    }

    Ok(())
}

fn http_method_is_invalid(method: &str) -> bool {
    method.is_empty() || !method.bytes().all(|b| b.is_ascii_alphabetic())
}
