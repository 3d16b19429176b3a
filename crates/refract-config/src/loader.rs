//! Rules file loading

use crate::validator::validate_config;
use crate::{RulesFile, RulesFormat};
use refract_core::{Error, Result};
use regex::{Captures, Regex};
use std::env;
use std::fs;
use std::path::Path;

/// Read, parse and validate the rules file at `path`
///
/// Read and parse errors are prefixed with the path. Rule errors name the
/// offending rule.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RulesFile> {
    let path = path.as_ref();

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
    let format = RulesFormat::detect(path, &content);

    let file = load_from_str(&content, format).map_err(|e| match e {
        Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
        other => other,
    })?;

    tracing::debug!(
        path = %path.display(),
        format = %format,
        rules = file.rules.len(),
        "Rules file loaded"
    );

    Ok(file)
}

/// Parse and validate a rules document
pub fn load_from_str(content: &str, format: RulesFormat) -> Result<RulesFile> {
    let expanded = expand_env_vars(content)?;
    let file = format.parse(&expanded)?;
    validate_config(&file)?;
    Ok(file)
}

/// Substitute `${VAR}` and `${VAR:-default}`; `$${VAR}` stays literal
///
/// Every unset variable without a default is named in the error.
fn expand_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$(\$?)\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .map_err(|e| Error::Config(format!("Invalid regex: {e}")))?;

    let mut missing: Vec<String> = Vec::new();
    let expanded = re.replace_all(content, |caps: &Captures<'_>| {
        if !caps[1].is_empty() {
            return caps[0][1..].to_string();
        }

        let name = &caps[2];
        match (env::var(name), caps.get(3)) {
            (Ok(value), _) => value,
            (Err(_), Some(default)) => default.as_str().to_string(),
            (Err(_), None) => {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(Error::Config(format!(
            "unset environment variables without a default: {}",
            missing.join(", ")
        )));
    }

    Ok(expanded.into_owned())
}
