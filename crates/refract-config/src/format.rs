//! Rules file formats

use crate::RulesFile;
use refract_core::{Error, Result};
use std::fmt;
use std::path::Path;

/// Serialization format of a rules file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulesFormat {
    /// YAML
    Yaml,
    /// TOML
    Toml,
    /// JSON
    Json,
}

impl RulesFormat {
    /// Format named by a file extension, if any
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Guess the format from the document itself
    ///
    /// A leading `{` is JSON and a leading `[table]` header is TOML. Anything
    /// else is read as YAML, which also covers an empty file.
    pub fn sniff(content: &str) -> Self {
        let first = content
            .lines()
            .map(str::trim_start)
            .find(|line| !line.is_empty() && !line.starts_with('#'));

        match first {
            Some(line) if line.starts_with('{') => Self::Json,
            Some(line) if line.starts_with('[') => Self::Toml,
            _ => Self::Yaml,
        }
    }

    /// Pick the format for `path`, falling back to the content
    pub fn detect(path: &Path, content: &str) -> Self {
        Self::from_extension(path).unwrap_or_else(|| Self::sniff(content))
    }

    /// Deserialize a rules file without validating it
    pub(crate) fn parse(self, content: &str) -> Result<RulesFile> {
        let parsed = match self {
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|e| Error::Config(format!("invalid {self} rules: {e}")))
    }
}

impl fmt::Display for RulesFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Yaml => "YAML",
            Self::Toml => "TOML",
            Self::Json => "JSON",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension() {
        assert_eq!(
            RulesFormat::from_extension(Path::new("rules.yml")),
            Some(RulesFormat::Yaml)
        );
        assert_eq!(
            RulesFormat::from_extension(Path::new("/etc/refract/RULES.TOML")),
            Some(RulesFormat::Toml)
        );
        assert_eq!(RulesFormat::from_extension(Path::new("rules.txt")), None);
        assert_eq!(RulesFormat::from_extension(Path::new("rules")), None);
    }

    #[test]
    fn test_sniff() {
        assert_eq!(RulesFormat::sniff("  {\"rules\": []}"), RulesFormat::Json);
        assert_eq!(
            RulesFormat::sniff("# rewrite rules\n\n[[rules]]\nname = \"x\"\n"),
            RulesFormat::Toml
        );
        assert_eq!(RulesFormat::sniff("rules: [ ]\n"), RulesFormat::Yaml);
        assert_eq!(RulesFormat::sniff(""), RulesFormat::Yaml);
    }

    #[test]
    fn test_extension_wins_over_content() {
        let content = "{\"rules\": []}";
        assert_eq!(
            RulesFormat::detect(Path::new("rules.yaml"), content),
            RulesFormat::Yaml
        );
        assert_eq!(
            RulesFormat::detect(Path::new("rules.conf"), content),
            RulesFormat::Json
        );
    }

    #[test]
    fn test_parse_error_names_format() {
        let err = RulesFormat::Toml.parse("[[rules]\n").unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.starts_with("invalid TOML rules")));
    }
}
