//! # Refract Configuration
//!
//! Declarative rule files for the rewriting pipeline.
//!
//! A rules file is YAML, TOML or JSON. The format comes from the file
//! extension, or from the content when the extension says nothing. `${VAR}`
//! references are expanded before parsing and every file is validated before
//! it is handed out.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod format;
pub mod loader;
pub mod types;
pub mod validator;

pub use format::RulesFormat;
pub use loader::{load_config, load_from_str};
pub use refract_encoding::CompressionConfig;
pub use types::{
    ConditionConfig, HeaderCondition, JsonOperation, PipelineConfig, ReplaceConfig, RuleConfig,
    RulesFile,
};
pub use validator::validate_config;
