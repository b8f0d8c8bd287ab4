//! TOML-based configuration for gridquery.
//!
//! Example configuration:
//! ```toml
//! [resolver]
//! display_name_fallback = true
//! accept_single_candidate = true
//! renamed_field_patterns = ["^sg_"]
//! synthesized_prefix = "Fake"
//!
//! [query]
//! retired_column = "is_retired"
//! max_path_depth = 8
//! name_fields = ["name", "code", "content", "subject", "title"]
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Relationship resolution.
    pub resolver: ResolverSettings,

    /// Path resolution and query planning.
    pub query: QuerySettings,
}

/// Relationship resolver configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Correlate renamed fields by display name when nothing else matched.
    pub display_name_fallback: bool,

    /// Link a single display-name candidate. When false the match is only
    /// reported.
    pub accept_single_candidate: bool,

    /// Regexes marking fields that may have been renamed since creation.
    /// The matched text is stripped before correlating display names.
    pub renamed_field_patterns: Vec<String>,

    /// Prefix of synthesized connection entity names.
    pub synthesized_prefix: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            display_name_fallback: true,
            accept_single_candidate: true,
            renamed_field_patterns: vec!["^sg_".to_string()],
            synthesized_prefix: "Fake".to_string(),
        }
    }
}

impl ResolverSettings {
    /// Compile `renamed_field_patterns`.
    pub fn renamed_patterns(&self) -> Result<Vec<Regex>, SettingsError> {
        self.renamed_field_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    SettingsError::InvalidConfig(format!(
                        "resolver.renamed_field_patterns: '{pattern}': {e}"
                    ))
                })
            })
            .collect()
    }
}

/// Query planning configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Soft-delete column present on every stored entity.
    pub retired_column: String,

    /// Maximum number of field tokens in one dot-path.
    pub max_path_depth: usize,

    /// Candidate fields for the `name` of a linked-entity summary, in
    /// priority order.
    pub name_fields: Vec<String>,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            retired_column: "is_retired".to_string(),
            max_path_depth: 8,
            name_fields: ["name", "code", "content", "subject", "title"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check values serde cannot check.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.resolver.renamed_patterns()?;
        if self.resolver.synthesized_prefix.is_empty() {
            return Err(SettingsError::InvalidConfig(
                "resolver.synthesized_prefix must not be empty".to_string(),
            ));
        }
        if self.query.max_path_depth == 0 {
            return Err(SettingsError::InvalidConfig(
                "query.max_path_depth must be at least 1".to_string(),
            ));
        }
        if self.query.retired_column.is_empty() {
            return Err(SettingsError::InvalidConfig(
                "query.retired_column must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
