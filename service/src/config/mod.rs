//! Configuration loading for the MIHCSME service
//!
//! This module provides configuration loading from YAML files with
//! environment variable substitution support.

use crate::remote::ChildPolicy;
use mihcsme_core::{MihcsmeError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Default base namespace for remote annotations
pub const DEFAULT_NAMESPACE_BASE: &str = "MIHCSME";

/// Load configuration from `YAML` file with environment variable substitution
///
/// # Errors
///
/// Returns `MihcsmeError::Io` if the file cannot be read
/// Returns `MihcsmeError::Config` if the YAML cannot be parsed
pub fn load_config<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)?;
    let substituted = substitute_env_vars(&contents);
    serde_yaml::from_str(&substituted)
        .map_err(|e| MihcsmeError::config(format!("Failed to parse YAML config: {e}")))
}

/// Load and validate the service configuration
///
/// # Errors
///
/// Returns `MihcsmeError::Config` when the file is malformed or fails validation
pub fn load_service_config(path: &Path) -> Result<MihcsmeConfig> {
    let config: MihcsmeConfig = load_config(path)?;
    config.validate()?;
    Ok(config)
}

/// Substitute environment variables in the format `${VAR:-default}`
pub(crate) fn substitute_env_vars(content: &str) -> String {
    let Ok(re) = regex::Regex::new(r"\$\{([^}:]+)(?::(-)?([^}]*))?\}") else {
        return content.to_string();
    };

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default_value = caps.get(3).map_or("", |m| m.as_str());

        env::var(var_name).unwrap_or_else(|_| default_value.to_string())
    })
    .to_string()
}

/// Complete MIHCSME service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MihcsmeConfig {
    /// Remote annotation namespaces
    pub namespace: NamespaceConfig,
    /// Spreadsheet parser settings
    pub parser: ParserConfig,
    /// Spreadsheet writer settings
    pub writer: WriterConfig,
    /// Upload settings
    pub upload: UploadConfig,
}

impl MihcsmeConfig {
    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `MihcsmeError::Config` listing every invalid setting
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.namespace.base.trim().is_empty() {
            problems.push("namespace.base must not be empty");
        }
        if self.namespace.base.ends_with('/') {
            problems.push("namespace.base must not end with '/'");
        }
        if self.parser.comment_prefix.is_empty() {
            problems.push("parser.comment_prefix must not be empty");
        } else if crate::sheets::LEADING_HEADERS
            .iter()
            .any(|header| header.starts_with(&self.parser.comment_prefix))
        {
            problems.push("parser.comment_prefix must not match the start of a sheet header");
        }
        if self.writer.column_width <= 0.0 || !self.writer.column_width.is_finite() {
            problems.push("writer.column_width must be a positive number");
        }
        if parse_hex_color(&self.writer.header_background).is_none() {
            problems.push("writer.header_background must be an RGB hex color");
        }
        if parse_hex_color(&self.writer.header_text).is_none() {
            problems.push("writer.header_text must be an RGB hex color");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(MihcsmeError::config(format!(
                "Configuration validation failed:\n- {}",
                problems.join("\n- ")
            )))
        }
    }
}

/// Namespace configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    /// Base namespace; container and child namespaces are derived from it
    pub base: String,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            base: DEFAULT_NAMESPACE_BASE.to_string(),
        }
    }
}

/// Spreadsheet parser configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Rows whose first cell starts with this prefix are skipped; the writer
    /// refuses metadata whose leading cells start with it
    pub comment_prefix: String,
    /// Declare every annotation column as `text` when the definitions sheet is missing
    pub infer_missing_definitions: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            comment_prefix: "#".to_string(),
            infer_missing_definitions: false,
        }
    }
}

/// Spreadsheet writer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Width of every written column
    pub column_width: f64,
    /// Header row background color (RGB hex)
    pub header_background: String,
    /// Header row text color (RGB hex)
    pub header_text: String,
    /// Keep header rows visible while scrolling
    pub freeze_headers: bool,
    /// Attach dropdowns and numeric ranges to condition columns
    pub add_validation: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            column_width: 24.0,
            header_background: "4472C4".to_string(),
            header_text: "FFFFFF".to_string(),
            freeze_headers: true,
            add_validation: true,
        }
    }
}

impl WriterConfig {
    /// Header background as RGB
    #[must_use]
    pub fn header_background_rgb(&self) -> u32 {
        parse_hex_color(&self.header_background).unwrap_or(0x0044_72C4)
    }

    /// Header text as RGB
    #[must_use]
    pub fn header_text_rgb(&self) -> u32 {
        parse_hex_color(&self.header_text).unwrap_or(0x00FF_FFFF)
    }
}

/// Upload configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// How existing child annotations are treated; must be chosen explicitly
    pub child_policy: Option<ChildPolicy>,
}

fn parse_hex_color(hex: &str) -> Option<u32> {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}
