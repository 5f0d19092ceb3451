//! Structured-document persistence
//!
//! A metadata set is stored as its [`MetadataDocument`] form in JSON or YAML.
//! Reading always goes through full validation.

use mihcsme_core::{MetadataDocument, MetadataSet, MihcsmeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Serialization format of a metadata document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// JSON
    Json,
    /// YAML
    Yaml,
}

impl DocumentFormat {
    /// Format implied by a file extension (`.json`, `.yaml`, `.yml`)
    ///
    /// # Errors
    ///
    /// Returns `MihcsmeError::Serialization` for any other extension
    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Ok(Self::Json),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            _ => Err(MihcsmeError::serialization(format!(
                "cannot infer document format of '{}' (expected .json, .yaml or .yml)",
                path.display()
            ))),
        }
    }
}

/// Serialize to pretty JSON
///
/// # Errors
///
/// Returns `MihcsmeError::Serialization` if serialization fails
pub fn to_json_string(metadata: &MetadataSet) -> Result<String> {
    Ok(serde_json::to_string_pretty(&metadata.to_document())?)
}

/// Deserialize and validate JSON
///
/// # Errors
///
/// Returns `MihcsmeError::Serialization` for malformed JSON and
/// `MihcsmeError::Validation` when the content violates the metadata rules
pub fn from_json_str(json: &str) -> Result<MetadataSet> {
    let document: MetadataDocument = serde_json::from_str(json)?;
    Ok(MetadataSet::from_document(document)?)
}

/// Serialize to YAML
///
/// # Errors
///
/// Returns `MihcsmeError::Serialization` if serialization fails
pub fn to_yaml_string(metadata: &MetadataSet) -> Result<String> {
    Ok(serde_yaml::to_string(&metadata.to_document())?)
}

/// Deserialize and validate YAML
///
/// # Errors
///
/// Returns `MihcsmeError::Serialization` for malformed YAML and
/// `MihcsmeError::Validation` when the content violates the metadata rules
pub fn from_yaml_str(yaml: &str) -> Result<MetadataSet> {
    let document: MetadataDocument = serde_yaml::from_str(yaml)?;
    Ok(MetadataSet::from_document(document)?)
}

/// Serialize in the given format
///
/// # Errors
///
/// Returns `MihcsmeError::Serialization` if serialization fails
pub fn to_string(metadata: &MetadataSet, format: DocumentFormat) -> Result<String> {
    match format {
        DocumentFormat::Json => to_json_string(metadata),
        DocumentFormat::Yaml => to_yaml_string(metadata),
    }
}

/// Deserialize and validate in the given format
///
/// # Errors
///
/// See [`from_json_str`] and [`from_yaml_str`]
pub fn from_str(content: &str, format: DocumentFormat) -> Result<MetadataSet> {
    match format {
        DocumentFormat::Json => from_json_str(content),
        DocumentFormat::Yaml => from_yaml_str(content),
    }
}

/// Read a document file, choosing the format by extension
///
/// # Errors
///
/// Returns `MihcsmeError::Io` if the file cannot be read, otherwise see [`from_str`]
pub fn read_document(path: &Path) -> Result<MetadataSet> {
    let format = DocumentFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    let metadata = from_str(&content, format)?;
    info!(
        "Read metadata document {}: {} annotations",
        path.display(),
        metadata.annotation_count()
    );
    Ok(metadata)
}

/// Write a document file, choosing the format by extension
///
/// # Errors
///
/// Returns `MihcsmeError::Io` if the file cannot be written, otherwise see [`to_string`]
pub fn write_document(metadata: &MetadataSet, path: &Path) -> Result<()> {
    let format = DocumentFormat::from_path(path)?;
    std::fs::write(path, to_string(metadata, format)?)?;
    info!("Wrote metadata document {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.JSON")).ok(), Some(DocumentFormat::Json));
        assert_eq!(DocumentFormat::from_path(Path::new("a.yml")).ok(), Some(DocumentFormat::Yaml));
        assert!(matches!(
            DocumentFormat::from_path(Path::new("a.xlsx")),
            Err(MihcsmeError::Serialization(_))
        ));
    }

    #[test]
    fn test_malformed_json_is_a_serialization_error() {
        assert!(matches!(from_json_str("{"), Err(MihcsmeError::Serialization(_))));
    }
}
