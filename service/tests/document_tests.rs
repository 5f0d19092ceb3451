//! Structured-document persistence tests

mod helpers;

use helpers::metadata_fixtures::*;
use mihcsme_core::{ConditionValue, MihcsmeError};
use mihcsme_service::document::{self, DocumentFormat};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;

/// JSON round trip preserves the metadata set
#[test]
fn test_json_roundtrip() {
    let metadata = full_metadata();
    let json = document::to_json_string(&metadata).unwrap();
    assert_eq!(document::from_json_str(&json).unwrap(), metadata);
}

/// YAML round trip preserves the metadata set
#[test]
fn test_yaml_roundtrip() {
    let metadata = full_metadata();
    let yaml = document::to_yaml_string(&metadata).unwrap();
    assert_eq!(document::from_yaml_str(&yaml).unwrap(), metadata);
}

/// The document uses the section names as top-level fields
#[test]
fn test_top_level_fields() {
    let json = document::to_json_string(&full_metadata()).unwrap();
    let value: Value = serde_json::from_str(&json).unwrap();
    let fields: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();

    assert_eq!(
        fields,
        vec![
            "investigation_information",
            "study_information",
            "assay_information",
            "assay_conditions",
            "annotations",
            "reference_sheets",
        ]
    );
    assert_eq!(value["assay_conditions"][0]["type"], "numeric");
    assert_eq!(value["annotations"][0]["plate"], "Plate1");
    assert_eq!(value["annotations"][0]["well"], "A01");
    assert_eq!(value["annotations"][0]["values"]["Temperature"], 37);
    assert_eq!(
        value["investigation_information"]["DataOwner"]["First Name"],
        "Jane"
    );
}

/// Files are read and written by extension
#[test]
fn test_read_write_files() {
    let temp_dir = TempDir::new().unwrap();
    let metadata = plate_metadata();

    for name in ["metadata.json", "metadata.yaml", "metadata.yml"] {
        let path = temp_dir.path().join(name);
        document::write_document(&metadata, &path).unwrap();
        assert_eq!(document::read_document(&path).unwrap(), metadata, "{name}");
    }
}

/// Unknown extensions are rejected before touching the file
#[test]
fn test_unknown_extension() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("metadata.toml");

    let result = document::write_document(&plate_metadata(), &path);
    assert!(matches!(result, Err(MihcsmeError::Serialization(_))));
    assert!(!path.exists());
    assert!(DocumentFormat::from_path(&path).is_err());
}

/// A well-formed document that breaks the metadata rules is a validation error
#[test]
fn test_invalid_document_is_a_validation_error() {
    let yaml = r"
investigation_information:
  DataOwner:
    First Name: Jane
    Last Name: Doe
  InvestigationInformation:
    Investigation Title: Screen 1
assay_conditions:
  - name: CellLine
    type: categorical
    allowed_values: [HeLa, U2OS]
annotations:
  - well: A1
    values:
      CellLine: HEK293
";
    let Err(MihcsmeError::Validation(error)) = document::from_yaml_str(yaml) else {
        panic!("Expected a validation error");
    };
    assert_eq!(error.issues()[0].path, "AssayConditions[A01].CellLine");
}

/// Hand-written documents are normalized on load
#[test]
fn test_loaded_values_are_normalized() {
    let json = r#"{
        "investigation_information": {
            "DataOwner": {"First Name": " Jane ", "Last Name": "Doe"},
            "InvestigationInformation": {"Investigation Title": "Screen 1"}
        },
        "assay_conditions": [{"name": "Temperature", "type": "numeric"}],
        "annotations": [
            {"well": "b2", "values": {"Temperature": 37.0}},
            {"well": "B3", "values": {"Temperature": "  "}}
        ]
    }"#;

    let metadata = document::from_str(json, DocumentFormat::Json).unwrap();
    assert_eq!(metadata.investigation().data_owner.first_name, "Jane");
    assert_eq!(metadata.annotation_count(), 1);
    assert_eq!(
        metadata.annotation(&id("B02")).unwrap().get("Temperature"),
        Some(&ConditionValue::from(37))
    );
}

/// Malformed JSON is a serialization error
#[test]
fn test_malformed_json() {
    let result = document::from_json_str("{\"annotations\": [");
    assert!(matches!(result, Err(MihcsmeError::Serialization(_))));
}
