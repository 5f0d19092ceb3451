//! Integration tests for the metadata spreadsheet parser

mod helpers;

use helpers::metadata_fixtures::*;
use mihcsme_core::{ConditionValue, IssueKind, MihcsmeError};
use mihcsme_service::config::ParserConfig;
use mihcsme_service::sheets::MetadataSheetsParser;
use pretty_assertions::assert_eq;
use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

fn parse(bytes: Vec<u8>) -> mihcsme_core::Result<mihcsme_service::sheets::ParsedWorkbook> {
    MetadataSheetsParser::new().parse_bytes(bytes)
}

/// Workbook with the standard investigation and definitions plus `rows` as the annotation table
fn workbook_with_annotations(rows: &[&[Cell<'_>]]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    add_investigation(&mut workbook).unwrap();
    add_definitions(&mut workbook).unwrap();
    add_sheet(&mut workbook, "AssayConditions", rows).unwrap();
    workbook.save_to_buffer().unwrap()
}

/// A well written as `A1` is read as `A01` with typed values
#[test]
fn test_parse_scenario_workbook() {
    let parsed = parse(scenario_workbook("HeLa").unwrap()).unwrap();
    let metadata = parsed.metadata;

    assert_eq!(metadata.annotation_count(), 1);
    let values = metadata.annotation(&id("A01")).expect("A01 should be annotated");
    assert_eq!(values.get("Temperature"), Some(&ConditionValue::from(37)));
    assert_eq!(values.get("CellLine"), Some(&ConditionValue::from("HeLa")));

    let investigation = metadata.investigation();
    assert_eq!(investigation.data_owner.first_name, "Jane");
    assert_eq!(investigation.investigation.title, "Screen 1");
    assert_eq!(metadata.conditions().len(), 2);
    assert!(parsed.warnings.is_empty(), "unexpected warnings: {:?}", parsed.warnings);
}

/// Parsing from a file gives the same result as parsing from memory
#[test]
fn test_parse_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("metadata.xlsx");
    std::fs::write(&path, scenario_workbook("U2OS").unwrap()).unwrap();

    let from_file = MetadataSheetsParser::new().parse_file(&path).unwrap();
    let from_bytes = parse(scenario_workbook("U2OS").unwrap()).unwrap();
    assert_eq!(from_file.metadata, from_bytes.metadata);
}

/// A value outside the categorical set is a validation error pointing at the row
#[test]
fn test_value_outside_allowed_set() {
    let Err(MihcsmeError::Validation(error)) = parse(scenario_workbook("HEK293").unwrap()) else {
        panic!("Expected a validation error");
    };

    assert_eq!(error.len(), 1);
    let issue = &error.issues()[0];
    assert_eq!(issue.path, "AssayConditions[A01].CellLine");
    assert_eq!(issue.location.as_deref(), Some("AssayConditions row 2"));
    assert!(issue.reason.contains("HEK293"), "reason was: {}", issue.reason);
}

/// A numeric value above the declared maximum is rejected
#[test]
fn test_value_outside_numeric_range() {
    let bytes = workbook_with_annotations(&[
        &[Text("Well"), Text("Temperature"), Text("CellLine")],
        &[Text("A1"), Number(37.0), Text("HeLa")],
        &[Text("B3"), Number(95.0), Text("HeLa")],
    ]);

    let Err(MihcsmeError::Validation(error)) = parse(bytes) else {
        panic!("Expected a validation error");
    };
    assert_eq!(error.issues()[0].path, "AssayConditions[B03].Temperature");
    assert_eq!(error.issues()[0].location.as_deref(), Some("AssayConditions row 3"));
}

/// An annotation column without a definition is structural
#[test]
fn test_undeclared_column() {
    let bytes = workbook_with_annotations(&[
        &[Text("Well"), Text("Temperature"), Text("Humidity")],
        &[Text("A1"), Number(37.0), Number(60.0)],
    ]);

    let Err(MihcsmeError::Parse(error)) = parse(bytes) else {
        panic!("Expected a parse error");
    };
    let issue = error
        .issues()
        .iter()
        .find(|i| i.field.as_deref() == Some("Humidity"))
        .expect("Humidity should be reported");
    assert_eq!(issue.kind, IssueKind::Structure);
    assert_eq!(issue.row, Some(1));
}

/// `A1` and `A01` name the same well
#[test]
fn test_duplicate_identifier() {
    let bytes = workbook_with_annotations(&[
        &[Text("Well"), Text("Temperature")],
        &[Text("A1"), Number(37.0)],
        &[Text("A01"), Number(30.0)],
    ]);

    let Err(MihcsmeError::Parse(error)) = parse(bytes) else {
        panic!("Expected a parse error");
    };
    assert_eq!(error.issues().len(), 1);
    assert_eq!(error.issues()[0].row, Some(3));
    assert!(error.issues()[0].reason.contains("duplicate identifier A01"));
}

/// A malformed well coordinate is reported with its row
#[test]
fn test_malformed_well() {
    let bytes = workbook_with_annotations(&[
        &[Text("Well"), Text("Temperature")],
        &[Text("Q99"), Number(37.0)],
    ]);

    let Err(MihcsmeError::Validation(error)) = parse(bytes) else {
        panic!("Expected a validation error");
    };
    let issue = &error.issues()[0];
    assert_eq!(issue.location.as_deref(), Some("AssayConditions row 2"));
    assert!(issue.reason.contains("row letter 'Q'"), "reason was: {}", issue.reason);
}

/// A declared condition without a column only warns
#[test]
fn test_declared_condition_without_column() {
    let bytes = workbook_with_annotations(&[
        &[Text("Well"), Text("Temperature")],
        &[Text("A1"), Number(37.0)],
    ]);

    let parsed = parse(bytes).unwrap();
    assert_eq!(parsed.warnings.len(), 1);
    assert_eq!(parsed.warnings[0].field.as_deref(), Some("CellLine"));
    assert_eq!(parsed.metadata.conditions().len(), 2);
}

/// Comment rows, blank rows and rows without values are skipped
#[test]
fn test_skipped_rows() {
    let bytes = workbook_with_annotations(&[
        &[Text("# plate layout v2")],
        &[Text("Well"), Text("Temperature"), Text("CellLine")],
        &[Text("# control wells follow")],
        &[Text("A1"), Number(37.0), Text("HeLa")],
        &[],
        &[Text("A2")],
        &[Text("A3"), Blank, Text("U2OS")],
    ]);

    let metadata = parse(bytes).unwrap().metadata;
    let ids: Vec<String> = metadata.annotations().map(|(id, _)| id.to_string()).collect();
    assert_eq!(ids, vec!["A01", "A03"]);
    assert_eq!(metadata.annotation(&id("A03")).unwrap().len(), 1);
}

/// Without a definitions sheet the annotation columns cannot be typed
#[test]
fn test_missing_definitions_sheet() {
    let mut workbook = Workbook::new();
    add_investigation(&mut workbook).unwrap();
    add_sheet(
        &mut workbook,
        "AssayConditions",
        &[&[Text("Well"), Text("Treatment")], &[Text("A1"), Text("DMSO")]],
    )
    .unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let Err(MihcsmeError::Parse(error)) = parse(bytes.clone()) else {
        panic!("Expected a parse error");
    };
    assert!(error.has_structural_issues());
    assert_eq!(error.issues()[0].sheet.as_deref(), Some("AssayConditionDefinitions"));

    let parser = MetadataSheetsParser::with_config(ParserConfig {
        infer_missing_definitions: true,
        ..ParserConfig::default()
    });
    let parsed = parser.parse_bytes(bytes).unwrap();
    let treatment = parsed.metadata.conditions().get("Treatment").unwrap();
    assert_eq!(treatment.kind, mihcsme_core::ConditionKind::Text);
    assert_eq!(parsed.warnings.len(), 1);
}

/// Problems on different sheets are reported together
#[test]
fn test_errors_collected_across_sheets() {
    let mut workbook = Workbook::new();
    add_sheet(
        &mut workbook,
        "InvestigationInformation",
        &[
            &[Text("Annotation_groups"), Text("Key"), Text("Value")],
            &[Text("DataOwner"), Text("First Name"), Text("Jane")],
            &[Text("DataOwner"), Text("E-Mail Address"), Text("not-an-address")],
            &[Text("InvestigationInformation"), Text("Investigation Title"), Text("Screen 1")],
        ],
    )
    .unwrap();
    add_definitions(&mut workbook).unwrap();
    add_sheet(
        &mut workbook,
        "AssayConditions",
        &[
            &[Text("Well"), Text("Temperature"), Text("CellLine")],
            &[Text("A1"), Text("warm"), Text("HeLa")],
        ],
    )
    .unwrap();

    let Err(MihcsmeError::Validation(error)) = parse(workbook.save_to_buffer().unwrap()) else {
        panic!("Expected a validation error");
    };
    let paths: Vec<&str> = error.issues().iter().map(|i| i.path.as_str()).collect();
    assert!(paths.contains(&"InvestigationInformation.DataOwner.Last Name"), "{paths:?}");
    assert!(paths.contains(&"InvestigationInformation.DataOwner.E-Mail Address"), "{paths:?}");
    assert!(paths.contains(&"AssayConditions[A01].Temperature"), "{paths:?}");

    let email = error
        .issues()
        .iter()
        .find(|i| i.path.ends_with("E-Mail Address"))
        .unwrap();
    assert_eq!(email.location.as_deref(), Some("InvestigationInformation row 3"));
}

/// The investigation sheet is required
#[test]
fn test_missing_investigation_sheet() {
    let mut workbook = Workbook::new();
    add_definitions(&mut workbook).unwrap();
    let Err(MihcsmeError::Parse(error)) = parse(workbook.save_to_buffer().unwrap()) else {
        panic!("Expected a parse error");
    };
    assert!(error.issues()[0].reason.contains("InvestigationInformation"));
}

/// Sample tokens qualified by a plate column
#[test]
fn test_sample_identifiers_with_plate() {
    let bytes = workbook_with_annotations(&[
        &[Text("Plate"), Text("Sample"), Text("CellLine")],
        &[Text("Plate1"), Text("S-1"), Text("HeLa")],
        &[Text("Plate2"), Text("S-1"), Text("U2OS")],
    ]);

    let metadata = parse(bytes).unwrap().metadata;
    assert!(metadata.uses_sample_identifiers());
    assert!(metadata.uses_plate_names());
    assert_eq!(
        metadata.annotation(&id("Plate2/S-1")).unwrap().get("CellLine"),
        Some(&ConditionValue::from("U2OS"))
    );
}

/// A header with both Well and Sample columns is ambiguous
#[test]
fn test_well_and_sample_columns() {
    let bytes = workbook_with_annotations(&[
        &[Text("Well"), Text("Sample"), Text("CellLine")],
        &[Text("A1"), Text("S-1"), Text("HeLa")],
    ]);
    assert!(matches!(parse(bytes), Err(MihcsmeError::Parse(_))));
}

/// Underscore-prefixed sheets are kept as reference vocabularies
#[test]
fn test_reference_sheet() {
    let mut workbook = Workbook::new();
    add_investigation(&mut workbook).unwrap();
    add_definitions(&mut workbook).unwrap();
    add_sheet(
        &mut workbook,
        "_CellLines",
        &[
            &[Text("Name"), Text("Cellosaurus")],
            &[Text("HeLa"), Text("CVCL_0030")],
            &[Text("U2OS"), Text("CVCL_0042")],
        ],
    )
    .unwrap();

    let parsed = parse(workbook.save_to_buffer().unwrap()).unwrap();
    let sheets = parsed.metadata.reference_sheets();
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0].name, "_CellLines");
    assert_eq!(sheets[0].entries.get("U2OS").map(String::as_str), Some("CVCL_0042"));
}

/// Bytes that are not a workbook are a spreadsheet error
#[test]
fn test_not_a_workbook() {
    let result = parse(b"Well,Temperature\nA1,37\n".to_vec());
    assert!(matches!(result, Err(MihcsmeError::Spreadsheet(_))));
}
