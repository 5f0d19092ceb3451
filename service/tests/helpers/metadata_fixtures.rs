//! Metadata sets and hand-written workbooks used across the integration tests

#![allow(dead_code)]

use indexmap::IndexMap;
use mihcsme_core::{
    AnnotationRecord, ConditionDefinition, ConditionKind, MetadataDocument, MetadataSet,
    ReferenceSheet, SampleId,
};
use rust_xlsxwriter::{Workbook, XlsxError};

/// One cell of a hand-written sheet
#[derive(Debug, Clone, Copy)]
pub enum Cell<'a> {
    /// Text cell
    Text(&'a str),
    /// Numeric cell
    Number(f64),
    /// Nothing written
    Blank,
}

pub use Cell::{Blank, Number, Text};

/// Append a sheet holding `rows`, starting at A1
pub fn add_sheet(workbook: &mut Workbook, name: &str, rows: &[&[Cell<'_>]]) -> Result<(), XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;
    for (r, cells) in rows.iter().enumerate() {
        for (c, cell) in cells.iter().enumerate() {
            let (r, c) = (r as u32, c as u16);
            match cell {
                Text(text) => {
                    sheet.write_string(r, c, *text)?;
                }
                Number(number) => {
                    sheet.write_number(r, c, *number)?;
                }
                Blank => {}
            }
        }
    }
    Ok(())
}

/// Investigation sheet with the three required fields
pub fn add_investigation(workbook: &mut Workbook) -> Result<(), XlsxError> {
    add_sheet(
        workbook,
        "InvestigationInformation",
        &[
            &[Text("Annotation_groups"), Text("Key"), Text("Value")],
            &[Text("DataOwner"), Text("First Name"), Text("Jane")],
            &[Text("DataOwner"), Text("Last Name"), Text("Doe")],
            &[Text("InvestigationInformation"), Text("Investigation Title"), Text("Screen 1")],
        ],
    )
}

/// Definitions `Temperature: numeric`, `CellLine: categorical {HeLa, U2OS}`
pub fn add_definitions(workbook: &mut Workbook) -> Result<(), XlsxError> {
    add_sheet(
        workbook,
        "AssayConditionDefinitions",
        &[
            &[
                Text("Condition"),
                Text("Type"),
                Text("Allowed Values"),
                Text("Minimum"),
                Text("Maximum"),
                Text("Unit"),
                Text("Description"),
            ],
            &[Text("Temperature"), Text("numeric"), Blank, Number(4.0), Number(42.0), Text("°C")],
            &[Text("CellLine"), Text("categorical"), Text("HeLa | U2OS")],
        ],
    )
}

/// Workbook with one well row `A1, Temperature=37, CellLine=<cell_line>`
pub fn scenario_workbook(cell_line: &str) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    add_investigation(&mut workbook)?;
    add_definitions(&mut workbook)?;
    add_sheet(
        &mut workbook,
        "AssayConditions",
        &[
            &[Text("Well"), Text("Temperature"), Text("CellLine")],
            &[Text("A1"), Number(37.0), Text(cell_line)],
        ],
    )?;
    workbook.save_to_buffer()
}

/// Condition definitions shared by the fixtures
pub fn conditions() -> Vec<ConditionDefinition> {
    vec![
        ConditionDefinition::new("Temperature", ConditionKind::Numeric)
            .with_range(Some(4.0), Some(42.0))
            .with_unit("°C"),
        ConditionDefinition::new("CellLine", ConditionKind::Categorical)
            .with_allowed_values(["HeLa", "U2OS"])
            .with_description("Cell line seeded in the well"),
        ConditionDefinition::new("Treatment", ConditionKind::Text),
    ]
}

/// Document without plate names, suitable for a plate container
pub fn plate_document() -> MetadataDocument {
    MetadataDocument {
        investigation_information: [
            ("DataOwner", "First Name", "Jane"),
            ("DataOwner", "Last Name", "Doe"),
            ("DataOwner", "E-Mail Address", "jane.doe@example.org"),
            ("DataOwner", "ORCID investigator", "0000-0002-1825-0097"),
            ("InvestigationInformation", "Investigation Title", "Screen 1"),
            ("InvestigationInformation", "Start Date", "2024-01-05"),
            ("Funding", "Grant", "NWO-123"),
        ]
        .into_iter()
        .collect(),
        study_information: [("Study", "Study Title", "Heat shock"), ("Study", "Study type", "screen")]
            .into_iter()
            .collect(),
        assay_information: [("Assay", "Imaging protocol", "widefield 20x")].into_iter().collect(),
        assay_conditions: conditions(),
        annotations: vec![
            AnnotationRecord::well("A01")
                .with_value("Temperature", 37)
                .with_value("CellLine", "HeLa"),
            AnnotationRecord::well("A02")
                .with_value("Temperature", 41.5)
                .with_value("CellLine", "U2OS")
                .with_value("Treatment", "DMSO 0.1%"),
            AnnotationRecord::well("B01").with_value("Treatment", "untreated"),
        ],
        reference_sheets: Vec::new(),
    }
}

/// Validated metadata without plate names or reference sheets
pub fn plate_metadata() -> MetadataSet {
    MetadataSet::from_document(plate_document()).unwrap()
}

/// Validated metadata with plate names and a reference sheet
pub fn full_metadata() -> MetadataSet {
    let mut document = plate_document();
    document.annotations = document
        .annotations
        .into_iter()
        .enumerate()
        .map(|(i, record)| record.on_plate(if i == 0 { "Plate1" } else { "Plate2" }))
        .collect();
    document.reference_sheets = vec![ReferenceSheet {
        name: "_CellLines".into(),
        key_header: "Name".into(),
        value_header: "Cellosaurus".into(),
        entries: IndexMap::from([
            ("HeLa".to_string(), "CVCL_0030".to_string()),
            ("U2OS".to_string(), "CVCL_0042".to_string()),
        ]),
    }];
    MetadataSet::from_document(document).unwrap()
}

/// Parse an identifier
pub fn id(text: &str) -> SampleId {
    text.parse().unwrap()
}
