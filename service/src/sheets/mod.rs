//! MIHCSME workbook support
//!
//! This module reads and writes MIHCSME metadata workbooks. Parser and
//! generator share the sheet names and headers defined here, so anything the
//! generator writes the parser reads back to an equal metadata set.
//!
//! ## Workbook Layout
//!
//! Key/value sheets (`InvestigationInformation`, `StudyInformation`,
//! `AssayInformation`) hold one value per row:
//!
//! ```text
//! | Annotation_groups        | Key                 | Value          |
//! |--------------------------|---------------------|----------------|
//! | DataOwner                | First Name          | Jane           |
//! | DataOwner                | Last Name           | Doe            |
//! | InvestigationInformation | Investigation Title | Drug screen 12 |
//! ```
//!
//! `AssayConditionDefinitions` declares the per-well conditions:
//!
//! ```text
//! | Condition   | Type        | Allowed Values | Minimum | Maximum | Unit | Description |
//! |-------------|-------------|----------------|---------|---------|------|-------------|
//! | Temperature | numeric     |                | 4       | 42      | °C   |             |
//! | CellLine    | categorical | HeLa | U2OS    |         |         |      |             |
//! ```
//!
//! `AssayConditions` is the wide annotation table, one row per well (or
//! sample) and one column per declared condition. The `Plate` column is
//! optional; the identifier column is `Well` or `Sample`:
//!
//! ```text
//! | Plate  | Well | Temperature | CellLine |
//! |--------|------|-------------|----------|
//! | Plate1 | A01  | 37          | HeLa     |
//! | Plate1 | A02  | 37          | U2OS     |
//! ```
//!
//! Sheets whose name starts with `_` are two-column reference vocabularies.
//! In every sheet, rows whose first cell starts with `#` are comments and
//! fully blank rows are ignored.
//!
//! ## Modules
//!
//! - `parser`: read a workbook into a validated metadata set
//! - `generator`: write a metadata set as a workbook
//! - `types`: header mappings, cell conversion and parse warnings

pub mod generator;
pub mod parser;
pub mod types;

pub use generator::MetadataSheetsGenerator;
pub use parser::{MetadataSheetsParser, ParsedWorkbook};
pub use types::ParseWarning;

use mihcsme_core::section;

/// Investigation Information sheet
pub const SHEET_INVESTIGATION: &str = section::INVESTIGATION;
/// Study Information sheet
pub const SHEET_STUDY: &str = section::STUDY;
/// Assay Information sheet
pub const SHEET_ASSAY: &str = section::ASSAY;
/// Condition definition sheet
pub const SHEET_CONDITION_DEFINITIONS: &str = section::CONDITION_DEFINITIONS;
/// Wide annotation table sheet
pub const SHEET_ANNOTATIONS: &str = section::ANNOTATIONS;
/// Prefix of reference vocabulary sheets
pub const REFERENCE_SHEET_PREFIX: char = '_';

/// Headers of key/value sheets
pub const GROUPED_HEADERS: [&str; 3] = [mihcsme_core::metadata::GROUP_HEADER, "Key", "Value"];

/// Headers of the condition definition sheet
pub const DEFINITION_HEADERS: [&str; 7] = [
    "Condition",
    "Type",
    "Allowed Values",
    "Minimum",
    "Maximum",
    "Unit",
    "Description",
];

/// Plate column header of the annotation table
pub const PLATE_HEADER: &str = "Plate";
/// Identifier column header for well coordinates
pub const WELL_HEADER: &str = "Well";
/// Identifier column header for sample tokens
pub const SAMPLE_HEADER: &str = "Sample";

/// Fixed headers written in the first column of a sheet
pub const LEADING_HEADERS: [&str; 5] = [
    GROUPED_HEADERS[0],
    DEFINITION_HEADERS[0],
    PLATE_HEADER,
    WELL_HEADER,
    SAMPLE_HEADER,
];
