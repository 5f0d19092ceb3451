//! Workbook parser
//!
//! Reads every sheet of a MIHCSME workbook into a [`MetadataDocument`],
//! remembering where each field came from, then validates the document. All
//! problems of one pass are reported together with sheet and row locations.

use super::types::{
    AnnotationColumns, DefinitionColumns, IdColumn, ParseWarning, SheetRow, cell_to_value,
    sheet_rows, value_to_text,
};
use super::{
    REFERENCE_SHEET_PREFIX, SHEET_ANNOTATIONS, SHEET_ASSAY, SHEET_CONDITION_DEFINITIONS,
    SHEET_INVESTIGATION, SHEET_STUDY,
};
use crate::config::ParserConfig;
use calamine::{Data, Range, Reader, Xlsx};
use indexmap::IndexMap;
use mihcsme_core::metadata::{ALLOWED_VALUES_SEPARATOR, GROUP_HEADER};
use mihcsme_core::validation::{element_path, member_path};
use mihcsme_core::{
    AnnotationRecord, ConditionDefinition, ConditionKind, GroupedInformation, IssueKind,
    MetadataDocument, MetadataSet, MihcsmeError, ParseError, ParseIssue, ReferenceSheet, Result,
    SampleId,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};

/// Validated metadata together with the non-fatal findings of the parse
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedWorkbook {
    /// Validated metadata set
    pub metadata: MetadataSet,
    /// Warnings such as declared conditions without a column
    pub warnings: Vec<ParseWarning>,
}

/// Parser for MIHCSME workbooks
#[derive(Debug, Clone, Default)]
pub struct MetadataSheetsParser {
    config: ParserConfig,
}

/// Everything gathered while walking the sheets
#[derive(Default)]
struct ParseState {
    document: MetadataDocument,
    issues: Vec<ParseIssue>,
    warnings: Vec<ParseWarning>,
    locations: HashMap<String, (String, u32)>,
}

impl ParseState {
    fn structure(&mut self, sheet: &str, row: Option<u32>, field: Option<&str>, reason: impl Into<String>) {
        self.push(IssueKind::Structure, sheet, row, field, reason.into());
    }

    fn value(&mut self, sheet: &str, row: u32, field: &str, reason: impl Into<String>) {
        self.push(IssueKind::Value, sheet, Some(row), Some(field), reason.into());
    }

    fn push(&mut self, kind: IssueKind, sheet: &str, row: Option<u32>, field: Option<&str>, reason: String) {
        self.issues.push(ParseIssue {
            kind,
            sheet: Some(sheet.to_string()),
            row,
            field: field.map(str::to_string),
            reason,
        });
    }

    fn warn(&mut self, warning: ParseWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    fn locate(&mut self, path: String, sheet: &str, row: u32) {
        self.locations
            .entry(path)
            .or_insert_with(|| (sheet.to_string(), row));
    }

    /// Source of a field path: exact match, then the enclosing element,
    /// then successively shorter member paths
    fn lookup(&self, path: &str) -> Option<&(String, u32)> {
        if let Some(found) = self.locations.get(path) {
            return Some(found);
        }
        if let Some(end) = path.find(']') {
            if let Some(found) = self.locations.get(&path[..=end]) {
                return Some(found);
            }
        }
        let mut current = path;
        while let Some(dot) = current.rfind('.') {
            current = &current[..dot];
            if let Some(found) = self.locations.get(current) {
                return Some(found);
            }
        }
        None
    }
}

/// Sheet a field path belongs to
fn sheet_of(path: &str) -> &str {
    path.find(['.', '['])
        .map_or(path, |end| &path[..end])
}

impl MetadataSheetsParser {
    /// Create a parser with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser with custom settings
    #[must_use]
    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse a workbook file
    ///
    /// # Errors
    ///
    /// Returns `MihcsmeError::Io` if the file cannot be read,
    /// `MihcsmeError::Spreadsheet` if it is not a workbook,
    /// `MihcsmeError::Parse` on structural problems and
    /// `MihcsmeError::Validation` when only cell values are invalid
    pub fn parse_file(&self, path: &Path) -> Result<ParsedWorkbook> {
        info!("Parsing MIHCSME workbook: {}", path.display());
        let bytes = std::fs::read(path)?;
        self.parse_bytes(bytes)
    }

    /// Parse workbook bytes
    ///
    /// # Errors
    ///
    /// See [`Self::parse_file`]
    pub fn parse_bytes(&self, bytes: Vec<u8>) -> Result<ParsedWorkbook> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
            .map_err(|e| MihcsmeError::spreadsheet(format!("Failed to open workbook: {e}")))?;
        self.parse_workbook(&mut workbook)
    }

    /// Parse an opened workbook
    ///
    /// # Errors
    ///
    /// See [`Self::parse_file`]
    pub fn parse_workbook<RS: Read + Seek>(&self, workbook: &mut Xlsx<RS>) -> Result<ParsedWorkbook> {
        let sheet_names = workbook.sheet_names().to_vec();
        let mut state = ParseState::default();

        for name in &sheet_names {
            let known = [
                SHEET_INVESTIGATION,
                SHEET_STUDY,
                SHEET_ASSAY,
                SHEET_CONDITION_DEFINITIONS,
                SHEET_ANNOTATIONS,
            ];
            if !known.contains(&name.as_str()) && !name.starts_with(REFERENCE_SHEET_PREFIX) {
                debug!("Ignoring sheet '{name}'");
            }
        }

        match Self::range(workbook, SHEET_INVESTIGATION, &sheet_names, &mut state) {
            Some(range) => {
                state.document.investigation_information =
                    self.read_grouped(&range, SHEET_INVESTIGATION, &mut state);
            }
            None => state.structure(
                SHEET_INVESTIGATION,
                None,
                None,
                format!("required sheet '{SHEET_INVESTIGATION}' is missing"),
            ),
        }
        if let Some(range) = Self::range(workbook, SHEET_STUDY, &sheet_names, &mut state) {
            state.document.study_information = self.read_grouped(&range, SHEET_STUDY, &mut state);
        }
        if let Some(range) = Self::range(workbook, SHEET_ASSAY, &sheet_names, &mut state) {
            state.document.assay_information = self.read_grouped(&range, SHEET_ASSAY, &mut state);
        }

        let declared = Self::range(workbook, SHEET_CONDITION_DEFINITIONS, &sheet_names, &mut state)
            .map(|range| self.read_definitions(&range, &mut state));

        match Self::range(workbook, SHEET_ANNOTATIONS, &sheet_names, &mut state) {
            Some(range) => self.read_annotations(&range, declared, &mut state),
            None => {
                state.document.assay_conditions = declared.unwrap_or_default();
                state.warn(ParseWarning::new(
                    SHEET_ANNOTATIONS,
                    "sheet is missing; the metadata carries no per-well annotations",
                ));
            }
        }

        for name in sheet_names
            .iter()
            .filter(|n| n.starts_with(REFERENCE_SHEET_PREFIX))
        {
            if let Some(range) = Self::range(workbook, name, &sheet_names, &mut state) {
                if let Some(sheet) = self.read_reference_sheet(&range, name, &mut state) {
                    state.document.reference_sheets.push(sheet);
                }
            }
        }

        Self::finish(state)
    }

    fn range<RS: Read + Seek>(
        workbook: &mut Xlsx<RS>,
        name: &str,
        sheet_names: &[String],
        state: &mut ParseState,
    ) -> Option<Range<Data>> {
        if !sheet_names.iter().any(|n| n == name) {
            return None;
        }
        match workbook.worksheet_range(name) {
            Ok(range) => Some(range),
            Err(e) => {
                state.structure(name, None, None, format!("sheet cannot be read: {e}"));
                None
            }
        }
    }

    fn is_skipped(&self, row: &SheetRow<'_>) -> bool {
        row.is_blank() || row.is_comment(&self.config.comment_prefix)
    }

    /// Read an `Annotation_groups | Key | Value` sheet
    fn read_grouped(&self, range: &Range<Data>, sheet: &str, state: &mut ParseState) -> GroupedInformation {
        let mut info = GroupedInformation::new();
        let mut seen = HashSet::new();

        for row in sheet_rows(range).filter(|r| !self.is_skipped(r)) {
            let group = row.text(0);
            let key = row.text(1);
            if group.as_deref() == Some(GROUP_HEADER) {
                continue;
            }
            let value = match cell_to_value(row.cell(2)) {
                Ok(value) => value_to_text(value),
                Err(reason) => {
                    let field = match (&group, &key) {
                        (Some(g), Some(k)) => member_path(&member_path(sheet, g), k),
                        _ => sheet.to_string(),
                    };
                    state.value(sheet, row.number, &field, reason);
                    continue;
                }
            };

            match (group, key) {
                (Some(group), Some(key)) => {
                    let group_path = member_path(sheet, &group);
                    let path = member_path(&group_path, &key);
                    if !seen.insert((group.clone(), key.clone())) {
                        state.structure(sheet, Some(row.number), Some(&path), "duplicate key in group");
                        continue;
                    }
                    state.locate(group_path, sheet, row.number);
                    state.locate(path, sheet, row.number);
                    if let Some(value) = value {
                        info.insert(group, key, value);
                    }
                }
                (None, Some(key)) => state.structure(
                    sheet,
                    Some(row.number),
                    Some(&key),
                    "row has a key but no annotation group",
                ),
                (Some(group), None) if value.is_some() => state.structure(
                    sheet,
                    Some(row.number),
                    Some(&group),
                    "row has a value but no key",
                ),
                (None, None) if value.is_some() => {
                    state.structure(sheet, Some(row.number), None, "row has a value but no group or key");
                }
                _ => {}
            }
        }
        info
    }

    /// Read the condition definition sheet
    fn read_definitions(&self, range: &Range<Data>, state: &mut ParseState) -> Vec<ConditionDefinition> {
        let sheet = SHEET_CONDITION_DEFINITIONS;
        let mut rows = sheet_rows(range).filter(|r| !self.is_skipped(r));
        let Some(header) = rows.next() else {
            return Vec::new();
        };
        let columns = DefinitionColumns::from_headers(&header.texts());
        let (Some(name_column), Some(kind_column)) = (columns.name, columns.kind) else {
            state.structure(
                sheet,
                Some(header.number),
                None,
                "header must contain 'Condition' and 'Type' columns",
            );
            return Vec::new();
        };

        let mut definitions = Vec::new();
        for row in rows {
            let Some(name) = row.text(name_column) else {
                state.structure(sheet, Some(row.number), None, "condition name is missing");
                continue;
            };
            let scope = element_path(sheet, &name);
            let kind = match row.text(kind_column).map(|t| t.parse::<ConditionKind>()) {
                Some(Ok(kind)) => kind,
                Some(Err(reason)) => {
                    state.structure(sheet, Some(row.number), Some(&scope), reason);
                    continue;
                }
                None => {
                    state.structure(sheet, Some(row.number), Some(&scope), "condition type is missing");
                    continue;
                }
            };

            let allowed_values = columns
                .allowed
                .and_then(|c| row.text(c))
                .map(|text| {
                    text.split(ALLOWED_VALUES_SEPARATOR)
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let minimum = Self::bound(&row, columns.minimum, &member_path(&scope, "minimum"), state);
            let maximum = Self::bound(&row, columns.maximum, &member_path(&scope, "maximum"), state);

            state.locate(element_path(sheet, format!("#{}", definitions.len())), sheet, row.number);
            state.locate(scope, sheet, row.number);
            definitions.push(ConditionDefinition {
                name,
                kind,
                allowed_values,
                minimum,
                maximum,
                unit: columns.unit.and_then(|c| row.text(c)),
                description: columns.description.and_then(|c| row.text(c)),
            });
        }
        debug!("Read {} condition definitions", definitions.len());
        definitions
    }

    fn bound(row: &SheetRow<'_>, column: Option<usize>, field: &str, state: &mut ParseState) -> Option<f64> {
        let column = column?;
        match cell_to_value(row.cell(column)) {
            Ok(Value::Null) => None,
            Ok(Value::Number(n)) => n.as_f64(),
            Ok(Value::String(s)) => match s.parse::<f64>() {
                Ok(bound) => Some(bound),
                Err(_) => {
                    state.value(SHEET_CONDITION_DEFINITIONS, row.number, field, format!("'{s}' is not a number"));
                    None
                }
            },
            Ok(other) => {
                state.value(SHEET_CONDITION_DEFINITIONS, row.number, field, format!("{other} is not a number"));
                None
            }
            Err(reason) => {
                state.value(SHEET_CONDITION_DEFINITIONS, row.number, field, reason);
                None
            }
        }
    }

    /// Read the wide annotation table against the declared conditions
    ///
    /// Without a definitions sheet the columns are declared as `text` when
    /// inference is enabled, otherwise the table is a structural error.
    fn read_annotations(
        &self,
        range: &Range<Data>,
        declared: Option<Vec<ConditionDefinition>>,
        state: &mut ParseState,
    ) {
        let sheet = SHEET_ANNOTATIONS;
        let mut rows = sheet_rows(range).filter(|r| !self.is_skipped(r));
        let Some(header) = rows.next() else {
            state.document.assay_conditions = declared.unwrap_or_default();
            return;
        };
        let layout = AnnotationColumns::from_headers(&header.texts());
        for problem in &layout.problems {
            state.structure(sheet, Some(header.number), None, problem.clone());
        }
        let Some((id_column, id_kind)) = layout.id else {
            state.document.assay_conditions = declared.unwrap_or_default();
            return;
        };

        let definitions = match declared {
            Some(definitions) => definitions,
            None if self.config.infer_missing_definitions => {
                state.warn(ParseWarning::new(
                    SHEET_CONDITION_DEFINITIONS,
                    "sheet is missing; every annotation column is declared as text",
                ));
                layout
                    .conditions
                    .iter()
                    .map(|(_, name)| ConditionDefinition::new(name.clone(), ConditionKind::Text))
                    .collect()
            }
            None => {
                if !layout.conditions.is_empty() {
                    state.structure(
                        SHEET_CONDITION_DEFINITIONS,
                        None,
                        None,
                        format!("required sheet '{SHEET_CONDITION_DEFINITIONS}' is missing"),
                    );
                }
                return;
            }
        };

        let mut columns = Vec::with_capacity(layout.conditions.len());
        for (column, name) in &layout.conditions {
            if definitions.iter().any(|d| d.name.trim() == name) {
                columns.push((*column, name.clone()));
            } else {
                state.structure(
                    sheet,
                    Some(header.number),
                    Some(name),
                    format!("column '{name}' is not declared in {SHEET_CONDITION_DEFINITIONS}"),
                );
            }
        }
        for definition in &definitions {
            if !layout.conditions.iter().any(|(_, n)| n == definition.name.trim()) {
                state.warn(
                    ParseWarning::new(sheet, "declared condition has no column")
                        .with_field(definition.name.clone()),
                );
            }
        }
        state.document.assay_conditions = definitions;

        let mut seen: HashMap<SampleId, u32> = HashMap::new();
        let id_header = match id_kind {
            IdColumn::Well => super::WELL_HEADER,
            IdColumn::Sample => super::SAMPLE_HEADER,
        };
        for row in rows {
            let mut values = IndexMap::new();
            let mut failed = false;
            for (column, name) in &columns {
                match cell_to_value(row.cell(*column)) {
                    Ok(Value::Null) => {}
                    Ok(value) => {
                        values.insert(name.clone(), value);
                    }
                    Err(reason) => {
                        state.value(sheet, row.number, name, reason);
                        failed = true;
                    }
                }
            }
            if values.is_empty() && !failed {
                continue;
            }
            let Some(id_text) = row.text(id_column) else {
                state.structure(sheet, Some(row.number), Some(id_header), "row has values but no identifier");
                continue;
            };

            let mut record = match id_kind {
                IdColumn::Well => AnnotationRecord::well(id_text),
                IdColumn::Sample => AnnotationRecord::sample(id_text),
            };
            record.plate = layout.plate.and_then(|c| row.text(c));
            record.values = values;

            if let Ok(id) = record.parse_id() {
                if let Some(first) = seen.get(&id) {
                    state.structure(
                        sheet,
                        Some(row.number),
                        Some(id_header),
                        format!("duplicate identifier {id} (first on row {first})"),
                    );
                    continue;
                }
                seen.insert(id.clone(), row.number);
                state.locate(element_path(sheet, &id), sheet, row.number);
            }
            let index = state.document.annotations.len();
            state.locate(element_path(sheet, format!("#{index}")), sheet, row.number);
            state.document.annotations.push(record);
        }
        debug!("Read {} annotation rows", state.document.annotations.len());
    }

    /// Read a two-column reference vocabulary sheet
    fn read_reference_sheet(&self, range: &Range<Data>, name: &str, state: &mut ParseState) -> Option<ReferenceSheet> {
        let mut rows = sheet_rows(range).filter(|r| !self.is_skipped(r));
        let scope = element_path(mihcsme_core::section::REFERENCE_SHEETS, name);
        let Some(header) = rows.next() else {
            state.structure(name, None, None, "reference sheet has no header row");
            return None;
        };
        let (Some(key_header), Some(value_header)) = (header.text(0), header.text(1)) else {
            state.structure(name, Some(header.number), None, "reference sheet needs key and value headers");
            return None;
        };
        state.locate(scope, name, header.number);

        let mut entries = IndexMap::new();
        for row in rows {
            let Some(key) = row.text(0) else {
                state.structure(name, Some(row.number), None, "row has a value but no key");
                continue;
            };
            if entries.contains_key(&key) {
                state.structure(name, Some(row.number), Some(&key), "duplicate vocabulary key");
                continue;
            }
            entries.insert(key, row.text(1).unwrap_or_default());
        }
        Some(ReferenceSheet {
            name: name.to_string(),
            key_header,
            value_header,
            entries,
        })
    }

    /// Validate the gathered document and classify every problem
    fn finish(state: ParseState) -> Result<ParsedWorkbook> {
        let ParseState {
            document,
            mut issues,
            warnings,
            locations,
        } = state;
        let lookup = ParseState {
            locations,
            ..ParseState::default()
        };

        match MetadataSet::from_document(document) {
            Ok(metadata) if issues.is_empty() => {
                info!(
                    "Parsed workbook: {} conditions, {} annotations, {} warnings",
                    metadata.conditions().len(),
                    metadata.annotation_count(),
                    warnings.len()
                );
                Ok(ParsedWorkbook { metadata, warnings })
            }
            Ok(_) => Err(ParseError::new(issues).into_error()),
            Err(validation) => {
                for issue in validation.into_issues() {
                    let (sheet, row) = match lookup.lookup(&issue.path) {
                        Some((sheet, row)) => (sheet.clone(), Some(*row)),
                        None => (sheet_of(&issue.path).to_string(), None),
                    };
                    issues.push(ParseIssue {
                        kind: IssueKind::Value,
                        sheet: Some(sheet),
                        row,
                        field: Some(issue.path),
                        reason: issue.reason,
                    });
                }
                Err(ParseError::new(issues).into_error())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_lookup_falls_back_to_enclosing_element() {
        let mut state = ParseState::default();
        state.locate("AssayConditions[A01]".into(), SHEET_ANNOTATIONS, 2);
        state.locate("StudyInformation.Study".into(), SHEET_STUDY, 4);

        assert_eq!(
            state.lookup("AssayConditions[A01].CellLine"),
            Some(&(SHEET_ANNOTATIONS.to_string(), 2))
        );
        assert_eq!(
            state.lookup("StudyInformation.Study.Title"),
            Some(&(SHEET_STUDY.to_string(), 4))
        );
        assert_eq!(state.lookup("AssayConditions[B01].Dose"), None);
    }

    #[test]
    fn test_sheet_of_path() {
        assert_eq!(sheet_of("AssayConditions[A01].CellLine"), "AssayConditions");
        assert_eq!(sheet_of("InvestigationInformation.DataOwner.Email"), "InvestigationInformation");
        assert_eq!(sheet_of("AssayConditions"), "AssayConditions");
    }

    #[test]
    fn test_not_a_workbook() {
        let parser = MetadataSheetsParser::new();
        assert!(matches!(
            parser.parse_bytes(b"not a zip archive".to_vec()),
            Err(MihcsmeError::Spreadsheet(_))
        ));
    }
}
