//! Workbook generator
//!
//! Writes a validated metadata set in the layout the parser reads. Condition
//! columns get dropdowns and numeric ranges so that values typed in Excel
//! follow the declared conditions.

use super::{
    DEFINITION_HEADERS, GROUPED_HEADERS, PLATE_HEADER, SAMPLE_HEADER, SHEET_ANNOTATIONS,
    SHEET_ASSAY, SHEET_CONDITION_DEFINITIONS, SHEET_INVESTIGATION, SHEET_STUDY, WELL_HEADER,
};
use crate::config::{ParserConfig, WriterConfig};
use mihcsme_core::{
    ConditionDefinition, ConditionKind, ConditionValue, GroupedInformation, MetadataSet,
    MihcsmeError, ReferenceSheet, Result,
};
use rust_xlsxwriter::{
    Color, DataValidation, DataValidationRule, Format, FormatBorder, Workbook, Worksheet, XlsxError,
};
use std::path::Path;
use tracing::{info, warn};

/// Last row index of an xlsx worksheet
const LAST_ROW: u32 = 1_048_575;

fn xlsx_error(e: XlsxError) -> MihcsmeError {
    MihcsmeError::spreadsheet(e.to_string())
}

fn column(index: usize) -> Result<u16> {
    u16::try_from(index)
        .map_err(|_| MihcsmeError::spreadsheet(format!("column index {index} exceeds the sheet width")))
}

fn row(index: usize) -> Result<u32> {
    u32::try_from(index + 1)
        .ok()
        .filter(|r| *r <= LAST_ROW)
        .ok_or_else(|| MihcsmeError::spreadsheet(format!("row index {index} exceeds the sheet height")))
}

/// Generator for MIHCSME workbooks
#[derive(Debug, Clone)]
pub struct MetadataSheetsGenerator {
    config: WriterConfig,
    comment_prefix: String,
}

impl Default for MetadataSheetsGenerator {
    fn default() -> Self {
        Self::with_config(WriterConfig::default())
    }
}

impl MetadataSheetsGenerator {
    /// Create a generator with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator with custom settings
    #[must_use]
    pub fn with_config(config: WriterConfig) -> Self {
        Self {
            config,
            comment_prefix: ParserConfig::default().comment_prefix,
        }
    }

    /// Refuse metadata whose leading cells the parser would read as comments
    ///
    /// Pass the `comment_prefix` of the [`ParserConfig`] that will read the
    /// workbook back.
    #[must_use]
    pub fn with_comment_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.comment_prefix = prefix.into();
        self
    }

    /// Write `metadata` as a workbook file
    ///
    /// # Errors
    ///
    /// Returns `MihcsmeError::Spreadsheet` if the workbook cannot be built
    /// and `MihcsmeError::Io` if the file cannot be written
    pub fn generate_file(&self, metadata: &MetadataSet, path: &Path) -> Result<()> {
        let buffer = self.generate_buffer(metadata)?;
        std::fs::write(path, buffer)?;
        info!("Wrote MIHCSME workbook: {}", path.display());
        Ok(())
    }

    /// Write `metadata` as workbook bytes
    ///
    /// # Errors
    ///
    /// Returns `MihcsmeError::Validation` if a leading cell starts with the
    /// comment prefix and `MihcsmeError::Spreadsheet` if the workbook cannot be built
    pub fn generate_buffer(&self, metadata: &MetadataSet) -> Result<Vec<u8>> {
        metadata.check_comment_prefix(&self.comment_prefix)?;
        let mut workbook = Workbook::new();
        let header_format = Format::new()
            .set_bold()
            .set_background_color(Color::RGB(self.config.header_background_rgb()))
            .set_font_color(Color::RGB(self.config.header_text_rgb()))
            .set_border(FormatBorder::Thin);

        let investigation = metadata.investigation().to_groups();
        self.grouped_sheet(&mut workbook, SHEET_INVESTIGATION, &investigation, &header_format)?;
        self.grouped_sheet(&mut workbook, SHEET_STUDY, metadata.study(), &header_format)?;
        self.grouped_sheet(&mut workbook, SHEET_ASSAY, metadata.assay(), &header_format)?;
        self.definitions_sheet(&mut workbook, metadata.conditions().definitions(), &header_format)?;
        self.annotations_sheet(&mut workbook, metadata, &header_format)?;
        for sheet in metadata.reference_sheets() {
            self.reference_sheet(&mut workbook, sheet, &header_format)?;
        }

        workbook
            .save_to_buffer()
            .map_err(|e| MihcsmeError::spreadsheet(format!("Failed to save workbook: {e}")))
    }

    fn new_sheet<'a>(&self, workbook: &'a mut Workbook, name: &str, headers: &[&str], format: &Format) -> Result<&'a mut Worksheet> {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name).map_err(xlsx_error)?;
        for (i, header) in headers.iter().enumerate() {
            let col = column(i)?;
            worksheet
                .write_string_with_format(0, col, *header, format)
                .map_err(xlsx_error)?;
            worksheet
                .set_column_width(col, self.config.column_width)
                .map_err(xlsx_error)?;
        }
        if self.config.freeze_headers {
            worksheet.set_freeze_panes(1, 0).map_err(xlsx_error)?;
        }
        Ok(worksheet)
    }

    fn grouped_sheet(
        &self,
        workbook: &mut Workbook,
        name: &str,
        info: &GroupedInformation,
        format: &Format,
    ) -> Result<()> {
        let worksheet = self.new_sheet(workbook, name, &GROUPED_HEADERS, format)?;
        for (i, (group, key, value)) in info.iter().enumerate() {
            let r = row(i)?;
            worksheet.write_string(r, 0, group).map_err(xlsx_error)?;
            worksheet.write_string(r, 1, key).map_err(xlsx_error)?;
            worksheet.write_string(r, 2, value).map_err(xlsx_error)?;
        }
        Ok(())
    }

    fn definitions_sheet(
        &self,
        workbook: &mut Workbook,
        definitions: &[ConditionDefinition],
        format: &Format,
    ) -> Result<()> {
        let worksheet = self.new_sheet(workbook, SHEET_CONDITION_DEFINITIONS, &DEFINITION_HEADERS, format)?;
        for (i, definition) in definitions.iter().enumerate() {
            let r = row(i)?;
            worksheet.write_string(r, 0, &definition.name).map_err(xlsx_error)?;
            worksheet
                .write_string(r, 1, definition.kind.as_str())
                .map_err(xlsx_error)?;
            if !definition.allowed_values.is_empty() {
                worksheet
                    .write_string(r, 2, definition.allowed_values.join(" | "))
                    .map_err(xlsx_error)?;
            }
            if let Some(minimum) = definition.minimum {
                worksheet.write_number(r, 3, minimum).map_err(xlsx_error)?;
            }
            if let Some(maximum) = definition.maximum {
                worksheet.write_number(r, 4, maximum).map_err(xlsx_error)?;
            }
            if let Some(unit) = &definition.unit {
                worksheet.write_string(r, 5, unit).map_err(xlsx_error)?;
            }
            if let Some(description) = &definition.description {
                worksheet.write_string(r, 6, description).map_err(xlsx_error)?;
            }
        }
        Ok(())
    }

    fn annotations_sheet(&self, workbook: &mut Workbook, metadata: &MetadataSet, format: &Format) -> Result<()> {
        let mut headers = Vec::new();
        if metadata.uses_plate_names() {
            headers.push(PLATE_HEADER);
        }
        headers.push(if metadata.uses_sample_identifiers() {
            SAMPLE_HEADER
        } else {
            WELL_HEADER
        });
        let first_condition = headers.len();
        let definitions = metadata.conditions().definitions();
        headers.extend(definitions.iter().map(|d| d.name.as_str()));

        let worksheet = self.new_sheet(workbook, SHEET_ANNOTATIONS, &headers, format)?;
        for (i, (id, values)) in metadata.annotations().enumerate() {
            let r = row(i)?;
            let mut col = 0;
            if metadata.uses_plate_names() {
                if let Some(plate) = &id.plate {
                    worksheet.write_string(r, 0, plate).map_err(xlsx_error)?;
                }
                col += 1;
            }
            worksheet
                .write_string(r, column(col)?, id.key.to_string())
                .map_err(xlsx_error)?;

            for (offset, definition) in definitions.iter().enumerate() {
                let c = column(first_condition + offset)?;
                match values.get(&definition.name) {
                    Some(ConditionValue::Number(n)) => {
                        if let Some(number) = n.as_f64() {
                            worksheet.write_number(r, c, number).map_err(xlsx_error)?;
                        }
                    }
                    Some(ConditionValue::Text(text)) => {
                        worksheet.write_string(r, c, text).map_err(xlsx_error)?;
                    }
                    None => {}
                }
            }
        }

        if self.config.add_validation {
            for (offset, definition) in definitions.iter().enumerate() {
                let Some(validation) = condition_validation(definition) else {
                    continue;
                };
                let c = column(first_condition + offset)?;
                worksheet
                    .add_data_validation(1, c, LAST_ROW, c, &validation)
                    .map_err(xlsx_error)?;
            }
        }
        Ok(())
    }

    fn reference_sheet(&self, workbook: &mut Workbook, sheet: &ReferenceSheet, format: &Format) -> Result<()> {
        let headers = [sheet.key_header.as_str(), sheet.value_header.as_str()];
        let worksheet = self.new_sheet(workbook, &sheet.name, &headers, format)?;
        for (i, (key, value)) in sheet.entries.iter().enumerate() {
            let r = row(i)?;
            worksheet.write_string(r, 0, key).map_err(xlsx_error)?;
            worksheet.write_string(r, 1, value).map_err(xlsx_error)?;
        }
        Ok(())
    }
}

/// Dropdown or range check for a condition column, if it has constraints
fn condition_validation(definition: &ConditionDefinition) -> Option<DataValidation> {
    match definition.kind {
        ConditionKind::Categorical => {
            let values: Vec<&str> = definition.allowed_values.iter().map(String::as_str).collect();
            match DataValidation::new().allow_list_strings(&values) {
                Ok(validation) => Some(validation),
                Err(e) => {
                    warn!("Skipping dropdown for condition '{}': {e}", definition.name);
                    None
                }
            }
        }
        ConditionKind::Numeric => {
            let rule = match (definition.minimum, definition.maximum) {
                (Some(min), Some(max)) => DataValidationRule::Between(min, max),
                (Some(min), None) => DataValidationRule::GreaterThanOrEqualTo(min),
                (None, Some(max)) => DataValidationRule::LessThanOrEqualTo(max),
                (None, None) => return None,
            };
            Some(DataValidation::new().allow_decimal_number(rule))
        }
        ConditionKind::Text => None,
    }
}
