//! Common types and utilities for workbook processing

use super::{PLATE_HEADER, SAMPLE_HEADER, WELL_HEADER};
use calamine::{Data, Range};
use chrono::{NaiveDate, NaiveTime, TimeDelta};
use mihcsme_core::types::normalize_number;
use mihcsme_core::validation::DATE_FORMAT;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

static EMPTY: Data = Data::Empty;

/// Non-fatal finding reported alongside a parsed metadata set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    /// Sheet the finding concerns
    pub sheet: String,
    /// Column or field concerned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// What was noticed
    pub message: String,
}

impl ParseWarning {
    /// Create a warning on a sheet
    #[must_use]
    pub fn new(sheet: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sheet: sheet.into(),
            field: None,
            message: message.into(),
        }
    }

    /// Attach the concerned column or field
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}: {field}: {}", self.sheet, self.message),
            None => write!(f, "{}: {}", self.sheet, self.message),
        }
    }
}

/// One worksheet row addressed by absolute column
#[derive(Debug, Clone, Copy)]
pub struct SheetRow<'a> {
    /// 1-based spreadsheet row number
    pub number: u32,
    first_column: usize,
    cells: &'a [Data],
}

impl<'a> SheetRow<'a> {
    /// Cell at absolute 0-based column
    #[must_use]
    pub fn cell(&self, column: usize) -> &'a Data {
        column
            .checked_sub(self.first_column)
            .and_then(|i| self.cells.get(i))
            .unwrap_or(&EMPTY)
    }

    /// Trimmed, non-empty text of a cell
    #[must_use]
    pub fn text(&self, column: usize) -> Option<String> {
        cell_to_text(self.cell(column))
    }

    /// One past the last absolute column present
    #[must_use]
    pub fn width(&self) -> usize {
        self.first_column + self.cells.len()
    }

    /// Texts of all cells from column 0
    #[must_use]
    pub fn texts(&self) -> Vec<Option<String>> {
        (0..self.width()).map(|c| self.text(c)).collect()
    }

    /// Whether every cell is empty or whitespace
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| cell_to_text(c).is_none())
    }

    /// Whether the first cell starts with `prefix`
    #[must_use]
    pub fn is_comment(&self, prefix: &str) -> bool {
        self.text(0).is_some_and(|t| t.starts_with(prefix))
    }
}

/// Rows of a worksheet range with their absolute row numbers
pub fn sheet_rows(range: &Range<Data>) -> impl Iterator<Item = SheetRow<'_>> {
    let (first_row, first_column) = range.start().unwrap_or((0, 0));
    range.rows().enumerate().map(move |(index, cells)| SheetRow {
        number: first_row + u32::try_from(index).unwrap_or(u32::MAX - first_row) + 1,
        first_column: first_column as usize,
        cells,
    })
}

/// Convert a cell into a raw JSON value for validation
///
/// Integral floats become integers and date cells become `YYYY-MM-DD` text.
///
/// # Errors
///
/// Returns the reason text for error cells and non-finite numbers
pub fn cell_to_value(cell: &Data) -> Result<Value, String> {
    match cell {
        Data::Empty => Ok(Value::Null),
        Data::String(s) => {
            let trimmed = s.trim();
            Ok(if trimmed.is_empty() {
                Value::Null
            } else {
                Value::String(trimmed.to_string())
            })
        }
        Data::Int(i) => Ok(Value::from(*i)),
        Data::Float(f) => normalize_number(*f)
            .map(Value::Number)
            .ok_or_else(|| format!("{f} is not a finite number")),
        Data::Bool(b) => Ok(Value::Bool(*b)),
        Data::DateTime(dt) => excel_serial_to_text(dt.as_f64())
            .map(Value::String)
            .ok_or_else(|| "date cell is out of range".to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Ok(Value::String(s.trim().to_string())),
        Data::Error(e) => Err(format!("cell contains the spreadsheet error {e:?}")),
    }
}

/// Trimmed, non-empty text rendering of a cell
#[must_use]
pub fn cell_to_text(cell: &Data) -> Option<String> {
    value_to_text(cell_to_value(cell).ok()?)
}

/// Text rendering of a raw value; `None` when blank
#[must_use]
pub fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => (!s.is_empty()).then_some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Convert an Excel serial date (1900 system) into ISO text
#[allow(clippy::cast_possible_truncation)]
fn excel_serial_to_text(serial: f64) -> Option<String> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let millis = (serial * 86_400_000.0).round() as i64;
    let moment = epoch.checked_add_signed(TimeDelta::try_milliseconds(millis)?)?;
    Some(if moment.time() == NaiveTime::MIN {
        moment.date().format(DATE_FORMAT).to_string()
    } else {
        moment.format("%Y-%m-%dT%H:%M:%S").to_string()
    })
}

/// Column positions in the condition definition sheet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionColumns {
    /// Condition name
    pub name: Option<usize>,
    /// Data type
    pub kind: Option<usize>,
    /// `|`-separated allowed values
    pub allowed: Option<usize>,
    /// Lower bound
    pub minimum: Option<usize>,
    /// Upper bound
    pub maximum: Option<usize>,
    /// Unit
    pub unit: Option<usize>,
    /// Description
    pub description: Option<usize>,
}

impl DefinitionColumns {
    /// Map header texts to column positions
    #[must_use]
    pub fn from_headers(headers: &[Option<String>]) -> Self {
        let mut mapping = Self::default();
        for (idx, header) in headers.iter().enumerate() {
            let Some(header) = header else { continue };
            match header.trim().to_lowercase().as_str() {
                "condition" | "name" | "condition name" => mapping.name = Some(idx),
                "type" | "data type" | "datatype" => mapping.kind = Some(idx),
                "allowed values" | "allowed" | "values" => mapping.allowed = Some(idx),
                "minimum" | "min" => mapping.minimum = Some(idx),
                "maximum" | "max" => mapping.maximum = Some(idx),
                "unit" | "units" => mapping.unit = Some(idx),
                "description" | "desc" => mapping.description = Some(idx),
                _ => {}
            }
        }
        mapping
    }
}

/// Kind of identifier column in the annotation table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdColumn {
    /// `Well` coordinates
    Well,
    /// `Sample` tokens
    Sample,
}

/// Column positions in the wide annotation table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationColumns {
    /// Optional plate column
    pub plate: Option<usize>,
    /// Identifier column and its grammar
    pub id: Option<(usize, IdColumn)>,
    /// Condition columns in sheet order
    pub conditions: Vec<(usize, String)>,
    /// Layout problems found in the header row
    pub problems: Vec<String>,
}

impl AnnotationColumns {
    /// Map header texts to column positions; blank headers are ignored
    #[must_use]
    pub fn from_headers(headers: &[Option<String>]) -> Self {
        let mut mapping = Self::default();
        let mut seen = HashSet::new();
        for (idx, header) in headers.iter().enumerate() {
            let Some(header) = header else { continue };
            if !seen.insert(header.clone()) {
                mapping
                    .problems
                    .push(format!("column '{header}' appears more than once"));
                continue;
            }
            if header.eq_ignore_ascii_case(PLATE_HEADER) {
                mapping.plate = Some(idx);
            } else if header.eq_ignore_ascii_case(WELL_HEADER) {
                mapping.set_id(idx, IdColumn::Well);
            } else if header.eq_ignore_ascii_case(SAMPLE_HEADER) {
                mapping.set_id(idx, IdColumn::Sample);
            } else {
                mapping.conditions.push((idx, header.clone()));
            }
        }
        if mapping.id.is_none() {
            mapping
                .problems
                .push(format!("header needs a '{WELL_HEADER}' or '{SAMPLE_HEADER}' column"));
        }
        mapping
    }

    fn set_id(&mut self, idx: usize, kind: IdColumn) {
        if self.id.is_some() {
            self.problems.push(format!(
                "only one of '{WELL_HEADER}' and '{SAMPLE_HEADER}' may be present"
            ));
        } else {
            self.id = Some((idx, kind));
        }
    }
}
