//! Identifier and value types for MIHCSME metadata

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of plate rows addressable by a row letter (`A`-`P`)
pub const PLATE_ROWS: u32 = 16;

/// Highest plate column number
pub const PLATE_COLUMNS: u32 = 48;

/// Leading marker of spreadsheet comment rows
pub const COMMENT_MARKER: char = '#';

/// Identifier grammar violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Text is not letter + column number
    #[error("invalid well format '{0}' (expected e.g. A1 or A01)")]
    WellFormat(String),

    /// Row letter outside `A`-`P`
    #[error("invalid row letter '{0}' (expected A-P)")]
    RowLetter(char),

    /// Column outside `1`-`48`
    #[error("invalid column {0} (expected 1-{PLATE_COLUMNS})")]
    Column(u32),

    /// 0-based grid position outside the plate
    #[error("grid position (row {row}, column {column}) is outside a {PLATE_ROWS}x{PLATE_COLUMNS} plate")]
    Grid {
        /// 0-based row
        row: u32,
        /// 0-based column
        column: u32,
    },

    /// Free-form sample token is empty or contains forbidden characters
    #[error("invalid sample identifier '{0}' (must be non-empty, without whitespace, '/' or a leading '#')")]
    Sample(String),
}

/// Plate coordinate, canonically rendered as `A01`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WellPosition {
    row: u32,
    column: u32,
}

impl WellPosition {
    /// Build from 0-based grid coordinates as stored on remote child objects
    ///
    /// # Errors
    ///
    /// Returns `IdentifierError::Grid` when the position is outside the plate
    pub fn from_grid(row: u32, column: u32) -> Result<Self, IdentifierError> {
        if row >= PLATE_ROWS || column >= PLATE_COLUMNS {
            return Err(IdentifierError::Grid { row, column });
        }
        Ok(Self { row, column })
    }

    /// 0-based row index
    #[must_use]
    pub fn row_index(self) -> u32 {
        self.row
    }

    /// 0-based column index
    #[must_use]
    pub fn column_index(self) -> u32 {
        self.column
    }

    /// Row letter, `A` for the first row
    #[must_use]
    pub fn row_letter(self) -> char {
        char::from_digit(self.row + 10, 36)
            .map_or('?', |c| c.to_ascii_uppercase())
    }

    /// 1-based column number
    #[must_use]
    pub fn column_number(self) -> u32 {
        self.column + 1
    }
}

impl FromStr for WellPosition {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let Some(letter) = chars.next() else {
            return Err(IdentifierError::WellFormat(trimmed.to_string()));
        };
        let digits = chars.as_str();
        if !letter.is_ascii_alphabetic()
            || digits.is_empty()
            || digits.len() > 3
            || !digits.chars().all(|c| c.is_ascii_digit())
        {
            return Err(IdentifierError::WellFormat(trimmed.to_string()));
        }

        let letter = letter.to_ascii_uppercase();
        let row = u32::from(letter) - u32::from('A');
        if row >= PLATE_ROWS {
            return Err(IdentifierError::RowLetter(letter));
        }

        let column: u32 = digits
            .parse()
            .map_err(|_| IdentifierError::WellFormat(trimmed.to_string()))?;
        if column == 0 || column > PLATE_COLUMNS {
            return Err(IdentifierError::Column(column));
        }

        Ok(Self {
            row,
            column: column - 1,
        })
    }
}

impl fmt::Display for WellPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}", self.row_letter(), self.column_number())
    }
}

impl TryFrom<String> for WellPosition {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WellPosition> for String {
    fn from(value: WellPosition) -> Self {
        value.to_string()
    }
}

/// Identity of an annotated object inside its plate
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKey {
    /// Plate coordinate
    Well(WellPosition),
    /// Free-form sample token
    Sample(String),
}

impl SampleKey {
    /// Parse a well coordinate
    ///
    /// # Errors
    ///
    /// Returns the grammar violation if `text` is not a coordinate
    pub fn well(text: &str) -> Result<Self, IdentifierError> {
        text.parse().map(Self::Well)
    }

    /// Validate a free-form sample token
    ///
    /// # Errors
    ///
    /// Returns `IdentifierError::Sample` for empty tokens or tokens with
    /// whitespace, `/`, or a leading comment marker
    pub fn sample(text: &str) -> Result<Self, IdentifierError> {
        let token = text.trim();
        if token.is_empty()
            || token.starts_with(COMMENT_MARKER)
            || token.chars().any(|c| c.is_whitespace() || c == '/')
        {
            return Err(IdentifierError::Sample(token.to_string()));
        }
        Ok(Self::Sample(token.to_string()))
    }

    /// Whether this key is a plate coordinate
    #[must_use]
    pub fn is_well(&self) -> bool {
        matches!(self, Self::Well(_))
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Well(position) => position.fmt(f),
            Self::Sample(token) => f.write_str(token),
        }
    }
}

/// Well/sample identifier, optionally qualified by plate name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleId {
    /// Plate name, needed when a screen holds several plates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate: Option<String>,
    /// Coordinate or sample token
    #[serde(flatten)]
    pub key: SampleKey,
}

impl SampleId {
    /// Unqualified well identifier
    #[must_use]
    pub fn well(position: WellPosition) -> Self {
        Self {
            plate: None,
            key: SampleKey::Well(position),
        }
    }

    /// Qualify with a plate name
    #[must_use]
    pub fn on_plate(mut self, plate: impl Into<String>) -> Self {
        self.plate = Some(plate.into());
        self
    }
}

impl FromStr for SampleId {
    type Err = IdentifierError;

    /// Accepts `A01`, `Plate1/A01` or a sample token; coordinates win over tokens
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (plate, rest) = match s.trim().rsplit_once('/') {
            Some((plate, rest)) => (Some(plate.trim().to_string()), rest),
            None => (None, s.trim()),
        };
        let key = SampleKey::well(rest).or_else(|_| SampleKey::sample(rest))?;
        Ok(Self { plate, key })
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.plate {
            Some(plate) => write!(f, "{plate}/{}", self.key),
            None => self.key.fmt(f),
        }
    }
}

/// Declared data type of an assay condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    /// Value restricted to the allowed set
    Categorical,
    /// Number, optionally bounded
    Numeric,
    /// Free text
    Text,
}

impl ConditionKind {
    /// Lowercase name used in spreadsheets and annotations
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Categorical => "categorical",
            Self::Numeric => "numeric",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "categorical" | "category" | "enum" => Ok(Self::Categorical),
            "numeric" | "number" | "float" | "integer" => Ok(Self::Numeric),
            "text" | "string" | "str" => Ok(Self::Text),
            other => Err(format!(
                "unknown condition type '{other}' (expected categorical, numeric or text)"
            )),
        }
    }
}

/// Schema entry for one per-well condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionDefinition {
    /// Condition name, used as column header and annotation key
    pub name: String,
    /// Declared data type
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    /// Allowed values; empty means unrestricted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
    /// Inclusive lower bound for numeric conditions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    /// Inclusive upper bound for numeric conditions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Unit of measurement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConditionDefinition {
    /// Create an unrestricted definition
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ConditionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            allowed_values: Vec::new(),
            minimum: None,
            maximum: None,
            unit: None,
            description: None,
        }
    }

    /// Restrict to an allowed value set
    #[must_use]
    pub fn with_allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Set inclusive numeric bounds
    #[must_use]
    pub fn with_range(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    /// Set the unit
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Validated value of a condition on one well
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    /// Numeric value, integral numbers kept as integers
    Number(serde_json::Number),
    /// Categorical or text value
    Text(String),
}

impl ConditionValue {
    /// Build a numeric value; `None` for non-finite input
    #[must_use]
    pub fn number(value: f64) -> Option<Self> {
        normalize_number(value).map(Self::Number)
    }

    /// Numeric value as `f64`
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            Self::Text(_) => None,
        }
    }

    /// Text value
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }

    /// Raw JSON form fed back through validation
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => n.fmt(f),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for ConditionValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

/// Largest magnitude at which every integer is exactly representable as `f64`
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Canonical JSON number for `value`
///
/// Integral values become integers so that `37`, `37.0` and `"37"` compare equal
/// after passing through any representation.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn normalize_number(value: f64) -> Option<serde_json::Number> {
    if !value.is_finite() {
        return None;
    }
    if value.fract() == 0.0 && value.abs() < EXACT_INTEGER_LIMIT {
        return Some(serde_json::Number::from(value as i64));
    }
    serde_json::Number::from_f64(value)
}

/// Grouped key/value section (`group -> key -> value`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupedInformation {
    groups: IndexMap<String, IndexMap<String, String>>,
}

impl GroupedInformation {
    /// Create an empty section
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous one for this group/key
    pub fn insert(
        &mut self,
        group: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        self.groups
            .entry(group.into())
            .or_default()
            .insert(key.into(), value.into())
    }

    /// Look up a value
    #[must_use]
    pub fn get(&self, group: &str, key: &str) -> Option<&str> {
        self.groups
            .get(group)
            .and_then(|g| g.get(key))
            .map(String::as_str)
    }

    /// Keys and values of one group
    #[must_use]
    pub fn group(&self, group: &str) -> Option<&IndexMap<String, String>> {
        self.groups.get(group)
    }

    /// Whether no value is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.values().all(IndexMap::is_empty)
    }

    /// Number of stored values
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.values().map(IndexMap::len).sum()
    }

    /// Iterate `(group, key, value)` in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.groups.iter().flat_map(|(group, entries)| {
            entries
                .iter()
                .map(move |(key, value)| (group.as_str(), key.as_str(), value.as_str()))
        })
    }
}

impl<G, K, V> FromIterator<(G, K, V)> for GroupedInformation
where
    G: Into<String>,
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (G, K, V)>>(iter: T) -> Self {
        let mut info = Self::new();
        for (group, key, value) in iter {
            info.insert(group, key, value);
        }
        info
    }
}

/// Controlled vocabulary sheet (`_`-prefixed in the workbook)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSheet {
    /// Sheet name including the leading underscore
    pub name: String,
    /// Header of the key column
    pub key_header: String,
    /// Header of the value column
    pub value_header: String,
    /// Vocabulary entries
    #[serde(default)]
    pub entries: IndexMap<String, String>,
}
