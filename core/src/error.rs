//! Error types for MIHCSME metadata operations

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single offending field found while constructing a metadata set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Dotted path to the field, e.g. `AssayConditions[A01].CellLine`
    pub path: String,
    /// Why the field was rejected
    pub reason: String,
    /// Where the raw value came from (sheet and row), when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl FieldIssue {
    /// Create an issue without source location
    #[must_use]
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
            location: None,
        }
    }

    /// Attach a source location
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} ({location}): {}", self.path, self.reason),
            None => write!(f, "{}: {}", self.path, self.reason),
        }
    }
}

/// Model construction or consistency failure
///
/// Carries every offending field, never just the first one.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[error("validation failed with {} issue(s): {}", .issues.len(), join_lines(.issues))]
pub struct ValidationError {
    issues: Vec<FieldIssue>,
}

impl ValidationError {
    /// Create an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an error holding a single issue
    #[must_use]
    pub fn single(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            issues: vec![FieldIssue::new(path, reason)],
        }
    }

    /// Record an issue
    pub fn push(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.issues.push(FieldIssue::new(path, reason));
    }

    /// Record a fully built issue
    pub fn push_issue(&mut self, issue: FieldIssue) {
        self.issues.push(issue);
    }

    /// Move every issue of `other` into this accumulator
    pub fn extend(&mut self, other: ValidationError) {
        self.issues.extend(other.issues);
    }

    /// Whether no issue has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Number of recorded issues
    #[must_use]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Recorded issues in discovery order
    #[must_use]
    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    /// Consume into the recorded issues
    #[must_use]
    pub fn into_issues(self) -> Vec<FieldIssue> {
        self.issues
    }

    /// Return `value` when nothing was recorded, otherwise the accumulated error
    ///
    /// # Errors
    ///
    /// Returns `self` if at least one issue was recorded
    pub fn into_result<T>(self, value: T) -> std::result::Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl From<Vec<FieldIssue>> for ValidationError {
    fn from(issues: Vec<FieldIssue>) -> Self {
        Self { issues }
    }
}

/// Category of a spreadsheet problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Layout is malformed: missing sheet or column, duplicate row, undeclared column
    Structure,
    /// A cell value failed a field rule
    Value,
}

/// One problem found while reading a spreadsheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseIssue {
    /// Structural or value problem
    pub kind: IssueKind,
    /// Sheet the problem was found on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    /// 1-based spreadsheet row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
    /// Column header or field path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Why the input was rejected
    pub reason: String,
}

impl ParseIssue {
    /// Create a structural issue on a sheet
    #[must_use]
    pub fn structure(sheet: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: IssueKind::Structure,
            sheet: Some(sheet.into()),
            row: None,
            field: None,
            reason: reason.into(),
        }
    }

    /// Create a value issue on a sheet
    #[must_use]
    pub fn value(sheet: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: IssueKind::Value,
            ..Self::structure(sheet, reason)
        }
    }

    /// Attach the 1-based row number
    #[must_use]
    pub fn at_row(mut self, row: u32) -> Self {
        self.row = Some(row);
        self
    }

    /// Attach the offending column or field path
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Render the location part (`sheet row N`) if any is known
    #[must_use]
    pub fn location(&self) -> Option<String> {
        match (&self.sheet, self.row) {
            (Some(sheet), Some(row)) => Some(format!("{sheet} row {row}")),
            (Some(sheet), None) => Some(sheet.clone()),
            (None, Some(row)) => Some(format!("row {row}")),
            (None, None) => None,
        }
    }
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = self.location() {
            write!(f, "{location}: ")?;
        }
        if let Some(field) = &self.field {
            write!(f, "{field}: ")?;
        }
        f.write_str(&self.reason)
    }
}

/// Spreadsheet is malformed or holds unparsable values
///
/// Aggregates every problem found in one pass over the workbook.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[error("spreadsheet parsing failed with {} issue(s): {}", .issues.len(), join_lines(.issues))]
pub struct ParseError {
    issues: Vec<ParseIssue>,
}

impl ParseError {
    /// Wrap collected issues
    #[must_use]
    pub fn new(issues: Vec<ParseIssue>) -> Self {
        Self { issues }
    }

    /// Collected issues in discovery order
    #[must_use]
    pub fn issues(&self) -> &[ParseIssue] {
        &self.issues
    }

    /// Whether any issue is structural
    #[must_use]
    pub fn has_structural_issues(&self) -> bool {
        self.issues.iter().any(|i| i.kind == IssueKind::Structure)
    }

    /// Classify the collected issues into the caller-facing error
    ///
    /// Value-only problems surface as a [`ValidationError`] whose paths name the
    /// offending field and row; anything structural keeps the full [`ParseError`].
    #[must_use]
    pub fn into_error(self) -> MihcsmeError {
        if self.has_structural_issues() {
            return MihcsmeError::Parse(self);
        }
        let issues = self
            .issues
            .into_iter()
            .map(|issue| {
                let location = issue.location();
                let mut field = FieldIssue::new(issue.field.unwrap_or_default(), issue.reason);
                field.location = location;
                field
            })
            .collect::<Vec<_>>();
        MihcsmeError::Validation(ValidationError::from(issues))
    }
}

/// A remote collaborator call failed (network, auth, server side)
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("remote call '{operation}' failed: {message}")]
pub struct RemoteIoError {
    /// Capability that was invoked
    pub operation: String,
    /// Opaque failure text from the collaborator
    pub message: String,
}

impl RemoteIoError {
    /// Create a new remote failure
    #[must_use]
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// A well/sample identifier could not be matched to a remote child object
///
/// Recorded per well in upload and download reports, never raised.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteResolutionError {
    /// No child carries this coordinate
    #[error("no child object matches '{identifier}'")]
    NoMatch {
        /// Identifier that was looked up
        identifier: String,
    },

    /// Several children carry this coordinate (plate name missing on a screen)
    #[error("'{identifier}' matches {count} child objects; add a plate name")]
    Ambiguous {
        /// Identifier that was looked up
        identifier: String,
        /// Number of matching children
        count: usize,
    },

    /// Child coordinate metadata cannot be turned into an identifier
    #[error("child object {child} has unusable coordinates: {reason}")]
    InvalidPosition {
        /// Remote child id
        child: i64,
        /// Why the coordinates were rejected
        reason: String,
    },
}

/// Main error type for MIHCSME operations
#[derive(Error, Debug)]
pub enum MihcsmeError {
    /// Model construction or consistency failure
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Spreadsheet structurally malformed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Container-level remote call failed
    #[error(transparent)]
    RemoteIo(#[from] RemoteIoError),

    /// Container carries no metadata annotation to download
    #[error("{container} has no metadata annotation in namespace '{namespace}'")]
    MissingContainerMetadata {
        /// Container display form, e.g. `Plate:51`
        container: String,
        /// Namespace that was searched
        namespace: String,
    },

    /// Workbook could not be opened, read or written
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MihcsmeError {
    /// Create a spreadsheet error
    #[must_use]
    pub fn spreadsheet(message: impl Into<String>) -> Self {
        Self::Spreadsheet(message.into())
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<serde_json::Error> for MihcsmeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON: {err}"))
    }
}

impl From<serde_yaml::Error> for MihcsmeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(format!("YAML: {err}"))
    }
}

/// Result type for MIHCSME operations
pub type Result<T> = std::result::Result<T, MihcsmeError>;

fn join_lines<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_accumulates() {
        let mut err = ValidationError::new();
        assert!(err.is_empty());
        err.push("InvestigationInformation.DataOwner.First Name", "required field is missing");
        err.push("AssayConditions[A01].CellLine", "'HEK293' is not allowed");
        assert_eq!(err.len(), 2);

        let text = err.to_string();
        assert!(text.contains("2 issue(s)"));
        assert!(text.contains("CellLine"));
        assert!(err.into_result(()).is_err());
    }

    #[test]
    fn test_value_only_parse_error_becomes_validation_error() {
        let err = ParseError::new(vec![
            ParseIssue::value("AssayConditions", "'HEK293' is not allowed")
                .at_row(3)
                .with_field("AssayConditions[A01].CellLine"),
        ]);

        match err.into_error() {
            MihcsmeError::Validation(v) => {
                let issue = &v.issues()[0];
                assert_eq!(issue.path, "AssayConditions[A01].CellLine");
                assert_eq!(issue.location.as_deref(), Some("AssayConditions row 3"));
            }
            other => panic!("Wrong error type: {other:?}"),
        }
    }

    #[test]
    fn test_structural_issue_keeps_parse_error() {
        let err = ParseError::new(vec![
            ParseIssue::value("AssayConditions", "not a number").at_row(4),
            ParseIssue::structure("AssayConditions", "duplicate identifier A01").at_row(5),
        ]);
        assert!(matches!(err.into_error(), MihcsmeError::Parse(p) if p.issues().len() == 2));
    }

    #[test]
    fn test_parse_issue_display() {
        let issue = ParseIssue::structure("AssayConditions", "column is not declared")
            .at_row(1)
            .with_field("Dose");
        assert_eq!(
            issue.to_string(),
            "AssayConditions row 1: Dose: column is not declared"
        );
    }

    #[test]
    fn test_serde_error_conversion() {
        let err: MihcsmeError = serde_json::from_str::<serde_json::Value>("{")
            .map_err(MihcsmeError::from)
            .unwrap_err();
        assert!(matches!(err, MihcsmeError::Serialization(msg) if msg.starts_with("JSON")));
    }
}
