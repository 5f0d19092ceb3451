//! Declarative field rules and the generic validator that walks them
//!
//! Every constraint on raw metadata values is expressed as a [`FieldRule`]
//! collected in a [`RuleTable`]. Investigation fields use a static table;
//! per-well conditions get a table built from their declared definitions.

use crate::error::ValidationError;
use crate::types::{ConditionDefinition, ConditionKind, ConditionValue, normalize_number};
use chrono::NaiveDate;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Calendar date format accepted for date fields
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Shape a raw value must take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Any scalar, rendered as trimmed text
    Text,
    /// Finite number
    Number,
    /// Calendar date `YYYY-MM-DD`
    Date,
    /// `local@domain`
    Email,
    /// ORCID iD `dddd-dddd-dddd-dddX`
    Orcid,
}

/// Constraints on a single named field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    /// Field name as it appears in the raw record
    pub name: String,
    /// Expected value shape
    pub kind: ValueKind,
    /// Whether the field must be present and non-empty
    pub required: bool,
    /// Allowed values; empty means unrestricted
    pub allowed_values: Vec<String>,
    /// Inclusive lower bound for numbers
    pub minimum: Option<f64>,
    /// Inclusive upper bound for numbers
    pub maximum: Option<f64>,
}

impl FieldRule {
    /// Optional, unrestricted field
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            allowed_values: Vec::new(),
            minimum: None,
            maximum: None,
        }
    }

    /// Mark as required
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Restrict to an allowed value set
    #[must_use]
    pub fn allowed<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Bound numeric values
    #[must_use]
    pub fn range(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    /// Check one raw value
    ///
    /// Returns `Ok(None)` for blank input (null or whitespace-only text).
    ///
    /// # Errors
    ///
    /// Returns the reason text when the value violates this rule
    pub fn check(&self, raw: &Value) -> Result<Option<CheckedValue>, String> {
        let checked = match self.kind {
            ValueKind::Text => scalar_text(raw)?.map(CheckedValue::Text),
            ValueKind::Number => self.check_number(raw)?,
            ValueKind::Date => match scalar_text(raw)? {
                Some(text) => Some(CheckedValue::Date(
                    NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|_| {
                        format!("'{text}' is not a calendar date (expected YYYY-MM-DD)")
                    })?,
                )),
                None => None,
            },
            ValueKind::Email => match scalar_text(raw)? {
                Some(text) if is_email(&text) => Some(CheckedValue::Text(text)),
                Some(text) => return Err(format!("'{text}' is not an e-mail address")),
                None => None,
            },
            ValueKind::Orcid => match scalar_text(raw)? {
                Some(text) if is_orcid(&text) => Some(CheckedValue::Text(text)),
                Some(text) => {
                    return Err(format!(
                        "'{text}' is not an ORCID iD (expected dddd-dddd-dddd-dddX)"
                    ));
                }
                None => None,
            },
        };

        if let (Some(CheckedValue::Text(text)), false) = (&checked, self.allowed_values.is_empty())
        {
            if !self.allowed_values.iter().any(|v| v == text) {
                return Err(format!(
                    "'{text}' is not one of the allowed values: {}",
                    self.allowed_values.join(", ")
                ));
            }
        }
        Ok(checked)
    }

    #[allow(clippy::float_cmp)]
    fn check_number(&self, raw: &Value) -> Result<Option<CheckedValue>, String> {
        let value = match raw {
            Value::Null => return Ok(None),
            Value::Number(n) => n.as_f64().ok_or_else(|| format!("{n} is not a finite number"))?,
            Value::String(s) if s.trim().is_empty() => return Ok(None),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", s.trim()))?,
            other => return Err(format!("{other} is not a number")),
        };

        let number =
            normalize_number(value).ok_or_else(|| format!("{value} is not a finite number"))?;
        if let Some(min) = self.minimum {
            if value < min {
                return Err(format!("{number} is below the minimum {min}"));
            }
        }
        if let Some(max) = self.maximum {
            if value > max {
                return Err(format!("{number} is above the maximum {max}"));
            }
        }
        if !self.allowed_values.is_empty()
            && !self
                .allowed_values
                .iter()
                .filter_map(|v| v.trim().parse::<f64>().ok())
                .any(|allowed| allowed == value)
        {
            return Err(format!(
                "{number} is not one of the allowed values: {}",
                self.allowed_values.join(", ")
            ));
        }
        Ok(Some(CheckedValue::Number(number)))
    }
}

/// Value that passed its rule
#[derive(Debug, Clone, PartialEq)]
pub enum CheckedValue {
    /// Trimmed text
    Text(String),
    /// Canonical number
    Number(serde_json::Number),
    /// Calendar date
    Date(NaiveDate),
}

impl CheckedValue {
    /// Text rendering (dates as `YYYY-MM-DD`)
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
            Self::Date(d) => d.format(DATE_FORMAT).to_string(),
        }
    }

    /// Date value, if this is one
    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<CheckedValue> for ConditionValue {
    fn from(value: CheckedValue) -> Self {
        match value {
            CheckedValue::Number(n) => Self::Number(n),
            other => Self::Text(other.into_text()),
        }
    }
}

/// Ordered set of field rules walked by [`RuleTable::check_record`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleTable {
    rules: IndexMap<String, FieldRule>,
    reject_unknown: bool,
}

impl RuleTable {
    /// Build a table that ignores fields without a rule
    #[must_use]
    pub fn new(rules: impl IntoIterator<Item = FieldRule>) -> Self {
        Self {
            rules: rules.into_iter().map(|r| (r.name.clone(), r)).collect(),
            reject_unknown: false,
        }
    }

    /// Reject fields that have no rule
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.reject_unknown = true;
        self
    }

    /// Rule for a field
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&FieldRule> {
        self.rules.get(name)
    }

    /// Whether a rule exists for `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Field names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Validate a record of raw values
    ///
    /// Every violation is pushed into `issues` under `scope.field`; checked
    /// values are returned in record order with blank values dropped. Fields
    /// without a rule are skipped, or reported when the table is strict.
    pub fn check_record<'a, I>(
        &self,
        scope: &str,
        record: I,
        issues: &mut ValidationError,
    ) -> IndexMap<String, CheckedValue>
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let mut checked = IndexMap::new();
        for (name, raw) in record {
            let path = member_path(scope, name);
            let Some(rule) = self.rules.get(name) else {
                if self.reject_unknown {
                    issues.push(path, format!("'{name}' is not a declared condition"));
                }
                continue;
            };
            match rule.check(raw) {
                Ok(Some(value)) => {
                    checked.insert(name.to_string(), value);
                }
                Ok(None) => {}
                Err(reason) => issues.push(path, reason),
            }
        }

        for rule in self.rules.values().filter(|r| r.required) {
            if !checked.contains_key(&rule.name) && !has_field(issues, scope, &rule.name) {
                issues.push(member_path(scope, &rule.name), "required field is missing");
            }
        }
        checked
    }
}

impl From<&ConditionDefinition> for FieldRule {
    fn from(definition: &ConditionDefinition) -> Self {
        let kind = match definition.kind {
            ConditionKind::Numeric => ValueKind::Number,
            ConditionKind::Categorical | ConditionKind::Text => ValueKind::Text,
        };
        FieldRule::new(definition.name.clone(), kind)
            .allowed(definition.allowed_values.iter().cloned())
            .range(definition.minimum, definition.maximum)
    }
}

/// Join a scope and a member name into a field path
#[must_use]
pub fn member_path(scope: &str, member: &str) -> String {
    format!("{scope}.{member}")
}

/// Indexed element path, e.g. `AssayConditions[A01]`
#[must_use]
pub fn element_path(scope: &str, element: impl std::fmt::Display) -> String {
    format!("{scope}[{element}]")
}

fn has_field(issues: &ValidationError, scope: &str, name: &str) -> bool {
    let path = member_path(scope, name);
    issues.issues().iter().any(|i| i.path == path)
}

fn scalar_text(raw: &Value) -> Result<Option<String>, String> {
    let text = match raw {
        Value::Null => return Ok(None),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Object(_) => {
            return Err("expected a single value, found a nested structure".to_string());
        }
    };
    Ok((!text.is_empty()).then_some(text))
}

static EMAIL_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s.](?:[^@\s]*\.)+[^@\s.]+$").ok());

static ORCID_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{4}-[0-9]{4}-[0-9]{3}[0-9X]$").ok());

fn is_email(text: &str) -> bool {
    EMAIL_PATTERN.as_ref().is_some_and(|re| re.is_match(text))
}

fn is_orcid(text: &str) -> bool {
    ORCID_PATTERN.as_ref().is_some_and(|re| re.is_match(text))
}
