//! The MIHCSME metadata set and its structured-document form
//!
//! [`MetadataSet`] is the validated root aggregate. It can only be obtained
//! through [`MetadataSet::from_document`] (or deserialization, which goes
//! through the same path), so every instance in circulation satisfies:
//!
//! - required investigation fields are present and well-formed
//! - condition names are unique and each definition is self-consistent
//! - every identifier matches its grammar and appears at most once
//! - every annotation key is a declared condition and every value matches its type
//!
//! Edits go through [`MetadataSet::with_annotations`] and friends, which
//! return a new validated instance.

use crate::error::ValidationError;
use crate::investigation::InvestigationInformation;
use crate::types::{
    COMMENT_MARKER, ConditionDefinition, ConditionKind, ConditionValue, GroupedInformation,
    ReferenceSheet, SampleId, SampleKey,
};
use crate::validation::{FieldRule, RuleTable, element_path, member_path};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Section names shared by spreadsheet sheets, field paths and remote keys
pub mod section {
    /// Investigation Information
    pub const INVESTIGATION: &str = "InvestigationInformation";
    /// Study Information
    pub const STUDY: &str = "StudyInformation";
    /// Assay Information
    pub const ASSAY: &str = "AssayInformation";
    /// Condition definitions
    pub const CONDITION_DEFINITIONS: &str = "AssayConditionDefinitions";
    /// Per-well annotations
    pub const ANNOTATIONS: &str = "AssayConditions";
    /// Controlled vocabulary sheets
    pub const REFERENCE_SHEETS: &str = "ReferenceSheets";
}

/// Column headers that cannot be used as condition names
pub const RESERVED_COLUMNS: [&str; 3] = ["Plate", "Well", "Sample"];

/// Separator between allowed values in a single spreadsheet cell
pub const ALLOWED_VALUES_SEPARATOR: char = '|';

/// Group header that marks the title row of key/value sheets
pub const GROUP_HEADER: &str = "Annotation_groups";

/// Condition values of one well, in declaration order
pub type ConditionValues = IndexMap<String, ConditionValue>;

/// Ordered, validated condition definitions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssayConditions {
    definitions: Vec<ConditionDefinition>,
}

impl AssayConditions {
    /// Validate a list of definitions
    ///
    /// # Errors
    ///
    /// Returns every inconsistency: empty, reserved or duplicate names,
    /// categorical conditions without values, bounds on non-numeric
    /// conditions, inverted bounds and unparsable numeric allowed values
    pub fn new(definitions: Vec<ConditionDefinition>) -> Result<Self, ValidationError> {
        let mut issues = ValidationError::new();
        let conditions = Self::check(definitions, &mut issues);
        issues.into_result(conditions)
    }

    fn check(definitions: Vec<ConditionDefinition>, issues: &mut ValidationError) -> Self {
        let mut seen = IndexSet::new();
        let mut accepted = Vec::with_capacity(definitions.len());

        for (index, mut definition) in definitions.into_iter().enumerate() {
            definition.name = definition.name.trim().to_string();
            trim_optional(&mut definition.unit);
            trim_optional(&mut definition.description);
            definition.allowed_values = definition
                .allowed_values
                .iter()
                .map(|v| v.trim().to_string())
                .collect();

            let scope = if definition.name.is_empty() {
                element_path(section::CONDITION_DEFINITIONS, format!("#{index}"))
            } else {
                element_path(section::CONDITION_DEFINITIONS, &definition.name)
            };
            let before = issues.len();

            if definition.name.is_empty() {
                issues.push(&scope, "condition name is empty");
            } else if definition.name.starts_with(COMMENT_MARKER) {
                issues.push(&scope, "condition name cannot start with '#'");
            } else if RESERVED_COLUMNS
                .iter()
                .any(|r| r.eq_ignore_ascii_case(&definition.name))
            {
                issues.push(&scope, "name is reserved for identifier columns");
            } else if !seen.insert(definition.name.clone()) {
                issues.push(&scope, "duplicate condition name");
            }

            if definition.allowed_values.iter().any(String::is_empty) {
                issues.push(member_path(&scope, "allowed_values"), "allowed values cannot be empty");
            }
            if definition
                .allowed_values
                .iter()
                .any(|v| v.contains(ALLOWED_VALUES_SEPARATOR))
            {
                issues.push(
                    member_path(&scope, "allowed_values"),
                    format!("allowed values cannot contain '{ALLOWED_VALUES_SEPARATOR}'"),
                );
            }

            match definition.kind {
                ConditionKind::Categorical if definition.allowed_values.is_empty() => {
                    issues.push(
                        member_path(&scope, "allowed_values"),
                        "categorical conditions need at least one allowed value",
                    );
                }
                ConditionKind::Numeric => {
                    for value in &definition.allowed_values {
                        if value.parse::<f64>().is_err() {
                            issues.push(
                                member_path(&scope, "allowed_values"),
                                format!("'{value}' is not a number"),
                            );
                        }
                    }
                    if let (Some(min), Some(max)) = (definition.minimum, definition.maximum) {
                        if min > max {
                            issues.push(
                                member_path(&scope, "minimum"),
                                format!("minimum {min} is greater than maximum {max}"),
                            );
                        }
                    }
                    for (field, bound) in [("minimum", definition.minimum), ("maximum", definition.maximum)] {
                        if bound.is_some_and(|b| !b.is_finite()) {
                            issues.push(member_path(&scope, field), "bound must be a finite number");
                        }
                    }
                }
                _ => {
                    if definition.minimum.is_some() || definition.maximum.is_some() {
                        issues.push(
                            member_path(&scope, "minimum"),
                            "bounds only apply to numeric conditions",
                        );
                    }
                }
            }

            if issues.len() == before {
                accepted.push(definition);
            }
        }

        Self {
            definitions: accepted,
        }
    }

    /// Definitions in declaration order
    #[must_use]
    pub fn definitions(&self) -> &[ConditionDefinition] {
        &self.definitions
    }

    /// Look up a definition by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ConditionDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    /// Declared names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|d| d.name.as_str())
    }

    /// Number of definitions
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether no condition is declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Strict rule table for per-well values
    #[must_use]
    pub fn rule_table(&self) -> RuleTable {
        RuleTable::new(self.definitions.iter().map(FieldRule::from)).strict()
    }
}

/// One well or sample in document form, before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    /// Plate name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate: Option<String>,
    /// Well coordinate (mutually exclusive with `sample`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub well: Option<String>,
    /// Sample token (mutually exclusive with `well`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
    /// Raw condition values
    #[serde(default)]
    pub values: IndexMap<String, Value>,
}

impl AnnotationRecord {
    /// Record for a well coordinate
    #[must_use]
    pub fn well(well: impl Into<String>) -> Self {
        Self {
            well: Some(well.into()),
            ..Self::default()
        }
    }

    /// Record for a sample token
    #[must_use]
    pub fn sample(sample: impl Into<String>) -> Self {
        Self {
            sample: Some(sample.into()),
            ..Self::default()
        }
    }

    /// Record for an already validated identifier
    #[must_use]
    pub fn for_id(id: &SampleId) -> Self {
        let base = match &id.key {
            SampleKey::Well(position) => Self::well(position.to_string()),
            SampleKey::Sample(token) => Self::sample(token.clone()),
        };
        Self {
            plate: id.plate.clone(),
            ..base
        }
    }

    /// Set the plate name
    #[must_use]
    pub fn on_plate(mut self, plate: impl Into<String>) -> Self {
        self.plate = Some(plate.into());
        self
    }

    /// Add a raw value
    #[must_use]
    pub fn with_value(mut self, condition: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(condition.into(), value.into());
        self
    }

    /// Parse the identifier fields
    ///
    /// # Errors
    ///
    /// Returns the reason text when neither or both of `well`/`sample` are set,
    /// or when the set one violates its grammar
    pub fn parse_id(&self) -> Result<SampleId, String> {
        let key = match (&self.well, &self.sample) {
            (Some(well), None) => SampleKey::well(well).map_err(|e| e.to_string())?,
            (None, Some(sample)) => SampleKey::sample(sample).map_err(|e| e.to_string())?,
            (Some(_), Some(_)) => return Err("both well and sample identifiers given".into()),
            (None, None) => return Err("missing well or sample identifier".into()),
        };
        let plate = self
            .plate
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        if plate
            .as_deref()
            .is_some_and(|p| p.contains('/') || p.starts_with(COMMENT_MARKER))
        {
            return Err("plate name cannot contain '/' or start with '#'".into());
        }
        Ok(SampleId { plate, key })
    }
}

/// Structured-document form of a metadata set
///
/// This is the persistence contract: nested, field-named, with arrays for
/// condition definitions and annotations. It carries raw values; converting
/// it into a [`MetadataSet`] runs full validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    /// `group -> key -> value` rows of Investigation Information
    #[serde(default)]
    pub investigation_information: GroupedInformation,
    /// Optional Study Information rows
    #[serde(default, skip_serializing_if = "GroupedInformation::is_empty")]
    pub study_information: GroupedInformation,
    /// Optional Assay Information rows
    #[serde(default, skip_serializing_if = "GroupedInformation::is_empty")]
    pub assay_information: GroupedInformation,
    /// Condition definitions in declaration order
    #[serde(default)]
    pub assay_conditions: Vec<ConditionDefinition>,
    /// Per-well/per-sample annotations
    #[serde(default)]
    pub annotations: Vec<AnnotationRecord>,
    /// Controlled vocabulary sheets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_sheets: Vec<ReferenceSheet>,
}

/// Validated MIHCSME metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MetadataDocument", into = "MetadataDocument")]
pub struct MetadataSet {
    investigation: InvestigationInformation,
    study: GroupedInformation,
    assay: GroupedInformation,
    conditions: AssayConditions,
    annotations: IndexMap<SampleId, ConditionValues>,
    reference_sheets: Vec<ReferenceSheet>,
}

impl MetadataSet {
    /// Validate a document into a metadata set
    ///
    /// Annotations whose values are all blank carry no metadata and are dropped.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing every offending field across all sections
    pub fn from_document(document: MetadataDocument) -> Result<Self, ValidationError> {
        let mut issues = ValidationError::new();

        let investigation =
            InvestigationInformation::check_groups(&document.investigation_information, &mut issues);
        check_group_names(section::INVESTIGATION, &document.investigation_information, &mut issues);
        let study = clean_groups(section::STUDY, &document.study_information, &mut issues);
        let assay = clean_groups(section::ASSAY, &document.assay_information, &mut issues);
        let conditions = AssayConditions::check(document.assay_conditions, &mut issues);
        let annotations = check_annotations(&conditions, document.annotations, &mut issues);
        let reference_sheets = check_reference_sheets(document.reference_sheets, &mut issues);

        debug!(
            conditions = conditions.len(),
            annotations = annotations.len(),
            issues = issues.len(),
            "checked metadata document"
        );
        issues.into_result(Self {
            investigation,
            study,
            assay,
            conditions,
            annotations,
            reference_sheets,
        })
    }

    /// Structured-document form
    #[must_use]
    pub fn to_document(&self) -> MetadataDocument {
        MetadataDocument {
            investigation_information: self.investigation.to_groups(),
            study_information: self.study.clone(),
            assay_information: self.assay.clone(),
            assay_conditions: self.conditions.definitions.clone(),
            annotations: self
                .annotations
                .iter()
                .map(|(id, values)| AnnotationRecord {
                    values: values
                        .iter()
                        .map(|(name, value)| (name.clone(), value.to_json()))
                        .collect(),
                    ..AnnotationRecord::for_id(id)
                })
                .collect(),
            reference_sheets: self.reference_sheets.clone(),
        }
    }

    /// New validated instance with the annotations replaced
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the new annotations violate the declared conditions
    pub fn with_annotations(&self, annotations: Vec<AnnotationRecord>) -> Result<Self, ValidationError> {
        let mut document = self.to_document();
        document.annotations = annotations;
        Self::from_document(document)
    }

    /// New validated instance with the condition definitions replaced
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if existing annotations no longer match the new conditions
    pub fn with_conditions(&self, conditions: Vec<ConditionDefinition>) -> Result<Self, ValidationError> {
        let mut document = self.to_document();
        document.assay_conditions = conditions;
        Self::from_document(document)
    }

    /// Investigation Information
    #[must_use]
    pub fn investigation(&self) -> &InvestigationInformation {
        &self.investigation
    }

    /// Study Information rows
    #[must_use]
    pub fn study(&self) -> &GroupedInformation {
        &self.study
    }

    /// Assay Information rows
    #[must_use]
    pub fn assay(&self) -> &GroupedInformation {
        &self.assay
    }

    /// Declared conditions
    #[must_use]
    pub fn conditions(&self) -> &AssayConditions {
        &self.conditions
    }

    /// Annotations in insertion order
    pub fn annotations(&self) -> impl Iterator<Item = (&SampleId, &ConditionValues)> {
        self.annotations.iter()
    }

    /// Values of one well/sample
    #[must_use]
    pub fn annotation(&self, id: &SampleId) -> Option<&ConditionValues> {
        self.annotations.get(id)
    }

    /// Number of annotated wells/samples
    #[must_use]
    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    /// Whether identifiers are sample tokens rather than coordinates
    #[must_use]
    pub fn uses_sample_identifiers(&self) -> bool {
        self.annotations.keys().any(|id| !id.key.is_well())
    }

    /// Whether any identifier carries a plate name
    #[must_use]
    pub fn uses_plate_names(&self) -> bool {
        self.annotations.keys().any(|id| id.plate.is_some())
    }

    /// Controlled vocabulary sheets
    #[must_use]
    pub fn reference_sheets(&self) -> &[ReferenceSheet] {
        &self.reference_sheets
    }

    /// Check that no leading spreadsheet cell starts with `prefix`
    ///
    /// The workbook parser skips rows whose first cell starts with its
    /// comment prefix. Group names, condition names, plate names, annotation
    /// identifiers, reference headers and vocabulary keys all land in that
    /// first cell, so a value starting with the prefix would vanish on the
    /// next read. The `'#'` rule of [`MetadataSet::from_document`] covers the
    /// default prefix; this covers any other.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming every leading cell that starts with `prefix`
    pub fn check_comment_prefix(&self, prefix: &str) -> Result<(), ValidationError> {
        let mut issues = ValidationError::new();
        if prefix.is_empty() {
            return Ok(());
        }
        let reason = format!("leading cell cannot start with the comment prefix '{prefix}'");

        let investigation = self.investigation.to_groups();
        for (scope, groups) in [
            (section::INVESTIGATION, &investigation),
            (section::STUDY, &self.study),
            (section::ASSAY, &self.assay),
        ] {
            let mut reported = IndexSet::new();
            for (group, _, _) in groups.iter() {
                if group.starts_with(prefix) && reported.insert(group) {
                    issues.push(member_path(scope, group), reason.as_str());
                }
            }
        }
        for definition in &self.conditions.definitions {
            if definition.name.starts_with(prefix) {
                issues.push(
                    element_path(section::CONDITION_DEFINITIONS, &definition.name),
                    reason.as_str(),
                );
            }
        }
        let plate_column = self.uses_plate_names();
        for id in self.annotations.keys() {
            let leading = match (&id.plate, plate_column) {
                (Some(plate), _) => Some(plate.clone()),
                (None, true) => None,
                (None, false) => Some(id.key.to_string()),
            };
            if leading.is_some_and(|cell| cell.starts_with(prefix)) {
                issues.push(element_path(section::ANNOTATIONS, id), reason.as_str());
            }
        }
        for sheet in &self.reference_sheets {
            let scope = element_path(section::REFERENCE_SHEETS, &sheet.name);
            if sheet.key_header.starts_with(prefix) {
                issues.push(member_path(&scope, &sheet.key_header), reason.as_str());
            }
            for key in sheet.entries.keys().filter(|k| k.starts_with(prefix)) {
                issues.push(member_path(&scope, key), reason.as_str());
            }
        }
        issues.into_result(())
    }
}

impl TryFrom<MetadataDocument> for MetadataSet {
    type Error = ValidationError;

    fn try_from(document: MetadataDocument) -> Result<Self, Self::Error> {
        Self::from_document(document)
    }
}

impl From<MetadataSet> for MetadataDocument {
    fn from(metadata: MetadataSet) -> Self {
        metadata.to_document()
    }
}

fn trim_optional(value: &mut Option<String>) {
    *value = value
        .take()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
}

fn check_group_names(scope: &str, groups: &GroupedInformation, issues: &mut ValidationError) {
    let mut reported = IndexSet::new();
    for (group, key, _) in groups.iter() {
        let trimmed = group.trim();
        if (trimmed.is_empty()
            || trimmed.contains('/')
            || trimmed.starts_with(COMMENT_MARKER)
            || trimmed == GROUP_HEADER)
            && reported.insert(group)
        {
            issues.push(
                member_path(scope, group),
                "group name must be non-empty, without '/', not start with '#' and not be 'Annotation_groups'",
            );
        }
        if key.trim().is_empty() {
            issues.push(member_path(scope, group), "key is empty");
        }
    }
}

fn clean_groups(scope: &str, groups: &GroupedInformation, issues: &mut ValidationError) -> GroupedInformation {
    check_group_names(scope, groups, issues);
    groups
        .iter()
        .map(|(group, key, value)| (group.trim(), key.trim(), value.trim()))
        .filter(|(_, _, value)| !value.is_empty())
        .collect()
}

fn check_annotations(
    conditions: &AssayConditions,
    records: Vec<AnnotationRecord>,
    issues: &mut ValidationError,
) -> IndexMap<SampleId, ConditionValues> {
    let rules = conditions.rule_table();
    let mut annotations: IndexMap<SampleId, ConditionValues> = IndexMap::new();
    let mut seen = IndexSet::new();
    let (mut wells, mut samples) = (0_usize, 0_usize);

    for (index, record) in records.into_iter().enumerate() {
        let id = match record.parse_id() {
            Ok(id) => id,
            Err(reason) => {
                issues.push(element_path(section::ANNOTATIONS, format!("#{index}")), reason);
                continue;
            }
        };
        let scope = element_path(section::ANNOTATIONS, &id);
        if !seen.insert(id.clone()) {
            issues.push(scope, "duplicate identifier");
            continue;
        }
        if id.key.is_well() { wells += 1 } else { samples += 1 }

        let checked = rules.check_record(
            &scope,
            record.values.iter().map(|(name, value)| (name.as_str(), value)),
            issues,
        );
        if checked.is_empty() {
            continue;
        }
        // Declaration order, independent of the order values arrived in.
        let values: ConditionValues = conditions
            .names()
            .filter_map(|name| {
                checked
                    .get(name)
                    .map(|v| (name.to_string(), ConditionValue::from(v.clone())))
            })
            .collect();
        annotations.insert(id, values);
    }

    if wells > 0 && samples > 0 {
        issues.push(
            section::ANNOTATIONS,
            "well coordinates and sample identifiers cannot be mixed in one metadata set",
        );
    }
    annotations
}

fn check_reference_sheets(sheets: Vec<ReferenceSheet>, issues: &mut ValidationError) -> Vec<ReferenceSheet> {
    let sheets: Vec<ReferenceSheet> = sheets
        .into_iter()
        .map(|sheet| ReferenceSheet {
            name: sheet.name.trim().to_string(),
            key_header: sheet.key_header.trim().to_string(),
            value_header: sheet.value_header.trim().to_string(),
            entries: sheet
                .entries
                .iter()
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .collect(),
        })
        .collect();
    let mut names = IndexSet::new();
    for sheet in &sheets {
        let scope = element_path(section::REFERENCE_SHEETS, &sheet.name);
        if !sheet.name.starts_with('_') {
            issues.push(&scope, "reference sheet names must start with '_'");
        }
        if sheet.name.chars().count() > 31
            || sheet.name.contains(['[', ']', ':', '*', '?', '/', '\\'])
        {
            issues.push(&scope, "not a valid sheet name (max 31 characters, no []:*?/\\)");
        }
        if !names.insert(sheet.name.to_lowercase()) {
            issues.push(&scope, "duplicate reference sheet (sheet names are case-insensitive)");
        }
        if sheet.key_header.is_empty() || sheet.value_header.is_empty() {
            issues.push(&scope, "key and value headers must be non-empty");
        }
        if sheet.key_header.starts_with(COMMENT_MARKER) {
            issues.push(member_path(&scope, &sheet.key_header), "key header cannot start with '#'");
        }
        for key in sheet.entries.keys() {
            if key.trim().is_empty() || key.starts_with(COMMENT_MARKER) {
                issues.push(
                    member_path(&scope, key),
                    "vocabulary keys must be non-empty and not start with '#'",
                );
            }
        }
    }
    sheets
}
