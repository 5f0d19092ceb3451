//! Map-annotation encoding of metadata
//!
//! Container keys:
//!
//! ```text
//! InvestigationInformation/<group>/<key>  -> value
//! StudyInformation/<group>/<key>          -> value
//! AssayInformation/<group>/<key>          -> value
//! AssayCondition/<name>                   -> {"type":"numeric","minimum":4,...}
//! ```
//!
//! Child annotations map condition names to the display form of their values.

use indexmap::{IndexMap, IndexSet};
use mihcsme_core::validation::{element_path, member_path};
use mihcsme_core::{
    ConditionDefinition, ConditionKind, ConditionValues, GroupedInformation, MapAnnotation,
    MetadataDocument, MetadataSet, Result, ValidationError, section,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Key prefix of condition definitions
pub const CONDITION_PREFIX: &str = "AssayCondition";

/// Condition definition without its name, stored as the key suffix
#[derive(Debug, Serialize, Deserialize)]
struct ConditionSpec {
    #[serde(rename = "type")]
    kind: ConditionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    allowed_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl ConditionSpec {
    fn of(definition: &ConditionDefinition) -> Self {
        Self {
            kind: definition.kind,
            allowed_values: definition.allowed_values.clone(),
            minimum: definition.minimum,
            maximum: definition.maximum,
            unit: definition.unit.clone(),
            description: definition.description.clone(),
        }
    }

    fn named(self, name: &str) -> ConditionDefinition {
        ConditionDefinition {
            name: name.to_string(),
            kind: self.kind,
            allowed_values: self.allowed_values,
            minimum: self.minimum,
            maximum: self.maximum,
            unit: self.unit,
            description: self.description,
        }
    }
}

/// Container annotation for `metadata`
///
/// # Errors
///
/// Returns `MihcsmeError::Serialization` if a condition cannot be encoded
pub fn encode_container(metadata: &MetadataSet, namespace: &str) -> Result<MapAnnotation> {
    let mut annotation = MapAnnotation::new(namespace);
    let investigation = metadata.investigation().to_groups();
    for (scope, info) in [
        (section::INVESTIGATION, &investigation),
        (section::STUDY, metadata.study()),
        (section::ASSAY, metadata.assay()),
    ] {
        for (group, key, value) in info.iter() {
            annotation.push(format!("{scope}/{group}/{key}"), value);
        }
    }
    for definition in metadata.conditions().definitions() {
        annotation.push(
            format!("{CONDITION_PREFIX}/{}", definition.name),
            serde_json::to_string(&ConditionSpec::of(definition))?,
        );
    }
    Ok(annotation)
}

/// Document holding the sections and conditions of a container annotation
///
/// The returned document has no annotations yet and is not validated.
///
/// # Errors
///
/// Returns a [`ValidationError`] for keys without a group or key part, for
/// condition descriptions that are not valid JSON, and for conditions or
/// keys stored twice (names are compared after trimming)
pub fn decode_container(annotation: &MapAnnotation) -> std::result::Result<MetadataDocument, ValidationError> {
    let mut issues = ValidationError::new();
    let mut document = MetadataDocument::default();
    let mut conditions: IndexMap<String, ConditionDefinition> = IndexMap::new();
    let mut seen_keys: IndexSet<(&str, String, String)> = IndexSet::new();

    for (full_key, value) in &annotation.pairs {
        let Some((scope, rest)) = full_key.split_once('/') else {
            debug!("Ignoring container key '{full_key}'");
            continue;
        };
        let target: &mut GroupedInformation = match scope {
            section::INVESTIGATION => &mut document.investigation_information,
            section::STUDY => &mut document.study_information,
            section::ASSAY => &mut document.assay_information,
            CONDITION_PREFIX => {
                let name = rest.trim();
                if conditions.contains_key(name) {
                    issues.push(
                        element_path(section::CONDITION_DEFINITIONS, name),
                        "condition is stored more than once",
                    );
                    continue;
                }
                match serde_json::from_str::<ConditionSpec>(value) {
                    Ok(spec) => {
                        conditions.insert(name.to_string(), spec.named(name));
                    }
                    Err(e) => issues.push(
                        element_path(section::CONDITION_DEFINITIONS, rest),
                        format!("stored condition is not valid: {e}"),
                    ),
                }
                continue;
            }
            _ => {
                debug!("Ignoring container key '{full_key}'");
                continue;
            }
        };
        match rest.split_once('/') {
            Some((group, key)) if !group.trim().is_empty() && !key.trim().is_empty() => {
                if seen_keys.insert((scope, group.trim().to_string(), key.trim().to_string())) {
                    target.insert(group, key, value.clone());
                } else {
                    issues.push(
                        member_path(&member_path(scope, group.trim()), key.trim()),
                        "stored key repeats an earlier key",
                    );
                }
            }
            _ => issues.push(member_path(scope, rest), "stored key needs a group and a key part"),
        }
    }

    document.assay_conditions = conditions.into_values().collect();
    issues.into_result(document)
}

/// Child annotation for one well's values
#[must_use]
pub fn encode_values(values: &ConditionValues, namespace: &str) -> MapAnnotation {
    let mut annotation = MapAnnotation::new(namespace);
    for (name, value) in values {
        annotation.push(name.clone(), value.to_string());
    }
    annotation
}

/// Raw values of a child annotation; the last pair for a key wins
///
/// Values stay text here and are re-typed when the document is validated.
#[must_use]
pub fn decode_values(annotation: &MapAnnotation) -> IndexMap<String, Value> {
    let mut values = IndexMap::new();
    for (name, value) in &annotation.pairs {
        values.insert(name.clone(), Value::String(value.clone()));
    }
    values
}
