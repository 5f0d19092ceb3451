//! Investigation Information: data owner identity and investigation details

use crate::error::ValidationError;
use crate::types::GroupedInformation;
use crate::validation::{CheckedValue, FieldRule, RuleTable, ValueKind, DATE_FORMAT, member_path};
use chrono::NaiveDate;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Group holding the owner identity
pub const GROUP_DATA_OWNER: &str = "DataOwner";
/// Group holding the investigation details
pub const GROUP_INVESTIGATION: &str = "InvestigationInformation";

const FIRST_NAME: &str = "First Name";
const MIDDLE_NAMES: &str = "Middle Name(s)";
const LAST_NAME: &str = "Last Name";
const USER_NAME: &str = "User name";
const INSTITUTE: &str = "Institute";
const EMAIL: &str = "E-Mail Address";
const ORCID: &str = "ORCID investigator";

const PROJECT_ID: &str = "Project ID";
const TITLE: &str = "Investigation Title";
const INTERNAL_ID: &str = "Investigation internal ID";
const DESCRIPTION: &str = "Investigation description";
const START_DATE: &str = "Start Date";
const END_DATE: &str = "End Date";

const KNOWN_FIELDS: [(&str, &str, ValueKind, bool); 13] = [
    (GROUP_DATA_OWNER, FIRST_NAME, ValueKind::Text, true),
    (GROUP_DATA_OWNER, MIDDLE_NAMES, ValueKind::Text, false),
    (GROUP_DATA_OWNER, LAST_NAME, ValueKind::Text, true),
    (GROUP_DATA_OWNER, USER_NAME, ValueKind::Text, false),
    (GROUP_DATA_OWNER, INSTITUTE, ValueKind::Text, false),
    (GROUP_DATA_OWNER, EMAIL, ValueKind::Email, false),
    (GROUP_DATA_OWNER, ORCID, ValueKind::Orcid, false),
    (GROUP_INVESTIGATION, PROJECT_ID, ValueKind::Text, false),
    (GROUP_INVESTIGATION, TITLE, ValueKind::Text, true),
    (GROUP_INVESTIGATION, INTERNAL_ID, ValueKind::Text, false),
    (GROUP_INVESTIGATION, DESCRIPTION, ValueKind::Text, false),
    (GROUP_INVESTIGATION, START_DATE, ValueKind::Date, false),
    (GROUP_INVESTIGATION, END_DATE, ValueKind::Date, false),
];

static RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new(KNOWN_FIELDS.iter().map(|(group, key, kind, required)| {
        let rule = FieldRule::new(field_name(group, key), *kind);
        if *required { rule.required() } else { rule }
    }))
});

fn field_name(group: &str, key: &str) -> String {
    format!("{group}.{key}")
}

/// Person owning the data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataOwner {
    /// Given name
    pub first_name: String,
    /// Middle names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_names: Option<String>,
    /// Family name
    pub last_name: String,
    /// Account name on the image server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Affiliation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institute: Option<String>,
    /// Contact address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// ORCID iD
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
}

/// Title, identifiers, description and dates of the investigation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestigationDetails {
    /// Funding or project identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Investigation title
    pub title: String,
    /// Lab-internal identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,
    /// Free-text description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// First day of the investigation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Last day of the investigation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

/// Validated Investigation Information
///
/// Built from grouped key/value rows; keys without a dedicated field are
/// kept in `additional` so that nothing the user entered is lost.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestigationInformation {
    /// Owner identity
    pub data_owner: DataOwner,
    /// Investigation details
    pub investigation: InvestigationDetails,
    /// Groups and keys without a dedicated field
    #[serde(default, skip_serializing_if = "GroupedInformation::is_empty")]
    pub additional: GroupedInformation,
}

impl InvestigationInformation {
    /// Validate grouped rows into typed Investigation Information
    ///
    /// # Errors
    ///
    /// Returns every field violation: missing required fields, malformed
    /// dates, e-mail addresses or ORCID iDs, and a start date after the end date
    pub fn from_groups(groups: &GroupedInformation) -> Result<Self, ValidationError> {
        let mut issues = ValidationError::new();
        let info = Self::check_groups(groups, &mut issues);
        issues.into_result(info)
    }

    /// Validate into `issues`, returning the typed value even when issues were found
    pub(crate) fn check_groups(groups: &GroupedInformation, issues: &mut ValidationError) -> Self {
        let mut known: Vec<(String, Value)> = Vec::new();
        let mut additional = GroupedInformation::new();
        for (group, key, value) in groups.iter() {
            let (group, key, value) = (group.trim(), key.trim(), value.trim());
            let name = field_name(group, key);
            if RULES.contains(&name) {
                known.push((name, Value::String(value.to_string())));
            } else if !value.is_empty() {
                additional.insert(group, key, value);
            }
        }

        let mut checked = RULES.check_record(
            GROUP_INVESTIGATION_SCOPE,
            known.iter().map(|(name, value)| (name.as_str(), value)),
            issues,
        );
        let mut take = |group: &str, key: &str| {
            checked
                .shift_remove(&field_name(group, key))
                .map(CheckedValue::into_text)
        };

        let data_owner = DataOwner {
            first_name: take(GROUP_DATA_OWNER, FIRST_NAME).unwrap_or_default(),
            middle_names: take(GROUP_DATA_OWNER, MIDDLE_NAMES),
            last_name: take(GROUP_DATA_OWNER, LAST_NAME).unwrap_or_default(),
            user_name: take(GROUP_DATA_OWNER, USER_NAME),
            institute: take(GROUP_DATA_OWNER, INSTITUTE),
            email: take(GROUP_DATA_OWNER, EMAIL),
            orcid: take(GROUP_DATA_OWNER, ORCID),
        };
        let date = |text: Option<String>| {
            text.and_then(|t| NaiveDate::parse_from_str(&t, DATE_FORMAT).ok())
        };
        let investigation = InvestigationDetails {
            project_id: take(GROUP_INVESTIGATION, PROJECT_ID),
            title: take(GROUP_INVESTIGATION, TITLE).unwrap_or_default(),
            internal_id: take(GROUP_INVESTIGATION, INTERNAL_ID),
            description: take(GROUP_INVESTIGATION, DESCRIPTION),
            start_date: date(take(GROUP_INVESTIGATION, START_DATE)),
            end_date: date(take(GROUP_INVESTIGATION, END_DATE)),
        };

        if let (Some(start), Some(end)) = (investigation.start_date, investigation.end_date) {
            if start > end {
                issues.push(
                    member_path(GROUP_INVESTIGATION_SCOPE, &field_name(GROUP_INVESTIGATION, END_DATE)),
                    format!("end date {end} is before start date {start}"),
                );
            }
        }

        Self {
            data_owner,
            investigation,
            additional,
        }
    }

    /// Flatten back into grouped rows, dedicated fields first
    #[must_use]
    pub fn to_groups(&self) -> GroupedInformation {
        let owner = &self.data_owner;
        let details = &self.investigation;
        let date = |d: Option<NaiveDate>| d.map(|d| d.format(DATE_FORMAT).to_string());

        let fields: [(&str, &str, Option<String>); 13] = [
            (GROUP_DATA_OWNER, FIRST_NAME, Some(owner.first_name.clone())),
            (GROUP_DATA_OWNER, MIDDLE_NAMES, owner.middle_names.clone()),
            (GROUP_DATA_OWNER, LAST_NAME, Some(owner.last_name.clone())),
            (GROUP_DATA_OWNER, USER_NAME, owner.user_name.clone()),
            (GROUP_DATA_OWNER, INSTITUTE, owner.institute.clone()),
            (GROUP_DATA_OWNER, EMAIL, owner.email.clone()),
            (GROUP_DATA_OWNER, ORCID, owner.orcid.clone()),
            (GROUP_INVESTIGATION, PROJECT_ID, details.project_id.clone()),
            (GROUP_INVESTIGATION, TITLE, Some(details.title.clone())),
            (GROUP_INVESTIGATION, INTERNAL_ID, details.internal_id.clone()),
            (GROUP_INVESTIGATION, DESCRIPTION, details.description.clone()),
            (GROUP_INVESTIGATION, START_DATE, date(details.start_date)),
            (GROUP_INVESTIGATION, END_DATE, date(details.end_date)),
        ];

        let mut groups: GroupedInformation = fields
            .into_iter()
            .filter_map(|(group, key, value)| {
                value.filter(|v| !v.is_empty()).map(|v| (group, key, v))
            })
            .collect();
        for (group, key, value) in self.additional.iter() {
            groups.insert(group, key, value);
        }
        groups
    }

    /// Dedicated field names per group, in canonical order
    #[must_use]
    pub fn known_fields() -> IndexMap<&'static str, Vec<&'static str>> {
        let mut fields: IndexMap<&'static str, Vec<&'static str>> = IndexMap::new();
        for (group, key, _, _) in KNOWN_FIELDS {
            fields.entry(group).or_default().push(key);
        }
        fields
    }
}

/// Path scope for investigation fields
const GROUP_INVESTIGATION_SCOPE: &str = crate::metadata::section::INVESTIGATION;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn groups() -> GroupedInformation {
        [
            ("DataOwner", "First Name", "Jane"),
            ("DataOwner", "Last Name", "Doe"),
            ("DataOwner", "Institute", "Leiden University"),
            ("DataOwner", "Phone", "+31 71 000"),
            ("InvestigationInformation", "Project ID", "INV-001"),
            ("InvestigationInformation", "Investigation Title", "Drug screen"),
            ("InvestigationInformation", "Start Date", "2024-01-05"),
            ("Funding", "Grant", "NWO-42"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_typed_fields_and_additional_groups() {
        let info = InvestigationInformation::from_groups(&groups()).unwrap();
        assert_eq!(info.data_owner.first_name, "Jane");
        assert_eq!(info.data_owner.institute.as_deref(), Some("Leiden University"));
        assert_eq!(info.investigation.title, "Drug screen");
        assert_eq!(info.investigation.start_date, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(info.additional.get("DataOwner", "Phone"), Some("+31 71 000"));
        assert_eq!(info.additional.get("Funding", "Grant"), Some("NWO-42"));
    }

    #[test]
    fn test_groups_roundtrip() {
        let info = InvestigationInformation::from_groups(&groups()).unwrap();
        let again = InvestigationInformation::from_groups(&info.to_groups()).unwrap();
        assert_eq!(info, again);
    }

    #[test]
    fn test_missing_required_fields() {
        let only_title: GroupedInformation =
            [("InvestigationInformation", "Investigation Title", "T")]
                .into_iter()
                .collect();
        let err = InvestigationInformation::from_groups(&only_title).unwrap_err();
        let paths: Vec<_> = err.issues().iter().map(|i| i.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "InvestigationInformation.DataOwner.First Name",
                "InvestigationInformation.DataOwner.Last Name",
            ]
        );
    }

    #[test]
    fn test_date_order_checked() {
        let mut g = groups();
        g.insert("InvestigationInformation", "End Date", "2023-12-31");
        let err = InvestigationInformation::from_groups(&g).unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err.issues()[0].reason.contains("before start date"));
    }

    #[test]
    fn test_invalid_date_reported() {
        let mut g = groups();
        g.insert("InvestigationInformation", "Start Date", "05/01/2024");
        let err = InvestigationInformation::from_groups(&g).unwrap_err();
        assert_eq!(
            err.issues()[0].path,
            "InvestigationInformation.InvestigationInformation.Start Date"
        );
    }
}
