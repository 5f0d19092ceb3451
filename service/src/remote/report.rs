//! Upload outcome accounting

use super::ChildPolicy;
use mihcsme_core::{ContainerRef, RemoteIoError, RemoteResolutionError, SampleId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why one well was not annotated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WellFailure {
    /// Identifier did not resolve to exactly one child
    Resolution(RemoteResolutionError),
    /// Per-well remote call failed
    RemoteIo(RemoteIoError),
}

impl fmt::Display for WellFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolution(e) => e.fmt(f),
            Self::RemoteIo(e) => e.fmt(f),
        }
    }
}

impl From<RemoteResolutionError> for WellFailure {
    fn from(error: RemoteResolutionError) -> Self {
        Self::Resolution(error)
    }
}

impl From<RemoteIoError> for WellFailure {
    fn from(error: RemoteIoError) -> Self {
        Self::RemoteIo(error)
    }
}

/// Result of one well
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WellStatus {
    /// Annotation written
    Succeeded,
    /// Resolved to a child during a dry run; nothing written
    Resolved,
    /// See the failure
    Failed,
}

/// Outcome of one attempted well or sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellOutcome {
    /// Identifier as written in the metadata
    pub identifier: String,
    /// Resolved remote child, if resolution succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child: Option<i64>,
    /// Succeeded or failed
    pub status: WellStatus,
    /// Reason of a failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<WellFailure>,
}

impl WellOutcome {
    /// Annotation written on `child`
    #[must_use]
    pub fn succeeded(id: &SampleId, child: i64) -> Self {
        Self {
            identifier: id.to_string(),
            child: Some(child),
            status: WellStatus::Succeeded,
            failure: None,
        }
    }

    /// Identifier resolved to `child` without writing
    #[must_use]
    pub fn resolved(id: &SampleId, child: i64) -> Self {
        Self {
            identifier: id.to_string(),
            child: Some(child),
            status: WellStatus::Resolved,
            failure: None,
        }
    }

    /// Well could not be annotated
    #[must_use]
    pub fn failed(id: &SampleId, child: Option<i64>, failure: impl Into<WellFailure>) -> Self {
        Self {
            identifier: id.to_string(),
            child,
            status: WellStatus::Failed,
            failure: Some(failure.into()),
        }
    }

    /// Whether the annotation was written, or would be in a dry run
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status != WellStatus::Failed
    }
}

/// Overall upload status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Every attempted well succeeded
    Success,
    /// Some wells failed
    PartialSuccess,
    /// Every attempted well failed
    Error,
}

/// Ordered per-well outcomes of one upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReport {
    /// Target container
    pub container: ContainerRef,
    /// Child conflict policy in effect
    pub policy: ChildPolicy,
    /// Nothing was written; successes are resolved identifiers
    #[serde(default)]
    pub dry_run: bool,
    /// Outcomes in metadata order
    pub outcomes: Vec<WellOutcome>,
    /// Attempted wells
    pub wells_processed: usize,
    /// Wells annotated
    pub wells_succeeded: usize,
    /// Wells not annotated
    pub wells_failed: usize,
}

impl UploadReport {
    /// Empty report for `container`
    #[must_use]
    pub fn new(container: ContainerRef, policy: ChildPolicy) -> Self {
        Self {
            container,
            policy,
            dry_run: false,
            outcomes: Vec::new(),
            wells_processed: 0,
            wells_succeeded: 0,
            wells_failed: 0,
        }
    }

    /// Account one outcome
    pub fn record(&mut self, outcome: WellOutcome) {
        self.wells_processed += 1;
        if outcome.is_success() {
            self.wells_succeeded += 1;
        } else {
            self.wells_failed += 1;
        }
        self.outcomes.push(outcome);
    }

    /// Overall status
    #[must_use]
    pub fn status(&self) -> ReportStatus {
        if self.wells_failed == 0 {
            ReportStatus::Success
        } else if self.wells_succeeded == 0 {
            ReportStatus::Error
        } else {
            ReportStatus::PartialSuccess
        }
    }

    /// Failed outcomes
    pub fn failures(&self) -> impl Iterator<Item = &WellOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Identifiers to pass as `only` when retrying
    #[must_use]
    pub fn failed_identifiers(&self) -> Vec<String> {
        self.failures().map(|o| o.identifier.clone()).collect()
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        if self.dry_run {
            format!(
                "{} (dry run): {} checked, {} resolved, {} unresolved",
                self.container, self.wells_processed, self.wells_succeeded, self.wells_failed
            )
        } else {
            format!(
                "{}: {} processed, {} succeeded, {} failed",
                self.container, self.wells_processed, self.wells_succeeded, self.wells_failed
            )
        }
    }
}
