//! Remote annotation mapping
//!
//! Moves a metadata set onto a remote container and back through the
//! [`RemoteClient`](mihcsme_core::RemoteClient) capability trait.
//!
//! ## Mapping
//!
//! - the container carries one map annotation in `<base>/Metadata` holding
//!   the information sections and the condition definitions
//! - every annotated child (well or sample) carries one map annotation in
//!   `<base>/AssayConditions` holding its condition values
//!
//! Children are matched by their own coordinate metadata. Per-well failures
//! are recorded in the report; only container-level failures abort.
//!
//! Removal clears both namespaces again and leaves every other annotation.

pub mod codec;
pub mod downloader;
pub mod remover;
pub mod report;
pub mod store;
pub mod uploader;

pub use downloader::{ChildFailure, DownloadReport, Downloader};
pub use remover::{RemovalReport, Remover};
pub use report::{ReportStatus, UploadReport, WellFailure, WellOutcome, WellStatus};
pub use store::LocalStore;
pub use uploader::{UploadOptions, Uploader};

use crate::config::DEFAULT_NAMESPACE_BASE;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Treatment of existing child annotations during upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChildPolicy {
    /// The child's annotation becomes exactly the uploaded pairs
    Replace,
    /// Existing pairs are kept and overwritten key by key
    Merge,
}

impl fmt::Display for ChildPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Replace => "replace",
            Self::Merge => "merge",
        })
    }
}

/// Annotation namespaces derived from one base
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespaces {
    /// Container-level metadata namespace
    pub container: String,
    /// Child-level condition namespace
    pub child: String,
}

impl Namespaces {
    /// Derive `<base>/Metadata` and `<base>/AssayConditions`
    #[must_use]
    pub fn from_base(base: &str) -> Self {
        Self {
            container: format!("{base}/Metadata"),
            child: format!("{base}/AssayConditions"),
        }
    }
}

impl Default for Namespaces {
    fn default() -> Self {
        Self::from_base(DEFAULT_NAMESPACE_BASE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaces() {
        let ns = Namespaces::default();
        assert_eq!(ns.container, "MIHCSME/Metadata");
        assert_eq!(ns.child, "MIHCSME/AssayConditions");
        assert_eq!(Namespaces::from_base("lab").child, "lab/AssayConditions");
    }

    #[test]
    fn test_policy_serde() {
        let policy: ChildPolicy = serde_yaml::from_str("merge").unwrap();
        assert_eq!(policy, ChildPolicy::Merge);
        assert_eq!(policy.to_string(), "merge");
    }
}
