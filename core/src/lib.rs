//! # MIHCSME Core
//!
//! Core types and traits for MIHCSME microscopy metadata in Rust.
//!
//! This crate provides the validated metadata model (investigation
//! information, assay condition definitions and per-well annotations), the
//! declarative rule tables it is validated against, the error taxonomy, and
//! the capability trait through which metadata reaches a remote annotation
//! server.
//!
//! ## Design Principles
//!
//! - **Validated or absent**: a [`MetadataSet`] only exists in a fully validated state
//! - **Rules are data**: field constraints live in [`validation::RuleTable`]s
//! - **No I/O**: spreadsheets, documents and servers are handled by the service crate

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Core error types for MIHCSME operations
pub mod error;

/// Identifier and value types
pub mod types;

/// Declarative field rules and the generic validator
pub mod validation;

/// Investigation Information
pub mod investigation;

/// Metadata set and its structured-document form
pub mod metadata;

/// Remote containers, children and map annotations
pub mod annotations;

/// Core trait definitions for remote annotation servers
pub mod traits;

pub use annotations::{ChildPosition, ContainerKind, ContainerRef, MapAnnotation, RemoteChild};
pub use error::{
    FieldIssue, IssueKind, MihcsmeError, ParseError, ParseIssue, RemoteIoError,
    RemoteResolutionError, Result, ValidationError,
};
pub use investigation::{DataOwner, InvestigationDetails, InvestigationInformation};
pub use metadata::{
    AnnotationRecord, AssayConditions, ConditionValues, MetadataDocument, MetadataSet, section,
};
pub use traits::RemoteClient;
pub use types::{
    ConditionDefinition, ConditionKind, ConditionValue, GroupedInformation, ReferenceSheet,
    SampleId, SampleKey, WellPosition,
};

/// Common imports for MIHCSME consumers
pub mod prelude {
    pub use crate::error::{MihcsmeError, Result, ValidationError};
    pub use crate::metadata::{AnnotationRecord, MetadataDocument, MetadataSet};
    pub use crate::traits::RemoteClient;
    pub use crate::types::{ConditionDefinition, ConditionKind, ConditionValue, SampleId};
}
