//! # MIHCSME Service
//!
//! Conversion of MIHCSME microscopy metadata between its three
//! representations: spreadsheet workbooks, structured JSON/YAML documents
//! and map annotations on a remote screen or plate.
//!
//! ## Overview
//!
//! - **Workbooks**: [`sheets::MetadataSheetsParser`] reads a workbook into a
//!   validated [`MetadataSet`](mihcsme_core::MetadataSet), reporting every
//!   problem with its sheet and row; [`sheets::MetadataSheetsGenerator`]
//!   writes one back in the same layout
//! - **Documents**: [`document`] stores a metadata set as JSON or YAML
//! - **Remote**: [`remote::Uploader`] and [`remote::Downloader`] move metadata
//!   onto and off a container through the
//!   [`RemoteClient`](mihcsme_core::RemoteClient) trait; [`remote::Remover`]
//!   clears it again
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mihcsme_service::prelude::*;
//! use mihcsme_core::ContainerRef;
//! use std::path::Path;
//!
//! fn main() -> mihcsme_core::Result<()> {
//!     let parsed = MetadataSheetsParser::new().parse_file(Path::new("metadata.xlsx"))?;
//!
//!     let mut store = LocalStore::open(Path::new("store.json"))?;
//!     let report = Uploader::new(&mut store, UploadOptions::new(ChildPolicy::Replace))
//!         .upload(&parsed.metadata, &ContainerRef::plate(51))?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Command-line interface
pub mod cli;

/// Configuration loading
pub mod config;

/// JSON and YAML documents
pub mod document;

/// Common imports
pub mod prelude;

/// Remote annotation mapping
pub mod remote;

/// Workbook parsing and generation
pub mod sheets;

pub use config::{MihcsmeConfig, load_service_config};
pub use remote::{ChildPolicy, Downloader, LocalStore, Remover, UploadReport, Uploader};
pub use sheets::{MetadataSheetsGenerator, MetadataSheetsParser};
