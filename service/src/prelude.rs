//! Prelude module for the MIHCSME service
//!
//! This module re-exports commonly used types and functions for convenient import.

// Re-export core types and traits
pub use mihcsme_core::prelude::*;

// Re-export spreadsheet conversion
pub use crate::sheets::{MetadataSheetsGenerator, MetadataSheetsParser, ParsedWorkbook};

// Re-export document persistence
pub use crate::document::{DocumentFormat, read_document, write_document};

// Re-export remote mapping
pub use crate::remote::{
    ChildPolicy, DownloadReport, Downloader, LocalStore, Namespaces, RemovalReport, Remover,
    UploadOptions, UploadReport, Uploader,
};

// Re-export configuration
pub use crate::config::{MihcsmeConfig, load_service_config};
