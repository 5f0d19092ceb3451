//! Metadata download from a remote container

use super::report::WellFailure;
use super::{Namespaces, codec};
use mihcsme_core::{
    AnnotationRecord, ContainerKind, ContainerRef, MetadataSet, MihcsmeError, RemoteClient,
    RemoteResolutionError, Result, SampleId,
};
use serde::Serialize;
use tracing::{debug, info, warn};

/// A child whose annotation could not be read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildFailure {
    /// Remote child id
    pub child: i64,
    /// Why it was skipped
    pub failure: WellFailure,
}

/// Reconstructed metadata with the children that could not be read
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadReport {
    /// Source container
    pub container: ContainerRef,
    /// Validated metadata
    pub metadata: MetadataSet,
    /// Children skipped, in listing order
    pub failures: Vec<ChildFailure>,
}

/// Reads a metadata set back from a container and its children
pub struct Downloader<'c, C: RemoteClient + ?Sized> {
    client: &'c C,
    namespaces: Namespaces,
}

impl<'c, C: RemoteClient + ?Sized> Downloader<'c, C> {
    /// Create a downloader over `client`
    pub fn new(client: &'c C, namespaces: Namespaces) -> Self {
        Self { client, namespaces }
    }

    /// Download the metadata of `container`
    ///
    /// Children without an annotation are omitted before their coordinates
    /// are looked at, so unannotated children off the grid are not failures.
    /// On a screen the plate
    /// name is part of each identifier; on a plate identifiers are bare.
    ///
    /// # Errors
    ///
    /// Returns `MihcsmeError::RemoteIo` when a container-level call fails,
    /// `MihcsmeError::MissingContainerMetadata` when the container has no
    /// metadata annotation, and `MihcsmeError::Validation` when the stored
    /// annotations do not match the stored conditions
    pub fn download(&self, container: &ContainerRef) -> Result<DownloadReport> {
        let annotation = self
            .client
            .get_container_annotation(container, &self.namespaces.container)?
            .ok_or_else(|| MihcsmeError::MissingContainerMetadata {
                container: container.to_string(),
                namespace: self.namespaces.container.clone(),
            })?;
        let mut document = codec::decode_container(&annotation)?;

        let children = self.client.list_children(container)?;
        let mut failures = Vec::new();
        for child in &children {
            let stored = match self.client.get_child_annotation(child.id, &self.namespaces.child) {
                Ok(Some(stored)) if !stored.is_empty() => stored,
                Ok(_) => continue,
                Err(e) => {
                    warn!("child {}: {e}", child.id);
                    failures.push(ChildFailure {
                        child: child.id,
                        failure: e.into(),
                    });
                    continue;
                }
            };
            let key = match child.sample_key() {
                Ok(key) => key,
                Err(e) => {
                    let failure = RemoteResolutionError::InvalidPosition {
                        child: child.id,
                        reason: e.to_string(),
                    };
                    warn!("{failure}");
                    failures.push(ChildFailure {
                        child: child.id,
                        failure: failure.into(),
                    });
                    continue;
                }
            };
            let id = SampleId {
                plate: match container.kind {
                    ContainerKind::Screen => child.plate.clone(),
                    ContainerKind::Plate => None,
                },
                key,
            };
            debug!("child {} -> {id}: {} pairs", child.id, stored.len());
            document.annotations.push(AnnotationRecord {
                values: codec::decode_values(&stored),
                ..AnnotationRecord::for_id(&id)
            });
        }

        let metadata = MetadataSet::from_document(document)?;
        info!(
            "Downloaded {container}: {} annotations, {} unreadable children",
            metadata.annotation_count(),
            failures.len()
        );
        Ok(DownloadReport {
            container: *container,
            metadata,
            failures,
        })
    }
}
