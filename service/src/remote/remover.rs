//! Removal of metadata from a remote container

use super::Namespaces;
use super::downloader::ChildFailure;
use mihcsme_core::{ContainerRef, RemoteClient, Result};
use serde::Serialize;
use tracing::{info, warn};

/// What a removal cleared
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalReport {
    /// Cleared container
    pub container: ContainerRef,
    /// Whether the container carried a metadata annotation
    pub container_removed: bool,
    /// Children that carried a condition annotation
    pub children_cleared: usize,
    /// Children whose annotation could not be removed
    pub failures: Vec<ChildFailure>,
}

impl RemovalReport {
    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: container metadata {}, {} children cleared, {} failed",
            self.container,
            if self.container_removed { "removed" } else { "absent" },
            self.children_cleared,
            self.failures.len()
        )
    }
}

/// Removes the annotations written by an upload
///
/// Only the container and child namespaces are touched; annotations in any
/// other namespace stay where they are.
pub struct Remover<'c, C: RemoteClient + ?Sized> {
    client: &'c mut C,
    namespaces: Namespaces,
}

impl<'c, C: RemoteClient + ?Sized> Remover<'c, C> {
    /// Create a remover over `client`
    pub fn new(client: &'c mut C, namespaces: Namespaces) -> Self {
        Self { client, namespaces }
    }

    /// Remove the metadata of `container` and of every child below it
    ///
    /// # Errors
    ///
    /// Returns `MihcsmeError::RemoteIo` when a container-level call fails;
    /// per-child failures are recorded in the report instead
    pub fn remove(&mut self, container: &ContainerRef) -> Result<RemovalReport> {
        let container_removed = self
            .client
            .remove_container_annotation(container, &self.namespaces.container)?;

        let children = self.client.list_children(container)?;
        let mut children_cleared = 0;
        let mut failures = Vec::new();
        for child in &children {
            match self.client.remove_child_annotation(child.id, &self.namespaces.child) {
                Ok(true) => children_cleared += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("child {}: {e}", child.id);
                    failures.push(ChildFailure {
                        child: child.id,
                        failure: e.into(),
                    });
                }
            }
        }

        let report = RemovalReport {
            container: *container,
            container_removed,
            children_cleared,
            failures,
        };
        info!("Removal finished: {}", report.summary());
        Ok(report)
    }
}
