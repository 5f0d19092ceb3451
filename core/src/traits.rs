//! Core trait definitions

use crate::annotations::{ContainerRef, MapAnnotation, RemoteChild};
use crate::error::RemoteIoError;

/// Narrow capability interface onto a remote annotation server
///
/// Uploader, downloader and remover depend only on this trait. Connection setup,
/// authentication, retries and timeouts belong to the implementor. Calls are
/// blocking round-trips issued one at a time.
pub trait RemoteClient {
    /// Annotation on `container` in `namespace`, if any
    ///
    /// # Errors
    ///
    /// Returns `RemoteIoError` when the server call fails
    fn get_container_annotation(
        &self,
        container: &ContainerRef,
        namespace: &str,
    ) -> Result<Option<MapAnnotation>, RemoteIoError>;

    /// Replace every annotation on `container` in `annotation.namespace` with `annotation`
    ///
    /// # Errors
    ///
    /// Returns `RemoteIoError` when the server call fails
    fn set_container_annotation(
        &mut self,
        container: &ContainerRef,
        annotation: &MapAnnotation,
    ) -> Result<(), RemoteIoError>;

    /// Child objects of `container` with their coordinate metadata
    ///
    /// For a screen this covers the wells of every plate in it.
    ///
    /// # Errors
    ///
    /// Returns `RemoteIoError` when the server call fails or the container does not exist
    fn list_children(&self, container: &ContainerRef) -> Result<Vec<RemoteChild>, RemoteIoError>;

    /// Annotation on child `child` in `namespace`, if any
    ///
    /// # Errors
    ///
    /// Returns `RemoteIoError` when the server call fails
    fn get_child_annotation(
        &self,
        child: i64,
        namespace: &str,
    ) -> Result<Option<MapAnnotation>, RemoteIoError>;

    /// Replace every annotation on child `child` in `annotation.namespace` with `annotation`
    ///
    /// # Errors
    ///
    /// Returns `RemoteIoError` when the server call fails
    fn set_child_annotation(
        &mut self,
        child: i64,
        annotation: &MapAnnotation,
    ) -> Result<(), RemoteIoError>;

    /// Remove every annotation on `container` in `namespace`
    ///
    /// Returns whether anything was removed. Annotations in other
    /// namespaces are left alone.
    ///
    /// # Errors
    ///
    /// Returns `RemoteIoError` when the server call fails
    fn remove_container_annotation(
        &mut self,
        container: &ContainerRef,
        namespace: &str,
    ) -> Result<bool, RemoteIoError>;

    /// Remove every annotation on child `child` in `namespace`
    ///
    /// Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns `RemoteIoError` when the server call fails
    fn remove_child_annotation(&mut self, child: i64, namespace: &str) -> Result<bool, RemoteIoError>;
}
