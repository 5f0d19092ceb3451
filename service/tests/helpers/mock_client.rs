//! Mock remote client

#![allow(dead_code)]

use mihcsme_core::{ContainerRef, MapAnnotation, RemoteChild, RemoteClient, RemoteIoError};
use mockall::mock;

mock! {
    pub Client {}

    impl RemoteClient for Client {
        fn get_container_annotation(
            &self,
            container: &ContainerRef,
            namespace: &str,
        ) -> Result<Option<MapAnnotation>, RemoteIoError>;

        fn set_container_annotation(
            &mut self,
            container: &ContainerRef,
            annotation: &MapAnnotation,
        ) -> Result<(), RemoteIoError>;

        fn list_children(&self, container: &ContainerRef) -> Result<Vec<RemoteChild>, RemoteIoError>;

        fn get_child_annotation(
            &self,
            child: i64,
            namespace: &str,
        ) -> Result<Option<MapAnnotation>, RemoteIoError>;

        fn set_child_annotation(
            &mut self,
            child: i64,
            annotation: &MapAnnotation,
        ) -> Result<(), RemoteIoError>;

        fn remove_container_annotation(
            &mut self,
            container: &ContainerRef,
            namespace: &str,
        ) -> Result<bool, RemoteIoError>;

        fn remove_child_annotation(&mut self, child: i64, namespace: &str) -> Result<bool, RemoteIoError>;
    }
}
