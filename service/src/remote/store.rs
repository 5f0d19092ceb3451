//! JSON-file annotation store
//!
//! A small stand-in for an annotation server: screens, plates, their wells
//! or samples, and the map annotations attached to each. The CLI uses it to
//! run uploads and downloads without a server connection.
//!
//! ```json
//! {
//!   "containers": [
//!     {"kind": "screen", "id": 1, "name": "Screen A"},
//!     {"kind": "plate", "id": 51, "name": "Plate1", "screen": 1}
//!   ],
//!   "children": [
//!     {"id": 1001, "container": 51, "position": {"grid": {"row": 0, "column": 0}}}
//!   ]
//! }
//! ```

use mihcsme_core::{
    ChildPosition, ContainerKind, ContainerRef, MapAnnotation, MihcsmeError, RemoteChild,
    RemoteClient, RemoteIoError, Result,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Screen or plate in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredContainer {
    /// Screen or Plate
    pub kind: ContainerKind,
    /// Numeric id, unique per kind
    pub id: i64,
    /// Display name; plate names become identifier plate names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Screen holding this plate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<i64>,
    /// Attached map annotations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<MapAnnotation>,
}

/// Well or sample in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChild {
    /// Numeric id, unique in the store
    pub id: i64,
    /// Plate holding the child
    pub container: i64,
    /// Own coordinate metadata
    pub position: ChildPosition,
    /// Attached map annotations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<MapAnnotation>,
}

/// In-memory annotation store persisted as JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStore {
    /// Screens and plates
    #[serde(default)]
    pub containers: Vec<StoredContainer>,
    /// Wells and samples
    #[serde(default)]
    pub children: Vec<StoredChild>,
}

fn replace_in_namespace(annotations: &mut Vec<MapAnnotation>, annotation: &MapAnnotation) {
    annotations.retain(|a| a.namespace != annotation.namespace);
    annotations.push(annotation.clone());
}

fn remove_namespace(annotations: &mut Vec<MapAnnotation>, namespace: &str) -> bool {
    let before = annotations.len();
    annotations.retain(|a| a.namespace != namespace);
    annotations.len() != before
}

fn in_namespace(annotations: &[MapAnnotation], namespace: &str) -> Option<MapAnnotation> {
    annotations.iter().rev().find(|a| a.namespace == namespace).cloned()
}

impl LocalStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store file
    ///
    /// # Errors
    ///
    /// Returns `MihcsmeError::Io` if the file cannot be read and
    /// `MihcsmeError::Serialization` if it is not a store document
    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let store: Self = serde_json::from_str(&content)?;
        info!(
            "Opened store {}: {} containers, {} children",
            path.display(),
            store.containers.len(),
            store.children.len()
        );
        Ok(store)
    }

    /// Write the store file
    ///
    /// # Errors
    ///
    /// Returns `MihcsmeError::Io` if the file cannot be written
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(MihcsmeError::from)
    }

    /// Add a screen
    #[must_use]
    pub fn with_screen(mut self, id: i64, name: &str) -> Self {
        self.containers.push(StoredContainer {
            kind: ContainerKind::Screen,
            id,
            name: Some(name.to_string()),
            screen: None,
            annotations: Vec::new(),
        });
        self
    }

    /// Add a plate, optionally inside a screen
    #[must_use]
    pub fn with_plate(mut self, id: i64, name: &str, screen: Option<i64>) -> Self {
        self.containers.push(StoredContainer {
            kind: ContainerKind::Plate,
            id,
            name: Some(name.to_string()),
            screen,
            annotations: Vec::new(),
        });
        self
    }

    /// Add a well at a 0-based grid position
    #[must_use]
    pub fn with_well(mut self, id: i64, plate: i64, row: u32, column: u32) -> Self {
        self.children.push(StoredChild {
            id,
            container: plate,
            position: ChildPosition::Grid { row, column },
            annotations: Vec::new(),
        });
        self
    }

    /// Add a labelled sample
    #[must_use]
    pub fn with_sample(mut self, id: i64, plate: i64, label: &str) -> Self {
        self.children.push(StoredChild {
            id,
            container: plate,
            position: ChildPosition::Label(label.to_string()),
            annotations: Vec::new(),
        });
        self
    }

    fn container(&self, container: &ContainerRef) -> Option<&StoredContainer> {
        self.containers
            .iter()
            .find(|c| c.kind == container.kind && c.id == container.id)
    }

    fn child(&self, id: i64) -> Option<&StoredChild> {
        self.children.iter().find(|c| c.id == id)
    }

    fn plates_of(&self, container: &ContainerRef) -> Vec<&StoredContainer> {
        self.containers
            .iter()
            .filter(|c| c.kind == ContainerKind::Plate)
            .filter(|c| match container.kind {
                ContainerKind::Plate => c.id == container.id,
                ContainerKind::Screen => c.screen == Some(container.id),
            })
            .collect()
    }
}

impl RemoteClient for LocalStore {
    fn get_container_annotation(
        &self,
        container: &ContainerRef,
        namespace: &str,
    ) -> std::result::Result<Option<MapAnnotation>, RemoteIoError> {
        debug!("get_container_annotation {container} {namespace}");
        let stored = self.container(container).ok_or_else(|| {
            RemoteIoError::new("get_container_annotation", format!("{container} does not exist"))
        })?;
        Ok(in_namespace(&stored.annotations, namespace))
    }

    fn set_container_annotation(
        &mut self,
        container: &ContainerRef,
        annotation: &MapAnnotation,
    ) -> std::result::Result<(), RemoteIoError> {
        debug!("set_container_annotation {container} {}", annotation.namespace);
        let stored = self
            .containers
            .iter_mut()
            .find(|c| c.kind == container.kind && c.id == container.id)
            .ok_or_else(|| {
                RemoteIoError::new("set_container_annotation", format!("{container} does not exist"))
            })?;
        replace_in_namespace(&mut stored.annotations, annotation);
        Ok(())
    }

    fn list_children(&self, container: &ContainerRef) -> std::result::Result<Vec<RemoteChild>, RemoteIoError> {
        debug!("list_children {container}");
        if self.container(container).is_none() {
            return Err(RemoteIoError::new("list_children", format!("{container} does not exist")));
        }
        let mut children = Vec::new();
        for plate in self.plates_of(container) {
            children.extend(
                self.children
                    .iter()
                    .filter(|c| c.container == plate.id)
                    .map(|c| RemoteChild {
                        id: c.id,
                        plate: plate.name.clone(),
                        position: c.position.clone(),
                    }),
            );
        }
        Ok(children)
    }

    fn get_child_annotation(
        &self,
        child: i64,
        namespace: &str,
    ) -> std::result::Result<Option<MapAnnotation>, RemoteIoError> {
        let stored = self
            .child(child)
            .ok_or_else(|| RemoteIoError::new("get_child_annotation", format!("child {child} does not exist")))?;
        Ok(in_namespace(&stored.annotations, namespace))
    }

    fn set_child_annotation(
        &mut self,
        child: i64,
        annotation: &MapAnnotation,
    ) -> std::result::Result<(), RemoteIoError> {
        let stored = self
            .children
            .iter_mut()
            .find(|c| c.id == child)
            .ok_or_else(|| RemoteIoError::new("set_child_annotation", format!("child {child} does not exist")))?;
        replace_in_namespace(&mut stored.annotations, annotation);
        Ok(())
    }

    fn remove_container_annotation(
        &mut self,
        container: &ContainerRef,
        namespace: &str,
    ) -> std::result::Result<bool, RemoteIoError> {
        debug!("remove_container_annotation {container} {namespace}");
        let stored = self
            .containers
            .iter_mut()
            .find(|c| c.kind == container.kind && c.id == container.id)
            .ok_or_else(|| {
                RemoteIoError::new("remove_container_annotation", format!("{container} does not exist"))
            })?;
        Ok(remove_namespace(&mut stored.annotations, namespace))
    }

    fn remove_child_annotation(&mut self, child: i64, namespace: &str) -> std::result::Result<bool, RemoteIoError> {
        let stored = self
            .children
            .iter_mut()
            .find(|c| c.id == child)
            .ok_or_else(|| {
                RemoteIoError::new("remove_child_annotation", format!("child {child} does not exist"))
            })?;
        Ok(remove_namespace(&mut stored.annotations, namespace))
    }
}
