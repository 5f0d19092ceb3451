//! Remote object vocabulary: containers, child objects and map annotations

use crate::types::{IdentifierError, SampleKey, WellPosition};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of remote container that carries metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// Collection of plates
    Screen,
    /// Single plate of wells
    Plate,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Screen => "Screen",
            Self::Plate => "Plate",
        })
    }
}

/// Reference to a remote container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerRef {
    /// Screen or Plate
    pub kind: ContainerKind,
    /// Numeric server-side id
    pub id: i64,
}

impl ContainerRef {
    /// Reference a screen
    #[must_use]
    pub fn screen(id: i64) -> Self {
        Self {
            kind: ContainerKind::Screen,
            id,
        }
    }

    /// Reference a plate
    #[must_use]
    pub fn plate(id: i64) -> Self {
        Self {
            kind: ContainerKind::Plate,
            id,
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Namespaced, ordered key/value annotation
///
/// Keys may repeat on the server side; readers treat the last occurrence as current.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapAnnotation {
    /// Namespace that identifies annotations written by this tool
    pub namespace: String,
    /// Key/value pairs in write order
    #[serde(default)]
    pub pairs: Vec<(String, String)>,
}

impl MapAnnotation {
    /// Create an empty annotation in `namespace`
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            pairs: Vec::new(),
        }
    }

    /// Append a pair
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Append a pair, builder style
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// Last value stored under `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set `key`, overwriting an existing pair in place or appending
    pub fn upsert(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter_mut().rev().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.pairs.push((key.to_string(), value)),
        }
    }

    /// Whether no pair is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Number of pairs
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }
}

/// Coordinate metadata a child object carries about itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildPosition {
    /// 0-based plate grid position
    Grid {
        /// 0-based row
        row: u32,
        /// 0-based column
        column: u32,
    },
    /// Sample label
    Label(String),
}

/// Child object (well or sample) of a remote container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteChild {
    /// Numeric server-side id
    pub id: i64,
    /// Name of the plate holding the child
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate: Option<String>,
    /// Own coordinate metadata
    pub position: ChildPosition,
}

impl RemoteChild {
    /// Well child at a 0-based grid position
    #[must_use]
    pub fn well(id: i64, plate: Option<&str>, row: u32, column: u32) -> Self {
        Self {
            id,
            plate: plate.map(str::to_string),
            position: ChildPosition::Grid { row, column },
        }
    }

    /// Identifier key derived from the child's own coordinates
    ///
    /// # Errors
    ///
    /// Returns the grammar violation when the grid position is off-plate or
    /// the label is not a valid sample token
    pub fn sample_key(&self) -> Result<SampleKey, IdentifierError> {
        match &self.position {
            ChildPosition::Grid { row, column } => {
                WellPosition::from_grid(*row, *column).map(SampleKey::Well)
            }
            ChildPosition::Label(label) => SampleKey::sample(label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_annotation_last_value_wins() {
        let mut ann = MapAnnotation::new("MIHCSME/AssayConditions")
            .with("CellLine", "HeLa")
            .with("CellLine", "U2OS");
        assert_eq!(ann.get("CellLine"), Some("U2OS"));

        ann.upsert("CellLine", "HeLa");
        ann.upsert("Temperature", "37");
        assert_eq!(ann.get("CellLine"), Some("HeLa"));
        assert_eq!(ann.len(), 3);
    }

    #[test]
    fn test_child_coordinates() {
        let child = RemoteChild::well(7, Some("P1"), 0, 0);
        assert_eq!(child.sample_key().unwrap().to_string(), "A01");

        let off_plate = RemoteChild::well(8, None, 20, 0);
        assert!(off_plate.sample_key().is_err());

        let labelled = RemoteChild {
            id: 9,
            plate: None,
            position: ChildPosition::Label("org-3".into()),
        };
        assert_eq!(
            labelled.sample_key().unwrap(),
            SampleKey::Sample("org-3".into())
        );
    }

    #[test]
    fn test_container_display() {
        assert_eq!(ContainerRef::plate(51).to_string(), "Plate:51");
        assert_eq!(ContainerRef::screen(3).to_string(), "Screen:3");
    }
}
