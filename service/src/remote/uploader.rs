//! Metadata upload onto a remote container

use super::report::{UploadReport, WellFailure, WellOutcome};
use super::{ChildPolicy, Namespaces, codec};
use indexmap::IndexSet;
use mihcsme_core::{
    ConditionValues, ContainerRef, MetadataSet, RemoteChild, RemoteClient, RemoteResolutionError,
    Result, SampleId, SampleKey,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Upload settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Treatment of existing child annotations
    pub policy: ChildPolicy,
    /// Annotation namespaces
    pub namespaces: Namespaces,
    /// Restrict the attempt to these identifiers
    pub only: Option<IndexSet<SampleId>>,
    /// Resolve identifiers without writing anything
    pub dry_run: bool,
}

impl UploadOptions {
    /// Options with the default namespaces
    #[must_use]
    pub fn new(policy: ChildPolicy) -> Self {
        Self {
            policy,
            namespaces: Namespaces::default(),
            only: None,
            dry_run: false,
        }
    }

    /// Use other namespaces
    #[must_use]
    pub fn with_namespaces(mut self, namespaces: Namespaces) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Only attempt the given identifiers
    #[must_use]
    pub fn only(mut self, ids: impl IntoIterator<Item = SampleId>) -> Self {
        self.only = Some(ids.into_iter().collect());
        self
    }

    /// Check that every identifier resolves to one child, writing nothing
    #[must_use]
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Whether `id` is part of the attempt
    #[must_use]
    pub fn selects(&self, id: &SampleId) -> bool {
        self.only.as_ref().is_none_or(|only| only.contains(id))
    }

    /// Number of wells an upload of `metadata` attempts
    ///
    /// Identifiers in `only` without an annotation in `metadata` are not counted.
    #[must_use]
    pub fn planned(&self, metadata: &MetadataSet) -> usize {
        metadata.annotations().filter(|(id, _)| self.selects(id)).count()
    }
}

/// Children of a container indexed by their own coordinates
struct ChildIndex<'a> {
    by_key: HashMap<SampleKey, Vec<&'a RemoteChild>>,
}

impl<'a> ChildIndex<'a> {
    fn build(children: &'a [RemoteChild]) -> Self {
        let mut by_key: HashMap<SampleKey, Vec<&'a RemoteChild>> = HashMap::new();
        for child in children {
            match child.sample_key() {
                Ok(key) => by_key.entry(key).or_default().push(child),
                Err(e) => debug!("Child {} cannot be matched: {e}", child.id),
            }
        }
        Self { by_key }
    }

    /// The single child matching `id`; a plate name must match as well
    fn resolve(&self, id: &SampleId) -> std::result::Result<i64, RemoteResolutionError> {
        let matches: Vec<_> = self
            .by_key
            .get(&id.key)
            .into_iter()
            .flatten()
            .filter(|c| id.plate.is_none() || c.plate == id.plate)
            .collect();
        match matches.as_slice() {
            [child] => Ok(child.id),
            [] => Err(RemoteResolutionError::NoMatch {
                identifier: id.to_string(),
            }),
            many => Err(RemoteResolutionError::Ambiguous {
                identifier: id.to_string(),
                count: many.len(),
            }),
        }
    }
}

/// Writes a metadata set onto a container and its children
pub struct Uploader<'c, C: RemoteClient + ?Sized> {
    client: &'c mut C,
    options: UploadOptions,
}

impl<'c, C: RemoteClient + ?Sized> Uploader<'c, C> {
    /// Create an uploader over `client`
    pub fn new(client: &'c mut C, options: UploadOptions) -> Self {
        Self { client, options }
    }

    /// Upload `metadata` onto `container`
    ///
    /// With [`UploadOptions::dry_run`] only the children are listed and every
    /// identifier is resolved; the report then names the unmatched ones.
    ///
    /// # Errors
    ///
    /// Returns `MihcsmeError::RemoteIo` when a container-level call fails;
    /// per-well failures are recorded in the report instead
    pub fn upload(&mut self, metadata: &MetadataSet, container: &ContainerRef) -> Result<UploadReport> {
        self.upload_with(metadata, container, |_| {})
    }

    /// Upload `metadata`, calling `progress` after every attempted well
    ///
    /// # Errors
    ///
    /// See [`Self::upload`]
    pub fn upload_with<F>(
        &mut self,
        metadata: &MetadataSet,
        container: &ContainerRef,
        mut progress: F,
    ) -> Result<UploadReport>
    where
        F: FnMut(&WellOutcome),
    {
        let annotation = codec::encode_container(metadata, &self.options.namespaces.container)?;
        if self.options.dry_run {
            debug!("Dry run: {} container pairs not written on {container}", annotation.len());
        } else {
            self.client.set_container_annotation(container, &annotation)?;
            debug!("Wrote {} container pairs on {container}", annotation.len());
        }

        let children = self.client.list_children(container)?;
        let index = ChildIndex::build(&children);

        if let Some(only) = &self.options.only {
            for id in only.iter().filter(|id| metadata.annotation(id).is_none()) {
                warn!("{id} has no annotation in the metadata and is skipped");
            }
        }

        let mut report = UploadReport::new(*container, self.options.policy);
        report.dry_run = self.options.dry_run;
        let selected: Vec<_> = metadata
            .annotations()
            .filter(|(id, _)| self.options.selects(id))
            .collect();
        for (id, values) in selected {
            let outcome = self.upload_well(&index, id, values);
            if let Some(failure) = &outcome.failure {
                warn!("{id}: {failure}");
            }
            progress(&outcome);
            report.record(outcome);
        }

        info!("Upload finished: {}", report.summary());
        Ok(report)
    }

    fn upload_well(&mut self, index: &ChildIndex<'_>, id: &SampleId, values: &ConditionValues) -> WellOutcome {
        let child = match index.resolve(id) {
            Ok(child) => child,
            Err(e) => return WellOutcome::failed(id, None, e),
        };
        if self.options.dry_run {
            return WellOutcome::resolved(id, child);
        }
        let namespace = &self.options.namespaces.child;
        let pairs = codec::encode_values(values, namespace);

        let annotation = match self.options.policy {
            ChildPolicy::Replace => pairs,
            ChildPolicy::Merge => match self.client.get_child_annotation(child, namespace) {
                Ok(Some(mut existing)) => {
                    for (key, value) in pairs.pairs {
                        existing.upsert(&key, value);
                    }
                    existing
                }
                Ok(None) => pairs,
                Err(e) => return WellOutcome::failed(id, Some(child), WellFailure::RemoteIo(e)),
            },
        };

        match self.client.set_child_annotation(child, &annotation) {
            Ok(()) => WellOutcome::succeeded(id, child),
            Err(e) => WellOutcome::failed(id, Some(child), e),
        }
    }
}
