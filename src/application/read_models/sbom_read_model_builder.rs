//! Builder for constructing SbomReadModel from grouped packages
//!
//! This module transforms the grouper's output into the query-optimized
//! read model consumed by the formatters.

use super::component_view::{ComponentKind, ComponentView, PropertyView, PROPERTY_PREFIX};
use super::dependency_view::DependencyView;
use super::sbom_read_model::SbomReadModel;
use crate::sbom_generation::domain::{ArtifactDescriptor, PackageComponent};
use crate::sbom_generation::services::{GroupedPackages, PackageUrl};
use crate::shared::Result;
use anyhow::Context;
use std::collections::{BTreeMap, BTreeSet};

/// Property of a file component naming the artifact it declares.
pub const PACKAGE_PROPERTY: &str = "package";

/// Builder for constructing SbomReadModel from grouped packages
///
/// Emits one library component per package and one file component per
/// artifact and per file that depends on an artifact. Edges go from each
/// file declaring an artifact package to that artifact's file, and from
/// each artifact to its parent.
pub struct SbomReadModelBuilder;

impl SbomReadModelBuilder {
    /// Builds a SbomReadModel from the grouped packages
    ///
    /// # Errors
    /// Returns an error if a location cannot be JSON-encoded
    pub fn build(grouped: &GroupedPackages) -> Result<SbomReadModel> {
        let mut components: BTreeMap<String, ComponentView> = BTreeMap::new();
        let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for artifact in &grouped.artifacts {
            components
                .entry(artifact.filename().to_string())
                .or_insert_with(|| Self::artifact_component(artifact));

            if let Some(parent) = &artifact.depends_on {
                Self::add_edge(&mut edges, artifact.filename(), &parent.filename);
            }
        }

        for package in &grouped.components {
            let library = Self::library_component(package)?;
            components.insert(library.bom_ref.clone(), library);

            let Some(artifact) = grouped
                .artifacts
                .iter()
                .find(|artifact| artifact.is_package(&package.name, &package.version))
            else {
                continue;
            };
            for location in &package.locations {
                let file = &location.block.file_name;
                components
                    .entry(file.clone())
                    .or_insert_with(|| ComponentView::file(file));
                Self::add_edge(&mut edges, file, artifact.filename());
            }
        }

        let dependencies = edges
            .into_iter()
            .map(|(bom_ref, depends_on)| DependencyView {
                bom_ref,
                depends_on: depends_on.into_iter().collect(),
            })
            .collect();

        Ok(SbomReadModel {
            components: components.into_values().collect(),
            dependencies,
        })
    }

    fn add_edge(edges: &mut BTreeMap<String, BTreeSet<String>>, from: &str, to: &str) {
        if from != to {
            edges
                .entry(from.to_string())
                .or_default()
                .insert(to.to_string());
        }
    }

    fn library_component(package: &PackageComponent) -> Result<ComponentView> {
        let mut properties: Vec<PropertyView> = package
            .metadata
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| PropertyView {
                name: format!("{}{}", PROPERTY_PREFIX, key),
                value: value.clone(),
            })
            .collect();
        properties.sort_by(|a, b| a.name.cmp(&b.name));

        let occurrences = package
            .locations
            .iter()
            .map(|location| {
                serde_json::to_string(location)
                    .with_context(|| format!("Failed to encode a location of {}", package.purl))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ComponentView {
            kind: ComponentKind::Library,
            bom_ref: package.purl.clone(),
            name: package.name.clone(),
            version: Some(package.version.clone()),
            purl: Some(package.purl.clone()),
            properties,
            occurrences,
        })
    }

    fn artifact_component(artifact: &ArtifactDescriptor) -> ComponentView {
        let detail = &artifact.detail;
        let mut component = ComponentView::file(&detail.filename);
        if let Some(purl) = PackageUrl::new(detail.ecosystem, &detail.name, &detail.version) {
            component.properties.push(PropertyView {
                name: format!("{}{}", PROPERTY_PREFIX, PACKAGE_PROPERTY),
                value: purl.to_string(),
            });
        }
        component
    }
}
