//! SBOM read model for query operations
//!
//! This module provides the main read model struct that aggregates
//! all SBOM data in a query-optimized format.

use super::component_view::{ComponentKind, ComponentView};
use super::dependency_view::DependencyView;

/// Main read model for SBOM data
///
/// Both lists are already in output order: components by `bom_ref`,
/// dependencies by their source ref.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SbomReadModel {
    pub components: Vec<ComponentView>,
    pub dependencies: Vec<DependencyView>,
}

impl SbomReadModel {
    /// Library components only.
    pub fn libraries(&self) -> impl Iterator<Item = &ComponentView> {
        self.components
            .iter()
            .filter(|component| component.kind == ComponentKind::Library)
    }

    pub fn component(&self, bom_ref: &str) -> Option<&ComponentView> {
        self.components
            .iter()
            .find(|component| component.bom_ref == bom_ref)
    }
}
