//! Read models for CQRS-lite pattern
//!
//! This module contains view-optimized structs that provide
//! a denormalized representation of the grouped packages, shaped
//! the way the CycloneDX document needs them.

pub mod component_view;
pub mod dependency_view;
pub mod sbom_read_model;
pub mod sbom_read_model_builder;

pub use component_view::{ComponentKind, ComponentView, PropertyView, PROPERTY_PREFIX};
pub use dependency_view::DependencyView;
pub use sbom_read_model::SbomReadModel;
pub use sbom_read_model_builder::SbomReadModelBuilder;
