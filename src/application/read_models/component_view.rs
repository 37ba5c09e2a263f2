//! Component view structs for read model
//!
//! These structs provide a query-optimized view of BOM components.

/// Namespace of every property key emitted on a component.
pub const PROPERTY_PREFIX: &str = "osv-scanner:";

/// CycloneDX component type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// A resolved package
    Library,
    /// A manifest or lockfile taking part in dependency edges
    File,
}

impl ComponentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Library => "library",
            ComponentKind::File => "file",
        }
    }
}

/// View representation of a CycloneDX property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyView {
    pub name: String,
    pub value: String,
}

/// View representation of a BOM component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentView {
    pub kind: ComponentKind,
    /// PURL for libraries, file name for files
    pub bom_ref: String,
    pub name: String,
    pub version: Option<String>,
    pub purl: Option<String>,
    /// Sorted by name, all prefixed with [`PROPERTY_PREFIX`]
    pub properties: Vec<PropertyView>,
    /// JSON-encoded locations, sorted by block position
    pub occurrences: Vec<String>,
}

impl ComponentView {
    /// File component named after `filename`.
    pub fn file(filename: &str) -> Self {
        Self {
            kind: ComponentKind::File,
            bom_ref: filename.to_string(),
            name: filename.to_string(),
            version: None,
            purl: None,
            properties: Vec::new(),
            occurrences: Vec::new(),
        }
    }

    /// Value of the property `name` (given without prefix).
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|property| {
                property
                    .name
                    .strip_prefix(PROPERTY_PREFIX)
                    .is_some_and(|key| key == name)
            })
            .map(|property| property.value.as_str())
    }
}
