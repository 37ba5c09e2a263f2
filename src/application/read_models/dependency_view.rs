//! Dependency view structs for read model

/// One `dependencies` entry of the BOM: `bom_ref` depends on every ref of
/// `depends_on` (sorted, deduplicated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyView {
    pub bom_ref: String,
    pub depends_on: Vec<String>,
}
