use crate::sbom_generation::domain::{Ecosystem, DEV_GROUP, OPTIONAL_GROUP};
use std::collections::BTreeSet;

/// Bundler groups that only matter while developing the project.
const RUBY_DEV_GROUPS: [&str; 7] = [
    "dev",
    "development",
    "test",
    "ci",
    "cucumber",
    "linting",
    "rubocop",
];

/// DevGroupPolicy decides whether a package's dependency groups make it a
/// development-only dependency.
///
/// Each ecosystem names its groups differently, so the rule is per ecosystem.
/// An empty group set is never development-only.
pub struct DevGroupPolicy;

impl DevGroupPolicy {
    pub fn is_dev(ecosystem: Ecosystem, groups: &BTreeSet<String>) -> bool {
        if groups.is_empty() {
            return false;
        }

        match ecosystem {
            Ecosystem::Npm => {
                groups
                    .iter()
                    .all(|g| g == DEV_GROUP || g == OPTIONAL_GROUP)
                    && groups.contains(DEV_GROUP)
            }
            Ecosystem::Packagist | Ecosystem::PyPI => groups.iter().all(|g| g == DEV_GROUP),
            Ecosystem::Maven => groups.iter().all(|g| g.starts_with("test")),
            Ecosystem::RubyGems => groups
                .iter()
                .all(|g| RUBY_DEV_GROUPS.contains(&g.as_str())),
            _ => false,
        }
    }
}
