//! Manifest matchers: correlate lockfile records with the manifest that
//! declared them.

mod build_gradle;
mod composer_json;
mod gemfile;
mod nuget_csproj;
mod package_json;
mod pipfile;
mod pom;
mod pyproject_toml;
mod requirements;

pub use build_gradle::BuildGradleMatcher;
pub use composer_json::ComposerJsonMatcher;
pub use gemfile::GemfileMatcher;
pub use nuget_csproj::NugetCsprojMatcher;
pub use package_json::PackageJsonMatcher;
pub use pipfile::PipfileMatcher;
pub use pom::PomMatcher;
pub use pyproject_toml::PyprojectTomlMatcher;
pub use requirements::RequirementsMatcher;

use crate::sbom_generation::domain::{FileLocations, FilePosition, PackageRecord, Position};
use crate::shared::position::{
    find_in_block_by_regex, first_non_empty_column, last_non_empty_column, JsonEntry,
};

/// Marks `record` as declared by a manifest: it becomes direct, gains
/// `requirement` as a target version and `group` as a dep group, and takes
/// the manifest positions when no earlier declaration provided them.
pub(crate) fn mark_declared(
    record: &mut PackageRecord,
    requirement: &str,
    group: Option<&str>,
    locations: Option<FileLocations>,
) {
    record.is_direct = true;
    record.add_target_version(requirement);
    if let Some(group) = group {
        record.add_dep_group(group);
    }
    if let Some(locations) = locations {
        crate::trace_position!(
            "[MATCH] {}@{} declared at {}",
            record.name,
            record.version,
            locations.block
        );
        record.graft_source_locations(locations);
    }
}

/// Locations of a `"name": "requirement"` member of a JSON manifest: the
/// whole pair, the key and the value.
pub(crate) fn json_pair_locations(entry: &JsonEntry, filename: &str) -> FileLocations {
    FileLocations::new(entry.block.clone().in_file(filename))
        .with_name(entry.key.clone().map(|key| key.in_file(filename)))
        .with_version(entry.value.clone().map(|value| value.in_file(filename)))
}

/// 0-based line range `[start, end)` of the body of the TOML table `[table]`.
pub(crate) fn toml_table_lines<S: AsRef<str>>(lines: &[S], table: &str) -> Option<(usize, usize)> {
    let header = format!("[{}]", table);
    let start = lines.iter().position(|line| line.as_ref().trim() == header)? + 1;
    let end = lines[start..]
        .iter()
        .position(|line| line.as_ref().trim_start().starts_with('['))
        .map_or(lines.len(), |offset| start + offset);
    Some((start, end))
}

/// Locations of a `key = requirement` entry of the TOML table `[table]`.
///
/// The key may be quoted. The version is the requirement string when it is
/// written inline on the key's line.
pub(crate) fn toml_key_locations<S: AsRef<str>>(
    lines: &[S],
    table: &str,
    key: &str,
    requirement: &str,
    filename: &str,
) -> Option<FileLocations> {
    let (start, end) = toml_table_lines(lines, table)?;
    let body = &lines[start..end];
    let name = find_in_block_by_regex(body, &regex::escape(key), start + 1, r#"^\s*["']?"#, r#"["']?\s*="#)?;

    let line = body[name.line.start - start - 1].as_ref();
    let block = FilePosition::new(
        filename,
        Position::at(name.line.start),
        Position::new(first_non_empty_column(line)?, last_non_empty_column(line)? + 1),
    );
    let version = if requirement.is_empty() {
        None
    } else {
        find_in_block_by_regex(&[line], &regex::escape(requirement), name.line.start, r#"=\s*["']"#, r#"["']"#)
            .or_else(|| {
                find_in_block_by_regex(&[line], &regex::escape(requirement), name.line.start, r#"version\s*=\s*["']"#, r#"["']"#)
            })
    };

    Some(
        FileLocations::new(block)
            .with_name(Some(name.in_file(filename)))
            .with_version(version.map(|position| position.in_file(filename))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sbom_generation::domain::{Ecosystem, FilePosition, PackageManager, Position};

    fn locations(line: usize) -> FileLocations {
        FileLocations::new(FilePosition::new(
            "/app/manifest",
            Position::at(line),
            Position::new(1, 10),
        ))
    }

    #[test]
    fn test_mark_declared_first_location_wins() {
        let mut record = PackageRecord::new("a", "1.0.0", Ecosystem::Npm, PackageManager::Npm);

        mark_declared(&mut record, "^1.0.0", Some("prod"), Some(locations(3)));
        mark_declared(&mut record, "~1.0.0", Some("dev"), Some(locations(9)));

        assert!(record.is_direct);
        assert_eq!(record.target_versions, vec!["^1.0.0", "~1.0.0"]);
        assert!(record.dep_groups.contains("prod") && record.dep_groups.contains("dev"));
        assert_eq!(record.source_locations.unwrap().block.line, Position::at(3));
    }

    #[test]
    fn test_mark_declared_without_requirement_or_group() {
        let mut record = PackageRecord::new("a", "1.0.0", Ecosystem::Npm, PackageManager::Npm);
        mark_declared(&mut record, "", None, None);

        assert!(record.is_direct);
        assert!(record.target_versions.is_empty());
        assert!(record.dep_groups.is_empty());
        assert!(record.source_locations.is_none());
    }

    #[test]
    fn test_toml_key_locations() {
        let lines = vec![
            "[packages]",
            "requests = \"==2.31.0\"",
            "\"Flask\" = {version = \">=2.0\", extras = [\"async\"]}",
            "",
            "[dev-packages]",
            "requests = \"*\"",
        ];

        let requests = toml_key_locations(&lines, "packages", "requests", "==2.31.0", "/app/Pipfile").unwrap();
        assert_eq!(requests.block.line, Position::at(2));
        assert_eq!(requests.block.column, Position::new(1, 22));
        assert_eq!(requests.name.unwrap().column, Position::new(1, 9));
        assert_eq!(requests.version.unwrap().column, Position::new(13, 21));

        let flask = toml_key_locations(&lines, "packages", "Flask", ">=2.0", "/app/Pipfile").unwrap();
        assert_eq!(flask.name.unwrap().column, Position::new(2, 7));
        assert_eq!(flask.version.unwrap().column, Position::new(23, 28));

        let dev = toml_key_locations(&lines, "dev-packages", "requests", "*", "/app/Pipfile").unwrap();
        assert_eq!(dev.block.line, Position::at(6));
        assert!(toml_key_locations(&lines, "packages", "django", "", "/app/Pipfile").is_none());
        assert!(toml_key_locations(&lines, "source", "requests", "", "/app/Pipfile").is_none());
    }
}
