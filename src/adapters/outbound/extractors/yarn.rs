use super::commit::try_extract_commit;
use crate::adapters::outbound::matchers::PackageJsonMatcher;
use crate::ports::outbound::{DepFile, Extractor, Matcher};
use crate::sbom_generation::domain::{Ecosystem, FileLocations, PackageManager, PackageRecord};
use crate::shared::error::ExtractError;
use crate::shared::position::{
    block_between, find_in_block_by_delimiters, find_in_block_by_regex, text_to_lines,
};
use crate::shared::regex_cache::static_regex;
use std::path::Path;

/// Lines of one package group, with the 0-based index of its header.
struct YarnGroup<'a> {
    first_line: usize,
    last_line: usize,
    lines: Vec<&'a str>,
}

fn should_skip_line(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with('#')
}

/// Splits the file into groups, each starting at a non-indented header.
fn group_package_lines(lines: &[String]) -> Vec<YarnGroup<'_>> {
    let mut groups: Vec<YarnGroup<'_>> = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        if should_skip_line(line) {
            continue;
        }
        if !line.starts_with(' ') {
            groups.push(YarnGroup {
                first_line: index,
                last_line: index,
                lines: Vec::new(),
            });
        }
        if let Some(group) = groups.last_mut() {
            group.last_line = index;
            group.lines.push(line);
        }
    }

    groups
}

/// Name and requested ranges from a header such as
/// `"@scope/pkg@^1.0.0", "@scope/pkg@~1.2.0":`.
fn parse_header(header: &str) -> (String, Vec<String>) {
    let header = header.replace('"', "");
    let header = header.strip_suffix(':').unwrap_or(&header);

    let mut name = String::new();
    let mut is_scoped = false;
    let mut targets = Vec::new();

    for part in header.split(',') {
        let part = part.trim_start();
        let part = match part.strip_prefix('@') {
            Some(unscoped) => {
                is_scoped = true;
                unscoped
            }
            None => part,
        };

        let (part_name, mut range) = part.split_once('@').unwrap_or((part, ""));
        if name.is_empty() {
            name = part_name.to_string();
        }

        if let Some(aliased) = range.strip_prefix("npm:") {
            if aliased.contains('@') {
                let (real_name, real_targets) = parse_header(aliased);
                name = real_name;
                targets.extend(real_targets);
                // The alias carries its own scope marker.
                is_scoped = false;
                continue;
            }
            range = aliased;
        }

        for prefix in ["file:", "link:", "portal:"] {
            if let Some(local) = range.strip_prefix(prefix) {
                range = local;
            }
        }
        let range = range.split("::locator").next().unwrap_or(range);
        targets.push(range.to_string());
    }

    if is_scoped {
        name = format!("@{}", name);
    }
    (name, targets)
}

fn determine_version(group: &YarnGroup<'_>) -> String {
    let regex = static_regex(r#"^ {2}"?version"?:? "?([\w.+-]+)"?$"#);
    group
        .lines
        .iter()
        .find_map(|line| regex.captures(line))
        .and_then(|captures| captures.get(1))
        .map(|version| version.as_str().to_string())
        .unwrap_or_default()
}

fn determine_resolution(group: &YarnGroup<'_>) -> String {
    let regex = static_regex(r#"^ {2}"?(?:resolution:|resolved)"? "([^ '"]+)"$"#);
    group
        .lines
        .iter()
        .find_map(|line| regex.captures(line))
        .and_then(|captures| captures.get(1))
        .map(|resolution| resolution.as_str().to_string())
        .unwrap_or_default()
}

/// Names listed under the group's `dependencies:` and `optionalDependencies:` keys.
fn determine_dependencies(group: &YarnGroup<'_>) -> Vec<String> {
    let mut dependencies = Vec::new();
    let mut in_section = false;

    for line in &group.lines {
        if !line.starts_with("    ") {
            let key = line.trim().trim_end_matches(':');
            in_section = matches!(key, "dependencies" | "optionalDependencies");
            continue;
        }
        if !in_section {
            continue;
        }

        let entry = line.trim();
        let name = match entry.strip_prefix('"') {
            Some(quoted) => quoted.split('"').next().unwrap_or_default(),
            None => entry
                .split(|c: char| c == ' ' || c == ':')
                .next()
                .unwrap_or_default(),
        };
        if !name.is_empty() && !dependencies.iter().any(|known| known == name) {
            dependencies.push(name.to_string());
        }
    }

    dependencies
}

/// Extractor for `yarn.lock`, both the v1 format and the Berry (v2+) YAML dialect.
#[derive(Debug, Default)]
pub struct YarnLockExtractor {
    matcher: PackageJsonMatcher,
}

impl YarnLockExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Extractor for YarnLockExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|name| name == "yarn.lock")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        let lines = text_to_lines(file.text());
        let mut records = Vec::new();

        for group in group_package_lines(&lines) {
            let Some(header) = group.lines.first() else {
                continue;
            };
            let (name, targets) = parse_header(header);
            if name == "__metadata" {
                continue;
            }

            let version = determine_version(&group);
            if version.is_empty() {
                tracing::warn!(
                    "Failed to determine version of {} while parsing {}",
                    name,
                    file.path()
                );
            }
            let commit = try_extract_commit(&determine_resolution(&group));

            let group_lines = &lines[group.first_line..=group.last_line];
            let start_line = group.first_line + 1;
            let mut locations = FileLocations::default();
            if let Some(block) = block_between(&lines, group.first_line, group.last_line) {
                locations = FileLocations::new(block.in_file(file.path()))
                    .with_name(
                        find_in_block_by_delimiters(&group_lines[..1], &name, start_line, "", "@")
                            .map(|p| p.in_file(file.path())),
                    )
                    .with_version(
                        find_in_block_by_regex(
                            group_lines,
                            &regex::escape(&version),
                            start_line,
                            r#"^ {2}"?version"?:? "?"#,
                            r#""?$"#,
                        )
                        .filter(|_| !version.is_empty())
                        .map(|p| p.in_file(file.path())),
                    );
            }

            let mut record = PackageRecord::new(name, version, Ecosystem::Npm, PackageManager::Yarn)
                .with_commit(commit)
                .with_locations(locations);
            for target in targets {
                record.add_target_version(target);
            }
            record.dependencies = determine_dependencies(&group);

            records.push(record);
        }

        Ok(records)
    }

    fn matchers(&self) -> Vec<&dyn Matcher> {
        vec![&self.matcher]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::filesystem::LocalDepFile;
    use crate::sbom_generation::domain::{sort_records, Position};

    fn extract(content: &str) -> Vec<PackageRecord> {
        let file = LocalDepFile::from_content("/project/yarn.lock", content);
        let mut records = YarnLockExtractor::new().extract(&file).unwrap();
        sort_records(&mut records);
        records
    }

    const V1_LOCKFILE: &str = r#"# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.
# yarn lockfile v1


"@babel/code-frame@^7.0.0", "@babel/code-frame@^7.10.4":
  version "7.12.13"
  resolved "https://registry.yarnpkg.com/@babel/code-frame/-/code-frame-7.12.13.tgz#dcfc826beef65e75c50e21d3837d7d95798dd658"
  integrity sha512-HV1Cm0Q3ZrpCR93tkWOYiuYIgLxZXZFVG2VgK+MBWjUqZTundupbfx2aXarXuw5Ko5aMcjtJgbSs4vUGBS5v6g==
  dependencies:
    "@babel/highlight" "^7.12.13"

"mine@git+ssh://git@github.com/org/mine#abc1234":
  resolved "https://codeload.github.com/org/mine/tar.gz/abc1234deadbeef"

string-width@^4.1.0, "string-width@npm:real-width@^4.2.0":
  version "4.2.3"
  resolved "https://registry.yarnpkg.com/real-width/-/real-width-4.2.3.tgz"
"#;

    #[test]
    fn test_v1_records() {
        let records = extract(V1_LOCKFILE);
        let keys: Vec<_> = records
            .iter()
            .map(|r| format!("{}@{}", r.name, r.version))
            .collect();
        assert_eq!(keys, vec!["@babel/code-frame@7.12.13", "mine@", "real-width@4.2.3"]);

        let babel = &records[0];
        assert_eq!(babel.target_versions, vec!["^7.0.0", "^7.10.4"]);
        assert_eq!(babel.dependencies, vec!["@babel/highlight"]);
        assert!(babel.commit.is_empty());
    }

    #[test]
    fn test_git_resolution_becomes_commit() {
        let records = extract(V1_LOCKFILE);
        let mine = records.iter().find(|r| r.name == "mine").unwrap();

        assert_eq!(mine.commit, "abc1234deadbeef");
        assert!(mine.version.is_empty());
        assert_eq!(mine.dedup_key(), ("mine", "abc1234deadbeef"));
        assert_eq!(mine.target_versions, vec!["git+ssh://git@github.com/org/mine#abc1234"]);
    }

    #[test]
    fn test_block_positions() {
        let records = extract(V1_LOCKFILE);
        let babel = &records[0];

        assert_eq!(babel.locations.block.filename, "/project/yarn.lock");
        assert_eq!(babel.locations.block.line, Position::new(5, 10));
        assert_eq!(babel.locations.block.column, Position::new(1, 35));

        let name = babel.locations.name.as_ref().unwrap();
        assert_eq!(name.line, Position::at(5));
        assert_eq!(name.column, Position::new(2, 19));

        let version = babel.locations.version.as_ref().unwrap();
        assert_eq!(version.line, Position::at(6));
        assert_eq!(version.column, Position::new(12, 19));
    }

    const BERRY_LOCKFILE: &str = r#"# This file is generated by running "yarn install" inside your project.

__metadata:
  version: 6
  cacheKey: 8

"@types/node@npm:^20.0.0":
  version: 20.1.0
  resolution: "@types/node@npm:20.1.0"
  checksum: abc
  languageName: node
  linkType: hard

"local-pkg@file:./local::locator=app%40workspace%3A.":
  version: 1.0.0
  resolution: "local-pkg@file:./local#./local::hash=123&locator=app%40workspace%3A."
  dependencies:
    left-pad: ^1.3.0
  languageName: node
  linkType: hard
"#;

    #[test]
    fn test_berry_records() {
        let records = extract(BERRY_LOCKFILE);
        assert_eq!(records.len(), 2);

        let node = &records[0];
        assert_eq!(node.name, "@types/node");
        assert_eq!(node.version, "20.1.0");
        assert_eq!(node.target_versions, vec!["^20.0.0"]);

        let local = &records[1];
        assert_eq!(local.name, "local-pkg");
        assert_eq!(local.target_versions, vec!["./local"]);
        assert_eq!(local.dependencies, vec!["left-pad"]);
    }

    #[test]
    fn test_empty_file() {
        assert!(extract("").is_empty());
        assert!(extract("# yarn lockfile v1\n\n").is_empty());
    }

    #[test]
    fn test_parse_header_aliases() {
        let (name, targets) = parse_header(r#""string-width-cjs@npm:string-width@^4.2.0":"#);
        assert_eq!(name, "string-width");
        assert_eq!(targets, vec!["^4.2.0"]);

        let (name, targets) = parse_header(r#""@scope/a@npm:@scope/b@^1.0.0":"#);
        assert_eq!(name, "@scope/b");
        assert_eq!(targets, vec!["^1.0.0"]);
    }
}
