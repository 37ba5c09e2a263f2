use super::{decode_yaml, is_blank, yaml_scalar, MappingOrScalar, YamlText};
use crate::adapters::outbound::matchers::PackageJsonMatcher;
use crate::ports::outbound::{DepFile, Extractor, Matcher};
use crate::sbom_generation::domain::{
    Ecosystem, FileLocations, FilePosition, PackageManager, PackageRecord, Position, DEV_GROUP,
    OPTIONAL_GROUP, PROD_GROUP,
};
use crate::shared::error::ExtractError;
use crate::shared::position::{in_yaml, text_to_lines, YamlPositions};
use crate::shared::regex_cache::static_regex;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PnpmResolution {
    tarball: String,
    commit: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PnpmLockPackage {
    resolution: PnpmResolution,
    #[serde(deserialize_with = "yaml_scalar")]
    name: String,
    #[serde(deserialize_with = "yaml_scalar")]
    version: String,
    dev: Option<bool>,
}

/// The `specifier`/`version` pair of an importer dependency since lockfile v6.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PnpmDependencySpec {
    #[serde(deserialize_with = "yaml_scalar")]
    specifier: String,
    #[serde(deserialize_with = "yaml_scalar")]
    version: String,
}

/// A dependency of an importer: a bare version before lockfile v6, a
/// specifier/version pair since.
type PnpmDependency = MappingOrScalar<PnpmDependencySpec>;

impl PnpmDependency {
    fn version(&self) -> String {
        match self {
            MappingOrScalar::Mapping(spec) => spec.version.clone(),
            MappingOrScalar::Scalar(version) => version.clone(),
        }
    }

    fn specifier(&self) -> Option<&str> {
        match self {
            MappingOrScalar::Mapping(spec) if !spec.specifier.is_empty() => Some(&spec.specifier),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PnpmImporter {
    specifiers: BTreeMap<String, YamlText>,
    dependencies: BTreeMap<String, PnpmDependency>,
    optional_dependencies: BTreeMap<String, PnpmDependency>,
    dev_dependencies: BTreeMap<String, PnpmDependency>,
}

impl PnpmImporter {
    /// Dependency sections with the group each one stands for.
    fn sections(&self) -> [(&'static str, &BTreeMap<String, PnpmDependency>); 3] {
        [
            (PROD_GROUP, &self.dependencies),
            (OPTIONAL_GROUP, &self.optional_dependencies),
            (DEV_GROUP, &self.dev_dependencies),
        ]
    }
}

/// Lockfile versions 5 and 6. A single-project lockfile keeps its
/// dependency sections at the top level, a workspace under `importers`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PnpmLockfile {
    specifiers: BTreeMap<String, YamlText>,
    dependencies: BTreeMap<String, PnpmDependency>,
    optional_dependencies: BTreeMap<String, PnpmDependency>,
    dev_dependencies: BTreeMap<String, PnpmDependency>,
    importers: BTreeMap<String, PnpmImporter>,
    packages: BTreeMap<String, Option<PnpmLockPackage>>,
}

impl PnpmLockfile {
    /// The top-level sections, which describe the root project.
    fn root(&mut self) -> PnpmImporter {
        PnpmImporter {
            specifiers: std::mem::take(&mut self.specifiers),
            dependencies: std::mem::take(&mut self.dependencies),
            optional_dependencies: std::mem::take(&mut self.optional_dependencies),
            dev_dependencies: std::mem::take(&mut self.dev_dependencies),
        }
    }
}

/// Just enough of the document to pick a layout.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PnpmLockfileHeader {
    #[serde(deserialize_with = "yaml_scalar")]
    lockfile_version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PnpmV9Package {
    #[serde(deserialize_with = "yaml_scalar")]
    version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PnpmSnapshot {
    dependencies: BTreeMap<String, YamlText>,
    optional_dependencies: BTreeMap<String, YamlText>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PnpmV9Lockfile {
    importers: BTreeMap<String, PnpmImporter>,
    packages: BTreeMap<String, Option<PnpmV9Package>>,
    snapshots: BTreeMap<String, Option<PnpmSnapshot>>,
}

const CODELOAD_PREFIX: &str = "https://codeload.github.com";

fn codeload_commit(url: &str) -> Option<String> {
    if !url.starts_with(CODELOAD_PREFIX) {
        return None;
    }
    static_regex(r"https://codeload\.github\.com(?:/[\w.-]+){2}/tar\.gz/(\w+)$")
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|commit| commit.as_str().to_string())
}

/// Drops the peer-dependency suffix: `1.0.0(react@18.0.0)` or `1.0.0_react@18.0.0`.
fn strip_peer_suffix(version: &str) -> &str {
    let version = version.split('(').next().unwrap_or(version);
    version.split('_').next().unwrap_or(version)
}

fn sanitize_local_path(value: &str) -> String {
    for prefix in ["file:", "link:", "portal:"] {
        if let Some(local) = value.strip_prefix(prefix) {
            return local.strip_prefix("./").unwrap_or(local).to_string();
        }
    }
    value.to_string()
}

fn split_name_at_version(value: &str) -> Option<(&str, &str)> {
    let (name, version) = value.rsplit_once('@')?;
    if name.is_empty() || !version.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some((name, version))
}

/// Name and version from a v5 (`/name/1.0.0_peer`) or v6 (`/name@1.0.0(peer)`)
/// package path.
fn parse_legacy_key(key: &str) -> Option<(String, String)> {
    // Local packages always carry an explicit name and version.
    if key.starts_with("file:") {
        return None;
    }

    let key = key.split('(').next().unwrap_or(key);
    let mut parts = key.split('/').skip(1);
    let first = parts.next().filter(|part| !part.is_empty())?;
    let name = if first.starts_with('@') {
        format!("{}/{}", first, parts.next()?)
    } else {
        first.to_string()
    };

    let (name, version) = match parts.next() {
        Some(version) if !version.is_empty() => (name, version.to_string()),
        _ => {
            let (name, version) = split_name_at_version(&name)?;
            (name.to_string(), version.to_string())
        }
    };

    if !version.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some((name, strip_peer_suffix(&version).to_string()))
}

/// Span of `needle` inside a single-line key position, searching from the
/// end when `from_end` is set.
fn span_in_key(
    key: &FilePosition,
    key_text: &str,
    needle: &str,
    from_end: bool,
) -> Option<FilePosition> {
    if needle.is_empty() {
        return None;
    }
    let index = if from_end {
        key_text.rfind(needle)?
    } else {
        key_text.find(needle)?
    };
    let start = key.column.start + key_text[..index].chars().count();
    Some(FilePosition::new(
        String::new(),
        key.line,
        Position::new(start, start + needle.chars().count()),
    ))
}

fn package_locations(
    positions: &YamlPositions,
    key: &str,
    name: &str,
    version: &str,
    file_path: &str,
) -> FileLocations {
    let Some(entry) = positions.get(&["packages", key]) else {
        return FileLocations::default();
    };

    FileLocations::new(entry.block.clone().in_file(file_path))
        .with_name(span_in_key(&entry.key, key, name, false).map(|p| p.in_file(file_path)))
        .with_version(span_in_key(&entry.key, key, version, true).map(|p| p.in_file(file_path)))
}

fn new_record(name: impl Into<String>, version: impl Into<String>) -> PackageRecord {
    PackageRecord::new(name, version, Ecosystem::Npm, PackageManager::Pnpm)
}

fn parse_legacy(mut lockfile: PnpmLockfile, positions: &YamlPositions, file_path: &str) -> Vec<PackageRecord> {
    let root = lockfile.root();
    let importers: Vec<&PnpmImporter> = std::iter::once(&root)
        .chain(lockfile.importers.values())
        .collect();
    let mut records = Vec::new();

    for (key, package) in &lockfile.packages {
        let package = package.as_ref();
        let parsed = parse_legacy_key(key);
        let name = package
            .map(|p| p.name.clone())
            .filter(|n| !n.is_empty())
            .or_else(|| parsed.as_ref().map(|(name, _)| name.clone()))
            .unwrap_or_default();
        let version = package
            .map(|p| p.version.clone())
            .filter(|v| !v.is_empty())
            .or_else(|| parsed.as_ref().map(|(_, version)| version.clone()))
            .unwrap_or_default();
        if name.is_empty() || version.is_empty() {
            continue;
        }

        let commit = package
            .and_then(|p| codeload_commit(&p.resolution.tarball))
            .or_else(|| package.map(|p| p.resolution.commit.clone()))
            .unwrap_or_default();

        let mut record = new_record(name.clone(), version.clone())
            .with_commit(commit)
            .with_locations(package_locations(positions, key, &name, &version, file_path));
        if package.and_then(|p| p.dev) == Some(true) {
            record.add_dep_group(DEV_GROUP);
        }

        for importer in &importers {
            for (group, section) in importer.sections() {
                let Some(dependency) = section.get(&name) else {
                    continue;
                };
                let declared = sanitize_local_path(&dependency.version());
                let resolved = strip_peer_suffix(declared.rsplit('/').next().unwrap_or(&declared));
                if strip_peer_suffix(&declared) != version && resolved != version {
                    continue;
                }

                record.is_direct = true;
                record.add_dep_group(group);
                let specifier = dependency
                    .specifier()
                    .map(str::to_string)
                    .or_else(|| importer.specifiers.get(&name).map(|specifier| specifier.0.clone()));
                if let Some(specifier) = specifier {
                    record.add_target_version(sanitize_local_path(&specifier));
                }
            }
        }

        records.push(record);
    }

    records
}

/// Resolved version of a v9 dependency reference, which is either a version
/// (with an optional peer suffix) or a tarball URL resolved in `packages`.
fn v9_version(lockfile: &PnpmV9Lockfile, name: &str, reference: &str) -> String {
    if reference.starts_with(CODELOAD_PREFIX) || reference.starts_with("file:") {
        return lockfile
            .packages
            .get(&format!("{}@{}", name, reference))
            .and_then(|package| package.as_ref())
            .map(|package| package.version.clone())
            .unwrap_or_default();
    }
    strip_peer_suffix(reference).to_string()
}

fn parse_v9(lockfile: PnpmV9Lockfile, positions: &YamlPositions, file_path: &str) -> Vec<PackageRecord> {
    let mut records: BTreeMap<String, PackageRecord> = BTreeMap::new();

    let add = |records: &mut BTreeMap<String, PackageRecord>,
                   name: &str,
                   reference: &str,
                   groups: &BTreeSet<String>|
     -> Option<String> {
        if reference.starts_with("link:") {
            return None;
        }
        let version = v9_version(&lockfile, name, reference);
        let commit = codeload_commit(reference).unwrap_or_default();
        if version.is_empty() && commit.is_empty() {
            return None;
        }

        let package_key = format!("{}@{}", name, reference.split('(').next().unwrap_or(reference));
        let record_key = format!("{}@{}", name, version);
        let mut record = new_record(name, version.clone())
            .with_commit(commit)
            .with_groups(groups.iter().cloned());
        record.locations = package_locations(positions, &package_key, name, &version, file_path);

        match records.get_mut(&record_key) {
            Some(existing) => existing.absorb(record),
            None => {
                records.insert(record_key.clone(), record);
            }
        }
        Some(record_key)
    };

    for importer in lockfile.importers.values() {
        for (group, section) in importer.sections() {
            for (name, dependency) in section {
                let reference = dependency.version();
                let groups = BTreeSet::from([group.to_string()]);
                let Some(root_key) = add(&mut records, name, &reference, &groups) else {
                    continue;
                };
                if let Some(root) = records.get_mut(&root_key) {
                    root.is_direct = true;
                    if let Some(specifier) = dependency.specifier() {
                        root.add_target_version(specifier);
                    }
                }

                // Transitive dependencies inherit the groups of the direct one.
                let mut visited = BTreeSet::new();
                let mut queue = VecDeque::from([(format!("{}@{}", name, reference), root_key)]);
                while let Some((snapshot_key, record_key)) = queue.pop_front() {
                    if !visited.insert(snapshot_key.clone()) {
                        continue;
                    }
                    let Some(Some(snapshot)) = lockfile.snapshots.get(&snapshot_key) else {
                        continue;
                    };

                    let children = snapshot
                        .dependencies
                        .iter()
                        .chain(snapshot.optional_dependencies.iter());
                    for (child_name, child_reference) in children {
                        let child_reference = &child_reference.0;
                        if let Some(record) = records.get_mut(&record_key) {
                            if !record.dependencies.contains(child_name) {
                                record.dependencies.push(child_name.clone());
                            }
                        }
                        if let Some(child_key) = add(&mut records, child_name, child_reference, &groups) {
                            queue.push_back((format!("{}@{}", child_name, child_reference), child_key));
                        }
                    }
                }
            }
        }
    }

    records.into_values().collect()
}

fn lockfile_major_version(header: &PnpmLockfileHeader) -> u32 {
    header
        .lockfile_version
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|major| major.parse().ok())
        .unwrap_or(0)
}

/// Extractor for `pnpm-lock.yaml`, lockfile versions 5, 6 and 9.
#[derive(Debug, Default)]
pub struct PnpmLockExtractor {
    matcher: PackageJsonMatcher,
}

impl PnpmLockExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Extractor for PnpmLockExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|name| name == "pnpm-lock.yaml")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if is_blank(file) {
            return Ok(Vec::new());
        }

        let comments_only = file.text().lines().all(|line| {
            let line = line.trim();
            line.is_empty() || line.starts_with('#')
        });
        if comments_only {
            return Ok(Vec::new());
        }
        let Some(header) = decode_yaml::<Option<PnpmLockfileHeader>>(file)? else {
            return Ok(Vec::new());
        };
        let lines = text_to_lines(file.text());
        let positions = in_yaml(&lines);

        if lockfile_major_version(&header) >= 9 {
            let lockfile: PnpmV9Lockfile = decode_yaml(file)?;
            Ok(parse_v9(lockfile, &positions, file.path()))
        } else {
            let lockfile: PnpmLockfile = decode_yaml(file)?;
            Ok(parse_legacy(lockfile, &positions, file.path()))
        }
    }

    fn matchers(&self) -> Vec<&dyn Matcher> {
        vec![&self.matcher]
    }
}
