//! Requirement-line grammar shared by the pip-style extractors and matchers.

use crate::sbom_generation::domain::{
    Ecosystem, FileLocations, FilePosition, PackageManager, PackageRecord, Position,
};
use crate::sbom_generation::services::normalize_python_name;
use crate::shared::position::{find_substring_in_multiline, first_non_empty_column, last_non_empty_column};
use crate::shared::regex_cache::static_regex;

pub const EXTRAS_ANNOTATION: &str = "extras";
pub const MARKERS_ANNOTATION: &str = "environment-markers";
pub const OPTIONS_ANNOTATION: &str = "options";

const REQUIREMENT_PATTERN: &str = r"^\s*(?P<pkgname>[a-zA-Z0-9._-]+)\s*(\[(?P<optnames>[a-zA-Z0-9._,\s-]+)])?\s*(\(?\s*(?P<requirement>(\s*,?\s*(?P<constraint>~=|==|!=|<=|>=|<|>|===)\s*(?P<version>[a-zA-Z0-9._!*+-]+))+|(@\s*(?P<wheel>[^;]+)))\s*\)?)?\s*(;\s*(?P<envmarkers>.*))?\s*";

/// One parsed requirement such as `Flask[async] >= 2.0 ; python_version > "3.8"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirement {
    /// Name as written.
    pub raw_name: String,
    /// PEP 503 normalized name.
    pub name: String,
    /// Declared requirement without whitespace, `==<version>` for wheels.
    pub requirement: String,
    /// Exact pin when the requirement names a single version, otherwise the
    /// declared requirement.
    pub version: String,
    pub extras: String,
    pub markers: String,
    pub options: String,
    /// Text the version was read from, used to locate it.
    version_text: String,
}

/// PEP 503 name with any `[extras]` suffix removed.
pub fn normalized_requirement_name(name: &str) -> String {
    let normalized = normalize_python_name(name);
    match normalized.split_once('[') {
        Some((bare, _)) => bare.to_string(),
        None => normalized,
    }
}

/// True when the line ends with an unescaped backslash.
pub fn is_line_continuation(line: &str) -> bool {
    let trailing = line.chars().rev().take_while(|&c| c == '\\').count();
    trailing % 2 == 1
}

/// Lines that carry no requirement: flags, URLs and paths.
pub fn is_not_requirement_line(line: &str) -> bool {
    line.is_empty()
        || line.starts_with('-')
        || line.starts_with("https://")
        || line.starts_with("http://")
        || line.starts_with('.')
        || line.starts_with('/')
}

/// Strips a `# comment` and surrounding whitespace.
pub fn strip_comment(line: &str) -> String {
    static_regex(r"\s*#.*")
        .replace_all(line.trim(), "")
        .into_owned()
}

/// Version from a wheel filename (`name-version[-build]-python-abi-platform.whl`).
pub fn version_from_wheel_url(url: &str) -> Option<String> {
    static_regex(
        r"^.*?/(?P<distribution>[^-/]+)-(?P<version>[^-/]+)(-(?P<buildtag>[^-/]+))?-(?P<pythontag>[^-/]+)-(?P<abitag>[^-/]+)-(?P<platformtag>[^-/]+)\.whl\s*$",
    )
    .captures(url)
    .and_then(|captures| captures.name("version"))
    .map(|version| version.as_str().to_string())
    .filter(|version| !version.is_empty())
}

fn is_exact_pin(requirement: &str) -> Option<&str> {
    let version = requirement
        .strip_prefix("===")
        .or_else(|| requirement.strip_prefix("=="))?;
    let single = !version.is_empty()
        && !version.contains(',')
        && !version.contains('*')
        && !version.starts_with('=');
    single.then_some(version)
}

/// Parses one logical requirement line (continuations already joined).
pub fn parse_requirement(line: &str) -> Option<Requirement> {
    let (declaration, options) = split_options(line);
    let captures = static_regex(REQUIREMENT_PATTERN).captures(&declaration)?;
    let group = |name: &str| {
        captures
            .name(name)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    };

    let raw_name = group("pkgname");
    if raw_name.is_empty() {
        return None;
    }

    let declared = group("requirement");
    let wheel = group("wheel");
    let (requirement, version, version_text) = if !wheel.is_empty() {
        match version_from_wheel_url(&wheel).filter(|_| wheel.ends_with(".whl")) {
            Some(version) => (format!("=={}", version), version, wheel.clone()),
            None => (String::new(), String::new(), String::new()),
        }
    } else {
        let requirement: String = declared.chars().filter(|c| !c.is_whitespace()).collect();
        let version = is_exact_pin(&requirement)
            .map(str::to_string)
            .unwrap_or_else(|| requirement.clone());
        (requirement, version, declared)
    };

    Some(Requirement {
        name: normalized_requirement_name(&raw_name),
        raw_name,
        requirement,
        version,
        extras: group("optnames"),
        markers: group("envmarkers"),
        options,
        version_text,
    })
}

/// Separates `--hash=...` style per-requirement options from the declaration.
fn split_options(line: &str) -> (String, String) {
    let (before_markers, markers) = match line.split_once(';') {
        Some((before, after)) => (before, Some(after)),
        None => (line, None),
    };
    if !before_markers.split_whitespace().any(|token| token.starts_with("--")) {
        return (line.to_string(), String::new());
    }

    let (options, declaration): (Vec<&str>, Vec<&str>) = before_markers
        .split_whitespace()
        .filter(|token| *token != "\\")
        .partition(|token| token.starts_with("--"));

    let mut declaration = declaration.join(" ");
    if let Some(markers) = markers {
        declaration.push_str(" ;");
        declaration.push_str(markers);
    }
    (declaration, options.join(" "))
}

impl Requirement {
    /// Positions of this requirement inside `block_text`, the raw (possibly
    /// multi-line) text of the declaration starting on `line_number`.
    pub fn locations(&self, path: &str, block_text: &str, line_number: usize) -> FileLocations {
        let lines: Vec<&str> = block_text.split('\n').collect();
        let last_index = lines.len().saturating_sub(1);
        let block = match (
            lines.first().and_then(|line| first_non_empty_column(line)),
            lines.last().and_then(|line| last_non_empty_column(line)),
        ) {
            (Some(start), Some(end)) => FilePosition::new(
                path,
                Position::new(line_number, line_number + last_index),
                Position::new(start, end + 1),
            ),
            _ => FilePosition::default(),
        };

        let locate = |needle: &str| {
            find_substring_in_multiline(block_text, needle, line_number)
                .map(|position| position.in_file(path))
        };
        let version = if self.version_text.is_empty() {
            None
        } else {
            locate(&self.version_text)
        };

        FileLocations::new(block)
            .with_name(locate(&self.raw_name))
            .with_version(version)
    }

    /// Converts into a record located in `path`; see [`Requirement::locations`].
    pub fn into_record(
        self,
        path: &str,
        package_manager: PackageManager,
        block_text: &str,
        line_number: usize,
    ) -> PackageRecord {
        let locations = self.locations(path, block_text, line_number);
        let mut record = PackageRecord::new(self.name, self.version, Ecosystem::PyPI, package_manager)
            .with_locations(locations);
        record.add_target_version(self.requirement);
        for (key, value) in [
            (EXTRAS_ANNOTATION, self.extras),
            (MARKERS_ANNOTATION, self.markers),
            (OPTIONS_ANNOTATION, self.options),
        ] {
            if !value.is_empty() {
                record.annotations.insert(key.to_string(), value);
            }
        }
        record
    }
}
