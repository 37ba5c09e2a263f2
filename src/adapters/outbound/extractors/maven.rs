//! `pom.xml` model shared by the Maven extractor and the POM matcher.

use super::is_blank;
use super::xml_tree::{parse_xml, LineIndex, XmlNode};
use crate::adapters::outbound::matchers::PomMatcher;
use crate::ports::outbound::{DepFile, Extractor, Matcher};
use crate::sbom_generation::domain::{
    Ecosystem, FileLocations, FilePosition, PackageManager, PackageRecord,
};
use crate::shared::error::ExtractError;
use crate::shared::regex_cache::static_regex;
use std::collections::BTreeMap;
use std::path::Path;

/// Parent POMs followed before giving up on a (probably circular) chain.
pub const MAX_PARENT_DEPTH: usize = 10;

/// Version reported when a property cannot be resolved or a range is empty.
pub const UNRESOLVED_VERSION: &str = "0";

/// One `<dependency>` or `<plugin>` entry with its positions.
#[derive(Debug, Clone, Default)]
pub struct PomDependency {
    pub group_id: String,
    pub artifact_id: String,
    /// Declared version text, before property substitution.
    pub version: String,
    pub scope: String,
    pub locations: FileLocations,
}

impl PomDependency {
    pub fn name(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PomParent {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub relative_path: String,
}

impl PomParent {
    /// Location of the parent POM relative to the child's directory.
    pub fn pom_path(&self) -> String {
        if self.relative_path.is_empty() {
            return "../pom.xml".to_string();
        }
        if self.relative_path.ends_with(".xml") {
            self.relative_path.clone()
        } else {
            Path::new(&self.relative_path)
                .join("pom.xml")
                .to_string_lossy()
                .into_owned()
        }
    }
}

/// The parts of a POM the scanner reads.
#[derive(Debug, Clone, Default)]
pub struct PomProject {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub parent: Option<PomParent>,
    pub properties: BTreeMap<String, String>,
    pub dependencies: Vec<PomDependency>,
    pub managed_dependencies: Vec<PomDependency>,
    pub plugins: Vec<PomDependency>,
}

fn read_dependency(node: &XmlNode, index: &LineIndex<'_>, path: &str) -> PomDependency {
    let text_position = |name: &str| -> Option<FilePosition> {
        let (start, end) = node.child(name)?.text_range?;
        Some(index.span(start, end).in_file(path))
    };

    PomDependency {
        group_id: node.child_text("groupId").to_string(),
        artifact_id: node.child_text("artifactId").to_string(),
        version: node.child_text("version").to_string(),
        scope: node.child_text("scope").trim().to_string(),
        locations: FileLocations::new(index.span(node.start, node.end).in_file(path))
            .with_name(text_position("artifactId"))
            .with_version(text_position("version")),
    }
}

fn read_dependencies(
    holder: Option<&XmlNode>,
    element: &str,
    index: &LineIndex<'_>,
    path: &str,
) -> Vec<PomDependency> {
    holder
        .map(|holder| {
            holder
                .children_named(element)
                .map(|node| read_dependency(node, index, path))
                .collect()
        })
        .unwrap_or_default()
}

impl PomProject {
    /// Parses the POM at `path` whose content is `text`.
    ///
    /// # Errors
    /// Returns the XML parser's message, or a message when the root element
    /// is not `<project>`.
    pub fn parse(path: &str, text: &str) -> Result<Self, String> {
        let root = parse_xml(text)?;
        if root.name != "project" {
            return Err(format!("expected a <project> root element, found <{}>", root.name));
        }
        let index = LineIndex::new(text);

        let parent = root.child("parent").map(|parent| PomParent {
            group_id: parent.child_text("groupId").to_string(),
            artifact_id: parent.child_text("artifactId").to_string(),
            version: parent.child_text("version").to_string(),
            relative_path: parent.child_text("relativePath").to_string(),
        });

        let properties = root
            .child("properties")
            .map(|properties| {
                properties
                    .children
                    .iter()
                    .map(|property| (property.name.clone(), property.text.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let build = root.child("build");
        let mut plugins = read_dependencies(build.and_then(|b| b.child("plugins")), "plugin", &index, path);
        plugins.extend(read_dependencies(
            build.and_then(|b| b.descend(&["pluginManagement", "plugins"])),
            "plugin",
            &index,
            path,
        ));

        Ok(Self {
            group_id: root.child_text("groupId").to_string(),
            artifact_id: root.child_text("artifactId").to_string(),
            version: root.child_text("version").to_string(),
            parent,
            properties,
            dependencies: read_dependencies(root.child("dependencies"), "dependency", &index, path),
            managed_dependencies: read_dependencies(
                root.descend(&["dependencyManagement", "dependencies"]),
                "dependency",
                &index,
                path,
            ),
            plugins,
        })
    }

    /// Group id, inherited from the parent when the project omits it.
    pub fn effective_group_id(&self) -> &str {
        match (&self.group_id, &self.parent) {
            (group_id, Some(parent)) if group_id.is_empty() => &parent.group_id,
            (group_id, _) => group_id,
        }
    }

    /// Version, inherited from the parent when the project omits it.
    pub fn effective_version(&self) -> &str {
        match (&self.version, &self.parent) {
            (version, Some(parent)) if version.is_empty() => &parent.version,
            (version, _) => version,
        }
    }

    /// Properties usable in `${...}` references: the declared ones plus the
    /// `project.*` built-ins.
    pub fn resolvable_properties(&self) -> BTreeMap<String, String> {
        let mut properties = self.properties.clone();
        let builtins = [
            ("project.groupId", self.effective_group_id().to_string()),
            ("project.artifactId", self.artifact_id.clone()),
            ("project.version", self.effective_version().to_string()),
            (
                "project.parent.version",
                self.parent.as_ref().map(|p| p.version.clone()).unwrap_or_default(),
            ),
        ];
        for (key, value) in builtins {
            if !value.is_empty() {
                properties.entry(key.to_string()).or_insert(value);
            }
        }
        properties
    }

    /// Folds a parent into this project: the child's identity, properties and
    /// dependencies take precedence.
    fn merge_parent(self, mut parent: PomProject) -> PomProject {
        parent.properties.extend(self.properties);
        parent.dependencies.extend(self.dependencies);
        parent.managed_dependencies.extend(self.managed_dependencies);
        parent.plugins.extend(self.plugins);

        PomProject {
            group_id: self.group_id,
            artifact_id: self.artifact_id,
            version: self.version,
            parent: self.parent,
            ..parent
        }
    }
}

/// First bound of a version range such as `[1.0,2.0)`; `0` when empty.
pub fn first_range_bound(version: &str) -> String {
    static_regex(r"[\[(]?(.*?)(?:,|[)\]]|$)")
        .captures(version)
        .and_then(|captures| captures.get(1))
        .map(|bound| bound.as_str().trim())
        .filter(|bound| !bound.is_empty())
        .unwrap_or(UNRESOLVED_VERSION)
        .to_string()
}

/// Substitutes `${property}` references and reduces ranges to their first
/// bound. Unknown properties become `0` with a warning.
pub fn resolve_version(dependency: &str, version: &str, properties: &BTreeMap<String, String>) -> String {
    let substituted = static_regex(r"\$\{([^}]+)\}").replace_all(version, |captures: &regex::Captures<'_>| {
        let property = &captures[1];
        match properties.get(property) {
            Some(value) => first_range_bound(value),
            None => {
                tracing::warn!(
                    "Failed to resolve version of {}: property \"{}\" could not be found",
                    dependency,
                    &captures[0]
                );
                UNRESOLVED_VERSION.to_string()
            }
        }
    });

    first_range_bound(&substituted)
}

/// Reads `file` and its local parent chain into one merged project.
fn decode_with_parents(file: &dyn DepFile, depth: usize) -> Result<PomProject, ExtractError> {
    if depth >= MAX_PARENT_DEPTH {
        return Err(ExtractError::parse(
            Path::new(file.path()),
            format!(
                "maven file decoding reached the max depth ({}/{}), check for a circular dependency",
                depth, MAX_PARENT_DEPTH
            ),
        ));
    }

    let project = PomProject::parse(file.path(), file.text())
        .map_err(|details| ExtractError::parse(Path::new(file.path()), details))?;
    let Some(parent) = project.parent.clone() else {
        return Ok(project);
    };

    let parent_file = match file.open(&parent.pom_path()) {
        Ok(parent_file) => parent_file,
        Err(err) if err.is_not_found() => {
            tracing::warn!(
                "Parent POM {}:{} of {} is not available locally, its declarations are ignored",
                parent.group_id,
                parent.artifact_id,
                file.path()
            );
            return Ok(project);
        }
        Err(err) => return Err(err),
    };
    tracing::debug!("Opening parent file {}", parent_file.path());

    let parent_project = decode_with_parents(parent_file.as_ref(), depth + 1)?;
    Ok(project.merge_parent(parent_project))
}

fn to_record(dependency: &PomDependency, properties: &BTreeMap<String, String>) -> PackageRecord {
    let name = dependency.name();
    let version = resolve_version(&name, &dependency.version, properties);

    PackageRecord::new(name, version, Ecosystem::Maven, PackageManager::Maven)
        .with_locations(dependency.locations.clone())
        .with_groups([dependency.scope.clone()])
}

/// Extractor for Maven `pom.xml` files, including their local parent chain.
#[derive(Debug, Default)]
pub struct MavenLockExtractor {
    matcher: PomMatcher,
}

impl MavenLockExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Extractor for MavenLockExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|name| name == "pom.xml")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if is_blank(file) {
            return Ok(Vec::new());
        }

        let project = decode_with_parents(file, 0)?;
        let properties = project.resolvable_properties();

        // Managed dependencies override plain ones with the same coordinates.
        let mut records: BTreeMap<String, PackageRecord> = BTreeMap::new();
        for dependency in project.dependencies.iter().chain(&project.managed_dependencies) {
            records.insert(dependency.name(), to_record(dependency, &properties));
        }

        Ok(records.into_values().collect())
    }

    fn matchers(&self) -> Vec<&dyn Matcher> {
        vec![&self.matcher]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::filesystem::LocalDepFile;
    use crate::sbom_generation::domain::Position;
    use std::fs;
    use tempfile::TempDir;

    const POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <groupId>org.acme</groupId>
  <artifactId>app</artifactId>
  <version>1.0.0</version>
  <properties>
    <foo.version>1.2.3</foo.version>
  </properties>
  <dependencies>
    <dependency>
      <groupId>x</groupId>
      <artifactId>y</artifactId>
      <version>${foo.version}</version>
    </dependency>
    <dependency>
      <groupId>org.junit</groupId>
      <artifactId>junit</artifactId>
      <version>[4.12,5.0)</version>
      <scope>test</scope>
    </dependency>
    <dependency>
      <groupId>missing</groupId>
      <artifactId>prop</artifactId>
      <version>${nowhere}</version>
    </dependency>
  </dependencies>
  <dependencyManagement>
    <dependencies>
      <dependency>
        <groupId>org.junit</groupId>
        <artifactId>junit</artifactId>
        <version>4.13.2</version>
        <scope>test</scope>
      </dependency>
    </dependencies>
  </dependencyManagement>
</project>
"#;

    fn extract(content: &str) -> Vec<PackageRecord> {
        let file = LocalDepFile::from_content("/project/pom.xml", content);
        MavenLockExtractor::new().extract(&file).unwrap()
    }

    #[test]
    fn test_property_substitution() {
        let records = extract(POM);
        let y = records.iter().find(|r| r.name == "x:y").unwrap();
        assert_eq!(y.version, "1.2.3");
        assert_eq!(y.ecosystem, Ecosystem::Maven);
    }

    #[test]
    fn test_managed_dependency_overrides_plain_one() {
        let records = extract(POM);
        let junit = records.iter().find(|r| r.name == "org.junit:junit").unwrap();
        assert_eq!(junit.version, "4.13.2");
        assert!(junit.dep_groups.contains("test"));
        assert_eq!(junit.locations.block.line, Position::new(29, 34));
    }

    #[test]
    fn test_unresolved_property_is_zero() {
        let records = extract(POM);
        let missing = records.iter().find(|r| r.name == "missing:prop").unwrap();
        assert_eq!(missing.version, "0");
    }

    #[test]
    fn test_dependency_positions() {
        let records = extract(POM);
        let y = records.iter().find(|r| r.name == "x:y").unwrap();

        assert_eq!(y.locations.block.filename, "/project/pom.xml");
        assert_eq!(y.locations.block.line, Position::new(10, 14));
        assert_eq!(y.locations.block.column, Position::new(5, 18));

        let name = y.locations.name.as_ref().unwrap();
        assert_eq!(name.line, Position::at(12));
        assert_eq!(name.column, Position::new(19, 20));

        let version = y.locations.version.as_ref().unwrap();
        assert_eq!(version.line, Position::at(13));
        assert_eq!(version.column, Position::new(16, 30));
    }

    #[test]
    fn test_first_range_bound() {
        assert_eq!(first_range_bound("[1.0,2.0)"), "1.0");
        assert_eq!(first_range_bound("(,1.0]"), "0");
        assert_eq!(first_range_bound("1.2.3"), "1.2.3");
        assert_eq!(first_range_bound(""), "0");
        assert_eq!(first_range_bound("[1.5]"), "1.5");
    }

    #[test]
    fn test_parent_chain_is_merged() {
        let temp_dir = TempDir::new().unwrap();
        let child_dir = temp_dir.path().join("child");
        fs::create_dir(&child_dir).unwrap();
        fs::write(
            temp_dir.path().join("pom.xml"),
            r#"<project>
  <groupId>org.acme</groupId>
  <artifactId>parent</artifactId>
  <version>2.0.0</version>
  <properties>
    <lib.version>3.1.0</lib.version>
    <shared.version>1.0.0</shared.version>
  </properties>
  <dependencies>
    <dependency>
      <groupId>org.acme</groupId>
      <artifactId>from-parent</artifactId>
      <version>${shared.version}</version>
    </dependency>
  </dependencies>
</project>
"#,
        )
        .unwrap();
        fs::write(
            child_dir.join("pom.xml"),
            r#"<project>
  <parent>
    <groupId>org.acme</groupId>
    <artifactId>parent</artifactId>
    <version>2.0.0</version>
  </parent>
  <artifactId>child</artifactId>
  <properties>
    <shared.version>1.5.0</shared.version>
  </properties>
  <dependencies>
    <dependency>
      <groupId>org.lib</groupId>
      <artifactId>lib</artifactId>
      <version>${lib.version}</version>
    </dependency>
    <dependency>
      <groupId>org.acme</groupId>
      <artifactId>sibling</artifactId>
      <version>${project.version}</version>
    </dependency>
  </dependencies>
</project>
"#,
        )
        .unwrap();

        let file = LocalDepFile::open(&child_dir.join("pom.xml")).unwrap();
        let records = MavenLockExtractor::new().extract(&file).unwrap();
        let find = |name: &str| records.iter().find(|r| r.name == name).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(find("org.lib:lib").version, "3.1.0");
        assert_eq!(find("org.acme:sibling").version, "2.0.0");

        let inherited = find("org.acme:from-parent");
        assert_eq!(inherited.version, "1.5.0");
        let parent_path = fs::canonicalize(temp_dir.path().join("pom.xml")).unwrap();
        assert_eq!(
            inherited.locations.block.filename,
            parent_path.to_string_lossy()
        );
    }

    #[test]
    fn test_missing_parent_is_not_fatal() {
        let records = extract(
            r#"<project>
  <parent>
    <groupId>org.springframework.boot</groupId>
    <artifactId>spring-boot-starter-parent</artifactId>
    <version>3.2.0</version>
    <relativePath>/nonexistent/parent</relativePath>
  </parent>
  <artifactId>app</artifactId>
  <dependencies>
    <dependency>
      <groupId>a</groupId>
      <artifactId>b</artifactId>
      <version>1</version>
    </dependency>
  </dependencies>
</project>
"#,
        );
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_invalid_xml() {
        let file = LocalDepFile::from_content("/project/pom.xml", "<project><dependencies></project>");
        let err = MavenLockExtractor::new().extract(&file).unwrap_err();
        assert!(matches!(err, ExtractError::Parse { .. }));
    }

    #[test]
    fn test_empty_file() {
        assert!(extract("").is_empty());
    }

    #[test]
    fn test_parent_pom_path() {
        let parent = |relative_path: &str| PomParent {
            relative_path: relative_path.to_string(),
            ..PomParent::default()
        };
        assert_eq!(parent("").pom_path(), "../pom.xml");
        assert_eq!(parent("../parent/pom.xml").pom_path(), "../parent/pom.xml");
        assert_eq!(parent("../parent").pom_path(), "../parent/pom.xml");
    }
}
