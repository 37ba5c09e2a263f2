use super::mark_declared;
use crate::adapters::outbound::extractors::is_blank;
use crate::adapters::outbound::extractors::xml_tree::{parse_xml, LineIndex, XmlNode};
use crate::ports::outbound::{DepFile, Matcher};
use crate::sbom_generation::domain::{ArtifactDescriptor, FileLocations, FilePosition, PackageRecord};
use crate::shared::error::ExtractError;
use crate::shared::regex_cache::cached_regex;
use std::fs;
use std::path::Path;

const PROJECT_EXTENSION: &str = "csproj";

/// One `<PackageReference>` of a project file.
struct PackageReference {
    name: String,
    version: String,
    locations: FileLocations,
}

fn package_reference_nodes<'n>(node: &'n XmlNode, found: &mut Vec<&'n XmlNode>) {
    for child in &node.children {
        if child.name == "PackageReference" {
            found.push(child);
        } else {
            package_reference_nodes(child, found);
        }
    }
}

/// Position of the value of attribute `name` inside the start tag of `node`.
fn attribute_value_span(
    source: &str,
    index: &LineIndex<'_>,
    node: &XmlNode,
    name: &str,
    value: &str,
) -> Option<FilePosition> {
    let pattern = format!(
        r#"(?i)\b{}\s*=\s*["'](?P<value>{})["']"#,
        regex::escape(name),
        regex::escape(value)
    );
    let regex = cached_regex(&pattern).ok()?;
    let element = source.get(node.start..node.end)?;
    let found = regex.captures(element)?.name("value")?;
    Some(index.span(node.start + found.start(), node.start + found.end()))
}

fn read_package_references(file: &dyn DepFile) -> Result<Vec<PackageReference>, ExtractError> {
    let source = file.text();
    let root = parse_xml(source).map_err(|details| ExtractError::parse(Path::new(file.path()), details))?;
    let index = LineIndex::new(source);
    let filename = file.path();

    let mut nodes = Vec::new();
    package_reference_nodes(&root, &mut nodes);

    let references = nodes
        .into_iter()
        .filter_map(|node| {
            let (attribute, name) = ["Include", "Update"]
                .into_iter()
                .find_map(|attribute| node.attribute(attribute).map(|name| (attribute, name)))?;
            let block = index.span(node.start, node.end).in_file(filename);
            let name_position = attribute_value_span(source, &index, node, attribute, name);

            let (version, version_position) = match node.attribute("Version") {
                Some(version) => (
                    version.to_string(),
                    attribute_value_span(source, &index, node, "Version", version),
                ),
                None => match node.child("Version") {
                    Some(child) => (
                        child.text.clone(),
                        child.text_range.map(|(start, end)| index.span(start, end)),
                    ),
                    None => (String::new(), None),
                },
            };

            Some(PackageReference {
                name: name.to_string(),
                version,
                locations: FileLocations::new(block)
                    .with_name(name_position.map(|position| position.in_file(filename)))
                    .with_version(version_position.map(|position| position.in_file(filename))),
            })
        })
        .collect();

    Ok(references)
}

/// Project file of the lockfile's directory: the one named after the
/// directory when present, otherwise the first in name order.
fn find_project_file(dir: &Path) -> Option<String> {
    let mut projects: Vec<String> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|file_type| file_type.is_file()))
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| {
            Path::new(name)
                .extension()
                .is_some_and(|extension| extension.eq_ignore_ascii_case(PROJECT_EXTENSION))
        })
        .collect();
    projects.sort();

    let preferred = dir
        .file_name()
        .map(|name| format!("{}.{}", name.to_string_lossy(), PROJECT_EXTENSION));
    match preferred.filter(|preferred| projects.contains(preferred)) {
        Some(preferred) => Some(preferred),
        None => projects.into_iter().next(),
    }
}

/// Matcher for the `*.csproj` project owning a NuGet `packages.lock.json`.
///
/// Package ids are compared case-insensitively, as NuGet does.
#[derive(Debug, Default)]
pub struct NugetCsprojMatcher;

impl Matcher for NugetCsprojMatcher {
    fn get_source_file(&self, lockfile: &dyn DepFile) -> Result<Box<dyn DepFile>, ExtractError> {
        let dir = lockfile.dir();
        match find_project_file(dir) {
            Some(project) => lockfile.open(&project),
            None => Err(ExtractError::NotFound {
                path: dir.join(format!("*.{}", PROJECT_EXTENSION)),
            }),
        }
    }

    fn match_packages(
        &self,
        source_file: &dyn DepFile,
        records: &mut [PackageRecord],
    ) -> Result<Option<ArtifactDescriptor>, ExtractError> {
        if is_blank(source_file) {
            return Ok(None);
        }

        for reference in read_package_references(source_file)? {
            for record in records
                .iter_mut()
                .filter(|record| record.name.eq_ignore_ascii_case(&reference.name))
            {
                mark_declared(record, &reference.version, None, Some(reference.locations.clone()));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::filesystem::LocalDepFile;
    use crate::sbom_generation::domain::{Ecosystem, PackageManager, Position};
    use tempfile::TempDir;

    const CSPROJ: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <ItemGroup>
    <PackageReference Include="Newtonsoft.Json" Version="13.0.3" />
    <PackageReference Include="Serilog">
      <Version>3.1.1</Version>
    </PackageReference>
  </ItemGroup>
</Project>
"#;

    fn record(name: &str, version: &str) -> PackageRecord {
        PackageRecord::new(name, version, Ecosystem::NuGet, PackageManager::NuGet)
    }

    fn matched() -> Vec<PackageRecord> {
        let file = LocalDepFile::from_content("/app/App.csproj", CSPROJ);
        let mut records = vec![
            record("newtonsoft.json", "13.0.3"),
            record("Serilog", "3.1.1"),
            record("System.Memory", "4.5.5"),
        ];
        assert!(NugetCsprojMatcher.match_packages(&file, &mut records).unwrap().is_none());
        records
    }

    #[test]
    fn test_attribute_version() {
        let records = matched();
        let newtonsoft = &records[0];
        assert!(newtonsoft.is_direct);
        assert_eq!(newtonsoft.target_versions, vec!["13.0.3"]);

        let source = newtonsoft.source_locations.as_ref().unwrap();
        assert_eq!(source.block.filename, "/app/App.csproj");
        assert_eq!(source.block.line, Position::at(3));
        assert_eq!(source.block.column, Position::new(5, 68));
        assert_eq!(source.name.as_ref().unwrap().column, Position::new(32, 47));
        assert_eq!(source.version.as_ref().unwrap().column, Position::new(58, 64));
    }

    #[test]
    fn test_child_version() {
        let records = matched();
        let serilog = &records[1];
        assert_eq!(serilog.target_versions, vec!["3.1.1"]);

        let source = serilog.source_locations.as_ref().unwrap();
        assert_eq!(source.block.line, Position::new(4, 6));
        let version = source.version.as_ref().unwrap();
        assert_eq!(version.line, Position::at(5));
        assert_eq!(version.column, Position::new(16, 21));

        assert!(!records[2].is_direct);
    }

    #[test]
    fn test_project_file_lookup() {
        let dir = TempDir::new().unwrap();
        let app = dir.path().join("App");
        fs::create_dir(&app).unwrap();
        fs::write(app.join("packages.lock.json"), "{}").unwrap();
        let lockfile = LocalDepFile::open(&app.join("packages.lock.json")).unwrap();

        assert!(NugetCsprojMatcher.get_source_file(&lockfile).err().unwrap().is_not_found());

        fs::write(app.join("Aaa.csproj"), CSPROJ).unwrap();
        let source = NugetCsprojMatcher.get_source_file(&lockfile).unwrap();
        assert!(source.path().ends_with("Aaa.csproj"));

        fs::write(app.join("App.csproj"), CSPROJ).unwrap();
        let source = NugetCsprojMatcher.get_source_file(&lockfile).unwrap();
        assert!(source.path().ends_with("App.csproj"));
    }
}
