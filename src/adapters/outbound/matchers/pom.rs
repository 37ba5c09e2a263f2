use super::mark_declared;
use crate::adapters::outbound::extractors::is_blank;
use crate::adapters::outbound::extractors::maven::{
    resolve_version, PomDependency, PomProject, MAX_PARENT_DEPTH,
};
use crate::ports::outbound::{DepFile, Matcher};
use crate::sbom_generation::domain::{ArtifactDescriptor, ArtifactDetail, Ecosystem, PackageRecord};
use crate::shared::error::ExtractError;
use std::collections::BTreeMap;
use std::path::Path;

fn parse(file: &dyn DepFile) -> Result<PomProject, ExtractError> {
    PomProject::parse(file.path(), file.text())
        .map_err(|details| ExtractError::parse(Path::new(file.path()), details))
}

/// A POM of the hierarchy with the file it was read from.
struct PomFile {
    path: String,
    project: PomProject,
}

/// Reads the parents of `project` that are available locally, nearest first.
fn local_parents(file: &dyn DepFile, project: &PomProject) -> Result<Vec<PomFile>, ExtractError> {
    let mut parents: Vec<PomFile> = Vec::new();
    let mut parent = project.parent.clone();

    while let Some(declared) = parent {
        if parents.len() >= MAX_PARENT_DEPTH {
            tracing::warn!(
                "Stopped following parents of {} after {} levels",
                file.path(),
                MAX_PARENT_DEPTH
            );
            break;
        }
        let child_path = parents.last().map_or(file.path(), |child| child.path.as_str());
        let parent_path = Path::new(child_path)
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(declared.pom_path());
        let parent_file = match file.open(&parent_path.to_string_lossy()) {
            Ok(parent_file) => parent_file,
            Err(err) if err.is_not_found() => break,
            Err(err) => return Err(err),
        };

        let project = parse(parent_file.as_ref())?;
        parent = project.parent.clone();
        parents.push(PomFile {
            path: parent_file.path().to_string(),
            project,
        });
    }

    Ok(parents)
}

/// Properties visible from the first POM of `hierarchy`: each POM overrides
/// the ones of its parents.
fn hierarchy_properties(hierarchy: &[PomFile]) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    for pom in hierarchy.iter().rev() {
        properties.extend(pom.project.resolvable_properties());
    }
    properties
}

fn declared_entries(project: &PomProject) -> impl Iterator<Item = &PomDependency> {
    project
        .dependencies
        .iter()
        .chain(&project.managed_dependencies)
        .chain(&project.plugins)
}

/// Matcher for Maven POMs: the scanned `pom.xml` is its own manifest.
///
/// Declarations are looked up through the local parent chain (dependencies,
/// dependency management and build plugins) and the POM is reported as a build
/// artifact, depending on its parent when it declares one.
#[derive(Debug, Default)]
pub struct PomMatcher;

impl Matcher for PomMatcher {
    fn get_source_file(&self, lockfile: &dyn DepFile) -> Result<Box<dyn DepFile>, ExtractError> {
        lockfile.open(lockfile.path())
    }

    fn match_packages(
        &self,
        source_file: &dyn DepFile,
        records: &mut [PackageRecord],
    ) -> Result<Option<ArtifactDescriptor>, ExtractError> {
        if is_blank(source_file) {
            return Ok(None);
        }

        let project = parse(source_file)?;
        let parents = local_parents(source_file, &project)?;
        let mut hierarchy = vec![PomFile {
            path: source_file.path().to_string(),
            project,
        }];
        hierarchy.extend(parents);
        let properties = hierarchy_properties(&hierarchy);

        for pom in &hierarchy {
            for entry in declared_entries(&pom.project) {
                let name = entry.name();
                let version = resolve_version(&name, &entry.version, &properties);
                for record in records
                    .iter_mut()
                    .filter(|record| record.name == name && record.version == version)
                {
                    let scope = (!entry.scope.is_empty()).then_some(entry.scope.as_str());
                    mark_declared(record, entry.version.trim(), scope, Some(entry.locations.clone()));
                }
            }
        }

        let own = &hierarchy[0];
        let mut artifact = ArtifactDescriptor::new(ArtifactDetail {
            name: format!("{}:{}", own.project.effective_group_id(), own.project.artifact_id),
            version: resolve_version(
                &own.project.artifact_id,
                own.project.effective_version(),
                &properties,
            ),
            ecosystem: Ecosystem::Maven,
            filename: own.path.clone(),
        });
        if let Some(parent) = &own.project.parent {
            let filename = match hierarchy.get(1) {
                Some(parent_pom) => parent_pom.path.clone(),
                None => source_file
                    .dir()
                    .join(parent.pom_path())
                    .to_string_lossy()
                    .into_owned(),
            };
            artifact = artifact.with_parent(ArtifactDetail {
                name: format!("{}:{}", parent.group_id, parent.artifact_id),
                version: parent.version.clone(),
                ecosystem: Ecosystem::Maven,
                filename,
            });
        }

        Ok(Some(artifact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::filesystem::LocalDepFile;
    use crate::sbom_generation::domain::{PackageManager, Position};
    use std::fs;
    use tempfile::TempDir;

    const PARENT: &str = r#"<project>
  <groupId>org.acme</groupId>
  <artifactId>parent</artifactId>
  <version>2.0.0</version>
  <properties>
    <jackson.version>2.16.0</jackson.version>
  </properties>
  <dependencyManagement>
    <dependencies>
      <dependency>
        <groupId>com.fasterxml.jackson.core</groupId>
        <artifactId>jackson-databind</artifactId>
        <version>${jackson.version}</version>
      </dependency>
    </dependencies>
  </dependencyManagement>
</project>
"#;

    const CHILD: &str = r#"<project>
  <parent>
    <groupId>org.acme</groupId>
    <artifactId>parent</artifactId>
    <version>2.0.0</version>
  </parent>
  <artifactId>app</artifactId>
  <properties>
    <jackson.version>2.16.1</jackson.version>
  </properties>
  <dependencies>
    <dependency>
      <groupId>org.junit</groupId>
      <artifactId>junit</artifactId>
      <version>4.13.2</version>
      <scope>test</scope>
    </dependency>
  </dependencies>
  <build>
    <plugins>
      <plugin>
        <groupId>org.apache.maven.plugins</groupId>
        <artifactId>maven-surefire-plugin</artifactId>
        <version>3.2.2</version>
      </plugin>
    </plugins>
  </build>
</project>
"#;

    fn record(name: &str, version: &str) -> PackageRecord {
        PackageRecord::new(name, version, Ecosystem::Maven, PackageManager::Maven)
    }

    fn project() -> (TempDir, LocalDepFile) {
        let dir = TempDir::new().unwrap();
        let app_dir = dir.path().join("app");
        fs::create_dir(&app_dir).unwrap();
        fs::write(dir.path().join("pom.xml"), PARENT).unwrap();
        fs::write(app_dir.join("pom.xml"), CHILD).unwrap();
        let file = LocalDepFile::open(&app_dir.join("pom.xml")).unwrap();
        (dir, file)
    }

    #[test]
    fn test_artifact_with_parent() {
        let (dir, file) = project();
        let artifact = PomMatcher.match_packages(&file, &mut []).unwrap().unwrap();

        assert_eq!(artifact.detail.name, "org.acme:app");
        assert_eq!(artifact.detail.version, "2.0.0");
        assert_eq!(artifact.filename(), file.path());

        let parent = artifact.depends_on.unwrap();
        assert_eq!(parent.name, "org.acme:parent");
        let parent_path = fs::canonicalize(dir.path().join("pom.xml")).unwrap();
        assert_eq!(parent.filename, parent_path.to_string_lossy());
    }

    #[test]
    fn test_declarations_across_hierarchy() {
        let (dir, file) = project();
        let mut records = [
            record("org.junit:junit", "4.13.2"),
            record("com.fasterxml.jackson.core:jackson-databind", "2.16.1"),
            record("org.apache.maven.plugins:maven-surefire-plugin", "3.2.2"),
            record("org.hamcrest:hamcrest-core", "1.3"),
        ];
        PomMatcher.match_packages(&file, &mut records).unwrap();

        let junit = &records[0];
        assert!(junit.is_direct);
        assert!(junit.dep_groups.contains("test"));
        let source = junit.source_locations.as_ref().unwrap();
        assert_eq!(source.block.line, Position::new(12, 17));
        assert_eq!(source.version.as_ref().unwrap().line, Position::at(15));

        let jackson = &records[1];
        assert!(jackson.is_direct);
        assert_eq!(jackson.target_versions, vec!["${jackson.version}"]);
        let parent_path = fs::canonicalize(dir.path().join("pom.xml")).unwrap();
        assert_eq!(
            jackson.source_locations.as_ref().unwrap().block.filename,
            parent_path.to_string_lossy()
        );

        assert!(records[2].is_direct);
        assert!(!records[3].is_direct);
    }

    #[test]
    fn test_artifact_without_parent() {
        let file = LocalDepFile::from_content(
            "/repo/pom.xml",
            "<project><groupId>g</groupId><artifactId>a</artifactId><version>1</version></project>",
        );
        let artifact = PomMatcher.match_packages(&file, &mut []).unwrap().unwrap();
        assert!(artifact.is_package("g:a", "1"));
        assert!(artifact.depends_on.is_none());
    }

    #[test]
    fn test_missing_parent_still_links_by_path() {
        let file = LocalDepFile::from_content(
            "/repo/module/pom.xml",
            "<project><parent><groupId>g</groupId><artifactId>p</artifactId><version>1</version></parent><artifactId>m</artifactId></project>",
        );
        let artifact = PomMatcher.match_packages(&file, &mut []).unwrap().unwrap();
        assert!(artifact.is_package("g:m", "1"));
        assert_eq!(artifact.depends_on.unwrap().filename, "/repo/module/../pom.xml");
    }
}
