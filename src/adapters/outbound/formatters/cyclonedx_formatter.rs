use crate::application::dto::CycloneDxVersion;
use crate::application::read_models::{ComponentView, DependencyView, SbomReadModel};
use crate::ports::outbound::SbomFormatter;
use crate::shared::Result;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Bom<'m> {
    #[serde(rename = "$schema")]
    schema: &'static str,
    #[serde(rename = "bomFormat")]
    bom_format: &'static str,
    #[serde(rename = "specVersion")]
    spec_version: &'static str,
    version: u32,
    components: Vec<Component<'m>>,
    dependencies: Vec<Dependency<'m>>,
}

#[derive(Debug, Serialize)]
struct Component<'m> {
    #[serde(rename = "bom-ref")]
    bom_ref: &'m str,
    #[serde(rename = "type")]
    component_type: &'static str,
    name: &'m str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'m str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purl: Option<&'m str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    properties: Vec<Property<'m>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    evidence: Option<Evidence<'m>>,
}

#[derive(Debug, Serialize)]
struct Property<'m> {
    name: &'m str,
    value: &'m str,
}

#[derive(Debug, Serialize)]
struct Evidence<'m> {
    occurrences: Vec<Occurrence<'m>>,
}

#[derive(Debug, Serialize)]
struct Occurrence<'m> {
    location: &'m str,
}

#[derive(Debug, Serialize)]
struct Dependency<'m> {
    #[serde(rename = "ref")]
    bom_ref: &'m str,
    #[serde(rename = "dependsOn")]
    depends_on: &'m [String],
}

/// CycloneDxFormatter adapter for generating CycloneDX 1.4 or 1.5 JSON
///
/// Output is compact unless pretty-printing is requested, which tests use
/// to keep expectations readable.
pub struct CycloneDxFormatter {
    version: CycloneDxVersion,
    pretty: bool,
}

impl CycloneDxFormatter {
    pub fn new(version: CycloneDxVersion) -> Self {
        Self {
            version,
            pretty: false,
        }
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    fn build_component<'m>(&self, component: &'m ComponentView) -> Component<'m> {
        let evidence = (self.version.has_evidence() && !component.occurrences.is_empty()).then(|| {
            Evidence {
                occurrences: component
                    .occurrences
                    .iter()
                    .map(|location| Occurrence { location })
                    .collect(),
            }
        });

        Component {
            bom_ref: &component.bom_ref,
            component_type: component.kind.as_str(),
            name: &component.name,
            version: component.version.as_deref(),
            purl: component.purl.as_deref(),
            properties: component
                .properties
                .iter()
                .map(|property| Property {
                    name: &property.name,
                    value: &property.value,
                })
                .collect(),
            evidence,
        }
    }

    fn build_dependency(dependency: &DependencyView) -> Dependency<'_> {
        Dependency {
            bom_ref: &dependency.bom_ref,
            depends_on: &dependency.depends_on,
        }
    }
}

impl Default for CycloneDxFormatter {
    fn default() -> Self {
        Self::new(CycloneDxVersion::default())
    }
}

impl SbomFormatter for CycloneDxFormatter {
    fn format(&self, model: &SbomReadModel) -> Result<String> {
        let bom = Bom {
            schema: self.version.schema(),
            bom_format: "CycloneDX",
            spec_version: self.version.spec_version(),
            version: 1,
            components: model
                .components
                .iter()
                .map(|component| self.build_component(component))
                .collect(),
            dependencies: model
                .dependencies
                .iter()
                .map(Self::build_dependency)
                .collect(),
        };

        let json = if self.pretty {
            serde_json::to_string_pretty(&bom)?
        } else {
            serde_json::to_string(&bom)?
        };
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::read_models::{ComponentKind, PropertyView};
    use serde_json::Value;

    const LOCATION: &str = r#"{"block":{"file_name":"app/package-lock.json","line_start":8,"line_end":12,"column_start":5,"column_end":6}}"#;

    fn create_test_read_model() -> SbomReadModel {
        SbomReadModel {
            components: vec![
                ComponentView::file("app/package.json"),
                ComponentView {
                    kind: ComponentKind::Library,
                    bom_ref: "pkg:npm/wrappy@1.0.2".to_string(),
                    name: "wrappy".to_string(),
                    version: Some("1.0.2".to_string()),
                    purl: Some("pkg:npm/wrappy@1.0.2".to_string()),
                    properties: vec![PropertyView {
                        name: "osv-scanner:package-manager".to_string(),
                        value: "npm".to_string(),
                    }],
                    occurrences: vec![LOCATION.to_string()],
                },
            ],
            dependencies: vec![DependencyView {
                bom_ref: "app/package.json".to_string(),
                depends_on: vec!["lib/package.json".to_string()],
            }],
        }
    }

    fn format(version: CycloneDxVersion) -> Value {
        let json = CycloneDxFormatter::new(version)
            .format(&create_test_read_model())
            .unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_format_1_5() {
        let bom = format(CycloneDxVersion::V1_5);
        assert_eq!(bom["$schema"], "http://cyclonedx.org/schema/bom-1.5.schema.json");
        assert_eq!(bom["bomFormat"], "CycloneDX");
        assert_eq!(bom["specVersion"], "1.5");
        assert_eq!(bom["version"], 1);

        let library = &bom["components"][1];
        assert_eq!(library["bom-ref"], "pkg:npm/wrappy@1.0.2");
        assert_eq!(library["type"], "library");
        assert_eq!(library["purl"], "pkg:npm/wrappy@1.0.2");
        assert_eq!(library["properties"][0]["name"], "osv-scanner:package-manager");
        assert_eq!(library["evidence"]["occurrences"][0]["location"], LOCATION);
    }

    #[test]
    fn test_format_1_4_has_no_evidence() {
        let bom = format(CycloneDxVersion::V1_4);
        assert_eq!(bom["specVersion"], "1.4");
        assert_eq!(bom["$schema"], "http://cyclonedx.org/schema/bom-1.4.schema.json");
        assert!(bom["components"][1].get("evidence").is_none());
        assert_eq!(bom["dependencies"][0]["ref"], "app/package.json");
    }

    #[test]
    fn test_file_component() {
        let bom = format(CycloneDxVersion::V1_5);
        let file = &bom["components"][0];
        assert_eq!(file["type"], "file");
        assert_eq!(file["name"], "app/package.json");
        assert!(file.get("version").is_none());
        assert!(file.get("purl").is_none());
        assert!(file.get("properties").is_none());
        assert!(file.get("evidence").is_none());
    }

    #[test]
    fn test_dependencies() {
        let bom = format(CycloneDxVersion::V1_5);
        assert_eq!(bom["dependencies"][0]["dependsOn"][0], "lib/package.json");
    }

    #[test]
    fn test_pretty_printing() {
        let model = create_test_read_model();
        let compact = CycloneDxFormatter::default().format(&model).unwrap();
        assert!(!compact.contains('\n'));

        let pretty = CycloneDxFormatter::default().pretty(true).format(&model).unwrap();
        assert!(pretty.contains("\n  \"bomFormat\": \"CycloneDX\""));
    }

    #[test]
    fn test_empty_model() {
        let json = CycloneDxFormatter::default()
            .format(&SbomReadModel::default())
            .unwrap();
        assert!(json.contains(r#""components":[]"#));
        assert!(json.contains(r#""dependencies":[]"#));
    }
}
