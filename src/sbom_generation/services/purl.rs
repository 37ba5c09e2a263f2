use crate::sbom_generation::domain::{Ecosystem, PackageRecord};
use std::fmt;

/// A package URL: `pkg:<type>/<namespace>/<name>@<version>`.
///
/// Components are kept verbatim. Version strings from lockfiles are already
/// canonical for their ecosystem, so no percent-encoding is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageUrl {
    pub purl_type: &'static str,
    pub namespace: String,
    pub name: String,
    pub version: String,
}

impl PackageUrl {
    /// Canonical URL for a package, or `None` when `name` cannot be split the
    /// way `ecosystem` requires.
    pub fn new(ecosystem: Ecosystem, name: &str, version: &str) -> Option<Self> {
        if name.is_empty() {
            return None;
        }

        let (purl_type, namespace, name) = split_name(ecosystem, name)?;
        let version = match ecosystem {
            Ecosystem::Go => version.strip_prefix('v').unwrap_or(version),
            _ => version,
        };

        Some(Self {
            purl_type,
            namespace,
            name,
            version: version.to_string(),
        })
    }

    /// URL of a record. Records installed from a repository without a
    /// version are identified by their commit.
    pub fn from_record(record: &PackageRecord) -> Option<Self> {
        let version = if record.version.is_empty() {
            &record.commit
        } else {
            &record.version
        };
        Self::new(record.ecosystem, &record.name, version)
    }
}

impl fmt::Display for PackageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pkg:{}/", self.purl_type)?;
        if !self.namespace.is_empty() {
            write!(f, "{}/", self.namespace)?;
        }
        f.write_str(&self.name)?;
        if !self.version.is_empty() {
            write!(f, "@{}", self.version)?;
        }
        Ok(())
    }
}

/// PEP 503 normalization: lowercase, with runs of `-`, `_` and `.` collapsed to `-`.
pub fn normalize_python_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut in_separator_run = false;

    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator_run {
                normalized.push('-');
            }
            in_separator_run = true;
        } else {
            normalized.push(c.to_ascii_lowercase());
            in_separator_run = false;
        }
    }

    normalized
}

fn two_segments(name: &str, separator: char) -> Option<(String, String)> {
    let mut parts = name.splitn(2, separator);
    let first = parts.next().filter(|p| !p.is_empty())?;
    let second = parts.next().filter(|p| !p.is_empty())?;
    Some((first.to_string(), second.to_string()))
}

fn split_name(ecosystem: Ecosystem, name: &str) -> Option<(&'static str, String, String)> {
    let plain = |purl_type: &'static str| Some((purl_type, String::new(), name.to_string()));

    match ecosystem {
        Ecosystem::Maven => {
            let (group, artifact) = two_segments(name, ':')?;
            Some(("maven", group, artifact))
        }
        Ecosystem::Npm => match name.strip_prefix('@') {
            Some(scoped) => {
                let (scope, package) = two_segments(scoped, '/')?;
                Some(("npm", scope, package))
            }
            None => plain("npm"),
        },
        Ecosystem::Go => match name.rsplit_once('/') {
            Some((namespace, last)) if !namespace.is_empty() && !last.is_empty() => {
                Some(("golang", namespace.to_string(), last.to_string()))
            }
            Some(_) => None,
            None => plain("golang"),
        },
        Ecosystem::PyPI => Some(("pypi", String::new(), normalize_python_name(name))),
        Ecosystem::Packagist => {
            let (vendor, package) = two_segments(name, '/')?;
            Some(("composer", vendor, package))
        }
        Ecosystem::NuGet => plain("nuget"),
        Ecosystem::RubyGems => plain("gem"),
        Ecosystem::CratesIo => plain("cargo"),
        Ecosystem::Hex => plain("hex"),
        Ecosystem::Pub => plain("pub"),
        Ecosystem::ConanCenter => plain("conan"),
        Ecosystem::Cran => plain("cran"),
        Ecosystem::Alpine => Some(("apk", "alpine".to_string(), name.to_string())),
        Ecosystem::Debian => Some(("deb", "debian".to_string(), name.to_string())),
        Ecosystem::Unspecified => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sbom_generation::domain::PackageManager;

    fn purl(ecosystem: Ecosystem, name: &str, version: &str) -> Option<String> {
        let record = PackageRecord::new(name, version, ecosystem, PackageManager::Unknown);
        PackageUrl::from_record(&record).map(|p| p.to_string())
    }

    #[test]
    fn test_maven_splits_group_and_artifact() {
        assert_eq!(
            purl(Ecosystem::Maven, "org.slf4j:slf4j-api", "2.0.9").unwrap(),
            "pkg:maven/org.slf4j/slf4j-api@2.0.9"
        );
        assert!(purl(Ecosystem::Maven, "slf4j-api", "2.0.9").is_none());
    }

    #[test]
    fn test_npm_scope_becomes_namespace() {
        assert_eq!(
            purl(Ecosystem::Npm, "@babel/core", "7.23.0").unwrap(),
            "pkg:npm/babel/core@7.23.0"
        );
        assert_eq!(purl(Ecosystem::Npm, "wrappy", "1.0.2").unwrap(), "pkg:npm/wrappy@1.0.2");
        assert!(purl(Ecosystem::Npm, "@broken", "1.0.0").is_none());
    }

    #[test]
    fn test_go_namespace_and_version_prefix() {
        assert_eq!(
            purl(Ecosystem::Go, "golang.org/x/mod", "v0.14.0").unwrap(),
            "pkg:golang/golang.org/x/mod@0.14.0"
        );
        assert_eq!(
            purl(Ecosystem::Go, "github.com/urfave/cli/v2", "v2.26.0").unwrap(),
            "pkg:golang/github.com/urfave/cli/v2@2.26.0"
        );
        assert_eq!(
            purl(Ecosystem::Go, "go.opencensus.io", "v0.24.0").unwrap(),
            "pkg:golang/go.opencensus.io@0.24.0"
        );
        assert!(purl(Ecosystem::Go, "", "v1.0.0").is_none());
    }

    #[test]
    fn test_pypi_name_is_normalized() {
        assert_eq!(
            purl(Ecosystem::PyPI, "Flask_SQLAlchemy", "3.1.1").unwrap(),
            "pkg:pypi/flask-sqlalchemy@3.1.1"
        );
    }

    #[test]
    fn test_composer_requires_vendor() {
        assert_eq!(
            purl(Ecosystem::Packagist, "symfony/yaml", "7.0.0").unwrap(),
            "pkg:composer/symfony/yaml@7.0.0"
        );
        assert!(purl(Ecosystem::Packagist, "yaml", "7.0.0").is_none());
    }

    #[test]
    fn test_plain_ecosystems() {
        assert_eq!(purl(Ecosystem::NuGet, "Newtonsoft.Json", "13.0.1").unwrap(), "pkg:nuget/Newtonsoft.Json@13.0.1");
        assert_eq!(purl(Ecosystem::RubyGems, "rails", "7.1.2").unwrap(), "pkg:gem/rails@7.1.2");
        assert_eq!(purl(Ecosystem::CratesIo, "serde", "1.0.0").unwrap(), "pkg:cargo/serde@1.0.0");
        assert_eq!(purl(Ecosystem::Alpine, "musl", "1.2.4-r2").unwrap(), "pkg:apk/alpine/musl@1.2.4-r2");
        assert!(purl(Ecosystem::Unspecified, "anything", "1").is_none());
    }

    #[test]
    fn test_commit_stands_in_for_missing_version() {
        let record = PackageRecord::new("mine", "", Ecosystem::Npm, PackageManager::Yarn)
            .with_commit("abc1234");
        assert_eq!(
            PackageUrl::from_record(&record).unwrap().to_string(),
            "pkg:npm/mine@abc1234"
        );
    }

    #[test]
    fn test_normalize_python_name() {
        assert_eq!(normalize_python_name("Django"), "django");
        assert_eq!(normalize_python_name("zope.interface"), "zope-interface");
        assert_eq!(normalize_python_name("a__b-._c"), "a-b-c");
    }
}
