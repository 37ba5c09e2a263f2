/// End-to-end tests for the CLI
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CARGO_LOCK: &str = r#"version = 3

[[package]]
name = "anyhow"
version = "1.0.75"

[[package]]
name = "serde"
version = "1.0.193"
"#;

fn write_cargo_lock(dir: &Path) {
    fs::write(dir.join("Cargo.lock"), CARGO_LOCK).unwrap();
}

fn parse_bom(stdout: &[u8]) -> Value {
    serde_json::from_slice(stdout).expect("stdout should be a JSON SBOM")
}

fn bom_refs(bom: &Value) -> Vec<String> {
    bom["components"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["bom-ref"].as_str().unwrap().to_string())
        .collect()
}

// Exit code tests for CLI
mod exit_code_tests {
    use super::*;

    /// Exit code 0: Success - normal execution
    #[test]
    fn test_exit_code_success() {
        let temp_dir = TempDir::new().unwrap();
        write_cargo_lock(temp_dir.path());

        cargo_bin_cmd!("lockfile-sbom")
            .arg(temp_dir.path())
            .assert()
            .code(0);
    }

    /// Exit code 0: --help should return success
    #[test]
    fn test_exit_code_help() {
        cargo_bin_cmd!("lockfile-sbom")
            .arg("--help")
            .assert()
            .code(0)
            .stdout(predicate::str::contains("--format"));
    }

    /// Exit code 0: --version should return success
    #[test]
    fn test_exit_code_version() {
        cargo_bin_cmd!("lockfile-sbom")
            .arg("--version")
            .assert()
            .code(0)
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }

    /// Exit code 2: Invalid arguments
    #[test]
    fn test_exit_code_invalid_argument() {
        cargo_bin_cmd!("lockfile-sbom")
            .arg("--invalid-option")
            .assert()
            .code(2);
    }

    /// Exit code 127: Unsupported output format
    #[test]
    fn test_exit_code_unsupported_format() {
        let temp_dir = TempDir::new().unwrap();
        cargo_bin_cmd!("lockfile-sbom")
            .args(["--format", "spdx-2-3"])
            .arg(temp_dir.path())
            .assert()
            .code(127)
            .stderr(predicate::str::contains("cyclonedx-1-4, cyclonedx-1-5"));
    }

    /// Exit code 127: Unsupported verbosity level
    #[test]
    fn test_exit_code_unsupported_verbosity() {
        let temp_dir = TempDir::new().unwrap();
        cargo_bin_cmd!("lockfile-sbom")
            .args(["--verbosity", "loud"])
            .arg(temp_dir.path())
            .assert()
            .code(127);
    }

    /// Exit code 1: Non-existent scan path
    #[test]
    fn test_exit_code_nonexistent_path() {
        cargo_bin_cmd!("lockfile-sbom")
            .arg("/nonexistent/path/that/does/not/exist")
            .assert()
            .code(1)
            .stderr(predicate::str::contains("An error occurred"));
    }

    /// Exit code 1: only unknown parsers enabled
    #[test]
    fn test_exit_code_unknown_parsers_only() {
        let temp_dir = TempDir::new().unwrap();
        write_cargo_lock(temp_dir.path());

        cargo_bin_cmd!("lockfile-sbom")
            .args(["--enable-parsers", "not-a-parser"])
            .arg(temp_dir.path())
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Known parsers are"));
    }
}

#[test]
fn test_cargo_lock_to_cyclonedx_1_5() {
    let temp_dir = TempDir::new().unwrap();
    write_cargo_lock(temp_dir.path());

    let output = cargo_bin_cmd!("lockfile-sbom")
        .arg(temp_dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let bom = parse_bom(&output.stdout);
    assert_eq!(bom["bomFormat"], "CycloneDX");
    assert_eq!(bom["specVersion"], "1.5");
    assert_eq!(bom["$schema"], "http://cyclonedx.org/schema/bom-1.5.schema.json");
    assert_eq!(
        bom_refs(&bom),
        vec!["pkg:cargo/anyhow@1.0.75", "pkg:cargo/serde@1.0.193"]
    );
}

#[test]
fn test_cyclonedx_1_4_has_no_evidence() {
    let temp_dir = TempDir::new().unwrap();
    write_cargo_lock(temp_dir.path());

    let output = cargo_bin_cmd!("lockfile-sbom")
        .args(["--format", "CycloneDX-1-4"])
        .arg(temp_dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let bom = parse_bom(&output.stdout);
    assert_eq!(bom["specVersion"], "1.4");
    for component in bom["components"].as_array().unwrap() {
        assert!(component.get("evidence").is_none());
    }
}

#[test]
fn test_empty_directory_yields_empty_sbom() {
    let temp_dir = TempDir::new().unwrap();

    let output = cargo_bin_cmd!("lockfile-sbom")
        .arg(temp_dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no packages found"));

    let bom = parse_bom(&output.stdout);
    assert!(bom["components"].as_array().unwrap().is_empty());
}

#[test]
fn test_output_file() {
    let temp_dir = TempDir::new().unwrap();
    write_cargo_lock(temp_dir.path());
    let output_path = temp_dir.path().join("bom.json");

    cargo_bin_cmd!("lockfile-sbom")
        .arg("--output")
        .arg(&output_path)
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let bom: Value = serde_json::from_str(&fs::read_to_string(&output_path).unwrap()).unwrap();
    assert_eq!(bom_refs(&bom).len(), 2);
}

#[test]
fn test_paths_relative_to_scan_dir() {
    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("service");
    fs::create_dir(&nested).unwrap();
    write_cargo_lock(&nested);

    let output = cargo_bin_cmd!("lockfile-sbom")
        .args(["--recursive", "--paths-relative-to-scan-dir"])
        .arg(temp_dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let bom = parse_bom(&output.stdout);
    let location = bom["components"][0]["evidence"]["occurrences"][0]["location"]
        .as_str()
        .unwrap();
    let location: Value = serde_json::from_str(location).unwrap();
    assert_eq!(location["block"]["file_name"], "service/Cargo.lock");
}

#[test]
fn test_non_recursive_scan_skips_subdirectories() {
    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("service");
    fs::create_dir(&nested).unwrap();
    write_cargo_lock(&nested);

    let output = cargo_bin_cmd!("lockfile-sbom")
        .arg(temp_dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(bom_refs(&parse_bom(&output.stdout)).is_empty());
}

#[test]
fn test_scan_subcommand_alias() {
    let temp_dir = TempDir::new().unwrap();
    write_cargo_lock(temp_dir.path());

    cargo_bin_cmd!("lockfile-sbom")
        .arg("scan")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("pkg:cargo/serde@1.0.193"));
}
