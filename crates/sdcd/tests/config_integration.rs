//! Configuration integration tests.
//!
//! Drive the binary with `info --json` and check how discovered config
//! files and pipeline variables shape the resolved changelog settings.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

const PIPELINE_VARS: &[&str] = &[
    "CHANGELOG_DIR",
    "CHANGELOG_RELEASES",
    "CHANGELOG_ONLY_VERSION_TAGS",
    "CHANGELOG_ONLY_STABLE_RELEASES",
    "CHANGELOG_FILENAME",
    "SD_ARTIFACTS_DIR",
];

/// Binary running in `dir` with a clean environment and logs kept in `dir`.
#[allow(deprecated)]
fn cmd_in(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    for var in PIPELINE_VARS {
        cmd.env_remove(var);
    }
    cmd.env_remove("RUST_LOG")
        .env("XDG_CONFIG_HOME", dir.join(".xdg"))
        .env("SDCD_LOG_DIR", dir.join(".logs"))
        .arg("-C")
        .arg(dir);
    cmd
}

fn info_json(cmd: &mut Command) -> Value {
    let output = cmd.args(["info", "--json"]).assert().success();
    serde_json::from_slice(&output.get_output().stdout).expect("info --json prints JSON")
}

// =============================================================================
// Discovery
// =============================================================================

#[test]
fn runs_without_config_file() {
    let tmp = TempDir::new().unwrap();
    let json = info_json(&mut cmd_in(tmp.path()));

    assert_eq!(json["changelog"]["fragment_dir"], "changelog.d");
    assert_eq!(json["changelog"]["releases"], "all");
    assert_eq!(json["changelog"]["only_version_tags"], true);
    assert_eq!(
        json["changelog"]["output"],
        "artifacts/reports/changelog/changelog.md"
    );
}

#[test]
fn discovers_dotfile_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".sdcd.toml"),
        "[changelog]\ndir = \"news\"\n",
    )
    .unwrap();

    let json = info_json(&mut cmd_in(tmp.path()));
    assert_eq!(json["changelog"]["fragment_dir"], "news");
    assert!(
        json["config"]["config_file"]
            .as_str()
            .is_some_and(|p| p.ends_with(".sdcd.toml"))
    );
}

#[test]
fn discovers_config_in_parent_directory() {
    let tmp = TempDir::new().unwrap();
    let nested = tmp.path().join("nested").join("deep");
    fs::create_dir_all(&nested).unwrap();
    fs::write(
        tmp.path().join("sdcd.yaml"),
        "changelog:\n  version_prefix: release-\n",
    )
    .unwrap();

    let json = info_json(&mut cmd_in(&nested));
    assert_eq!(json["changelog"]["version_prefix"], "release-");
}

#[test]
fn dotfile_takes_precedence_over_regular_name() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".sdcd.toml"), "[changelog]\ndir = \"dot\"\n").unwrap();
    fs::write(tmp.path().join("sdcd.toml"), "[changelog]\ndir = \"plain\"\n").unwrap();

    let json = info_json(&mut cmd_in(tmp.path()));
    assert_eq!(json["changelog"]["fragment_dir"], "dot");
}

#[test]
fn parses_json_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".sdcd.json"),
        r#"{"log_level": "warn", "changelog": {"only_stable_releases": true}}"#,
    )
    .unwrap();

    let json = info_json(&mut cmd_in(tmp.path()));
    assert_eq!(json["config"]["log_level"], "warn");
    assert_eq!(json["changelog"]["only_stable_releases"], true);
}

#[test]
fn git_boundary_stops_config_search() {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path().join("repo");
    let src = repo.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir(repo.join(".git")).unwrap();
    fs::write(tmp.path().join(".sdcd.toml"), "[changelog]\ndir = \"outside\"\n").unwrap();

    let json = info_json(&mut cmd_in(&src));
    assert_eq!(json["changelog"]["fragment_dir"], "changelog.d");
}

#[test]
fn explicit_config_flag_wins() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".sdcd.toml"), "[changelog]\ndir = \"project\"\n").unwrap();
    let explicit = tmp.path().join("ci.toml");
    fs::write(&explicit, "[changelog]\ndir = \"explicit\"\n").unwrap();

    let json = info_json(cmd_in(tmp.path()).arg("--config").arg(&explicit));
    assert_eq!(json["changelog"]["fragment_dir"], "explicit");
}

// =============================================================================
// Pipeline environment
// =============================================================================

#[test]
fn pipeline_variables_override_config_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".sdcd.toml"),
        "[changelog]\ndir = \"from-file\"\nonly_version_tags = true\n",
    )
    .unwrap();

    let json = info_json(
        cmd_in(tmp.path())
            .env("CHANGELOG_DIR", "from-env")
            .env("CHANGELOG_ONLY_VERSION_TAGS", "off")
            .env("CHANGELOG_RELEASES", "v0.0.1, v0.1.0")
            .env("SD_ARTIFACTS_DIR", "/sd/artifacts"),
    );

    let changelog = &json["changelog"];
    assert_eq!(changelog["fragment_dir"], "from-env");
    assert_eq!(changelog["only_version_tags"], false);
    assert_eq!(changelog["releases"], serde_json::json!(["v0.0.1", "v0.1.0"]));
    assert_eq!(
        changelog["output"],
        "/sd/artifacts/reports/changelog/changelog.md"
    );
}

#[test]
fn changelog_filename_overrides_artifacts_dir() {
    let tmp = TempDir::new().unwrap();
    let json = info_json(
        cmd_in(tmp.path())
            .env("SD_ARTIFACTS_DIR", "/sd/artifacts")
            .env("CHANGELOG_FILENAME", "CHANGES.md"),
    );
    assert_eq!(json["changelog"]["output"], "CHANGES.md");
}

#[test]
fn boolean_variables_accept_on_and_one() {
    let tmp = TempDir::new().unwrap();
    let json = info_json(cmd_in(tmp.path()).env("CHANGELOG_ONLY_STABLE_RELEASES", "1"));
    assert_eq!(json["changelog"]["only_stable_releases"], true);

    let json = info_json(cmd_in(tmp.path()).env("CHANGELOG_ONLY_STABLE_RELEASES", "yes"));
    assert_eq!(json["changelog"]["only_stable_releases"], false);
}

// =============================================================================
// Package name
// =============================================================================

#[test]
fn package_name_is_detected_from_manifest() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("setup.cfg"), "[metadata]\nname = mypkg\n").unwrap();

    let json = info_json(&mut cmd_in(tmp.path()));
    assert_eq!(json["changelog"]["package_name"], "mypkg");
}

#[test]
fn configured_package_name_beats_detection() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("setup.cfg"), "[metadata]\nname = detected\n").unwrap();
    fs::write(
        tmp.path().join(".sdcd.toml"),
        "[changelog]\npackage_name = \"configured\"\n",
    )
    .unwrap();

    let json = info_json(&mut cmd_in(tmp.path()));
    assert_eq!(json["changelog"]["package_name"], "configured");
}

// =============================================================================
// Error cases
// =============================================================================

#[test]
fn invalid_toml_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".sdcd.toml"), "this is not valid toml [[[").unwrap();

    cmd_in(tmp.path())
        .arg("info")
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn invalid_json_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".sdcd.json"), "{not valid json}").unwrap();

    cmd_in(tmp.path()).arg("info").assert().failure();
}

#[test]
fn wrong_type_in_changelog_section_fails() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".sdcd.toml"),
        "[changelog]\nonly_version_tags = \"maybe\"\n",
    )
    .unwrap();

    cmd_in(tmp.path()).arg("info").assert().failure();
}

#[test]
fn unknown_config_field_is_ignored() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".sdcd.toml"),
        "log_level = \"info\"\nunknown_field = \"ignored\"\n\n[hooks]\npre = []\n",
    )
    .unwrap();

    cmd_in(tmp.path()).arg("info").assert().success();
}
