//! Binary tests for the commands that need no network: `plan`, `contexts`
//! and `report`.

use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;
use predicates::str::contains;

const CONFIG: &str = "\
org: acme
required_status_check_contexts: [build]
default_tag_status_context:
  v1: [release-v1]
  v1.2: [release-v1.2]
default_language_context:
  go: [go-lint]
";

fn warden(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("warden"));
    cmd.current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("ORG_NAME")
        .env_remove("WARDEN_CONFIG")
        .env_remove("GITHUB_APP_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().expect("run warden");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

/// A bundle with one template, one primary and one optional workflow, and a
/// checkout whose primary workflow is stale and which carries a retired
/// managed file next to a hand-written one.
fn plan_fixture(tmp: &TempDir) {
    tmp.child("bundle/workflow-manifest.yaml")
        .write_str(
            "template_workflows: [managed-ci-pr.yml]\n\
             primary_workflows: [ci.yml]\n\
             optional_workflows: [managed-ci-deploy.yml]\n",
        )
        .expect("manifest");
    tmp.child("bundle/templates/managed-ci-pr.yml").write_str("on: pull_request\n").expect("template");
    tmp.child("bundle/workflows/ci.yml").write_str("on: push\njobs: {}\n").expect("ci");
    tmp.child("bundle/workflows/managed-ci-deploy.yml").write_str("on: release\n").expect("deploy");

    let wf = tmp.child("repo/.github/workflows");
    wf.child("managed-ci-pr.yml").write_str("customized by the team\n").expect("pr");
    wf.child("ci.yml").write_str("on: pull_request\njobs: {}\n").expect("stale ci");
    wf.child("managed-ci-old.yml").write_str("old\n").expect("retired");
    wf.child("handwritten.yml").write_str("mine\n").expect("user file");
}

#[test]
fn plan_lists_changes_and_leaves_foreign_files_alone() {
    let tmp = TempDir::new().expect("tmp");
    plan_fixture(&tmp);

    let json = stdout_json(warden(tmp.path()).args(["plan", "--bundle", "bundle", "--checkout", "repo", "--json"]));

    let deploy: Vec<&str> = json["to_deploy"]
        .as_array()
        .expect("to_deploy")
        .iter()
        .filter_map(|p| p["name"].as_str())
        .collect();
    assert_eq!(deploy, ["ci.yml"]);
    assert_eq!(json["to_deploy"][0]["classification"], "stale");
    assert_eq!(json["to_delete"], serde_json::json!(["managed-ci-old.yml"]));
    assert_eq!(json["settled"], false);
    assert_eq!(json["prefix"], "managed-ci");
}

#[test]
fn plan_deploys_requested_optional_workflow() {
    let tmp = TempDir::new().expect("tmp");
    plan_fixture(&tmp);

    warden(tmp.path())
        .args([
            "plan",
            "--bundle",
            "bundle",
            "--checkout",
            "repo",
            "--optional",
            "managed-ci-deploy.yml",
        ])
        .assert()
        .success()
        .stdout(contains("+ managed-ci-deploy.yml (optional)"))
        .stdout(contains("~ ci.yml (primary)"))
        .stdout(contains("- managed-ci-old.yml"))
        .stdout(contains("handwritten.yml").not());
}

#[test]
fn plan_diff_shows_unified_diff() {
    let tmp = TempDir::new().expect("tmp");
    plan_fixture(&tmp);

    warden(tmp.path())
        .args(["plan", "--bundle", "bundle", "--checkout", "repo", "--diff"])
        .assert()
        .success()
        .stdout(contains("--- a/.github/workflows/ci.yml"))
        .stdout(contains("+++ b/.github/workflows/ci.yml"))
        .stdout(contains("-on: pull_request"))
        .stdout(contains("+on: push"));
}

#[test]
fn plan_without_bundle_manifest_fails() {
    let tmp = TempDir::new().expect("tmp");
    tmp.child("bundle/workflows").create_dir_all().expect("bundle");
    tmp.child("repo").create_dir_all().expect("repo");

    warden(tmp.path())
        .args(["plan", "--bundle", "bundle", "--checkout", "repo"])
        .assert()
        .failure()
        .stderr(contains("workflow-manifest.yaml"));
}

#[test]
fn contexts_first_declared_prefix_wins() {
    let tmp = TempDir::new().expect("tmp");
    tmp.child("deployer-config.yaml").write_str(CONFIG).expect("config");

    warden(tmp.path())
        .args(["contexts", "--refspec", "v1.2.0", "--language", "go", "--existing", "manual"])
        .assert()
        .success()
        .stdout("build\ngo-lint\nmanual\nrelease-v1\n");
}

#[test]
fn contexts_json_names_matched_prefix() {
    let tmp = TempDir::new().expect("tmp");
    tmp.child("custom.yaml").write_str(CONFIG).expect("config");

    let json = stdout_json(warden(tmp.path()).args([
        "--config",
        "custom.yaml",
        "contexts",
        "--refspec",
        "v1.2.0",
        "--json",
    ]));
    assert_eq!(json["matched_prefix"], "v1");
    assert_eq!(json["contexts"], serde_json::json!(["build", "release-v1"]));
}

#[test]
fn contexts_without_config_uses_defaults() {
    let tmp = TempDir::new().expect("tmp");

    warden(tmp.path())
        .args(["contexts", "--existing", "only-this"])
        .assert()
        .success()
        .stdout("only-this\n");
}

#[test]
fn wrongly_typed_config_key_is_named() {
    let tmp = TempDir::new().expect("tmp");
    tmp.child("deployer-config.yaml")
        .write_str("required_status_check_contexts: 42\n")
        .expect("config");

    warden(tmp.path())
        .args(["contexts"])
        .assert()
        .failure()
        .stderr(contains("required_status_check_contexts"));
}

#[test]
fn report_table_and_json() {
    let tmp = TempDir::new().expect("tmp");
    tmp.child("reports/deployed.yaml")
        .write_str(
            "repositories:\n  api:\n    refspec: v1.2.0\n    workflows:\n      - name: ci.yml\n        updated: '2024-01-02 03:04:05'\n      - name: managed-ci-pr.yml\n",
        )
        .expect("report");

    warden(tmp.path())
        .args(["report", "--path", "reports/deployed.yaml"])
        .assert()
        .success()
        .stdout(contains("1 repositories"))
        .stdout(contains("api"))
        .stdout(contains("2024-01-02 03:04:05"))
        .stdout(contains("never"));

    let json = stdout_json(warden(tmp.path()).args(["report", "--path", "reports/deployed.yaml", "--json"]));
    assert_eq!(json["repositories"]["api"]["refspec"], "v1.2.0");
    assert_eq!(json["repositories"]["api"]["workflows"][0]["name"], "ci.yml");
}

#[test]
fn report_uses_configured_path_and_tolerates_absence() {
    let tmp = TempDir::new().expect("tmp");
    tmp.child("deployer-config.yaml")
        .write_str("report_path: out/report.yaml\n")
        .expect("config");

    warden(tmp.path())
        .args(["report"])
        .assert()
        .success()
        .stdout(contains("No deployments recorded."))
        .stdout(contains("out/report.yaml"));
}

#[test]
fn template_with_missing_local_file_fails_before_any_clone() {
    let tmp = TempDir::new().expect("tmp");

    warden(tmp.path())
        .args(["template", "--template", "nope.md", "--workspace", "work", "--dry-run"])
        .assert()
        .failure()
        .stderr(contains("failed to read template nope.md"));
    tmp.child("work").assert(predicate::path::missing());
}
