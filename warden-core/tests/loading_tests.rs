//! Loading the three YAML documents from disk: error messages and defaults.

use assert_fs::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use warden_core::{config, manifest, registry, ConfigError, WorkflowName};

// ---------------------------------------------------------------------------
// 1. Deployment manifest
// ---------------------------------------------------------------------------

#[test]
fn missing_deployment_manifest_is_not_found_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.child(registry::DEPLOYMENT_FILE);
    let err = registry::load_deployment_at(path.path()).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
    assert!(err.to_string().contains(registry::DEPLOYMENT_FILE));
}

#[rstest]
#[case::corrupt(": : corrupt : yaml : !!!\n  - broken: [unclosed")]
#[case::wrong_shape("- this is a list, not a mapping\n")]
fn malformed_deployment_manifest_is_parse_error(#[case] body: &str) {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child(registry::DEPLOYMENT_FILE);
    file.write_str(body).expect("write");

    let err = registry::load_deployment_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains(registry::DEPLOYMENT_FILE), "got: {err}");
}

#[test]
fn deployment_manifest_round_trips_optional_fields() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child(registry::DEPLOYMENT_FILE);
    file.write_str(
        r#"
default_managed_refspec: tags/v1.4.0
modules:
  - name: payments
    description: money things
    repositories:
      - name: payments-api
        refspec: tags/v2.0.0
        optional_workflows: [managed-ci-deploy.yaml]
        language: [python]
        needs: [docker]
      - name: payments-web
"#,
    )
    .expect("write");

    let m = registry::load_deployment_at(file.path()).expect("load");
    let repos: Vec<_> = m.repositories().collect();
    assert_eq!(repos.len(), 2);
    assert_eq!(repos[0].declared_language(), Some("python"));
    assert!(repos[0]
        .optional_workflows
        .contains(&WorkflowName::from("managed-ci-deploy.yaml")));
    assert!(repos[1].refspec.is_none());
    assert!(repos[1].needs.is_empty());
}

#[test]
fn empty_deployment_manifest_has_no_repositories() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child(registry::DEPLOYMENT_FILE);
    file.touch().expect("touch");
    let m = registry::load_deployment_at(file.path()).expect("load");
    assert_eq!(m.repositories().count(), 0);
}

// ---------------------------------------------------------------------------
// 2. Deployer configuration
// ---------------------------------------------------------------------------

#[test]
fn config_wrong_type_names_the_key() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("deployer-config.yaml");
    file.write_str("http_timeout_secs: soon\n").expect("write");

    let err = config::load_at(file.path()).unwrap_err();
    assert!(
        predicate::str::contains("http_timeout_secs").eval(&err.to_string()),
        "got: {err}"
    );
}

#[test]
fn config_missing_file_is_not_found() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let err = config::load_at(&dir.path().join("deployer-config.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
}

#[test]
fn config_defaults_are_recorded_as_diagnostics() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("deployer-config.yaml");
    file.write_str("org: acme\n").expect("write");

    let cfg = config::load_at(file.path()).expect("load");
    assert_eq!(cfg.org, "acme");
    assert_eq!(cfg.lang_variable, config::DEFAULT_LANG_VARIABLE);
    let keys: Vec<_> = cfg.diagnostics.iter().map(|d| d.key.as_str()).collect();
    assert!(keys.contains(&"lang_variable"));
    assert!(keys.contains(&"default_tag_status_context"));
    assert!(!keys.contains(&"org"));
}

// ---------------------------------------------------------------------------
// 3. Bundle manifest
// ---------------------------------------------------------------------------

#[test]
fn bundle_manifest_loads_from_bundle_root() {
    let bundle = assert_fs::TempDir::new().expect("tempdir");
    bundle
        .child(manifest::MANIFEST_FILE)
        .write_str("primary_workflows: [managed-ci-build.yaml]\n")
        .expect("write");

    let m = manifest::load_at(bundle.path()).expect("load");
    assert_eq!(m.primary_workflows, [WorkflowName::from("managed-ci-build.yaml")]);
    assert!(m.template_workflows.is_empty());
}
