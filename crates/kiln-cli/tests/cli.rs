//! Running the `kiln` binary end to end

use std::io::Write;

use assert_cmd::Command;
use tempfile::NamedTempFile;

const REGISTRY: &str = r#"
sources:
  mars:
    type: object
    required: [param]
  constants: ~
filters:
  rename: ~
"#;

fn file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    write!(file, "{content}").unwrap();
    file
}

fn kiln(registry: &NamedTempFile) -> Command {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.env_remove("KILN_REQUIRE_INPUT")
        .env("KILN_REGISTRY", registry.path());
    cmd
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn validate_prints_normalized_recipe() {
    let registry = file(".yaml", REGISTRY);
    let recipe = file(
        ".yaml",
        "dates:\n  start: 2020-01-01\n  end: 2020-01-02\n  frequency: 1h\ninput:\n  pipe:\n    - mars: {param: [2t]}\n    - rename: {}\n",
    );

    let assert = kiln(&registry).arg("validate").arg(recipe.path()).assert().success();
    let stdout = stdout_of(assert.get_output());
    assert!(stdout.starts_with("Validation successful!"));
    assert!(stdout.contains("\"dtype\": \"float32\""));
}

#[test]
fn validate_schema_flag_prints_schema() {
    let registry = file(".yaml", REGISTRY);
    let recipe = file(".json", r#"{"dates": {"values": ["2020-01-01"]}}"#);

    let assert = kiln(&registry)
        .args(["validate", "--schema"])
        .arg(recipe.path())
        .assert()
        .success();
    let stdout = stdout_of(assert.get_output());
    assert!(stdout.contains("\"$defs\""));
}

#[test]
fn validate_invalid_recipe_fails() {
    let registry = file(".yaml", REGISTRY);
    let recipe = file(".json", r#"{"dates": {}, "input": {"grib": {}}}"#);

    let assert = kiln(&registry).arg("validate").arg(recipe.path()).assert().failure();
    let stdout = stdout_of(assert.get_output());
    assert!(stdout.starts_with("Validation failed:"));
    assert!(stdout.contains("/input"));
}

#[test]
fn validate_require_input_from_env() {
    let registry = file(".yaml", REGISTRY);
    let recipe = file(".json", r#"{"dates": {}}"#);

    kiln(&registry)
        .env("KILN_REQUIRE_INPUT", "true")
        .arg("validate")
        .arg(recipe.path())
        .assert()
        .failure();
}

#[test]
fn steps_lists_registry() {
    let registry = file(".yaml", REGISTRY);

    let assert = kiln(&registry).arg("steps").assert().success();
    let stdout = stdout_of(assert.get_output());
    assert!(stdout.contains("sources (2):"));
    assert!(stdout.contains("  - constants (any mapping)"));
    assert!(stdout.contains("  - mars\n"));
    assert!(stdout.contains("filters (1):"));
}

#[test]
fn dates_prints_resolved_dates() {
    let registry = file(".yaml", REGISTRY);
    let recipe = file(
        ".yaml",
        "dates:\n  start: 2020-01-01\n  end: 2020-01-02\n  frequency: 12h\n  missing: ['2020-01-01T12:00:00']\n",
    );

    let assert = kiln(&registry).arg("dates").arg(recipe.path()).assert().success();
    let stdout = stdout_of(assert.get_output());
    assert_eq!(stdout, "2020-01-01T00:00:00\n2020-01-02T00:00:00\n");
}

#[test]
fn invalid_registry_shape_is_fatal() {
    let registry = file(".json", r#"{"sources": {"mars": {"type": 12}}}"#);

    kiln(&registry).arg("schema").assert().failure();
}
