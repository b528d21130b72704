//! Loading registry manifests from disk

use std::io::Write;

use kiln_registry::{load_manifest, RegistryError, StepCategory, StepRegistry};

#[test]
fn test_load_yaml_manifest_from_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        "sources:\n  mars:\n    type: object\n  constants: ~\nfilters:\n  rename: ~"
    )
    .unwrap();

    let registry = load_manifest(file.path()).unwrap();
    assert_eq!(registry.len(), 3);
    let filters = registry.function_schemas(StepCategory::Filters).unwrap();
    assert_eq!(filters[0].name, "rename");
    assert!(filters[0].shape.is_none());
}

#[test]
fn test_load_json_manifest_from_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{"filters": {{"regrid": {{"type": "object", "required": ["grid"]}}}}}}"#).unwrap();

    let registry = load_manifest(file.path()).unwrap();
    let filters = registry.function_schemas(StepCategory::Filters).unwrap();
    assert_eq!(filters.len(), 1);
    assert_eq!(filters[0].shape.as_ref().unwrap()["required"][0], "grid");
}

#[test]
fn test_missing_manifest_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_manifest(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, RegistryError::Io { .. }));
    assert!(err.to_string().contains("absent.yaml"));
}

#[test]
fn test_malformed_manifest_reports_path() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, "{{not json").unwrap();

    let err = load_manifest(file.path()).unwrap_err();
    assert!(matches!(err, RegistryError::InvalidManifest { .. }));
    assert!(err.to_string().contains("invalid JSON"));
}
