//! Unit tests for the definition registry.

use std::fs;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;

#[fixture]
fn populated_registry() -> DefinitionRegistry {
    let mut r = DefinitionRegistry::new();
    r.insert(Definition::new("echo")).expect("register echo");
    r.insert(Definition::new("fetch")).expect("register fetch");
    r
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[test]
fn new_registry_is_empty() {
    let r = DefinitionRegistry::new();
    assert!(r.is_empty());
    assert_eq!(r.len(), 0);
}

#[rstest]
fn insert_rejects_duplicate(mut populated_registry: DefinitionRegistry) {
    let err = populated_registry
        .insert(Definition::new("echo"))
        .expect_err("duplicate should fail");
    assert!(matches!(err, PluginError::AlreadyRegistered { ref name } if name == "echo"));
}

#[test]
fn insert_rejects_invalid_definition() {
    let mut r = DefinitionRegistry::new();
    let err = r.insert(Definition::new("")).expect_err("should reject");
    assert!(matches!(err, PluginError::Manifest { .. }));
}

#[rstest]
fn remove_returns_definition(mut populated_registry: DefinitionRegistry) {
    let removed = populated_registry.remove("echo").expect("echo present");
    assert_eq!(removed.name(), "echo");
    assert!(!populated_registry.contains("echo"));
    assert!(populated_registry.remove("echo").is_none());
}

#[rstest]
fn iter_is_name_ordered(populated_registry: DefinitionRegistry) {
    let names: Vec<&str> = populated_registry.iter().map(Definition::name).collect();
    assert_eq!(names, ["echo", "fetch"]);
}

// ---------------------------------------------------------------------------
// Loading from disk
// ---------------------------------------------------------------------------

#[test]
fn load_dir_creates_missing_directory() {
    let temp = TempDir::new().expect("temp dir");
    let dir = temp.path().join("plugins").join("definitions");
    let registry = DefinitionRegistry::load_dir(&dir).expect("load");
    assert!(registry.is_empty());
    assert!(dir.is_dir());
}

#[test]
fn load_dir_reads_only_yaml_manifests() {
    let temp = TempDir::new().expect("temp dir");
    fs::write(temp.path().join("echo.yaml"), "name: echo\n").expect("write echo");
    fs::write(temp.path().join("fetch.yaml"), "name: fetch\n").expect("write fetch");
    fs::write(temp.path().join("notes.txt"), "name: ignored\n").expect("write notes");
    fs::create_dir(temp.path().join("nested.yaml")).expect("mkdir");

    let registry = DefinitionRegistry::load_dir(temp.path()).expect("load");
    assert_eq!(registry.len(), 2);
    assert!(registry.contains("echo"));
    assert!(registry.contains("fetch"));
}

#[test]
fn load_dir_propagates_malformed_manifest() {
    let temp = TempDir::new().expect("temp dir");
    fs::write(temp.path().join("broken.yaml"), "name: [oops").expect("write");
    let err = DefinitionRegistry::load_dir(temp.path()).expect_err("should fail");
    assert!(matches!(err, PluginError::Manifest { .. }));
}
