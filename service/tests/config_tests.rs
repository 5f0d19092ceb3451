//! Tests for configuration loading

use mihcsme_core::MihcsmeError;
use mihcsme_service::config::{MihcsmeConfig, load_config, load_service_config};
use mihcsme_service::remote::ChildPolicy;
use pretty_assertions::assert_eq;
use std::env;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("mihcsme.yaml");
    fs::write(&path, content).unwrap();
    path
}

/// The shipped configuration file loads and matches the defaults
#[test]
fn test_shipped_config() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/mihcsme.yaml");
    let config = load_service_config(&path).expect("shipped config should load");

    assert_eq!(config.parser, MihcsmeConfig::default().parser);
    assert_eq!(config.writer, MihcsmeConfig::default().writer);
    assert!(!config.namespace.base.is_empty());
}

/// Missing sections and keys fall back to defaults
#[test]
fn test_partial_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "writer:\n  freeze_headers: false\n");

    let config = load_service_config(&path).unwrap();
    assert!(!config.writer.freeze_headers);
    assert!(config.writer.add_validation);
    assert_eq!(config.namespace.base, "MIHCSME");
    assert_eq!(config.parser.comment_prefix, "#");
}

/// Child policy is parsed from its lowercase name
#[test]
fn test_child_policy() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "upload:\n  child_policy: merge\n");
    assert_eq!(
        load_service_config(&path).unwrap().upload.child_policy,
        Some(ChildPolicy::Merge)
    );

    let path = write_config(&dir, "upload:\n  child_policy: overwrite\n");
    assert!(matches!(load_service_config(&path), Err(MihcsmeError::Config(_))));
}

/// Environment variables are substituted, with defaults for unset ones
#[test]
fn test_environment_substitution() {
    unsafe {
        env::set_var("MIHCSME_CONFIG_TEST_BASE", "lab-omero");
    }
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "namespace:\n  base: ${MIHCSME_CONFIG_TEST_BASE:-MIHCSME}\nparser:\n  comment_prefix: \"${MIHCSME_CONFIG_TEST_UNSET:-//}\"\n",
    );

    let config = load_service_config(&path).unwrap();
    assert_eq!(config.namespace.base, "lab-omero");
    assert_eq!(config.parser.comment_prefix, "//");

    unsafe {
        env::remove_var("MIHCSME_CONFIG_TEST_BASE");
    }
}

/// Values outside their ranges are rejected after parsing
#[test]
fn test_invalid_values() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "namespace:\n  base: \"MIHCSME/\"\nwriter:\n  column_width: -1\n");

    let Err(MihcsmeError::Config(message)) = load_service_config(&path) else {
        panic!("Expected a configuration error");
    };
    assert!(message.contains("namespace.base"));
    assert!(message.contains("column_width"));
}

/// A comment prefix that would swallow a header row is refused
#[test]
fn test_comment_prefix_cannot_match_a_header() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "parser:\n  comment_prefix: \"W\"\n");
    let Err(MihcsmeError::Config(message)) = load_service_config(&path) else {
        panic!("Expected a configuration error");
    };
    assert!(message.contains("parser.comment_prefix"));

    let path = write_config(&dir, "parser:\n  comment_prefix: \"//\"\n");
    let config = load_service_config(&path).unwrap();
    assert_eq!(config.parser.comment_prefix, "//");
}

/// Malformed YAML is a configuration error
#[test]
fn test_malformed_yaml() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "writer: [unclosed\n");
    assert!(matches!(
        load_config::<MihcsmeConfig>(&path),
        Err(MihcsmeError::Config(_))
    ));
}

/// A missing file is an IO error
#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = load_service_config(&dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(MihcsmeError::Io(_))));
}
