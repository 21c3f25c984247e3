// tests/integration/error_handling.rs

use std::io::Write;
use tempfile::NamedTempFile;
use weave::config::load_and_validate;
use weave::errors::WeaveError;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_dependency_cycle_returns_structured_error() {
    let file = config_file(
        r#"
[project.a]
depends_on = ["b"]

[project.b]
depends_on = ["a"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(WeaveError::DependencyCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains('a') || msg.contains('b'));
        }
        Err(e) => panic!("Expected DependencyCycle error, got: {e:?}"),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_dependency_returns_config_error() {
    let file = config_file(
        r#"
[project.a]
depends_on = ["NonExistent"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(WeaveError::ConfigError(msg)) => {
            assert!(msg.contains("unknown dependency"));
            assert!(msg.contains("NonExistent"));
        }
        Err(e) => panic!("Expected ConfigError, got: {e:?}"),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_invalid_failure_behaviour_is_a_toml_error() {
    let file = config_file(
        r#"
[build]
failure_behaviour = "sometimes"

[project.a]
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(WeaveError::TomlError(_))
    ));
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("Weave.toml");

    assert!(matches!(
        load_and_validate(&missing),
        Err(WeaveError::IoError(_))
    ));
}
