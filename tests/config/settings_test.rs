use std::io::Write;

use viewplan::config::{RejectionPolicy, Settings, SettingsError};

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[compiler]
max_path_depth = 3

[validator]
rejection = "any"
check_include_cycles = false
"#
    )
    .unwrap();

    let settings = Settings::load(file.path()).unwrap();
    assert_eq!(settings.compiler.max_path_depth, 3);
    assert!(settings.compiler.allow_reverse_joins);
    assert_eq!(settings.validator.rejection, RejectionPolicy::Any);
    assert!(!settings.validator.check_include_cycles);
    assert!(settings.validator.report_ambiguous_joins);
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("viewplan.toml");

    match Settings::load(&path) {
        Err(SettingsError::FileNotFound(missing)) => assert_eq!(missing, path),
        other => panic!("expected FileNotFound, got {:?}", other),
    }
}

#[test]
fn test_malformed_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[compiler\nmax_path_depth = ").unwrap();

    assert!(matches!(
        Settings::load(file.path()),
        Err(SettingsError::ParseError(_))
    ));
}

#[test]
fn test_round_trip_through_toml() {
    let mut settings = Settings::default();
    settings.compiler.allow_reverse_joins = false;
    settings.validator.rejection = RejectionPolicy::Any;

    let text = toml::to_string(&settings).unwrap();
    assert_eq!(Settings::from_toml_str(&text).unwrap(), settings);
}
