use docctl::logger::init_path;

// Separate binary: installs the global logger from a log4rs YAML file.
#[test]
fn yaml_config_file_drives_logging() {
    let tmp = tempfile::tempdir().unwrap();
    let log_file = tmp.path().join("yaml.log");
    let yaml = format!(
        "appenders:\n  file:\n    kind: file\n    path: \"{}\"\n    encoder:\n      pattern: \"{{l}} {{m}}{{n}}\"\nroot:\n  level: info\n  appenders:\n    - file\n",
        log_file.display()
    );
    let config = tmp.path().join("log4rs.yaml");
    std::fs::write(&config, yaml).unwrap();

    init_path(&config).unwrap();
    log::info!("configured from yaml");
    log::debug!("below the root level");
    log::logger().flush();

    let written = std::fs::read_to_string(&log_file).unwrap();
    assert!(written.contains("INFO configured from yaml"), "{written}");
    assert!(!written.contains("below the root level"));
}

#[test]
fn missing_yaml_file_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(init_path(&tmp.path().join("absent.yaml")).is_err());
}
