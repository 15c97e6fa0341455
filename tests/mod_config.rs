use docctl::config::{CONFIG_ENV, DEFAULT_CONFIG_FILE, LOG_LEVEL_ENV};
use docctl::{AppConfig, ControllerError};
use std::collections::HashMap;
use std::path::Path;

fn env_of(pairs: &[(&str, String)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect();
    move |key| map.get(key).cloned()
}

fn write(dir: &Path, file: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(file);
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn defaults_without_any_file() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = AppConfig::load_with(None, env_of(&[]), tmp.path()).unwrap();
    assert_eq!(cfg, AppConfig::default());
    assert_eq!(cfg.log_level(), "info");
}

#[test]
fn working_directory_file_is_picked_up() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), DEFAULT_CONFIG_FILE, "collection = \"cwd\"\n");
    let cfg = AppConfig::load_with(None, env_of(&[]), tmp.path()).unwrap();
    assert_eq!(cfg.collection.as_deref(), Some("cwd"));
}

#[test]
fn precedence_explicit_then_env_then_cwd() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), DEFAULT_CONFIG_FILE, "collection = \"cwd\"\n");
    let from_env = write(tmp.path(), "env.toml", "collection = \"env\"\n");
    let explicit = write(tmp.path(), "explicit.toml", "collection = \"explicit\"\n");
    let env = [(CONFIG_ENV, from_env.display().to_string())];

    let cfg = AppConfig::load_with(None, env_of(&env), tmp.path()).unwrap();
    assert_eq!(cfg.collection.as_deref(), Some("env"));

    let cfg = AppConfig::load_with(Some(&explicit), env_of(&env), tmp.path()).unwrap();
    assert_eq!(cfg.collection.as_deref(), Some("explicit"));
}

#[test]
fn missing_explicit_file_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let err = AppConfig::load_with(Some(&tmp.path().join("nope.toml")), env_of(&[]), tmp.path()).unwrap_err();
    assert!(matches!(err, ControllerError::Config(_)));
}

#[test]
fn env_log_level_overrides_file() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), DEFAULT_CONFIG_FILE, "[logging]\nlevel = \"warn\"\nretention = 2\n");
    let cfg = AppConfig::load_with(None, env_of(&[(LOG_LEVEL_ENV, "trace".into())]), tmp.path()).unwrap();
    assert_eq!(cfg.log_level(), "trace");
    assert_eq!(cfg.log_retention(), 2);
}

#[test]
fn search_table_feeds_controller_options() {
    let cfg = AppConfig::from_toml_str(
        "[search]\nsearch_fields = [\"title\", \"body\"]\npost_match_keywords = [\"stats.\"]\n",
    )
    .unwrap();
    let options = cfg.controller_options();
    assert_eq!(options.search.search_fields, ["title", "body"]);
    assert_eq!(options.search.post_match_keywords, ["stats."]);
    assert!(!options.search.auto_regexp_search);
    assert!(options.build_aggregate.is_none());
}

#[test]
fn unreadable_toml_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), DEFAULT_CONFIG_FILE, "collection = [");
    let err = AppConfig::load_with(None, env_of(&[]), tmp.path()).unwrap_err();
    assert!(matches!(err, ControllerError::Toml(_)));
}
