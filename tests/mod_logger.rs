use docctl::logger::{AUDIT_TARGET, collection_config, init_for_collection_in, log_audit, parse_level};
use log::LevelFilter;

#[test]
fn collection_config_routes_audit_records() {
    let tmp = tempfile::tempdir().unwrap();
    let (config, dir) = collection_config(tmp.path(), "articles", "debug", 3).unwrap();
    assert_eq!(dir, tmp.path().join("articles_logs"));
    assert!(dir.is_dir());
    assert_eq!(config.root().level(), LevelFilter::Debug);
    let audit = config.loggers().iter().find(|l| l.name() == AUDIT_TARGET).unwrap();
    assert!(!audit.additive());
    assert_eq!(audit.appenders(), ["audit".to_string()]);
}

#[test]
fn unknown_level_defaults_to_info() {
    assert_eq!(parse_level("loud"), LevelFilter::Info);
    assert_eq!(parse_level("Trace"), LevelFilter::Trace);
}

// Only test in this binary that installs the global logger.
#[test]
fn audit_lines_land_in_their_own_file() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = init_for_collection_in(tmp.path(), "orders", "info", 2).unwrap();
    log::info!("controller ready");
    log_audit("insert-one", "orders", 1);
    log::logger().flush();

    let audit = std::fs::read_to_string(dir.join("orders_audit.log")).unwrap();
    assert!(audit.contains(r#""op":"insert-one""#), "{audit}");
    assert!(audit.contains(r#""affected":1"#), "{audit}");
    let app = std::fs::read_to_string(dir.join("orders.log")).unwrap();
    assert!(app.contains("controller ready"));
    assert!(!app.contains("insert-one"));
}
