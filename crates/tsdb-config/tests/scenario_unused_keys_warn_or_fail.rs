//! Unused-key guard
//!
//! GREEN when:
//! 1) unused keys are reported under Warn without error
//! 2) unused keys fail under Fail
//! 3) everything under /timeseries and /reconcile counts as consumed
//! 4) unused pointers come back sorted

use tsdb_config::{load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy};

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let yaml = r#"
reconcile:
  orphaned_raw_tables: detach
legacy:
  foo: 123
  bar: 456
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).expect("config load must succeed");
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)
        .expect("warn mode must not error");

    assert!(!report.is_clean());
    assert!(report
        .unused_leaf_pointers
        .contains(&"/legacy/foo".to_string()));
    assert!(report
        .unused_leaf_pointers
        .contains(&"/legacy/bar".to_string()));
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let loaded = load_layered_yaml_from_strings(&["legacy: { foo: 1 }"]).unwrap();
    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();
    assert!(format!("{err:?}").contains("CONFIG_UNUSED_KEYS"));
}

#[test]
fn consumed_sections_are_clean() {
    let yaml = r#"
timeseries:
  tick:
    asset_classes:
      crypto:
        origins: { rth: "2000-01-03T00:00:00Z", eth: "2000-01-03T00:00:00Z", htf: "2000-01-03T00:00:00Z" }
        raw: [tick]
reconcile:
  orphaned_raw_tables: keep_ingesting
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
}

#[test]
fn deterministic_unused_pointer_ordering() {
    let loaded = load_layered_yaml_from_strings(&["unused: { b: 2, a: 1 }"]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/unused/a".to_string(), "/unused/b".to_string()]
    );
}
