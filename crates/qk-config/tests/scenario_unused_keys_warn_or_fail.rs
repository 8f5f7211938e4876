use qk_config::{load_layered_yaml_from_strings, report_unused_keys, report_unused_keys_against, UnusedKeyPolicy};

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let yaml = r#"
backtest:
  start: "2013-10-07"
strategy:
  name: noop
  leverage: 2
unused_section:
  foo: 123
  bar: 456
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).expect("warn mode must not error");

    assert_eq!(
        report.unused_leaf_pointers,
        vec![
            "/strategy/leverage".to_string(),
            "/unused_section/bar".to_string(),
            "/unused_section/foo".to_string(),
        ]
    );
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let yaml = r#"
backtest:
  start: "2013-10-07"
risk:
  max_drawdown: 0.2
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_UNUSED_KEYS"));
    assert!(msg.contains("/risk/max_drawdown"));
}

#[test]
fn consumed_prefix_covers_nested_keys() {
    let yaml = r#"
backtest:
  start: "2013-10-07"
  calendar: always_on
universe:
  symbols: [SPY, QQQ]
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
}

#[test]
fn explicit_prefix_list_is_normalized() {
    let yaml = "a:\n  b: 1\n  bc: 2\n";
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys_against(&loaded.config_json, &["a/b/", "/a/b"], UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(report.consumed_prefixes, vec!["/a/b".to_string()]);
    assert_eq!(report.unused_leaf_pointers, vec!["/a/bc".to_string()]);
}
