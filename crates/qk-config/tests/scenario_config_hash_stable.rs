use qk_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
backtest:
  start: "2013-10-07"
  end: "2013-10-11"
  initial_cash_micros: 100000000000
  resolution: minute
universe:
  symbols: [SPY, QQQ]
strategy:
  name: buy-and-hold
  symbol: SPY
"#;

/// Same content as BASE_YAML, keys in a different order.
const BASE_YAML_REORDERED: &str = r#"
strategy:
  symbol: SPY
  name: buy-and-hold
universe:
  symbols: [SPY, QQQ]
backtest:
  resolution: minute
  initial_cash_micros: 100000000000
  end: "2013-10-11"
  start: "2013-10-07"
"#;

const OVERLAY_YAML: &str = r#"
backtest:
  resolution: tick
strategy:
  name: moo-daily
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(original.config_hash, reordered.config_hash);
    assert_eq!(original.canonical_json, reordered.canonical_json);
}

#[test]
fn overlay_overrides_base_and_changes_hash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, merged.config_hash);

    let j = &merged.config_json;
    assert_eq!(j.pointer("/backtest/resolution").and_then(|v| v.as_str()), Some("tick"));
    assert_eq!(j.pointer("/strategy/name").and_then(|v| v.as_str()), Some("moo-daily"));
    // Untouched siblings survive the merge.
    assert_eq!(j.pointer("/strategy/symbol").and_then(|v| v.as_str()), Some("SPY"));
    assert_eq!(j.pointer("/backtest/start").and_then(|v| v.as_str()), Some("2013-10-07"));
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn invalid_yaml_is_an_error() {
    let err = load_layered_yaml_from_strings(&[BASE_YAML, "backtest: [unclosed"]).unwrap_err();
    assert!(format!("{err:#}").contains("layer 1"));
}

#[test]
fn layered_files_match_layered_strings() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let overlay = dir.path().join("overlay.yaml");
    std::fs::write(&base, BASE_YAML).unwrap();
    std::fs::write(&overlay, OVERLAY_YAML).unwrap();

    let from_files = qk_config::load_layered_yaml(&[
        base.to_str().unwrap(),
        overlay.to_str().unwrap(),
    ])
    .unwrap();
    let from_strings = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(from_files.config_hash, from_strings.config_hash);

    let missing = qk_config::load_layered_yaml(&["/nonexistent/qk.yaml"]).unwrap_err();
    assert!(missing.to_string().contains("failed to read yaml path"));
}
