//! Integration tests for the cache store.

use chrono::NaiveDate;
use serde_json::json;
use tempfile::TempDir;

use tgc_cache::config::Config;
use tgc_cache::store::cache::CacheStore;
use tgc_cache::store::payload::{Column, Payload, Table};

fn store_in(tmp: &TempDir) -> CacheStore {
    let mut config = Config::default();
    config.cache.cache_dir = tmp.path().join("cache");
    CacheStore::new(config).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_scenario_set_get_invalidate() {
    let tmp = TempDir::new().unwrap();
    let mut store = store_in(&tmp);

    let key_data = Payload::Document(json!({"a": 1}));
    let value = Payload::NumericArray(vec![1.0, 2.0, 3.0]);

    store.set("features", &key_data, value.clone(), None).unwrap();
    assert_eq!(store.get("features", &key_data, None).unwrap(), Some(value));

    store.invalidate(Some("features"), None);
    assert_eq!(store.get("features", &key_data, None).unwrap(), None);
}

#[test]
fn test_scenario_daily_keys_differ() {
    let tmp = TempDir::new().unwrap();
    let mut store = store_in(&tmp);

    let key_data = Payload::Document(json!({"ticker": "ACME"}));
    let value = Payload::NumericArray(vec![1.0, 2.0]);

    let monday = store
        .set_at("features", &key_data, value.clone(), None, date(2025, 11, 17))
        .unwrap();
    let tuesday = store
        .set_at("features", &key_data, value, None, date(2025, 11, 18))
        .unwrap();

    assert_ne!(monday, tuesday);
    assert_eq!(store.get_stats().file_entries, 2);

    // Same-day lookup hits; next-day lookup of the old key misses.
    assert!(store
        .get_at("features", &key_data, None, date(2025, 11, 18))
        .unwrap()
        .is_some());
    assert!(store
        .get_at("features", &key_data, None, date(2025, 11, 19))
        .unwrap()
        .is_none());
}

#[test]
fn test_expired_entry_is_miss_but_file_remains() {
    let tmp = TempDir::new().unwrap();
    let mut store = store_in(&tmp);

    let key_data = Payload::Document(json!({"a": 1}));
    let key = store
        .set("features", &key_data, Payload::NumericArray(vec![1.0]), None)
        .unwrap();

    // Fresh store so the memory tier cannot mask the expiry check.
    let mut reopened = store_in(&tmp);

    // Let the file age past an mtime granularity boundary.
    std::thread::sleep(std::time::Duration::from_millis(30));

    let expired = reopened.get("features", &key_data, Some(0.0)).unwrap();
    assert_eq!(expired, None);

    // The file was not deleted, and without the age limit it still hits.
    assert!(tmp.path().join("cache").join(format!("{key}.cache")).exists());
    assert!(reopened.get("features", &key_data, None).unwrap().is_some());
}

#[test]
fn test_evict_expired_reclaims_disk() {
    let tmp = TempDir::new().unwrap();
    let mut store = store_in(&tmp);

    let key_data = Payload::Document(json!({"a": 1}));
    store
        .set("features", &key_data, Payload::NumericArray(vec![1.0]), None)
        .unwrap();

    std::thread::sleep(std::time::Duration::from_millis(30));

    assert_eq!(store.evict_expired(1.0), 0);
    assert_eq!(store.evict_expired(0.0), 1);
    assert_eq!(store.get_stats().file_entries, 0);
}

#[test]
fn test_table_payload_file_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let mut store = store_in(&tmp);

    let table = Table {
        index: (1..=6).map(|d| json!(format!("2025-11-{d:02}"))).collect(),
        columns: vec![
            Column {
                name: "close".to_string(),
                values: vec![
                    json!(101.0),
                    json!(102.5),
                    json!(101.75),
                    json!(103.0),
                    json!(104.25),
                    json!(103.5),
                ],
            },
            Column {
                name: "symbol".to_string(),
                values: (0..6).map(|_| json!("ACME")).collect(),
            },
        ],
    };
    let key_data = Payload::Document(json!({"q": "ohlc"}));
    store
        .set("tables", &key_data, Payload::Table(table.clone()), None)
        .unwrap();

    // Read through the file tier: numeric columns are lossy within 1%.
    let mut reopened = store_in(&tmp);
    let hit = reopened.get("tables", &key_data, None).unwrap();
    let Some(Payload::Table(restored)) = hit else {
        panic!("expected a table payload");
    };

    assert_eq!(restored.index, table.index);
    assert_eq!(restored.columns.len(), 2);
    assert_eq!(restored.columns[1], table.columns[1]);

    for (orig, back) in table.columns[0].values.iter().zip(&restored.columns[0].values) {
        let orig = orig.as_f64().unwrap();
        let back = back.as_f64().unwrap();
        assert!((orig - back).abs() / orig.abs() < 0.01, "{orig} vs {back}");
    }
}

#[test]
fn test_compression_disabled_store_is_exact() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.cache.cache_dir = tmp.path().join("cache");
    config.cache.enable_compression = false;
    config.cache.enable_memory_cache = false;
    let mut store = CacheStore::new(config).unwrap();

    let key_data = Payload::Document(json!({"a": 1}));
    let value = Payload::NumericArray(vec![1.25, 2.5, 3.75]);
    store.set("features", &key_data, value.clone(), None).unwrap();

    // Memory tier disabled, so this is a pure file-tier read, uncompressed.
    assert_eq!(store.get("features", &key_data, None).unwrap(), Some(value));
}

#[test]
fn test_invalidate_by_pattern() {
    let tmp = TempDir::new().unwrap();
    let mut store = store_in(&tmp);

    let first = Payload::Document(json!({"a": 1}));
    let second = Payload::Document(json!({"a": 2}));
    let key = store
        .set("features", &first, Payload::NumericArray(vec![1.0]), None)
        .unwrap();
    store
        .set("features", &second, Payload::NumericArray(vec![2.0]), None)
        .unwrap();

    // Match on the first key's content hash: only that entry goes away.
    let hash = key.rsplit('-').next().unwrap().to_string();
    let removed = store.invalidate(None, Some(&hash));
    assert!(removed >= 1);

    assert_eq!(store.get("features", &first, None).unwrap(), None);
    assert!(store.get("features", &second, None).unwrap().is_some());
}

#[test]
fn test_metadata_is_persisted_in_entry() {
    let tmp = TempDir::new().unwrap();
    let mut store = store_in(&tmp);

    let key_data = Payload::Document(json!({"a": 1}));
    let key = store
        .set(
            "features",
            &key_data,
            Payload::NumericArray(vec![1.0]),
            Some(json!({"source": "unit-test"})),
        )
        .unwrap();

    let raw = std::fs::read(tmp.path().join("cache").join(format!("{key}.cache"))).unwrap();
    let entry: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(entry["metadata"]["source"], "unit-test");
    assert_eq!(entry["cache_key"], json!(key));
    assert!(entry["timestamp"].is_string());
    assert!(entry["value"].is_string());
}

#[test]
fn test_stats_reflect_both_tiers() {
    let tmp = TempDir::new().unwrap();
    let mut store = store_in(&tmp);

    let key_data = Payload::Document(json!({"a": 1}));
    store
        .set("features", &key_data, Payload::NumericArray(vec![1.0]), None)
        .unwrap();

    let stats = store.get_stats();
    assert_eq!(stats.file_entries, 1);
    assert_eq!(stats.memory_entries, 1);
    assert!(stats.total_size_bytes > 0);
    assert!(stats.compression_enabled);
}

#[test]
fn test_structural_keying_ignores_construction_order() {
    let tmp = TempDir::new().unwrap();
    let mut store = store_in(&tmp);

    let ordered: serde_json::Value = serde_json::from_str(r#"{"a": 1, "b": 2}"#).unwrap();
    let shuffled: serde_json::Value = serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();

    store
        .set(
            "features",
            &Payload::Document(ordered),
            Payload::NumericArray(vec![42.0]),
            None,
        )
        .unwrap();

    let hit = store
        .get("features", &Payload::Document(shuffled), None)
        .unwrap();
    assert!(hit.is_some());
}
