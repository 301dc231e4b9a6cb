// Configuration store tests: persistence, fallbacks, registry CRUD

mod common;

use common::router;
use routerwatch::error::StoreError;
use routerwatch::store::{ConfigStore, HealthThresholds, WanSelection};

#[test]
fn missing_file_starts_empty() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = ConfigStore::open(dir.path().join("routers.json"));
    assert!(store.routers().is_empty());
    assert!(store.default_router().is_none());
    assert_eq!(store.thresholds(), HealthThresholds::default());
}

#[test]
fn malformed_file_falls_back_to_defaults() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("routers.json");
    std::fs::write(&path, "{ not json").unwrap();
    let store = ConfigStore::open(&path);
    assert!(store.routers().is_empty());
    assert!(store.wan_selection().is_empty());
}

#[test]
fn writes_persist_and_reload() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("nested").join("routers.json");
    {
        let store = ConfigStore::open(&path);
        store.register(router("r1", "10.0.0.1")).unwrap();
        store.register(router("r2", "10.0.0.2")).unwrap();
        store.set_default("r2").unwrap();
        store
            .set_wan_selection(WanSelection {
                wan: vec!["ether1".into()],
                backup: Some("lte1".into()),
            })
            .unwrap();
    }

    let reopened = ConfigStore::open(&path);
    let ids: Vec<String> = reopened.routers().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["r1", "r2"]);
    assert_eq!(reopened.default_router().unwrap().id, "r2");
    assert!(reopened.wan_selection().is_backup("lte1"));
    assert_eq!(reopened.router("r1").unwrap().password, "secret");
}

#[test]
fn default_router_falls_back_to_first() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = ConfigStore::open(dir.path().join("routers.json"));
    store.register(router("r1", "10.0.0.1")).unwrap();
    store.register(router("r2", "10.0.0.2")).unwrap();
    assert_eq!(store.default_router().unwrap().id, "r1");

    let mut flagged = router("r3", "10.0.0.3");
    flagged.is_default = true;
    store.register(flagged).unwrap();
    assert_eq!(store.default_router().unwrap().id, "r3");

    store.remove("r3").unwrap();
    assert_eq!(store.default_router().unwrap().id, "r1");
}

#[test]
fn registry_errors_leave_state_unchanged() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = ConfigStore::open(dir.path().join("routers.json"));
    store.register(router("r1", "10.0.0.1")).unwrap();

    assert!(matches!(
        store.register(router("r1", "10.0.0.9")),
        Err(StoreError::DuplicateRouter(_))
    ));
    assert!(matches!(store.remove("nope"), Err(StoreError::UnknownRouter(_))));
    assert!(matches!(store.set_default("nope"), Err(StoreError::UnknownRouter(_))));
    assert!(matches!(
        store.update(router("nope", "10.0.0.9")),
        Err(StoreError::UnknownRouter(_))
    ));
    assert_eq!(store.routers().len(), 1);
    assert_eq!(store.router("r1").unwrap().host, "10.0.0.1");
}

#[test]
fn update_keeps_registry_position() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = ConfigStore::open(dir.path().join("routers.json"));
    store.register(router("r1", "10.0.0.1")).unwrap();
    store.register(router("r2", "10.0.0.2")).unwrap();

    let mut moved = router("r1", "10.9.9.9");
    moved.name = "Edge".into();
    store.update(moved).unwrap();

    let routers = store.routers();
    assert_eq!(routers[0].id, "r1");
    assert_eq!(routers[0].host, "10.9.9.9");
    assert_eq!(routers[0].name, "Edge");
}

#[test]
fn debug_output_redacts_credentials() {
    let r = router("r1", "10.0.0.1");
    let shown = format!("{:?}", r);
    assert!(!shown.contains("secret"));
    assert!(shown.contains("<redacted>"));
}

#[test]
fn thresholds_round_trip_through_the_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("routers.json");
    let custom = HealthThresholds {
        cpu_warning: 50.0,
        offline_routers_warning: 2,
        ..HealthThresholds::default()
    };
    ConfigStore::open(&path).set_thresholds(custom.clone()).unwrap();
    assert_eq!(ConfigStore::open(&path).thresholds(), custom);
}
