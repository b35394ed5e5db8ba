//! End-to-end aggregation tests with real file and environment backends.

use std::sync::Arc;
use std::time::Duration;

use conflux::{Coordinator, EnvResource, FileResource, FormatRegistry, Resource, Value};
use serde::Deserialize;

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);
const SILENCE_WINDOW: Duration = Duration::from_millis(400);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_file_overrides_env_regardless_of_which_watch_fired() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"APP_MODE":"file","file_only":1}"#).unwrap();
    std::env::set_var("APP_MODE", "env");
    std::env::set_var("APP_PORT", "8080");

    let registry = FormatRegistry::with_defaults();
    let env = EnvResource::new("APP_", &registry).unwrap();
    let file = FileResource::new(&path, &registry).unwrap();
    // File registered after env, so file keys win.
    let resources: Vec<Arc<dyn Resource>> = vec![Arc::new(env), Arc::new(file)];

    let mut coordinator = Coordinator::start(resources).await.unwrap();
    let current = coordinator.current();
    assert_eq!(current.get("APP_MODE").and_then(Value::as_str), Some("file"));
    assert_eq!(current.get("APP_PORT").and_then(Value::as_str), Some("8080"));

    // Only the file changes; its keys still take precedence and the env
    // contribution survives.
    let mut updates = coordinator.subscribe();
    std::fs::write(&path, r#"{"APP_MODE":"file-v2","file_only":2}"#).unwrap();
    let snapshot = tokio::time::timeout(NOTIFY_TIMEOUT, updates.recv())
        .await
        .expect("no re-merge after file change")
        .unwrap();
    assert_eq!(snapshot.get("APP_MODE").and_then(Value::as_str), Some("file-v2"));
    assert_eq!(snapshot.get("file_only").and_then(Value::as_f64), Some(2.0));
    assert_eq!(snapshot.get("APP_PORT").and_then(Value::as_str), Some("8080"));

    coordinator.stop().await;
    std::env::remove_var("APP_MODE");
    std::env::remove_var("APP_PORT");
}

#[tokio::test]
async fn test_byte_identical_rewrite_produces_no_notification() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "gen: 1\n").unwrap();

    let registry = FormatRegistry::with_defaults();
    let file = FileResource::new(&path, &registry).unwrap();
    let resources: Vec<Arc<dyn Resource>> = vec![Arc::new(file)];

    let mut coordinator = Coordinator::start(resources).await.unwrap();
    let mut updates = coordinator.subscribe();

    // Same bytes again: the resource suppresses the duplicate.
    std::fs::write(&path, "gen: 1\n").unwrap();
    let silent = tokio::time::timeout(SILENCE_WINDOW, updates.recv()).await;
    assert!(silent.is_err(), "duplicate payload produced a notification");

    // A real change still comes through.
    std::fs::write(&path, "gen: 2\n").unwrap();
    let snapshot = tokio::time::timeout(NOTIFY_TIMEOUT, updates.recv())
        .await
        .expect("no notification for a real change")
        .unwrap();
    assert_eq!(snapshot.get("gen").and_then(Value::as_f64), Some(2.0));

    coordinator.stop().await;
}

#[tokio::test]
async fn test_malformed_rewrite_keeps_last_good_tree() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"key":"good"}"#).unwrap();

    let registry = FormatRegistry::with_defaults();
    let file = FileResource::new(&path, &registry).unwrap();
    let resources: Vec<Arc<dyn Resource>> = vec![Arc::new(file)];

    let mut coordinator = Coordinator::start(resources).await.unwrap();
    let mut updates = coordinator.subscribe();
    let mut errors = coordinator.subscribe_errors();

    std::fs::write(&path, "{broken").unwrap();
    let error = tokio::time::timeout(NOTIFY_TIMEOUT, errors.recv())
        .await
        .expect("decode failure not reported")
        .unwrap();
    assert!(matches!(*error, conflux::ConfigError::Decode { .. }));
    // The snapshot still holds the last good tree.
    assert_eq!(coordinator.current().get("key").and_then(Value::as_str), Some("good"));

    // The corrected rewrite is not shadowed by the failed one.
    std::fs::write(&path, r#"{"key":"fixed"}"#).unwrap();
    let snapshot = tokio::time::timeout(NOTIFY_TIMEOUT, updates.recv())
        .await
        .expect("no notification after corrected rewrite")
        .unwrap();
    assert_eq!(snapshot.get("key").and_then(Value::as_str), Some("fixed"));

    coordinator.stop().await;
}

#[tokio::test]
async fn test_env_poll_detects_variable_change() {
    init_tracing();
    std::env::set_var("CONFLUX_POLL_KEY", "before");

    let registry = FormatRegistry::with_defaults();
    let env = EnvResource::new("CONFLUX_POLL_", &registry)
        .unwrap()
        .with_poll_interval(Duration::from_millis(50));
    let resources: Vec<Arc<dyn Resource>> = vec![Arc::new(env)];

    let mut coordinator = Coordinator::start(resources).await.unwrap();
    let mut updates = coordinator.subscribe();

    std::env::set_var("CONFLUX_POLL_KEY", "after");
    let snapshot = tokio::time::timeout(NOTIFY_TIMEOUT, updates.recv())
        .await
        .expect("poll never noticed the change")
        .unwrap();
    assert_eq!(
        snapshot.get("CONFLUX_POLL_KEY").and_then(Value::as_str),
        Some("after")
    );

    coordinator.stop().await;
    std::env::remove_var("CONFLUX_POLL_KEY");
}

#[tokio::test]
async fn test_merged_tree_decodes_into_typed_config() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("grpc.json");
    let yaml_path = dir.path().join("redis.yaml");
    std::fs::write(&json_path, r#"{"grpc":{"addr":"127.0.0.1","port":9090}}"#).unwrap();
    std::fs::write(&yaml_path, "redis:\n  addr: 127.0.0.1:6379\n  db: 3\n").unwrap();

    #[derive(Debug, Deserialize)]
    struct AppConfig {
        grpc: Grpc,
        redis: Redis,
    }
    #[derive(Debug, Deserialize)]
    struct Grpc {
        addr: String,
        port: f64,
    }
    #[derive(Debug, Deserialize)]
    struct Redis {
        addr: String,
        db: f64,
    }

    let registry = FormatRegistry::with_defaults();
    let resources: Vec<Arc<dyn Resource>> = vec![
        Arc::new(FileResource::new(&json_path, &registry).unwrap()),
        Arc::new(FileResource::new(&yaml_path, &registry).unwrap()),
    ];

    let merged = conflux::load_merged(&resources, &conflux::LastWinsMerger)
        .await
        .unwrap();
    let config: AppConfig = merged.decode().unwrap();
    assert_eq!(config.grpc.addr, "127.0.0.1");
    assert_eq!(config.grpc.port, 9090.0);
    assert_eq!(config.redis.addr, "127.0.0.1:6379");
    assert_eq!(config.redis.db, 3.0);
}
