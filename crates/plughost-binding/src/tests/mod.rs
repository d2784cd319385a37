//! Binding scenarios against a real plugin manager.

use plughost_config::StorageLayout;
use plughost_plugins::test_support::{FakeCluster, MapFetcher};
use plughost_plugins::{Params, PluginError, PluginManager};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::{BindingError, PluginBinding};

const MANIFEST: &str = "\
name: echo
binary: https://host/echo-bin
arguments:
  url:
    type: text
    required: true
";

fn record(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn manager(layout: &StorageLayout, cluster: &FakeCluster) -> PluginManager {
    let fetcher = MapFetcher::new()
        .with("https://host/echo.yaml", MANIFEST)
        .with("https://host/echo-bin", b"bin".to_vec());
    let mut manager = PluginManager::new(layout.clone(), cluster.runtime(fetcher));
    manager.load_local().expect("load plugins");
    manager
}

#[test]
fn bound_plugin_cannot_be_unregistered_until_released() {
    let temp = TempDir::new().expect("temp dir");
    let layout = StorageLayout::new(temp.path());
    let cluster = FakeCluster::new();
    let mut manager = manager(&layout, &cluster);
    manager.register("https://host/echo.yaml").expect("register");
    let mut binding = PluginBinding::new(&layout);
    binding.load_store().expect("load bindings");

    let missing_url = record(json!({"name": "job1", "type": "source", "plugin_name": "echo"}));
    let err = binding.add(missing_url, &manager).expect_err("url required");
    assert!(matches!(err, BindingError::Validation(_)), "got {err}");

    let job = record(json!({
        "name": "job1",
        "type": "source",
        "plugin_name": "echo",
        "url": "https://example.com/feed",
    }));
    binding.add(job, &manager).expect("add");

    let err = manager.unregister("echo", &binding).expect_err("in use");
    match err {
        PluginError::InUse { name, configs } => {
            assert_eq!(name, "echo");
            assert_eq!(configs, ["job1"]);
        }
        other => panic!("expected InUse, got {other}"),
    }

    binding.remove("job1").expect("remove");
    manager.unregister("echo", &binding).expect("unregister");
    assert!(manager.definition("echo").is_none());
}

#[test]
fn validation_does_not_need_a_running_plugin() {
    let temp = TempDir::new().expect("temp dir");
    let layout = StorageLayout::new(temp.path());
    let cluster = FakeCluster::new();
    let mut manager = manager(&layout, &cluster);
    manager.register("https://host/echo.yaml").expect("register");
    let mut binding = PluginBinding::new(&layout);

    let job = record(json!({
        "name": "job1",
        "type": "source",
        "plugin_name": "echo",
        "url": "https://example.com/feed",
    }));
    binding.add(job, &manager).expect("add");

    assert!(!manager.is_enabled("echo"));
    assert!(cluster.launches().is_empty());
}
