//! Crate-level lifecycle scenarios.


use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use plughost_config::StorageLayout;
use plughost_store::YamlDocument;
use serde_json::json;
use tempfile::TempDir;

use crate::error::PluginError;
use crate::instance::InstanceState;
use crate::manager::PluginManager;
use crate::protocol::HEALTH_API;
use crate::resolver::NoBindings;
use crate::test_support::{FakeCluster, MapFetcher};
use crate::Params;

const MANIFEST: &str = "\
name: echo
version: \"1.0.0\"
binary: https://host/echo-bin
arguments:
  url:
    type: text
    required: true
";

fn port_of(layout: &StorageLayout, plugin: &str) -> Option<u16> {
    YamlDocument::new(layout.plugin_state())
        .section(plugin)
        .read::<InstanceState>()
        .expect("read state")
        .and_then(|state| state.port)
}

#[test]
fn register_enable_call_disable_unregister() {
    let temp = TempDir::new().expect("temp dir");
    let layout = StorageLayout::new(temp.path());
    let cluster = FakeCluster::new();
    let fetcher = MapFetcher::new()
        .with("https://host/echo.yaml", MANIFEST)
        .with("https://host/echo-bin", b"\x7fELF".to_vec());
    let mut manager = PluginManager::new(layout.clone(), cluster.runtime(fetcher));
    manager.load_local().expect("load");

    let name = manager.register("https://host/echo.yaml").expect("register");
    assert_eq!(name, "echo");

    manager.enable("echo").expect("enable");
    let binary = layout.binary_path("echo");
    assert!(binary.is_file());
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&binary).expect("metadata").permissions().mode();
        assert_ne!(mode & 0o100, 0, "binary must be executable");
    }
    let port = port_of(&layout, "echo").expect("port persisted");
    assert!(cluster.is_listening(port));

    let health = manager
        .call("echo", HEALTH_API, &Params::new())
        .expect("health call");
    assert!(health.is_null());

    manager.disable("echo").expect("disable");
    assert_eq!(port_of(&layout, "echo"), None);
    assert!(!cluster.is_listening(port));

    manager.unregister("echo", &NoBindings).expect("unregister");
    assert!(manager.definition("echo").is_none());
    assert!(!layout.definition_path("echo").exists());
    assert!(!binary.exists());
}

#[test]
fn crashed_plugin_is_reported_not_enabled_by_its_instance() {
    let temp = TempDir::new().expect("temp dir");
    let layout = StorageLayout::new(temp.path());
    let cluster = FakeCluster::new();
    let fetcher = MapFetcher::new()
        .with("https://host/echo.yaml", MANIFEST)
        .with("https://host/echo-bin", b"bin".to_vec());
    let mut manager = PluginManager::new(layout.clone(), cluster.runtime(fetcher));
    manager.load_local().expect("load");
    manager.register("https://host/echo.yaml").expect("register");
    manager.enable("echo").expect("enable");
    let launch = cluster.launches().pop().expect("launched");

    assert!(cluster.crash(launch.pid, 1));
    let deadline = Instant::now() + Duration::from_secs(5);
    while port_of(&layout, "echo").is_some() {
        assert!(Instant::now() < deadline, "reaper did not clear the port");
        thread::sleep(Duration::from_millis(5));
    }

    let err = manager
        .call("echo", "search", &Params::new())
        .expect_err("port cleared");
    assert!(matches!(err, PluginError::NotEnabled { .. }), "got {err}");

    // The supervisor is still held, so re-enabling is a no-op until it is
    // disabled; disabling must not signal the dead process.
    manager.disable("echo").expect("disable");
    assert!(cluster.terminated().is_empty());
    manager.enable("echo").expect("enable again");
    let mut kwargs = Params::new();
    kwargs.insert("url".into(), json!("https://example.com"));
    let data = manager.call("echo", "search", &kwargs).expect("call");
    assert_eq!(data, json!({"url": "https://example.com"}));
}

#[test]
fn cancelling_aborts_a_pending_enable() {
    let temp = TempDir::new().expect("temp dir");
    let layout = StorageLayout::new(temp.path());
    let cluster = FakeCluster::new();
    cluster.refuse_health("echo");
    let fetcher = MapFetcher::new()
        .with("https://host/echo.yaml", MANIFEST)
        .with("https://host/echo-bin", b"bin".to_vec());
    let runtime = cluster
        .runtime(fetcher)
        .with_health_policy(crate::HealthPolicy::new(1_000, Duration::from_secs(1)));
    let mut manager = PluginManager::new(layout.clone(), runtime);
    manager.load_local().expect("load");
    manager.register("https://host/echo.yaml").expect("register");

    let token = manager.cancel_token().clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        token.cancel();
    });
    let started = Instant::now();
    let err = manager.enable("echo").expect_err("cancelled");
    canceller.join().expect("canceller thread");

    assert!(started.elapsed() < Duration::from_secs(30));
    assert!(
        matches!(err, PluginError::StartFailed { ref message, .. } if message == "cancelled"),
        "got {err}"
    );
    assert!(!manager.is_enabled("echo"));
    assert_eq!(port_of(&layout, "echo"), None);
}
