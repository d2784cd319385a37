//! Unit tests for the host context.

use plughost_plugins::test_support::{FakeCluster, MapFetcher};
use rstest::{fixture, rstest};
use serde_json::json;
use tempfile::TempDir;

use super::*;

const ECHO_SOURCE: &str = "https://host/echo.yaml";
const ECHO_MANIFEST: &str = "\
name: echo
type: source
binary: https://host/echo-bin
arguments:
  url:
    type: text
    required: true
";

struct Harness {
    temp: TempDir,
    cluster: FakeCluster,
    host: Host,
}

impl Harness {
    fn layout(&self) -> StorageLayout {
        StorageLayout::new(self.temp.path())
    }

    /// A second host over the same storage, as after a daemon restart.
    fn restarted(&self) -> Host {
        let mut host = Host::new(self.layout(), self.cluster.runtime(fetcher()));
        host.load().expect("reload host");
        host
    }
}

fn fetcher() -> MapFetcher {
    MapFetcher::new()
        .with(ECHO_SOURCE, ECHO_MANIFEST)
        .with("https://host/echo-bin", b"echo-bin".to_vec())
}

fn job(name: &str) -> Params {
    let mut data = Params::new();
    data.insert("name".into(), json!(name));
    data.insert("type".into(), json!("source"));
    data.insert("plugin_name".into(), json!("echo"));
    data.insert("url".into(), json!("https://example.com/feed"));
    data
}

#[fixture]
fn harness() -> Harness {
    let temp = TempDir::new().expect("temp dir");
    let cluster = FakeCluster::new();
    let mut host = Host::new(StorageLayout::new(temp.path()), cluster.runtime(fetcher()));
    host.load().expect("load empty host");
    Harness {
        temp,
        cluster,
        host,
    }
}

#[fixture]
fn registered(mut harness: Harness) -> Harness {
    harness.host.register(ECHO_SOURCE).expect("register echo");
    harness
}

#[rstest]
fn configs_need_a_registered_plugin(mut harness: Harness) {
    let err = harness.host.add_config(job("job1")).expect_err("no plugin");
    assert!(
        matches!(
            err,
            HostError::Binding(BindingError::PluginNotFound { ref plugin }) if plugin == "echo"
        ),
        "got {err}"
    );
}

#[rstest]
fn configs_are_checked_by_their_plugin(mut registered: Harness) {
    let mut data = job("job1");
    data.remove("url");

    let err = registered.host.add_config(data).expect_err("url required");

    assert!(
        matches!(err, HostError::Binding(BindingError::Validation(_))),
        "got {err}"
    );
    assert!(registered.host.list_config(None).is_empty());
}

#[rstest]
fn bound_plugin_stays_registered(mut registered: Harness) {
    registered.host.add_config(job("job1")).expect("bind");

    let err = registered.host.unregister("echo").expect_err("in use");
    assert!(
        matches!(err, HostError::Plugin(PluginError::InUse { ref configs, .. }) if configs == &["job1"]),
        "got {err}"
    );

    registered.host.remove_config("job1").expect("unbind");
    registered.host.unregister("echo").expect("unregister");
    assert!(registered.host.manager().definition("echo").is_none());
}

#[rstest]
fn update_config_is_revalidated(mut registered: Harness) {
    registered.host.add_config(job("job1")).expect("bind");
    let mut patch = Params::new();
    patch.insert("url".into(), json!(["not", "text"]));

    let err = registered
        .host
        .update_config("job1", patch)
        .expect_err("rejected");

    assert!(matches!(err, HostError::Binding(BindingError::Validation(_))));
    let config = registered.host.binding().get("job1").expect("still bound");
    assert_eq!(
        config.params().get("url"),
        Some(&json!("https://example.com/feed"))
    );
}

#[rstest]
fn enabled_plugin_answers_calls(mut registered: Harness) {
    registered.host.enable("echo").expect("enable");
    let mut kwargs = Params::new();
    kwargs.insert("keyword".into(), json!("ubuntu"));

    let data = registered
        .host
        .call("echo", "search", &kwargs)
        .expect("call");

    assert_eq!(data, json!({"keyword": "ubuntu"}));
    registered.host.disable("echo").expect("disable");
    assert!(matches!(
        registered.host.call("echo", "search", &kwargs),
        Err(HostError::Plugin(PluginError::NotEnabled { .. }))
    ));
}

#[rstest]
fn restart_restores_running_plugins_and_configs(mut registered: Harness) {
    registered.host.enable("echo").expect("enable");
    registered.host.add_config(job("job1")).expect("bind");

    let host = registered.restarted();

    assert!(host.manager().is_enabled("echo"));
    assert_eq!(registered.cluster.launches().len(), 1, "plugin was adopted");
    assert_eq!(
        host.list_config(Some("source"))
            .into_iter()
            .map(Config::name)
            .collect::<Vec<_>>(),
        ["job1"]
    );
}

#[rstest]
fn shutdown_leaves_plugins_stopped_after_restart(mut registered: Harness) {
    registered.host.enable("echo").expect("enable");
    registered.host.add_config(job("job1")).expect("bind");

    registered.host.shutdown().expect("shutdown");
    assert_eq!(registered.cluster.terminated().len(), 1);

    let host = registered.restarted();
    assert!(!host.manager().is_enabled("echo"));
    assert!(host.binding().get("job1").is_some());
    assert_eq!(registered.cluster.launches().len(), 1);
}
