//! Unit tests for the binding table.

use std::fs;

use plughost_plugins::{ArgumentSpec, ArgumentType, Definition};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tempfile::TempDir;

use super::*;

/// Resolver serving a fixed set of definitions.
struct Plugins(BTreeMap<String, Definition>);

impl Plugins {
    fn with(definitions: impl IntoIterator<Item = Definition>) -> Self {
        Self(
            definitions
                .into_iter()
                .map(|definition| (definition.name().to_owned(), definition))
                .collect(),
        )
    }
}

impl PluginResolver for Plugins {
    fn definition(&self, name: &str) -> Option<&Definition> {
        self.0.get(name)
    }
}

fn plugins() -> Plugins {
    Plugins::with([
        Definition::new("echo")
            .with_argument("url", ArgumentSpec::required(ArgumentType::Text))
            .with_argument("depth", ArgumentSpec::optional(ArgumentType::Integer)),
        Definition::new("mirror"),
    ])
}

fn params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn job(name: &str, plugin: &str) -> Params {
    params(json!({
        "name": name,
        "type": "source",
        "plugin_name": plugin,
        "url": "https://example.com/feed",
    }))
}

struct Harness {
    temp: TempDir,
    binding: PluginBinding,
}

impl Harness {
    fn layout(&self) -> StorageLayout {
        StorageLayout::new(self.temp.path())
    }

    fn table(&self) -> BTreeMap<String, Params> {
        YamlDocument::new(self.layout().binding_state())
            .read()
            .expect("read table")
    }

    fn reloaded(&self) -> PluginBinding {
        let mut binding = PluginBinding::new(&self.layout());
        binding.load_store().expect("reload");
        binding
    }
}

#[fixture]
fn harness() -> Harness {
    let temp = TempDir::new().expect("temp dir");
    let mut binding = PluginBinding::new(&StorageLayout::new(temp.path()));
    binding.load_store().expect("load empty store");
    Harness { temp, binding }
}

#[fixture]
fn bound(mut harness: Harness) -> Harness {
    harness
        .binding
        .add(job("job1", "echo"), &plugins())
        .expect("add job1");
    harness
}

// ---------------------------------------------------------------------------
// Add
// ---------------------------------------------------------------------------

#[rstest]
fn add_persists_the_flat_record(bound: Harness) {
    let table = bound.table();
    assert_eq!(table.len(), 1);
    assert_eq!(table.get("job1"), Some(&job("job1", "echo")));

    let config = bound.binding.get("job1").expect("bound");
    assert_eq!(config.plugin_name(), "echo");
    assert_eq!(
        config.params(),
        &params(json!({"url": "https://example.com/feed"}))
    );
}

#[rstest]
#[case::name("name")]
#[case::kind("type")]
#[case::plugin("plugin_name")]
fn add_requires_reserved_fields(mut harness: Harness, #[case] dropped: &str) {
    let mut data = job("job1", "echo");
    data.remove(dropped);

    let err = harness.binding.add(data, &plugins()).expect_err("invalid");

    assert!(
        matches!(err, BindingError::InvalidConfig { ref message } if message.contains(dropped)),
        "got {err}"
    );
    assert!(harness.binding.get("job1").is_none());
}

#[rstest]
fn add_rejects_duplicate_names(mut bound: Harness) {
    let err = bound
        .binding
        .add(job("job1", "mirror"), &plugins())
        .expect_err("duplicate");
    assert!(matches!(err, BindingError::Duplicate { ref name } if name == "job1"));
    assert_eq!(bound.binding.get("job1").map(Config::plugin_name), Some("echo"));
}

#[rstest]
fn add_requires_a_registered_plugin(mut harness: Harness) {
    let err = harness
        .binding
        .add(job("job1", "ghost"), &plugins())
        .expect_err("unknown plugin");
    assert!(matches!(err, BindingError::PluginNotFound { ref plugin } if plugin == "ghost"));
    assert!(!harness.layout().binding_state().exists());
}

#[rstest]
fn add_rejected_by_plugin_writes_nothing(mut harness: Harness) {
    let mut data = job("job1", "echo");
    data.insert("url".into(), json!(42));

    let err = harness.binding.add(data, &plugins()).expect_err("rejected");

    match err {
        BindingError::Validation(rejection) => assert_eq!(rejection.plugin(), "echo"),
        other => panic!("expected Validation, got {other}"),
    }
    assert!(harness.binding.get("job1").is_none());
    assert!(!harness.layout().binding_state().exists());
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

#[rstest]
fn update_merges_parameters(mut bound: Harness) {
    bound
        .binding
        .update("job1", params(json!({"depth": 3})), &plugins())
        .expect("update");

    let expected = params(json!({"url": "https://example.com/feed", "depth": 3}));
    assert_eq!(bound.binding.get("job1").map(Config::params), Some(&expected));
    let stored = bound.table().remove("job1").expect("stored");
    assert_eq!(stored.get("depth"), Some(&json!(3)));
    assert_eq!(stored.get("url"), Some(&json!("https://example.com/feed")));
}

#[rstest]
fn update_ignores_reserved_keys(mut bound: Harness) {
    bound
        .binding
        .update(
            "job1",
            params(json!({"name": "job2", "plugin_name": "mirror", "type": "sink"})),
            &plugins(),
        )
        .expect("update");

    let config = bound.binding.get("job1").expect("still bound");
    assert_eq!(config.plugin_name(), "echo");
    assert_eq!(config.kind(), "source");
    assert!(bound.binding.get("job2").is_none());
}

#[rstest]
fn rejected_update_changes_nothing(mut bound: Harness) {
    let before = fs::read(bound.layout().binding_state()).expect("read table");

    // `depth` alone would be accepted; the bad `url` must veto the whole patch.
    let err = bound
        .binding
        .update(
            "job1",
            params(json!({"depth": 5, "url": null})),
            &plugins(),
        )
        .expect_err("rejected");

    assert!(matches!(err, BindingError::Validation(_)), "got {err}");
    assert_eq!(
        bound.binding.get("job1").map(Config::params),
        Some(&params(json!({"url": "https://example.com/feed"})))
    );
    assert_eq!(
        fs::read(bound.layout().binding_state()).expect("read table"),
        before
    );
}

#[rstest]
fn update_unknown_config_fails(mut harness: Harness) {
    let err = harness
        .binding
        .update("ghost", Params::new(), &plugins())
        .expect_err("unknown");
    assert!(matches!(err, BindingError::NotFound { ref name } if name == "ghost"));
}

// ---------------------------------------------------------------------------
// Remove, list, reload
// ---------------------------------------------------------------------------

#[rstest]
fn remove_keeps_other_entries(mut bound: Harness) {
    bound
        .binding
        .add(job("job2", "mirror"), &plugins())
        .expect("add job2");

    bound.binding.remove("job1").expect("remove");

    assert!(bound.binding.get("job1").is_none());
    let table = bound.table();
    assert!(!table.contains_key("job1"));
    assert!(table.contains_key("job2"));
}

#[rstest]
fn remove_unknown_config_fails(mut harness: Harness) {
    let err = harness.binding.remove("ghost").expect_err("unknown");
    assert!(matches!(err, BindingError::NotFound { .. }));
}

#[rstest]
fn list_config_filters_by_type(mut bound: Harness) {
    let mut sink = job("job0", "mirror");
    sink.insert("type".into(), json!("sink"));
    bound.binding.add(sink, &plugins()).expect("add sink");

    let all: Vec<_> = bound
        .binding
        .list_config(None)
        .into_iter()
        .map(Config::name)
        .collect();
    assert_eq!(all, ["job0", "job1"]);
    let sources: Vec<_> = bound
        .binding
        .list_config(Some("source"))
        .into_iter()
        .map(Config::name)
        .collect();
    assert_eq!(sources, ["job1"]);
    assert!(bound.binding.list_config(Some("other")).is_empty());
}

#[rstest]
fn bindings_for_reports_configs_of_a_plugin(mut bound: Harness) {
    bound
        .binding
        .add(job("job2", "echo"), &plugins())
        .expect("add job2");
    bound
        .binding
        .add(job("job3", "mirror"), &plugins())
        .expect("add job3");

    assert_eq!(bound.binding.bindings_for("echo"), ["job1", "job2"]);
    assert_eq!(bound.binding.bindings_for("mirror"), ["job3"]);
    assert!(bound.binding.bindings_for("ghost").is_empty());
}

#[rstest]
fn configs_survive_reload(mut bound: Harness) {
    bound
        .binding
        .update("job1", params(json!({"depth": 2})), &plugins())
        .expect("update");

    let reloaded = bound.reloaded();

    assert_eq!(reloaded.get("job1"), bound.binding.get("job1"));
    assert_eq!(reloaded.list_config(None).len(), 1);
}

#[rstest]
#[case::mismatched_key("job9:\n  name: job1\n  type: source\n  plugin_name: echo\n")]
#[case::missing_plugin("job1:\n  name: job1\n  type: source\n")]
#[case::null_entry("job1: ~\n")]
fn load_store_rejects_malformed_entries(harness: Harness, #[case] table: &str) {
    fs::write(harness.layout().binding_state(), table).expect("seed table");
    let mut binding = PluginBinding::new(&harness.layout());

    let err = binding.load_store().expect_err("malformed");

    assert!(matches!(err, BindingError::InvalidConfig { .. }), "got {err}");
}
