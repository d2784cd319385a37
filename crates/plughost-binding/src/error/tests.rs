//! Unit tests for binding error types.

use plughost_plugins::{ArgumentSpec, ArgumentType, Definition, Params};

use super::*;

#[test]
fn validation_errors_keep_plugin_context() {
    let definition =
        Definition::new("echo").with_argument("url", ArgumentSpec::required(ArgumentType::Text));
    let rejection = definition
        .validate(&Params::new())
        .expect_err("url is required");

    let error = BindingError::from(rejection);

    let message = error.to_string();
    assert!(message.contains("echo"), "expected plugin in: {message}");
    assert!(message.contains("url"), "expected argument in: {message}");
    assert!(matches!(error, BindingError::Validation(_)));
}

#[test]
fn invalid_config_describes_the_field() {
    let error = BindingError::invalid("missing required field 'name'");
    assert_eq!(
        error.to_string(),
        "invalid config: missing required field 'name'"
    );
}
