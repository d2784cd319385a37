//! Wire types for host-to-plugin RPC.
//!
//! The host POSTs a JSON object to `http://localhost:<port>/`. The `api`
//! field names the operation and every other field is an argument:
//!
//! ```json
//! {"api": "search", "keyword": "ubuntu"}
//! ```
//!
//! The plugin answers with an envelope. Only HTTP 200 carrying `code: 200`
//! counts as success; `msg` explains any other code.
//!
//! ```json
//! {"code": 200, "data": ["..."]}
//! {"code": 500, "msg": "upstream unavailable"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::definition::Params;
use crate::error::PluginError;

/// Reserved zero-argument API used for liveness probes.
pub const HEALTH_API: &str = "_health";

/// Envelope and HTTP status code signalling success.
pub const SUCCESS_CODE: i64 = 200;

/// Request body sent to a plugin.
///
/// # Example
///
/// ```
/// use plughost_plugins::{Params, RpcRequest};
///
/// let mut kwargs = Params::new();
/// kwargs.insert("keyword".into(), "ubuntu".into());
/// let request = RpcRequest::new("search", kwargs);
///
/// let body = serde_json::to_value(&request).unwrap();
/// assert_eq!(body["api"], "search");
/// assert_eq!(body["keyword"], "ubuntu");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    api: String,
    #[serde(flatten)]
    kwargs: Params,
}

impl RpcRequest {
    /// Builds a request. An `api` key inside `kwargs` is discarded so the
    /// body always names the requested API.
    #[must_use]
    pub fn new(api: impl Into<String>, mut kwargs: Params) -> Self {
        kwargs.remove("api");
        Self {
            api: api.into(),
            kwargs,
        }
    }

    /// Builds the liveness probe.
    #[must_use]
    pub fn health() -> Self {
        Self::new(HEALTH_API, Params::new())
    }

    /// Requested API.
    #[must_use]
    pub const fn api(&self) -> &str {
        self.api.as_str()
    }

    /// Call arguments.
    #[must_use]
    pub const fn kwargs(&self) -> &Params {
        &self.kwargs
    }
}

/// Raw HTTP-level answer from a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcReply {
    status: u16,
    body: Vec<u8>,
}

impl RpcReply {
    /// Wraps an HTTP status and body.
    #[must_use]
    pub const fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Builds a successful reply carrying `data`.
    #[must_use]
    pub fn success(data: &Value) -> Self {
        let body = serde_json::json!({ "code": SUCCESS_CODE, "data": data });
        Self::new(200, body.to_string().into_bytes())
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Interprets the reply, returning the envelope's `data` on success.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Call`] when the HTTP status is not 200, the body
    /// is not an envelope, or the envelope code is not 200.
    pub fn into_data(self, plugin: &str, api: &str) -> Result<Value, PluginError> {
        let call_error = |message: String| PluginError::Call {
            name: plugin.to_owned(),
            api: api.to_owned(),
            message,
        };
        if i64::from(self.status) != SUCCESS_CODE {
            return Err(call_error(format!("http status {}", self.status)));
        }
        let envelope: RpcEnvelope = serde_json::from_slice(&self.body)
            .map_err(|error| call_error(format!("invalid response envelope: {error}")))?;
        envelope.into_result().map_err(call_error)
    }
}

/// JSON envelope returned by a plugin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcEnvelope {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    msg: Option<String>,
}

impl RpcEnvelope {
    /// Returns `true` when `code` is 200.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == Some(SUCCESS_CODE)
    }

    /// Plugin-supplied failure message.
    #[must_use]
    pub fn msg(&self) -> Option<&str> {
        self.msg.as_deref()
    }

    /// Splits the envelope into its payload or a failure description.
    ///
    /// # Errors
    ///
    /// Returns the plugin's `msg`, or a description of the code, when the
    /// envelope does not signal success.
    pub fn into_result(self) -> Result<Value, String> {
        if self.is_success() {
            return Ok(self.data);
        }
        let code = self
            .code
            .map_or_else(|| String::from("missing"), |code| code.to_string());
        Err(self.msg.map_or_else(
            || format!("code {code}"),
            |msg| format!("code {code}: {msg}"),
        ))
    }
}
