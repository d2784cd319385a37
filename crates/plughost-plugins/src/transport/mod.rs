//! HTTP transport carrying RPC requests to plugin processes.
//!
//! The [`RpcTransport`] trait abstracts delivery so lifecycle code can be
//! tested without real plugins. [`HttpTransport`] is the production
//! implementation: a blocking `reqwest` client that POSTs JSON to
//! `http://localhost:<port>/`.

use std::time::Duration;

use tracing::debug;

use crate::error::PluginError;
use crate::protocol::{RpcReply, RpcRequest};

const TRANSPORT_TARGET: &str = "plughost_plugins::transport";

/// Delivers a request to the plugin listening on `port`.
pub trait RpcTransport: Send + Sync {
    /// Sends `request` to `plugin` and returns the raw HTTP reply.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Call`] when the plugin cannot be reached or the
    /// body cannot be read.
    fn post(&self, plugin: &str, port: u16, request: &RpcRequest) -> Result<RpcReply, PluginError>;
}

/// Blocking HTTP/JSON transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    host: String,
}

impl HttpTransport {
    /// Builds a transport applying `timeout` to every request.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Call`] if the HTTP client cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, PluginError> {
        Self::with_host("localhost", timeout)
    }

    /// Builds a transport addressing plugins on `host` instead of
    /// `localhost`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Call`] if the HTTP client cannot be initialised.
    pub fn with_host(host: impl Into<String>, timeout: Duration) -> Result<Self, PluginError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| PluginError::Call {
                name: String::from("<transport>"),
                api: String::new(),
                message: format!("failed to build http client: {error}"),
            })?;
        Ok(Self {
            client,
            host: host.into(),
        })
    }

    fn endpoint(&self, port: u16) -> String {
        format!("http://{}:{port}/", self.host)
    }
}

impl RpcTransport for HttpTransport {
    fn post(&self, plugin: &str, port: u16, request: &RpcRequest) -> Result<RpcReply, PluginError> {
        let endpoint = self.endpoint(port);
        let call_error = |message: String| PluginError::Call {
            name: plugin.to_owned(),
            api: request.api().to_owned(),
            message,
        };
        debug!(
            target: TRANSPORT_TARGET,
            plugin,
            port,
            api = request.api(),
            "posting plugin request"
        );
        let response = self
            .client
            .post(&endpoint)
            .json(request)
            .send()
            .map_err(|error| call_error(format!("request to {endpoint} failed: {error}")))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|error| call_error(format!("failed to read response body: {error}")))?;
        debug!(
            target: TRANSPORT_TARGET,
            port,
            status,
            response_bytes = body.len(),
            "plugin replied"
        );
        Ok(RpcReply::new(status, body.to_vec()))
    }
}
