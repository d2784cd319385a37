//! Retrieval of plugin manifests and executables.
//!
//! A location is an `http`/`https` URL, a `file://` URL, or a plain local
//! path. The [`Fetcher`] trait lets lifecycle code be tested against
//! in-memory content.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::PluginError;

const FETCH_TARGET: &str = "plughost_plugins::fetch";

/// Resolves a location to its bytes.
pub trait Fetcher: Send + Sync {
    /// Downloads or reads the content at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Fetch`] if the location is unsupported,
    /// unreachable, or answers with a non-success status.
    fn fetch(&self, location: &str) -> Result<Vec<u8>, PluginError>;
}

/// Where a location string points.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Remote(Url),
    Local(PathBuf),
}

fn classify(location: &str) -> Result<Source, PluginError> {
    let fetch_error = |message: String| PluginError::Fetch {
        location: location.to_owned(),
        message,
    };
    let url = match Url::parse(location) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            return Ok(Source::Local(PathBuf::from(location)));
        }
        Err(error) => return Err(fetch_error(format!("invalid location: {error}"))),
    };
    match url.scheme() {
        "http" | "https" => Ok(Source::Remote(url)),
        "file" => url
            .to_file_path()
            .map(Source::Local)
            .map_err(|()| fetch_error(String::from("file url has no local path"))),
        // Windows drive letters parse as single-letter schemes.
        scheme if scheme.len() == 1 => Ok(Source::Local(PathBuf::from(location))),
        scheme => Err(fetch_error(format!("unsupported scheme '{scheme}'"))),
    }
}

/// Production fetcher backed by a blocking `reqwest` client and the local
/// filesystem.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Builds a fetcher applying `timeout` to every download.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Fetch`] if the HTTP client cannot be
    /// initialised.
    pub fn new(timeout: Duration) -> Result<Self, PluginError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| PluginError::Fetch {
                location: String::new(),
                message: format!("failed to build http client: {error}"),
            })?;
        Ok(Self { client })
    }

    fn download(&self, location: &str, url: Url) -> Result<Vec<u8>, PluginError> {
        let fetch_error = |message: String| PluginError::Fetch {
            location: location.to_owned(),
            message,
        };
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|error| fetch_error(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("http status {}", status.as_u16())));
        }
        let bytes = response
            .bytes()
            .map_err(|error| fetch_error(format!("failed to read body: {error}")))?;
        Ok(bytes.to_vec())
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, PluginError> {
        let source = classify(location)?;
        debug!(target: FETCH_TARGET, location, "fetching");
        let bytes = match source {
            Source::Remote(url) => self.download(location, url)?,
            Source::Local(path) => fs::read(&path).map_err(|error| PluginError::Fetch {
                location: location.to_owned(),
                message: format!("failed to read {}: {error}", path.display()),
            })?,
        };
        debug!(
            target: FETCH_TARGET,
            location,
            bytes = bytes.len(),
            "fetched"
        );
        Ok(bytes)
    }
}
