//! Plugin lifecycle management for the plugin host.
//!
//! Plugins are long-running local HTTP services shipped as standalone
//! executables. Each one is described by a YAML manifest (a
//! [`Definition`]) naming the plugin, the location of its executable, and
//! the arguments that configs bound to it must carry.
//!
//! # Architecture
//!
//! - [`DefinitionRegistry`] holds every registered manifest.
//! - [`PluginInstance`] supervises one plugin process: it installs the
//!   executable on demand, launches it on a free loopback port, polls its
//!   health API, and routes RPC calls to it.
//! - [`PluginManager`] ties both together, persists manifests and ports
//!   under the configured storage root, and restores running plugins when the
//!   host restarts.
//!
//! Fetching, launching, and RPC delivery sit behind the [`Fetcher`],
//! [`ProcessLauncher`], and [`RpcTransport`] traits, bundled into a
//! [`PluginRuntime`]. The `test-support` feature exposes in-memory
//! implementations of all three.
//!
//! # Example
//!
//! ```rust,no_run
//! use plughost_config::Config;
//! use plughost_plugins::{Params, PluginManager, PluginRuntime};
//!
//! # fn main() -> Result<(), plughost_plugins::PluginError> {
//! let config = Config::default();
//! let mut manager =
//!     PluginManager::new(config.storage_layout(), PluginRuntime::system(&config)?);
//! manager.load_local()?;
//! manager.enable("echo")?;
//! let reply = manager.call("echo", "search", &Params::new())?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod definition;
pub mod error;
pub mod fetch;
pub mod instance;
pub mod manager;
pub mod port;
pub mod process;
pub mod protocol;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

#[cfg(test)]
mod tests;

pub use self::cancel::CancelToken;
pub use self::definition::{
    ArgumentSpec, ArgumentType, Definition, Params, ValidationError, Violation,
};
pub use self::error::PluginError;
pub use self::fetch::{Fetcher, HttpFetcher};
pub use self::instance::{InstanceState, PluginInstance};
pub use self::manager::PluginManager;
pub use self::process::{PluginProcess, ProcessLauncher, SystemLauncher};
pub use self::protocol::{HEALTH_API, RpcEnvelope, RpcReply, RpcRequest};
pub use self::registry::DefinitionRegistry;
pub use self::resolver::{BindingInspector, NoBindings, PluginResolver};
pub use self::runtime::{HealthPolicy, PluginRuntime};
pub use self::transport::{HttpTransport, RpcTransport};
