//! Supervision of a single plugin process.
//!
//! A [`PluginInstance`] installs its plugin's executable on demand, launches
//! it on a free loopback port, waits for it to answer the health API, and
//! routes RPC calls to it. The port is persisted in the instance's section of
//! the plugin state file so a restarted host can find plugins that are still
//! running.
//!
//! Every launch spawns a reaper thread that waits for the process to exit.
//! When it does, the reaper marks the process as gone and clears the
//! persisted port, provided the port still belongs to that process.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use plughost_config::StorageLayout;
use plughost_store::{StoreError, YamlDocument, YamlSection, write_atomic};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::definition::{Definition, Params};
use crate::error::PluginError;
use crate::port::free_local_port;
use crate::process::PluginProcess;
use crate::protocol::{HEALTH_API, RpcRequest};
use crate::runtime::PluginRuntime;

const INSTANCE_TARGET: &str = "plughost_plugins::instance";

/// Permission bits for installed plugin executables.
const BINARY_MODE: u32 = 0o755;

/// Persisted per-plugin state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    /// Port the plugin listens on, or `None` when it is not running.
    #[serde(default)]
    pub port: Option<u16>,
}

/// The instance's state section, shared with its reaper thread.
///
/// `launch` counts launches so a reaper only ever releases the port
/// persisted by its own launch, even if the operating system hands the same
/// port out again.
#[derive(Debug)]
struct StateSlot {
    section: YamlSection,
    launch: u64,
}

impl StateSlot {
    fn port(&self) -> Result<Option<u16>, StoreError> {
        Ok(self
            .section
            .read::<InstanceState>()?
            .and_then(|state| state.port))
    }

    fn set_port(&self, port: Option<u16>) -> Result<(), StoreError> {
        self.section.write(&InstanceState { port })
    }

    /// Records a new launch on `port` and returns its sequence number.
    fn claim(&mut self, port: u16) -> Result<u64, StoreError> {
        self.set_port(Some(port))?;
        self.launch += 1;
        Ok(self.launch)
    }

    /// Clears the port if it still belongs to `launch`. Returns whether it
    /// did.
    fn release(&self, launch: u64, port: u16) -> Result<bool, StoreError> {
        if self.launch != launch || self.port()? != Some(port) {
            return Ok(false);
        }
        self.set_port(None)?;
        Ok(true)
    }
}

/// Handle on the process started by the last successful launch.
#[derive(Debug)]
struct ProcessHandle {
    pid: u32,
    port: u16,
    exited: Arc<AtomicBool>,
}

impl ProcessHandle {
    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}

/// Supervisor for one plugin process.
#[derive(Debug)]
pub struct PluginInstance {
    definition: Definition,
    binary_path: PathBuf,
    slot: Arc<Mutex<StateSlot>>,
    process: Option<ProcessHandle>,
    runtime: PluginRuntime,
}

impl PluginInstance {
    /// Binds a supervisor to `definition`, storing its port in the section of
    /// `state` named after the plugin.
    #[must_use]
    pub fn new(
        definition: Definition,
        layout: &StorageLayout,
        state: &YamlDocument,
        runtime: PluginRuntime,
    ) -> Self {
        let binary_path = layout.binary_path(definition.name());
        let section = state.section(definition.name());
        Self {
            definition,
            binary_path,
            slot: Arc::new(Mutex::new(StateSlot { section, launch: 0 })),
            process: None,
            runtime,
        }
    }

    /// Plugin name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.definition.name()
    }

    /// Definition this instance runs.
    #[must_use]
    pub const fn definition(&self) -> &Definition {
        &self.definition
    }

    /// Location of the installed executable.
    #[must_use]
    pub fn binary_path(&self) -> &Path {
        self.binary_path.as_path()
    }

    /// Persisted port, if the plugin is believed to be running.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Store`] if the state file cannot be read.
    pub fn port(&self) -> Result<Option<u16>, PluginError> {
        Ok(self.lock_slot().port()?)
    }

    /// Process id of the process this supervisor launched, while it runs.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.process
            .as_ref()
            .filter(|handle| !handle.has_exited())
            .map(|handle| handle.pid)
    }

    /// Starts the plugin unless it is already running and healthy.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::StartFailed`] if the binary cannot be
    /// installed, the process cannot be launched, or it never becomes
    /// healthy. The persisted port is reset and the process terminated
    /// before the error is returned.
    pub fn enable(&mut self) -> Result<(), PluginError> {
        if let Some(port) = self.port()? {
            if self.probe(port).is_ok() {
                info!(
                    target: INSTANCE_TARGET,
                    plugin = self.name(),
                    port,
                    "plugin already running"
                );
                return Ok(());
            }
            // Nothing answers on the persisted port, so it must not outlive
            // a failed relaunch.
            info!(
                target: INSTANCE_TARGET,
                plugin = self.name(),
                port,
                "discarding stale port"
            );
            self.lock_slot().set_port(None)?;
        }

        let binary = self.ensure_binary()?;
        let port = free_local_port().map_err(|source| PluginError::StartFailed {
            name: self.name().to_owned(),
            message: String::from("no free local port"),
            source: Some(Arc::new(source)),
        })?;
        let process = self.runtime.launcher().launch(&binary, self.name(), port)?;
        let pid = process.id();
        info!(
            target: INSTANCE_TARGET,
            plugin = self.name(),
            pid,
            port,
            "plugin process launched"
        );

        let claimed = self.lock_slot().claim(port);
        let launch = match claimed {
            Ok(launch) => launch,
            Err(error) => {
                self.terminate(pid);
                return Err(error.into());
            }
        };
        let exited = Arc::new(AtomicBool::new(false));
        if let Err(source) = self.spawn_reaper(process, launch, port, Arc::clone(&exited)) {
            self.revert_port();
            self.terminate(pid);
            return Err(PluginError::StartFailed {
                name: self.name().to_owned(),
                message: String::from("failed to spawn reaper thread"),
                source: Some(Arc::new(source)),
            });
        }
        self.process = Some(ProcessHandle { pid, port, exited });

        match self.await_health(port) {
            Ok(()) => {
                info!(
                    target: INSTANCE_TARGET,
                    plugin = self.name(),
                    port,
                    "plugin is healthy"
                );
                Ok(())
            }
            Err(reason) => {
                warn!(
                    target: INSTANCE_TARGET,
                    plugin = self.name(),
                    port,
                    reason = %reason,
                    "plugin failed to start"
                );
                self.revert_port();
                if let Some(handle) = self.process.take()
                    && !handle.has_exited()
                {
                    self.terminate(handle.pid);
                }
                Err(PluginError::start_failed(self.name(), reason))
            }
        }
    }

    /// Marks the plugin as stopped and asks its process to terminate.
    ///
    /// The persisted port is cleared first. Termination is requested without
    /// waiting for the process to exit; a failure to signal is logged.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Store`] if the state file cannot be updated.
    pub fn disable(&mut self) -> Result<(), PluginError> {
        self.lock_slot().set_port(None)?;
        if let Some(handle) = self.process.take() {
            if handle.has_exited() {
                debug!(
                    target: INSTANCE_TARGET,
                    plugin = self.name(),
                    pid = handle.pid,
                    port = handle.port,
                    "plugin process already exited"
                );
            } else {
                self.terminate(handle.pid);
            }
        }
        info!(target: INSTANCE_TARGET, plugin = self.name(), "plugin disabled");
        Ok(())
    }

    /// Invokes `api` with `kwargs` and returns the plugin's `data`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotEnabled`] when no port is persisted and
    /// [`PluginError::Call`] when delivery fails or the plugin reports a
    /// failure.
    pub fn call_api(&self, api: &str, kwargs: &Params) -> Result<Value, PluginError> {
        let port = self.port()?.ok_or_else(|| PluginError::NotEnabled {
            name: self.name().to_owned(),
        })?;
        self.post(port, &RpcRequest::new(api, kwargs.clone()))
    }

    /// Returns `true` if the plugin answers its health API.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.call_api(HEALTH_API, &Params::new())
            .inspect_err(|error| {
                warn!(
                    target: INSTANCE_TARGET,
                    plugin = self.name(),
                    error = %error,
                    "health check failed"
                );
            })
            .is_ok()
    }

    fn post(&self, port: u16, request: &RpcRequest) -> Result<Value, PluginError> {
        let reply = self
            .runtime
            .transport()
            .post(self.name(), port, request)?;
        reply.into_data(self.name(), request.api())
    }

    fn probe(&self, port: u16) -> Result<Value, PluginError> {
        self.post(port, &RpcRequest::health())
    }

    fn await_health(&self, port: u16) -> Result<(), String> {
        let policy = self.runtime.health();
        let cancel = self.runtime.cancel_token();
        for attempt in 1..=policy.attempts() {
            if cancel.is_cancelled() {
                return Err(String::from("cancelled"));
            }
            if self
                .process
                .as_ref()
                .is_some_and(ProcessHandle::has_exited)
            {
                return Err(String::from("process exited during startup"));
            }
            match self.probe(port) {
                Ok(_) => return Ok(()),
                Err(error) => debug!(
                    target: INSTANCE_TARGET,
                    plugin = self.name(),
                    attempt,
                    error = %error,
                    "health probe failed"
                ),
            }
            if attempt < policy.attempts() && cancel.wait_timeout(policy.interval()) {
                return Err(String::from("cancelled"));
            }
        }
        Err(format!(
            "no healthy response after {} attempts",
            policy.attempts()
        ))
    }

    fn ensure_binary(&self) -> Result<PathBuf, PluginError> {
        let path = self.binary_path.clone();
        if path.is_file() {
            return Ok(path);
        }
        let Some(location) = self.definition.binary() else {
            return Err(PluginError::start_failed(
                self.name(),
                "no executable is installed and the manifest declares no binary",
            ));
        };
        info!(
            target: INSTANCE_TARGET,
            plugin = self.name(),
            location,
            "installing plugin binary"
        );
        let bytes = self
            .runtime
            .fetcher()
            .fetch(location)
            .map_err(|error| PluginError::start_failed(self.name(), error.to_string()))?;
        self.install(&path, &bytes)
            .map_err(|source| PluginError::StartFailed {
                name: self.name().to_owned(),
                message: format!("failed to install {}", path.display()),
                source: Some(Arc::new(source)),
            })?;
        Ok(path)
    }

    fn install(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => debug!(
                target: INSTANCE_TARGET,
                plugin = self.name(),
                "removed previous binary"
            ),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => return Err(error),
        }
        write_atomic(path, bytes, BINARY_MODE)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(BINARY_MODE))?;
        }
        Ok(())
    }

    fn spawn_reaper(
        &self,
        mut process: Box<dyn PluginProcess>,
        launch: u64,
        port: u16,
        exited: Arc<AtomicBool>,
    ) -> io::Result<()> {
        let slot = Arc::clone(&self.slot);
        let plugin = self.name().to_owned();
        thread::Builder::new()
            .name(format!("plughost-reaper-{plugin}"))
            .spawn(move || {
                let status = process.wait();
                exited.store(true, Ordering::SeqCst);
                match status {
                    Ok(code) => info!(
                        target: INSTANCE_TARGET,
                        plugin = %plugin,
                        exit_code = ?code,
                        "plugin process exited"
                    ),
                    Err(error) => warn!(
                        target: INSTANCE_TARGET,
                        plugin = %plugin,
                        error = %error,
                        "failed to wait for plugin process"
                    ),
                }
                let released = slot
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .release(launch, port);
                match released {
                    Ok(true) => info!(
                        target: INSTANCE_TARGET,
                        plugin = %plugin,
                        port,
                        "cleared port of exited plugin"
                    ),
                    Ok(false) => {}
                    Err(error) => warn!(
                        target: INSTANCE_TARGET,
                        plugin = %plugin,
                        error = %error,
                        "failed to clear port of exited plugin"
                    ),
                }
            })?;
        Ok(())
    }

    fn revert_port(&self) {
        if let Err(error) = self.lock_slot().set_port(None) {
            warn!(
                target: INSTANCE_TARGET,
                plugin = self.name(),
                error = %error,
                "failed to reset persisted port"
            );
        }
    }

    fn terminate(&self, pid: u32) {
        if let Err(error) = self.runtime.launcher().terminate(pid) {
            warn!(
                target: INSTANCE_TARGET,
                plugin = self.name(),
                pid,
                error = %error,
                "failed to terminate plugin process"
            );
        }
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, StateSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
