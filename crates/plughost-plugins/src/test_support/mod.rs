//! In-memory doubles for fetching, launching, and calling plugins.
//!
//! A [`FakeCluster`] stands in for the operating system and the network at
//! once: [`FakeLauncher`] "starts" processes by marking their port as
//! listening, and [`FakeTransport`] answers RPC calls only on listening
//! ports. Tests can crash processes, make plugins refuse to become healthy,
//! and inspect every launch and call.
//!
//! Available to this crate's tests and, through the `test-support` feature,
//! to downstream crates.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;

use crate::error::PluginError;
use crate::fetch::Fetcher;
use crate::process::{PluginProcess, ProcessLauncher};
use crate::protocol::{HEALTH_API, RpcReply, RpcRequest};
use crate::runtime::{HealthPolicy, PluginRuntime};
use crate::transport::RpcTransport;

/// A launch recorded by [`FakeLauncher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    /// Executable that was started.
    pub binary: PathBuf,
    /// Plugin name passed with `--name`.
    pub plugin: String,
    /// Port passed with `--port`.
    pub port: u16,
    /// Fake process id.
    pub pid: u32,
}

/// A call recorded by [`FakeTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Plugin the call was addressed to.
    pub plugin: String,
    /// Destination port.
    pub port: u16,
    /// Request body.
    pub request: RpcRequest,
}

#[derive(Debug)]
struct FakeProcessEntry {
    port: u16,
    exit: Sender<Option<i32>>,
}

#[derive(Debug)]
struct ClusterState {
    next_pid: u32,
    processes: BTreeMap<u32, FakeProcessEntry>,
    listening: BTreeSet<u16>,
    unhealthy: BTreeSet<String>,
    replies: BTreeMap<String, RpcReply>,
    launches: Vec<Launch>,
    calls: Vec<Call>,
    terminated: Vec<u32>,
}

impl Default for ClusterState {
    fn default() -> Self {
        Self {
            next_pid: 1000,
            processes: BTreeMap::new(),
            listening: BTreeSet::new(),
            unhealthy: BTreeSet::new(),
            replies: BTreeMap::new(),
            launches: Vec::new(),
            calls: Vec::new(),
            terminated: Vec::new(),
        }
    }
}

impl ClusterState {
    fn end(&mut self, pid: u32, code: Option<i32>) -> bool {
        let Some(entry) = self.processes.remove(&pid) else {
            return false;
        };
        self.listening.remove(&entry.port);
        // A finished reaper has already dropped its receiver.
        entry.exit.send(code).unwrap_or_default();
        true
    }
}

/// Shared simulated process table and network.
#[derive(Debug, Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl FakeCluster {
    /// Creates an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Launcher whose processes live in this cluster.
    #[must_use]
    pub fn launcher(&self) -> FakeLauncher {
        FakeLauncher {
            cluster: self.clone(),
        }
    }

    /// Transport that reaches processes in this cluster.
    #[must_use]
    pub fn transport(&self) -> FakeTransport {
        FakeTransport {
            cluster: self.clone(),
        }
    }

    /// Runtime wired to this cluster and `fetcher`, with a fast health
    /// policy of three probes ten milliseconds apart.
    #[must_use]
    pub fn runtime(&self, fetcher: MapFetcher) -> PluginRuntime {
        PluginRuntime::new(
            Arc::new(fetcher),
            Arc::new(self.transport()),
            Arc::new(self.launcher()),
        )
        .with_health_policy(HealthPolicy::new(3, Duration::from_millis(10)))
    }

    /// Makes future launches of `plugin` never answer their health API.
    pub fn refuse_health(&self, plugin: &str) {
        self.lock().unhealthy.insert(plugin.to_owned());
    }

    /// Starts a listener on `port` that no launched process owns, as if a
    /// plugin from a previous host session were still running.
    pub fn listen(&self, port: u16) {
        self.lock().listening.insert(port);
    }

    /// Answers every call to `api` with `reply`.
    pub fn reply_with(&self, api: &str, reply: RpcReply) {
        self.lock().replies.insert(api.to_owned(), reply);
    }

    /// Makes the process `pid` exit with `code`. Returns whether it was
    /// running.
    #[must_use]
    pub fn crash(&self, pid: u32, code: i32) -> bool {
        self.lock().end(pid, Some(code))
    }

    /// Returns `true` while a process listens on `port`.
    #[must_use]
    pub fn is_listening(&self, port: u16) -> bool {
        self.lock().listening.contains(&port)
    }

    /// Returns `true` while the process `pid` runs.
    #[must_use]
    pub fn is_running(&self, pid: u32) -> bool {
        self.lock().processes.contains_key(&pid)
    }

    /// Every launch so far.
    #[must_use]
    pub fn launches(&self) -> Vec<Launch> {
        self.lock().launches.clone()
    }

    /// Every call so far, health probes included.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Process ids that received a termination request.
    #[must_use]
    pub fn terminated(&self) -> Vec<u32> {
        self.lock().terminated.clone()
    }
}

/// [`ProcessLauncher`] backed by a [`FakeCluster`].
#[derive(Debug, Clone)]
pub struct FakeLauncher {
    cluster: FakeCluster,
}

/// Process created by [`FakeLauncher`].
#[derive(Debug)]
pub struct FakeProcess {
    pid: u32,
    exit: Receiver<Option<i32>>,
}

impl PluginProcess for FakeProcess {
    fn id(&self) -> u32 {
        self.pid
    }

    fn wait(&mut self) -> io::Result<Option<i32>> {
        self.exit
            .recv()
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "fake process vanished"))
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(
        &self,
        binary: &Path,
        name: &str,
        port: u16,
    ) -> Result<Box<dyn PluginProcess>, PluginError> {
        let mut state = self.cluster.lock();
        let pid = state.next_pid;
        state.next_pid += 1;
        let (exit, receiver) = mpsc::channel();
        state.processes.insert(pid, FakeProcessEntry { port, exit });
        if !state.unhealthy.contains(name) {
            state.listening.insert(port);
        }
        state.launches.push(Launch {
            binary: binary.to_path_buf(),
            plugin: name.to_owned(),
            port,
            pid,
        });
        Ok(Box::new(FakeProcess {
            pid,
            exit: receiver,
        }))
    }

    fn terminate(&self, pid: u32) -> Result<(), PluginError> {
        let mut state = self.cluster.lock();
        state.terminated.push(pid);
        state.end(pid, None);
        Ok(())
    }
}

/// [`RpcTransport`] backed by a [`FakeCluster`].
///
/// Health probes succeed on listening ports. Other APIs answer with the
/// reply configured through [`FakeCluster::reply_with`], or echo the call
/// arguments back as `data`.
#[derive(Debug, Clone)]
pub struct FakeTransport {
    cluster: FakeCluster,
}

impl RpcTransport for FakeTransport {
    fn post(&self, plugin: &str, port: u16, request: &RpcRequest) -> Result<RpcReply, PluginError> {
        let mut state = self.cluster.lock();
        state.calls.push(Call {
            plugin: plugin.to_owned(),
            port,
            request: request.clone(),
        });
        if !state.listening.contains(&port) {
            return Err(PluginError::Call {
                name: plugin.to_owned(),
                api: request.api().to_owned(),
                message: format!("connection refused on port {port}"),
            });
        }
        if request.api() == HEALTH_API {
            return Ok(RpcReply::success(&Value::Null));
        }
        Ok(state.replies.get(request.api()).cloned().unwrap_or_else(|| {
            RpcReply::success(&Value::Object(request.kwargs().clone()))
        }))
    }
}

/// [`Fetcher`] serving fixed content by location.
#[derive(Debug, Clone, Default)]
pub struct MapFetcher {
    content: BTreeMap<String, Vec<u8>>,
}

impl MapFetcher {
    /// Creates a fetcher that knows no locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `bytes` at `location`.
    #[must_use]
    pub fn with(mut self, location: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.content.insert(location.into(), bytes.into());
        self
    }
}

impl Fetcher for MapFetcher {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, PluginError> {
        self.content
            .get(location)
            .cloned()
            .ok_or_else(|| PluginError::Fetch {
                location: location.to_owned(),
                message: String::from("http status 404"),
            })
    }
}
