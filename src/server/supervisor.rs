//! The process supervisor: lifecycle, packet dispatch and requests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::stdio::{read_lines, write_lines, StdinSink};
use super::{
    resolve_launch_path, InstalledVersionResolver, InvalidTransition, ProcessTree,
    ServerArgsBuilder, ServerState, ServerStateMachine, SupervisorError, SystemProcessTree,
    VersionResolver,
};
use crate::config::ServerOptions;
use crate::events::{EventBus, LaunchInfo, ServerEvent, WorkerEvent};
use crate::launcher::{
    BoxedReader, LaunchRequest, LaunchResult, Launcher, Platform, PlatformLauncher, ServerProcess,
};
use crate::protocol::{parse_packet, EventPacket, LogRecord, Packet, ParseError, ResponsePacket};
use crate::queue::{Request, RequestError, RequestQueueCollection};
use crate::telemetry::{DelayTrackers, TELEMETRY_REPORTING_DELAY};
use crate::workspace::{find_launch_targets, wait_for_project_file, LaunchTarget};

/// How long a stopped server gets to exit before it is killed.
pub const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of [`ProcessSupervisor::auto_start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoStart {
    /// The server was started against this target.
    Started(LaunchTarget),
    /// Several targets were found and none matched the preferred path.
    MultipleLaunchTargets(Vec<LaunchTarget>),
}

/// Builder for [`ProcessSupervisor`].
pub struct ProcessSupervisorBuilder {
    options: ServerOptions,
    workspace_root: PathBuf,
    platform: Platform,
    host_pid: u32,
    launcher: Option<Arc<dyn Launcher>>,
    process_tree: Option<Arc<dyn ProcessTree>>,
    resolver: Option<Arc<dyn VersionResolver>>,
}

impl ProcessSupervisorBuilder {
    #[must_use]
    pub fn launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    #[must_use]
    pub fn process_tree(mut self, process_tree: Arc<dyn ProcessTree>) -> Self {
        self.process_tree = Some(process_tree);
        self
    }

    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn VersionResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// PID passed to the server with `--hostPID`.
    #[must_use]
    pub fn host_pid(mut self, pid: u32) -> Self {
        self.host_pid = pid;
        self
    }

    #[must_use]
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    #[must_use]
    pub fn build(self) -> ProcessSupervisor {
        let stdin = Arc::new(StdinSink::new());
        let queue = RequestQueueCollection::new(self.options.concurrency, stdin.clone());
        let resolver = self.resolver.unwrap_or_else(|| {
            Arc::new(InstalledVersionResolver::new(
                self.options.install_root(),
                self.platform,
            ))
        });
        let (started, _) = watch::channel(false);

        ProcessSupervisor {
            inner: Arc::new(Inner {
                workspace_root: self.workspace_root,
                platform: self.platform,
                host_pid: self.host_pid,
                launcher: self.launcher.unwrap_or_else(|| Arc::new(PlatformLauncher::new())),
                process_tree: self.process_tree.unwrap_or_else(|| Arc::new(SystemProcessTree)),
                resolver,
                bus: EventBus::default(),
                state: Mutex::new(ServerStateMachine::new()),
                queue,
                stdin,
                next_seq: AtomicU64::new(1),
                generation: AtomicU64::new(0),
                delays: Mutex::new(DelayTrackers::new()),
                started,
                process: tokio::sync::Mutex::new(None),
                launch_target: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
                connect_cancel: Mutex::new(CancellationToken::new()),
                lifecycle: tokio::sync::Mutex::new(()),
                options: self.options,
            }),
        }
    }
}

struct Inner {
    options: ServerOptions,
    workspace_root: PathBuf,
    platform: Platform,
    host_pid: u32,
    launcher: Arc<dyn Launcher>,
    process_tree: Arc<dyn ProcessTree>,
    resolver: Arc<dyn VersionResolver>,
    bus: EventBus,
    state: Mutex<ServerStateMachine>,
    queue: RequestQueueCollection,
    stdin: Arc<StdinSink>,
    next_seq: AtomicU64,
    /// Incremented on every launch; background tasks carry the value they
    /// were spawned for.
    generation: AtomicU64,
    delays: Mutex<DelayTrackers>,
    /// Set once the current server reports `started`.
    started: watch::Sender<bool>,
    process: tokio::sync::Mutex<Option<ServerProcess>>,
    launch_target: Mutex<Option<LaunchTarget>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    connect_cancel: Mutex<CancellationToken>,
    /// Serializes start, stop and restart.
    lifecycle: tokio::sync::Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns one analysis server for a workspace.
///
/// Cloning is cheap; clones share the same server.
#[derive(Clone)]
pub struct ProcessSupervisor {
    inner: Arc<Inner>,
}

impl ProcessSupervisor {
    /// Start configuring a supervisor for `workspace_root`.
    #[must_use]
    pub fn builder(options: ServerOptions, workspace_root: impl Into<PathBuf>) -> ProcessSupervisorBuilder {
        ProcessSupervisorBuilder {
            options,
            workspace_root: workspace_root.into(),
            platform: Platform::current(),
            host_pid: std::process::id(),
            launcher: None,
            process_tree: None,
            resolver: None,
        }
    }

    /// A supervisor using the platform launcher and process tree.
    #[must_use]
    pub fn new(options: ServerOptions, workspace_root: impl Into<PathBuf>) -> Self {
        Self::builder(options, workspace_root).build()
    }

    fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn state(&self) -> ServerState {
        lock(&self.inner.state).state()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Started
    }

    /// Target of the current or most recent start.
    #[must_use]
    pub fn launch_target(&self) -> Option<LaunchTarget> {
        lock(&self.inner.launch_target).clone()
    }

    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        &self.inner.workspace_root
    }

    #[must_use]
    pub fn options(&self) -> &ServerOptions {
        &self.inner.options
    }

    /// Receive every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.inner.bus.subscribe()
    }

    #[must_use]
    pub fn queue(&self) -> &RequestQueueCollection {
        &self.inner.queue
    }

    fn publish(&self, event: ServerEvent) {
        self.inner.bus.publish(event);
    }

    fn transition(&self, to: ServerState) -> Result<(), InvalidTransition> {
        {
            let mut machine = lock(&self.inner.state);
            if machine.state() == to {
                return Ok(());
            }
            machine.transition(to)?;
        }
        self.publish(ServerEvent::StateChanged(to));
        Ok(())
    }

    /// Launch the server against `target` and wait for it to report `started`.
    ///
    /// On failure the server is stopped and a `ServerError` event is published.
    ///
    /// # Errors
    ///
    /// Returns an error if a server is already running, the executable cannot be
    /// resolved or launched, or the server does not start within the project
    /// load timeout.
    pub async fn start(&self, target: LaunchTarget) -> Result<(), SupervisorError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.start_locked(target).await
    }

    /// Stop any running server, then start against `target` (or the last
    /// target when `None`).
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`start`](Self::start); with no target at all
    /// this is [`SupervisorError::NoLaunchTarget`].
    pub async fn restart(&self, target: Option<LaunchTarget>) -> Result<(), SupervisorError> {
        let target = target
            .or_else(|| self.launch_target())
            .ok_or(SupervisorError::NoLaunchTarget)?;
        lock(&self.inner.connect_cancel).cancel();
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.stop_locked().await;
        self.start_locked(target).await
    }

    async fn start_locked(&self, target: LaunchTarget) -> Result<(), SupervisorError> {
        let state = self.state();
        if state != ServerState::Stopped {
            return Err(SupervisorError::AlreadyRunning(state));
        }

        let cancel = CancellationToken::new();
        *lock(&self.inner.connect_cancel) = cancel.clone();

        match self.launch(target, &cancel).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if !matches!(e, SupervisorError::StoppedWhileStarting) {
                    tracing::error!(error = %e, "Failed to start OmniSharp server");
                    self.publish(ServerEvent::ServerError(e.to_string()));
                }
                self.stop_locked().await;
                Err(e)
            }
        }
    }

    async fn launch(&self, target: LaunchTarget, cancel: &CancellationToken) -> Result<(), SupervisorError> {
        let inner = &self.inner;
        self.transition(ServerState::Starting)?;
        *lock(&inner.launch_target) = Some(target.clone());

        let args = ServerArgsBuilder::new(&target.target, inner.host_pid)
            .with_options(&inner.options)
            .build_args();
        let launch_path =
            resolve_launch_path(&inner.options, inner.resolver.as_ref(), inner.platform).await?;

        self.publish(ServerEvent::BeforeServerStart(target.target.clone()));
        tracing::info!(
            target = %target.target.display(),
            path = %launch_path.display(),
            "Starting OmniSharp server"
        );

        let request = LaunchRequest {
            cwd: target.directory.clone(),
            args,
            launch_path,
            use_mono: inner.options.use_mono,
        };
        let LaunchResult {
            mut process,
            command,
            args,
            using_mono,
        } = inner.launcher.launch(&request).await?;

        let pid = process.id();
        tracing::info!(pid, %command, using_mono, "OmniSharp server launched");
        self.publish(ServerEvent::ServerLaunched(LaunchInfo {
            command,
            args,
            pid,
            using_mono,
        }));

        let stdin = process.take_stdin();
        let stdout = process.take_stdout();
        let stderr = process.take_stderr();
        *inner.process.lock().await = Some(process);
        let stdin = stdin.ok_or(SupervisorError::MissingStream("stdin"))?;
        let stdout = stdout.ok_or(SupervisorError::MissingStream("stdout"))?;

        let generation = inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        inner.started.send_replace(false);
        let mut started = inner.started.subscribe();
        lock(&inner.delays).reset();

        let (tx, rx) = mpsc::unbounded_channel();
        inner.stdin.attach(tx);
        {
            let weak = Arc::downgrade(inner);
            let mut tasks = lock(&inner.tasks);
            tasks.push(tokio::spawn(write_lines(stdin, rx)));
            tasks.push(tokio::spawn(read_stdout(weak.clone(), stdout, generation)));
            if let Some(stderr) = stderr {
                tasks.push(tokio::spawn(read_stderr(weak.clone(), stderr)));
            }
            tasks.push(tokio::spawn(flush_telemetry_periodically(weak)));
        }

        self.transition(ServerState::Started)?;
        self.publish(ServerEvent::ServerStart(target.target.clone()));

        self.wait_for_started(&mut started, cancel).await?;
        tracing::info!(pid, "OmniSharp server started");
        inner.queue.drain();
        Ok(())
    }

    async fn wait_for_started(
        &self,
        started: &mut watch::Receiver<bool>,
        cancel: &CancellationToken,
    ) -> Result<(), SupervisorError> {
        let timeout = self.inner.options.project_load_timeout();
        tokio::select! {
            () = cancel.cancelled() => Err(SupervisorError::StoppedWhileStarting),
            result = tokio::time::timeout(timeout, started.wait_for(|started| *started)) => match result {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(_)) => Err(SupervisorError::StoppedWhileStarting),
                Err(_) => Err(SupervisorError::ProjectLoadTimeout {
                    secs: timeout.as_secs(),
                }),
            },
        }
    }

    /// Stop the server.
    ///
    /// Cancels a start that is still waiting for the server, terminates the
    /// process tree, rejects outstanding requests with
    /// [`RequestError::ServerStopped`] and publishes `ServerStop`. Calling it
    /// on a stopped server publishes nothing.
    pub async fn stop(&self) {
        lock(&self.inner.connect_cancel).cancel();
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.stop_locked().await;
    }

    async fn stop_locked(&self) {
        let inner = &self.inner;
        for task in lock(&inner.tasks).drain(..) {
            task.abort();
        }
        self.flush_telemetry();
        inner.stdin.detach();

        let process = inner.process.lock().await.take();
        let already_stopped = process.is_none() && self.state() == ServerState::Stopped;
        if let Some(process) = process {
            if let Some(pid) = process.id() {
                tracing::info!(pid, "Stopping OmniSharp server");
                // The process may already be gone; nothing else to clean up.
                if let Err(e) = inner.process_tree.terminate(pid).await {
                    tracing::warn!(pid, error = %e, "Failed to terminate server process tree");
                }
            }
            tokio::spawn(async move {
                if let Err(e) = process.reap(REAP_TIMEOUT).await {
                    tracing::debug!(error = %e, "Failed to reap server process");
                }
            });
        }

        inner.queue.abandon_all();
        if already_stopped {
            tracing::debug!("Server already stopped");
            return;
        }
        if let Err(e) = self.transition(ServerState::Stopped) {
            tracing::warn!(error = %e, "Unexpected state while stopping");
        }
        self.publish(ServerEvent::ServerStop);
    }

    /// Stop the server launched as `generation` if it is still the current one.
    async fn stop_generation(&self, generation: u64) {
        if self.inner.generation.load(Ordering::Acquire) != generation {
            return;
        }
        lock(&self.inner.connect_cancel).cancel();
        let _lifecycle = self.inner.lifecycle.lock().await;
        if self.inner.generation.load(Ordering::Acquire) == generation
            && self.state() != ServerState::Stopped
        {
            self.stop_locked().await;
        }
    }

    fn on_server_exit(&self, generation: u64) {
        if self.inner.generation.load(Ordering::Acquire) != generation
            || self.state() == ServerState::Stopped
        {
            return;
        }
        tracing::warn!(generation, "OmniSharp server output closed");
        self.publish(ServerEvent::ServerError(
            "OmniSharp server exited unexpectedly".to_string(),
        ));
        let supervisor = self.clone();
        tokio::spawn(async move { supervisor.stop_generation(generation).await });
    }

    /// Pick a launch target from the workspace and start it.
    ///
    /// With no targets this waits for a project file to be created and scans
    /// again. With one target, or several of which one is `preferred`, the
    /// server is (re)started. Otherwise `MultipleLaunchTargets` is published
    /// and the candidates are returned for the caller to choose from.
    ///
    /// # Errors
    ///
    /// Returns discovery errors or the errors of [`restart`](Self::restart).
    pub async fn auto_start(&self, preferred: Option<&Path>) -> Result<AutoStart, SupervisorError> {
        loop {
            let root = self.inner.workspace_root.clone();
            let max_results = self.inner.options.max_project_results;
            let targets = tokio::task::spawn_blocking(move || find_launch_targets(&root, max_results))
                .await
                .map_err(|e| SupervisorError::Join(e.to_string()))??;

            if targets.is_empty() {
                tracing::info!(root = %self.inner.workspace_root.display(), "No launch targets found");
                wait_for_project_file(&self.inner.workspace_root).await?;
                continue;
            }

            let chosen = if targets.len() == 1 {
                targets.first().cloned()
            } else {
                preferred.and_then(|path| targets.iter().find(|t| t.target == path).cloned())
            };

            return match chosen {
                Some(target) => {
                    self.restart(Some(target.clone())).await?;
                    Ok(AutoStart::Started(target))
                }
                None => {
                    tracing::info!(count = targets.len(), "Multiple launch targets found");
                    self.publish(ServerEvent::MultipleLaunchTargets(targets.clone()));
                    Ok(AutoStart::MultipleLaunchTargets(targets))
                }
            };
        }
    }

    /// Send `command` and decode the response body into `T`.
    ///
    /// Cancelling `token` removes the request only while it is still queued;
    /// once sent the call waits for the response.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::NotStarted`] unless the server is started, or
    /// the error the request completed with.
    pub async fn make_request<T: DeserializeOwned>(
        &self,
        command: &str,
        data: impl Serialize,
        token: Option<&CancellationToken>,
    ) -> Result<T, RequestError> {
        let body = self.request_value(command, data, token).await?;
        serde_json::from_value(body).map_err(|e| RequestError::Decode {
            command: command.to_string(),
            reason: e.to_string(),
        })
    }

    /// Send `command` and return the raw response body.
    ///
    /// # Errors
    ///
    /// See [`make_request`](Self::make_request).
    pub async fn request_value(
        &self,
        command: &str,
        data: impl Serialize,
        token: Option<&CancellationToken>,
    ) -> Result<Value, RequestError> {
        if self.state() != ServerState::Started {
            return Err(RequestError::NotStarted);
        }
        let data = serde_json::to_value(data).map_err(|e| RequestError::Encode {
            command: command.to_string(),
            reason: e.to_string(),
        })?;

        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let started_at = Instant::now();
        let (request, mut rx) = Request::new(seq, command, data);
        self.inner.queue.enqueue(request);

        let completed = match token {
            Some(token) => tokio::select! {
                biased;
                outcome = &mut rx => Some(outcome),
                () = token.cancelled() => None,
            },
            None => Some((&mut rx).await),
        };
        let outcome = match completed {
            Some(outcome) => outcome,
            None => {
                if !self.inner.queue.cancel(command, seq) {
                    tracing::debug!(command, seq, "Request already sent, waiting for response");
                }
                rx.await
            }
        };

        let body = outcome.unwrap_or_else(|_| Err(RequestError::ServerStopped(command.to_string())))?;
        lock(&self.inner.delays).record(command, started_at.elapsed());
        Ok(body)
    }

    /// Publish and clear accumulated latency measures.
    pub fn flush_telemetry(&self) {
        let reports = lock(&self.inner.delays).flush();
        for report in reports {
            self.publish(ServerEvent::Telemetry(report));
        }
    }

    fn on_line_received(&self, line: &str) {
        match parse_packet(line) {
            Ok(Packet::Response(response)) => self.handle_response(response),
            Ok(Packet::Event(event)) => self.handle_event(event),
            Err(ParseError::NotJson) => {
                let line = line.trim_end();
                if !line.is_empty() {
                    tracing::debug!(%line, "Server output");
                    self.publish(ServerEvent::StdOut(line.to_string()));
                }
            }
            Err(e @ ParseError::UnknownType(_)) => {
                tracing::debug!(error = %e, "Unhandled packet");
                self.publish(ServerEvent::StdOut(e.to_string()));
            }
            Err(e) => tracing::debug!(error = %e, "Ignoring malformed packet"),
        }
    }

    fn handle_response(&self, response: ResponsePacket) {
        let queue = &self.inner.queue;
        let Some(request) = queue.dequeue(&response.command, response.request_seq) else {
            tracing::debug!(
                command = %response.command,
                seq = response.request_seq,
                "Response for unknown request"
            );
            return;
        };

        match response.into_result() {
            Ok(body) => request.resolve(body),
            Err(message) => request.reject(RequestError::Failed(message)),
        }
        queue.drain();
    }

    fn handle_event(&self, event: EventPacket) {
        match event.event.as_str() {
            "log" => match serde_json::from_value::<LogRecord>(event.body) {
                Ok(record) => {
                    if self.inner.options.debug_mode || !record.is_timing_noise() {
                        self.publish(ServerEvent::Log(record));
                    }
                }
                Err(e) => tracing::debug!(error = %e, "Ignoring malformed log event"),
            },
            "started" => {
                self.inner.started.send_replace(true);
                self.publish(ServerEvent::OmnisharpStart);
            }
            name => self.publish(ServerEvent::Worker {
                kind: WorkerEvent::from_name(name),
                body: event.body,
            }),
        }
    }
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("workspace_root", &self.inner.workspace_root)
            .field("state", &self.state())
            .field("launch_target", &self.launch_target())
            .finish_non_exhaustive()
    }
}

async fn read_stdout(weak: Weak<Inner>, stdout: BoxedReader, generation: u64) {
    let result = read_lines(stdout, |line| {
        if let Some(inner) = weak.upgrade() {
            ProcessSupervisor::from_inner(inner).on_line_received(line);
        }
    })
    .await;
    if let Err(e) = result {
        tracing::warn!(error = %e, "Failed to read server output");
    }
    if let Some(inner) = weak.upgrade() {
        ProcessSupervisor::from_inner(inner).on_server_exit(generation);
    }
}

async fn read_stderr(weak: Weak<Inner>, stderr: BoxedReader) {
    let result = read_lines(stderr, |line| {
        if line.is_empty() {
            return;
        }
        tracing::warn!(%line, "Server stderr");
        if let Some(inner) = weak.upgrade() {
            inner.bus.publish(ServerEvent::StdErr(line.to_string()));
        }
    })
    .await;
    if let Err(e) = result {
        tracing::debug!(error = %e, "Failed to read server stderr");
    }
}

async fn flush_telemetry_periodically(weak: Weak<Inner>) {
    let start = tokio::time::Instant::now() + TELEMETRY_REPORTING_DELAY;
    let mut interval = tokio::time::interval_at(start, TELEMETRY_REPORTING_DELAY);
    loop {
        interval.tick().await;
        let Some(inner) = weak.upgrade() else {
            return;
        };
        ProcessSupervisor::from_inner(inner).flush_telemetry();
    }
}
