//! Supervisor tests against an in-memory fake server.

mod autostart_test;
mod lifecycle_test;
mod request_test;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use omnisharp_supervisor::config::ServerOptions;
use omnisharp_supervisor::events::ServerEvent;
use omnisharp_supervisor::launcher::{
    LaunchError, LaunchRequest, LaunchResult, Launcher, ServerProcess,
};
use omnisharp_supervisor::server::{ProcessSupervisor, ProcessTree};
use omnisharp_supervisor::workspace::{LaunchTarget, LaunchTargetKind};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::sync::{broadcast, mpsc};

pub const FAKE_PID: u32 = 4242;
pub const HOST_PID: u32 = 99;

/// The far end of a launched fake server's stdio.
pub struct FakeServer {
    requests: Lines<BufReader<DuplexStream>>,
    stdout: DuplexStream,
}

impl FakeServer {
    /// Next request written by the supervisor.
    pub async fn next_request(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(5), self.requests.next_line())
            .await
            .expect("request arrives")
            .unwrap()
            .expect("stdin open");
        serde_json::from_str(&line).unwrap()
    }

    /// True when no request arrives within `wait`.
    pub async fn no_request_within(&mut self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.requests.next_line())
            .await
            .is_err()
    }

    pub async fn write_line(&mut self, line: &str) {
        self.stdout.write_all(line.as_bytes()).await.unwrap();
        self.stdout.write_all(b"\n").await.unwrap();
        self.stdout.flush().await.unwrap();
    }

    pub async fn send_started(&mut self) {
        self.write_line(r#"{"Type":"event","Event":"started","Body":null}"#)
            .await;
    }

    pub async fn respond(&mut self, request: &Value, success: bool, body: Value, message: Option<&str>) {
        let mut response = json!({
            "Type": "response",
            "Command": request["Command"],
            "Request_seq": request["Seq"],
            "Success": success,
            "Body": body,
        });
        if let Some(message) = message {
            response["Message"] = json!(message);
        }
        self.write_line(&response.to_string()).await;
    }
}

/// Launcher that wires the supervisor to in-memory pipes.
pub struct FakeLauncher {
    announce_started: bool,
    requests: Mutex<Vec<LaunchRequest>>,
    servers: mpsc::UnboundedSender<FakeServer>,
}

impl FakeLauncher {
    pub fn new(announce_started: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<FakeServer>) {
        let (servers, rx) = mpsc::unbounded_channel();
        let launcher = Arc::new(Self {
            announce_started,
            requests: Mutex::new(Vec::new()),
            servers,
        });
        (launcher, rx)
    }

    pub fn launches(&self) -> Vec<LaunchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<LaunchResult, LaunchError> {
        self.requests.lock().unwrap().push(request.clone());

        let (client_stdin, server_stdin) = tokio::io::duplex(64 * 1024);
        let (server_stdout, client_stdout) = tokio::io::duplex(64 * 1024);
        let mut server = FakeServer {
            requests: BufReader::new(server_stdin).lines(),
            stdout: server_stdout,
        };
        if self.announce_started {
            server.send_started().await;
        }
        let _ = self.servers.send(server);

        Ok(LaunchResult {
            process: ServerProcess::from_streams(
                Some(FAKE_PID),
                Box::new(client_stdin),
                Box::new(client_stdout),
                None,
            ),
            command: request.launch_path.to_string_lossy().into_owned(),
            args: request.args.clone(),
            using_mono: false,
        })
    }
}

/// Launcher that always fails.
pub struct FailingLauncher;

#[async_trait]
impl Launcher for FailingLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<LaunchResult, LaunchError> {
        Err(LaunchError::NotFound(request.launch_path.clone()))
    }
}

/// Process tree that records which PIDs were terminated.
#[derive(Default)]
pub struct RecordingProcessTree {
    terminated: Mutex<Vec<u32>>,
}

impl RecordingProcessTree {
    pub fn terminated(&self) -> Vec<u32> {
        self.terminated.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessTree for RecordingProcessTree {
    async fn terminate(&self, pid: u32) -> std::io::Result<()> {
        self.terminated.lock().unwrap().push(pid);
        Ok(())
    }
}

pub fn launch_path() -> PathBuf {
    std::env::temp_dir().join("omnisharp").join("run")
}

pub fn options() -> ServerOptions {
    ServerOptions {
        path: Some(launch_path().to_string_lossy().into_owned()),
        ..Default::default()
    }
}

pub fn solution_target(root: &Path) -> LaunchTarget {
    LaunchTarget {
        label: "app.sln".to_string(),
        description: String::new(),
        directory: root.to_path_buf(),
        target: root.join("app.sln"),
        kind: LaunchTargetKind::Solution,
    }
}

pub struct Harness {
    pub supervisor: ProcessSupervisor,
    pub launcher: Arc<FakeLauncher>,
    pub tree: Arc<RecordingProcessTree>,
    pub servers: mpsc::UnboundedReceiver<FakeServer>,
    pub root: PathBuf,
}

impl Harness {
    pub fn new(options: ServerOptions, announce_started: bool) -> Self {
        Self::with_root(options, announce_started, std::env::temp_dir())
    }

    pub fn with_root(options: ServerOptions, announce_started: bool, root: PathBuf) -> Self {
        let (launcher, servers) = FakeLauncher::new(announce_started);
        let tree = Arc::new(RecordingProcessTree::default());
        let supervisor = ProcessSupervisor::builder(options, root.clone())
            .launcher(launcher.clone())
            .process_tree(tree.clone())
            .host_pid(HOST_PID)
            .build();
        Self {
            supervisor,
            launcher,
            tree,
            servers,
            root,
        }
    }

    /// Start against a solution target and return the fake server.
    pub async fn start(&mut self) -> FakeServer {
        self.supervisor
            .start(solution_target(&self.root))
            .await
            .expect("server starts");
        self.servers.recv().await.expect("server launched")
    }
}

/// Collect events until `done` matches one or `wait` elapses.
pub async fn collect_until(
    rx: &mut broadcast::Receiver<ServerEvent>,
    wait: Duration,
    done: impl Fn(&ServerEvent) -> bool,
) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    let _ = tokio::time::timeout(wait, async {
        while let Ok(event) = rx.recv().await {
            let finished = done(&event);
            events.push(event);
            if finished {
                break;
            }
        }
    })
    .await;
    events
}
