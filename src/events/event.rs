//! Event types published by the supervisor.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;

use crate::protocol::LogRecord;
use crate::server::ServerState;
use crate::telemetry::TelemetryReport;
use crate::workspace::LaunchTarget;

/// How the server process was started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchInfo {
    pub command: String,
    pub args: Vec<String>,
    pub pid: Option<u32>,
    pub using_mono: bool,
}

/// Named server events relayed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum WorkerEvent {
    ProjectAdded,
    ProjectChanged,
    ProjectRemoved,
    MsBuildProjectDiagnostics,
    Diagnostic,
    PackageRestoreStarted,
    PackageRestoreFinished,
    UnresolvedDependencies,
    TestMessage,
    BackgroundDiagnosticStatus,
    ProjectDiagnosticStatus,
    ProjectConfiguration,
    Error,
    Started,
    /// Any event name not listed above.
    Unknown(String),
}

impl WorkerEvent {
    /// Map a wire event name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "ProjectAdded" => Self::ProjectAdded,
            "ProjectChanged" => Self::ProjectChanged,
            "ProjectRemoved" => Self::ProjectRemoved,
            "MsBuildProjectDiagnostics" => Self::MsBuildProjectDiagnostics,
            "Diagnostic" => Self::Diagnostic,
            "PackageRestoreStarted" => Self::PackageRestoreStarted,
            "PackageRestoreFinished" => Self::PackageRestoreFinished,
            "UnresolvedDependencies" => Self::UnresolvedDependencies,
            "TestMessage" => Self::TestMessage,
            "BackgroundDiagnosticStatus" => Self::BackgroundDiagnosticStatus,
            "ProjectDiagnosticStatus" => Self::ProjectDiagnosticStatus,
            "ProjectConfiguration" => Self::ProjectConfiguration,
            "Error" => Self::Error,
            "started" => Self::Started,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The wire name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::ProjectAdded => "ProjectAdded",
            Self::ProjectChanged => "ProjectChanged",
            Self::ProjectRemoved => "ProjectRemoved",
            Self::MsBuildProjectDiagnostics => "MsBuildProjectDiagnostics",
            Self::Diagnostic => "Diagnostic",
            Self::PackageRestoreStarted => "PackageRestoreStarted",
            Self::PackageRestoreFinished => "PackageRestoreFinished",
            Self::UnresolvedDependencies => "UnresolvedDependencies",
            Self::TestMessage => "TestMessage",
            Self::BackgroundDiagnosticStatus => "BackgroundDiagnosticStatus",
            Self::ProjectDiagnosticStatus => "ProjectDiagnosticStatus",
            Self::ProjectConfiguration => "ProjectConfiguration",
            Self::Error => "Error",
            Self::Started => "started",
            Self::Unknown(name) => name,
        }
    }
}

/// Everything observable about a supervised server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The lifecycle state changed.
    StateChanged(ServerState),
    /// About to launch against this solution or directory.
    BeforeServerStart(PathBuf),
    /// The process was spawned.
    ServerLaunched(LaunchInfo),
    /// Launch succeeded; the solution path the server was started with.
    ServerStart(PathBuf),
    ServerStop,
    /// Start failed or the server misbehaved.
    ServerError(String),
    /// The server reported `started`.
    OmnisharpStart,
    /// Discovery found several targets and none was preferred.
    MultipleLaunchTargets(Vec<LaunchTarget>),
    /// A non-packet stdout line.
    StdOut(String),
    StdErr(String),
    Log(LogRecord),
    Worker { kind: WorkerEvent, body: Value },
    Telemetry(TelemetryReport),
}
