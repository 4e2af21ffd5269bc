//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::launcher::Platform;
use crate::queue::DEFAULT_CONCURRENCY;

/// Verbosity passed to the server with `--loglevel`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Trace,
    Debug,
    #[default]
    Information,
    Warning,
    Error,
    Critical,
}

impl LoggingLevel {
    /// Value for the `--loglevel` argument.
    #[must_use]
    pub fn as_arg(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Information => "information",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

/// Editor formatting settings forwarded when
/// [`ServerOptions::use_editor_formatting_settings`] is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormattingOptions {
    pub insert_spaces: bool,
    pub tab_size: u32,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            insert_spaces: true,
            tab_size: 4,
        }
    }
}

/// Settings that control how the server is launched and driven.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    /// Absolute path to a server executable, or a version (`"latest"`, `"1.32.1"`)
    /// to resolve under [`install_root`](Self::install_root).
    pub path: Option<String>,
    /// Launch through Mono on macOS/Linux.
    pub use_mono: bool,
    /// Pass `--debug` so the server waits for a debugger.
    pub wait_for_debugger: bool,
    pub logging_level: LoggingLevel,
    /// Seconds to wait for the server's `started` event.
    pub project_load_timeout: u64,
    /// Upper bound on files scanned during launch target discovery.
    pub max_project_results: usize,
    pub use_editor_formatting_settings: bool,
    pub formatting: FormattingOptions,
    /// In-flight capacity of the normal request lane.
    pub concurrency: usize,
    /// Directory holding installed server versions.
    pub install_root: Option<PathBuf>,
    /// Executable used when no `path` is configured.
    pub bundled_path: Option<PathBuf>,
    /// Keep noisy server log records instead of filtering them.
    pub debug_mode: bool,
}

pub const DEFAULT_PROJECT_LOAD_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_MAX_PROJECT_RESULTS: usize = 250;

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            path: None,
            use_mono: false,
            wait_for_debugger: false,
            logging_level: LoggingLevel::default(),
            project_load_timeout: DEFAULT_PROJECT_LOAD_TIMEOUT_SECS,
            max_project_results: DEFAULT_MAX_PROJECT_RESULTS,
            use_editor_formatting_settings: false,
            formatting: FormattingOptions::default(),
            concurrency: DEFAULT_CONCURRENCY,
            install_root: None,
            bundled_path: None,
            debug_mode: false,
        }
    }
}

impl ServerOptions {
    #[must_use]
    pub fn project_load_timeout(&self) -> Duration {
        Duration::from_secs(self.project_load_timeout)
    }

    /// Install root, defaulting to `<data dir>/omnisharp-supervisor`.
    #[must_use]
    pub fn install_root(&self) -> PathBuf {
        self.install_root.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map_or_else(|| PathBuf::from(".omnisharp"), |dir| dir.join("omnisharp-supervisor"))
        })
    }

    /// Fallback executable, defaulting to `<install root>/bundled/<executable>`.
    #[must_use]
    pub fn bundled_path(&self, platform: Platform) -> PathBuf {
        self.bundled_path.clone().unwrap_or_else(|| {
            self.install_root()
                .join("bundled")
                .join(platform.server_executable())
        })
    }
}
