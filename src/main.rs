//! OmniSharp Supervisor - launch and drive an OmniSharp server over stdio.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use omnisharp_supervisor::config::{ConfigLoader, ServerOptions};
use omnisharp_supervisor::display;
use omnisharp_supervisor::events::ServerEvent;
use omnisharp_supervisor::server::{AutoStart, ProcessSupervisor};
use omnisharp_supervisor::workspace::find_launch_targets;

#[derive(Parser)]
#[command(
    name = "omnisharp-supervisor",
    about = "Launch and drive an OmniSharp server over stdio",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the launch targets found in a workspace.
    Targets {
        /// Workspace root.
        workspace: PathBuf,
    },
    /// Start the server and print its events until Ctrl-C.
    Run {
        /// Workspace root.
        workspace: PathBuf,
        /// Solution or directory to start against when several are found.
        #[arg(short, long)]
        target: Option<PathBuf>,
        /// Print event bodies without truncation.
        #[arg(long)]
        raw: bool,
    },
    /// Start the server, send one request and print the response body.
    Request {
        /// Workspace root.
        workspace: PathBuf,
        /// Command name, e.g. `/projects`.
        command: String,
        /// Solution or directory to start against when several are found.
        #[arg(short, long)]
        target: Option<PathBuf>,
        /// Request arguments as JSON.
        #[arg(short, long)]
        data: Option<String>,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_options(path: Option<PathBuf>) -> Result<ServerOptions, String> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    loader.load().map_err(|e| e.to_string())
}

async fn start(
    supervisor: &ProcessSupervisor,
    target: Option<&Path>,
) -> Result<(), String> {
    match supervisor.auto_start(target).await.map_err(|e| e.to_string())? {
        AutoStart::Started(target) => {
            tracing::info!(target = %target.target.display(), "Server started");
            Ok(())
        }
        AutoStart::MultipleLaunchTargets(targets) => {
            display::print_targets(&targets);
            Err("Multiple launch targets found; pass one with --target".to_string())
        }
    }
}

async fn run(supervisor: ProcessSupervisor, target: Option<PathBuf>, raw: bool) -> Result<(), String> {
    let mut events = supervisor.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => display::print_event(&event, raw),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let result: Result<(), String> = async {
        tokio::select! {
            started = start(&supervisor, target.as_deref()) => started?,
            signal = tokio::signal::ctrl_c() => return signal.map_err(|e| e.to_string()),
        }
        tokio::signal::ctrl_c().await.map_err(|e| e.to_string())
    }
    .await;

    supervisor.stop().await;
    printer.abort();
    result
}

async fn request(
    supervisor: ProcessSupervisor,
    target: Option<PathBuf>,
    command: &str,
    data: Option<String>,
) -> Result<(), String> {
    let data: Value = match data {
        Some(json) => serde_json::from_str(&json).map_err(|e| format!("Invalid --data: {e}"))?,
        None => Value::Null,
    };

    let mut events = supervisor.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let ServerEvent::ServerError(message) = event {
                display::print_error(&message);
            }
        }
    });

    let result: Result<(), String> = async {
        start(&supervisor, target.as_deref()).await?;
        let body = supervisor
            .request_value(command, data, None)
            .await
            .map_err(|e| e.to_string())?;
        let pretty = serde_json::to_string_pretty(&body).map_err(|e| e.to_string())?;
        println!("{pretty}");
        Ok(())
    }
    .await;

    supervisor.stop().await;
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = match load_options(cli.config) {
        Ok(options) => options,
        Err(e) => {
            display::print_error(&e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Targets { workspace } => {
            find_launch_targets(&workspace, options.max_project_results)
                .map(|targets| display::print_targets(&targets))
                .map_err(|e| e.to_string())
        }
        Commands::Run {
            workspace,
            target,
            raw,
        } => {
            tracing::info!(workspace = %workspace.display(), "Starting OmniSharp supervisor");
            run(ProcessSupervisor::new(options, workspace), target, raw).await
        }
        Commands::Request {
            workspace,
            command,
            target,
            data,
        } => request(ProcessSupervisor::new(options, workspace), target, &command, data).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::print_error(&e);
            ExitCode::FAILURE
        }
    }
}
