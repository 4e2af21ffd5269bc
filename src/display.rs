//! Colored terminal output for server events.
//!
//! Each lifecycle stage, launch command line and server log record is printed
//! as one timestamped line.

use std::borrow::Cow;
use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::events::{LaunchInfo, ServerEvent};
use crate::protocol::{LogLevel, LogRecord};
use crate::workspace::LaunchTarget;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Maximum length for truncated event bodies.
const DEFAULT_MAX_LEN: usize = 120;

/// Truncate a string to at most `max_len` characters, adding an ellipsis.
#[must_use]
pub fn truncate(s: &str, max_len: usize, raw_mode: bool) -> String {
    if raw_mode || s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{kept}...")
}

/// Render a command line the way a shell would accept it.
#[must_use]
pub fn format_command_line(command: &str, args: &[String]) -> String {
    std::iter::once(command)
        .chain(args.iter().map(String::as_str))
        .map(|part| shell_escape::escape(Cow::Borrowed(part)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_line(tag: &str, message: &str) {
    println!("{} {} {}", timestamp().dimmed(), tag, message);
    let _ = io::stdout().flush();
}

/// Print a lifecycle stage.
pub fn print_stage(stage: &str, detail: &str) {
    print_line(&format!("{}", format!("[{stage}]").blue().bold()), detail);
}

/// Print the command line the server was launched with.
pub fn print_launch(info: &LaunchInfo) {
    let pid = info.pid.map_or_else(|| "?".to_string(), |pid| pid.to_string());
    let mono = if info.using_mono { " (mono)" } else { "" };
    print_stage(
        "LAUNCH",
        &format!(
            "pid={pid}{mono} {}",
            format_command_line(&info.command, &info.args).dimmed()
        ),
    );
}

/// Print a server log record with its level prefix.
pub fn print_server_log(record: &LogRecord) {
    let prefix = format!("[{}]", record.level.prefix());
    let tag = match record.level {
        LogLevel::Error | LogLevel::Critical => format!("{}", prefix.red().bold()),
        LogLevel::Warning => format!("{}", prefix.yellow().bold()),
        LogLevel::Trace | LogLevel::Debug => format!("{}", prefix.dimmed()),
        LogLevel::Information | LogLevel::Other(_) => format!("{}", prefix.cyan()),
    };
    print_line(&tag, &format!("{}: {}", record.name.bold(), record.message));
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message.red());
}

/// Print discovered launch targets, numbered.
pub fn print_targets(targets: &[LaunchTarget]) {
    if targets.is_empty() {
        println!("{}", "No launch targets found".yellow());
        return;
    }
    for (index, target) in targets.iter().enumerate() {
        println!(
            "{:>3}. {} {} {}",
            index + 1,
            target.label.bold(),
            format!("[{}]", target.kind).cyan(),
            target.target.display().dimmed()
        );
    }
    let _ = io::stdout().flush();
}

/// Print one supervisor event.
pub fn print_event(event: &ServerEvent, raw_mode: bool) {
    match event {
        ServerEvent::StateChanged(state) => print_stage("STATE", &format!("{state:?}")),
        ServerEvent::BeforeServerStart(target) => {
            print_stage("START", &format!("Starting OmniSharp on {}", target.display()));
        }
        ServerEvent::ServerLaunched(info) => print_launch(info),
        ServerEvent::ServerStart(target) => {
            print_stage("START", &format!("Launched for {}", target.display()));
        }
        ServerEvent::OmnisharpStart => print_stage("READY", "OmniSharp server started"),
        ServerEvent::ServerStop => print_stage("STOP", "OmniSharp server stopped"),
        ServerEvent::ServerError(message) => print_error(message),
        ServerEvent::MultipleLaunchTargets(targets) => {
            print_stage("TARGETS", "Multiple launch targets found, choose one with --target");
            print_targets(targets);
        }
        ServerEvent::StdOut(line) => print_line(&format!("{}", "[STDOUT]".dimmed()), line),
        ServerEvent::StdErr(line) => print_line(&format!("{}", "[STDERR]".yellow()), line),
        ServerEvent::Log(record) => print_server_log(record),
        ServerEvent::Worker { kind, body } => print_line(
            &format!("{}", format!("[{}]", kind.name()).magenta()),
            &truncate(&body.to_string(), DEFAULT_MAX_LEN, raw_mode).dimmed().to_string(),
        ),
        ServerEvent::Telemetry(report) => print_line(
            &format!("{}", "[TELEMETRY]".dimmed()),
            &format!("{} {:?}", report.event_name, report.measures.as_array()),
        ),
    }
}
