//! Server command-line arguments.

use std::path::{Path, PathBuf};

use crate::config::{FormattingOptions, LoggingLevel, ServerOptions};

/// Builder for the server's argument vector.
#[derive(Debug, Clone)]
pub struct ServerArgsBuilder {
    target: PathBuf,
    host_pid: u32,
    logging_level: LoggingLevel,
    wait_for_debugger: bool,
    formatting: Option<FormattingOptions>,
}

impl ServerArgsBuilder {
    /// Create a builder for `target`, owned by process `host_pid`.
    #[must_use]
    pub fn new(target: impl Into<PathBuf>, host_pid: u32) -> Self {
        Self {
            target: target.into(),
            host_pid,
            logging_level: LoggingLevel::default(),
            wait_for_debugger: false,
            formatting: None,
        }
    }

    /// Apply every argument-affecting setting from `options`.
    #[must_use]
    pub fn with_options(self, options: &ServerOptions) -> Self {
        self.logging_level(options.logging_level)
            .wait_for_debugger(options.wait_for_debugger)
            .formatting(
                options
                    .use_editor_formatting_settings
                    .then_some(options.formatting),
            )
    }

    #[must_use]
    pub fn logging_level(mut self, level: LoggingLevel) -> Self {
        self.logging_level = level;
        self
    }

    #[must_use]
    pub fn wait_for_debugger(mut self, wait: bool) -> Self {
        self.wait_for_debugger = wait;
        self
    }

    /// Forward editor formatting settings, or `None` to let the server decide.
    #[must_use]
    pub fn formatting(mut self, formatting: Option<FormattingOptions>) -> Self {
        self.formatting = formatting;
        self
    }

    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Build the command-line arguments.
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-s".to_string(),
            self.target.to_string_lossy().into_owned(),
            "--hostPID".to_string(),
            self.host_pid.to_string(),
            "--stdio".to_string(),
            "DotNet:enablePackageRestore=false".to_string(),
            "--encoding".to_string(),
            "utf-8".to_string(),
            "--loglevel".to_string(),
            self.logging_level.as_arg().to_string(),
        ];

        if self.wait_for_debugger {
            args.push("--debug".to_string());
        }

        if let Some(formatting) = self.formatting {
            args.push(format!(
                "formattingOptions:useTabs={}",
                !formatting.insert_spaces
            ));
            args.push(format!("formattingOptions:tabSize={}", formatting.tab_size));
            args.push(format!(
                "formattingOptions:indentationSize={}",
                formatting.tab_size
            ));
        }

        args
    }
}
