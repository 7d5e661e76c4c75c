//! Invocation of the external build tool on module directories

pub mod command;

pub use command::{BuildCommand, CapturedOutput};

use regex::Regex;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use crate::{config::BuildConfig, error::Result, loader::ModuleCandidate};

static FAILURE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(error|failure)\b").expect("valid failure pattern"));

/// Result of one build attempt
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub output: String,
    pub duration: Duration,
}

impl BuildOutput {
    /// Only the lines that report errors or failures
    pub fn failure_lines(&self) -> Vec<&str> {
        failure_lines(&self.output)
    }
}

pub fn failure_lines(output: &str) -> Vec<&str> {
    output
        .lines()
        .filter(|line| FAILURE_LINE.is_match(line))
        .collect()
}

/// Builds a module in place
pub trait ModuleBuilder: Send + Sync {
    /// Build the candidate and wait for the result. Spawn failures are
    /// errors; a build that ran and failed is `Ok` with `success == false`.
    fn build(&self, candidate: &ModuleCandidate) -> Result<BuildOutput>;

    /// Human readable form of what `build` runs
    fn describe(&self, candidate: &ModuleCandidate) -> String {
        format!("build {}", candidate.dir.display())
    }
}

/// Runs the configured build command with the module as working directory
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    command: BuildCommand,
}

impl CommandBuilder {
    pub fn new(command: BuildCommand) -> Self {
        Self { command }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        Self::new(BuildCommand::from_config(config))
    }

    pub fn command_for(&self, candidate: &ModuleCandidate) -> BuildCommand {
        self.command.in_dir(&candidate.dir)
    }
}

impl ModuleBuilder for CommandBuilder {
    fn build(&self, candidate: &ModuleCandidate) -> Result<BuildOutput> {
        let command = self.command_for(candidate);
        tracing::info!(
            "Building module '{}': {} (in {:?})",
            candidate.name,
            command.to_shell_command(),
            candidate.dir
        );

        let started = Instant::now();
        let captured = command.execute_captured()?;
        let output = BuildOutput {
            success: captured.success,
            exit_code: captured.code,
            output: captured.output,
            duration: started.elapsed(),
        };

        if output.success {
            tracing::info!(
                "Module '{}' built in {:.1}s",
                candidate.name,
                output.duration.as_secs_f64()
            );
        } else {
            tracing::warn!(
                "Build of module '{}' failed with exit code {:?}",
                candidate.name,
                output.exit_code
            );
            for line in output.failure_lines() {
                tracing::warn!("  {}", line);
            }
        }

        Ok(output)
    }

    fn describe(&self, candidate: &ModuleCandidate) -> String {
        let command = self.command_for(candidate);
        format!(
            "{} (in {})",
            command.to_shell_command(),
            candidate.dir.display()
        )
    }
}
