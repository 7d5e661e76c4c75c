use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::BuildConfig;

/// An external build command to run inside a module directory
#[derive(Debug, Clone, PartialEq)]
pub struct BuildCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

/// Exit status plus stdout and stderr merged, stdout first
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedOutput {
    pub code: Option<i32>,
    pub success: bool,
    pub output: String,
}

impl BuildCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
            env: Vec::new(),
        }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        let mut command = Self::new(config.command.clone(), config.args.clone());
        for (key, value) in &config.env {
            command = command.with_env(key.clone(), value.clone());
        }
        command
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: String, value: String) -> Self {
        self.env.push((key, value));
        self
    }

    pub fn in_dir(&self, dir: &Path) -> Self {
        self.clone().with_working_dir(dir)
    }

    pub fn to_shell_command(&self) -> String {
        let mut cmd = String::new();
        for (key, value) in &self.env {
            cmd.push_str(&format!("{key}={} ", quote(value)));
        }
        cmd.push_str(&quote(&self.program));
        for arg in &self.args {
            cmd.push(' ');
            cmd.push_str(&quote(arg));
        }
        cmd
    }

    /// Run to completion, capturing output. Blocks until the process exits.
    pub fn execute_captured(&self) -> io::Result<CapturedOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // A target dir inherited from the launcher's own build would send the
        // artifacts somewhere the loader never looks
        cmd.env_remove("CARGO_TARGET_DIR");

        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let output = cmd.output()?;
        let mut merged = String::from_utf8_lossy(&output.stdout).into_owned();
        merged.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CapturedOutput {
            code: output.status.code(),
            success: output.status.success(),
            output: merged,
        })
    }
}

fn quote(arg: &str) -> String {
    if arg.contains(' ') {
        format!("'{arg}'")
    } else {
        arg.to_string()
    }
}
