use anyhow::{Context, Result, bail};
use gdk_launcher_core::{CommandBuilder, ModuleBuilder, ModuleCandidate};
use std::path::Path;
use tracing::debug;

use super::load_config;

pub fn build_command(config: Option<&Path>, name: &str, dry_run: bool) -> Result<()> {
    let config = load_config(config)?;
    let dir = config.modules_dir.join(name);
    if !dir.is_dir() {
        bail!("Module '{}' not found in {}", name, config.modules_dir.display());
    }

    let mut candidate = ModuleCandidate::inspect(&dir, &config.build.profile)
        .with_context(|| format!("Invalid module directory {}", dir.display()))?;
    let builder = CommandBuilder::from_config(&config.build);
    let command = builder.command_for(&candidate);
    debug!("Build command for '{}': {:?}", name, command);

    if dry_run {
        println!("{}", command.to_shell_command());
        println!("Working directory: {}", dir.display());
        println!("Artifact: {}", candidate.artifact_path().display());
        if candidate.needs_compilation() {
            println!("Status: needs build");
        } else {
            println!("Status: up to date");
        }
        return Ok(());
    }

    println!("🔨 Building '{}': {}", name, builder.describe(&candidate));
    let output = builder
        .build(&candidate)
        .with_context(|| format!("Failed to run {}", command.to_shell_command()))?;

    if output.success {
        candidate
            .write_build_marker()
            .context("Failed to write build marker")?;
        println!(
            "✅ Built in {:.1}s: {}",
            output.duration.as_secs_f64(),
            candidate.artifact_path().display()
        );
        Ok(())
    } else {
        println!("❌ Build failed (exit code {:?})", output.exit_code);
        for line in output.failure_lines() {
            println!("   {line}");
        }
        std::process::exit(output.exit_code.unwrap_or(1));
    }
}
