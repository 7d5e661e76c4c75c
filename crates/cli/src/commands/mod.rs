pub mod build;
pub mod discover;
pub mod init;
pub mod launch;
pub mod transcript;
pub mod validate;

pub use build::build_command;
pub use discover::discover_command;
pub use init::init_command;
pub use launch::launch_command;
pub use transcript::transcript_command;
pub use validate::validate_command;

use anyhow::{Context, Result};
use gdk_launcher_core::LauncherConfig;
use std::path::Path;

/// The explicit `--config` file, or the nearest one above the working directory
pub(crate) fn load_config(path: Option<&Path>) -> Result<LauncherConfig> {
    match path {
        Some(path) => LauncherConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            LauncherConfig::discover(&cwd).context("Failed to load configuration")
        }
    }
}
