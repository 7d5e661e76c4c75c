use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{
    build_command, discover_command, init_command, launch_command, transcript_command,
    validate_command,
};

#[derive(Parser, Debug)]
#[command(name = "gdk-launcher")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    RUST_LOG=debug    Enable debug logging")]
pub struct Cli {
    /// Configuration file (defaults to the nearest gdk-launcher.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover, build and load every module and list the games
    #[command(visible_alias = "d")]
    Discover {
        /// Keep running and rediscover when a module changes
        #[arg(short, long)]
        watch: bool,

        /// Print the game list as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a module directory against the plugin contract
    #[command(visible_alias = "v")]
    Validate {
        /// Module directory
        dir: PathBuf,
    },
    /// Build one module
    #[command(visible_alias = "b")]
    Build {
        /// Module directory name under the modules directory
        name: String,

        /// Print the build command without executing it
        #[arg(short, long)]
        dry_run: bool,
    },
    /// Launch a game and open the message console
    #[command(visible_alias = "l")]
    Launch {
        /// Module, game id or game name
        name: String,

        /// Launch configuration as JSON, or @file to read it from a file
        #[arg(short = 'j', long = "config-json")]
        config_json: Option<String>,
    },
    /// Print a saved transcript in another format
    #[command(visible_alias = "t")]
    Transcript {
        /// Transcript file (.json or .jsonl)
        file: PathBuf,

        /// Output format: json, jsonl or text
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Write a default gdk-launcher.json
    Init {
        /// Specify the directory to initialize
        #[arg(short, long)]
        cwd: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    pub fn execute(self) -> Result<()> {
        let config = self.config.as_deref();
        match self.command {
            Commands::Discover { watch, json } => discover_command(config, watch, json),
            Commands::Validate { dir } => validate_command(&dir),
            Commands::Build { name, dry_run } => build_command(config, &name, dry_run),
            Commands::Launch { name, config_json } => {
                launch_command(config, &name, config_json.as_deref())
            }
            Commands::Transcript { file, format } => transcript_command(&file, &format),
            Commands::Init { cwd, force } => init_command(cwd.as_deref(), force),
        }
    }
}
