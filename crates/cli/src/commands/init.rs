use anyhow::{Context, Result};
use gdk_launcher_core::{CONFIG_FILE_NAME, LauncherConfig};
use std::{env, fs, path::Path};
use tracing::info;

pub fn init_command(cwd: Option<&Path>, force: bool) -> Result<()> {
    let project_root = match cwd {
        Some(cwd) => cwd.to_path_buf(),
        None => env::current_dir().context("Failed to get current directory")?,
    };
    let project_root = project_root
        .canonicalize()
        .context("Failed to canonicalize project root")?;

    let config_path = project_root.join(CONFIG_FILE_NAME);
    if config_path.exists() && !force {
        println!("❌ Config already exists at: {}", config_path.display());
        println!("   Use --force to overwrite");
        return Ok(());
    }

    println!("🚀 Initializing GDK launcher in: {}", project_root.display());

    let config = LauncherConfig::default();
    config
        .save_to_file(&config_path)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;
    println!("✅ Created config: {}", config_path.display());

    for dir in [&config.modules_dir, &config.saved_dir] {
        let path = project_root.join(dir);
        if !path.exists() {
            fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            info!("Created {}", path.display());
            println!("📁 Created: {}", path.display());
        }
    }

    println!("\n📌 Next steps:");
    println!("   Put each game module in its own directory under modules/");
    println!("   Run `gdk-launcher discover` to build and list them");
    Ok(())
}
