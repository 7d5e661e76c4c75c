use anyhow::{Context, Result, bail};
use gdk_launcher_core::{BuildConfig, ModuleCandidate, StructuralValidator};
use std::path::Path;

pub fn validate_command(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }

    println!("🔍 Validating: {}", dir.display());
    println!("{}", "=".repeat(60));

    let mut validator = StructuralValidator::new().context("Failed to initialize parser")?;
    match validator.validate(dir) {
        Ok(report) => {
            println!("✅ Structure OK");
            println!("   🎮 Entry type: {}", report.entry_type);
            println!("   📋 Metadata type: {}", report.metadata_type);
            if report.has_syntax_errors {
                println!("   ⚠️  Sources contain syntax errors; the build will report them");
            }

            let profile = BuildConfig::default().profile;
            if let Some(candidate) = ModuleCandidate::inspect(dir, &profile) {
                println!("   📦 Artifact: {}", candidate.artifact_path().display());
                if candidate.needs_compilation() {
                    println!("   🔨 Needs build");
                } else {
                    println!("   ✨ Up to date");
                }
            }
            Ok(())
        }
        Err(failure) => {
            println!("❌ {failure}");
            std::process::exit(1);
        }
    }
}
