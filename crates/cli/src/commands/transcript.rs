use anyhow::{Context, Result};
use gdk_launcher_core::TranscriptFormat;
use gdk_launcher_core::transcript::{Transcript, parse_entries, render};
use std::path::Path;

pub fn transcript_command(file: &Path, format: &str) -> Result<()> {
    let format: TranscriptFormat = format.parse()?;
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let entries = parse_entries(&contents)
        .with_context(|| format!("{} is not a transcript", file.display()))?;

    // Keep the original generation time when the input carries one
    let generated_at = Transcript::from_json(&contents)
        .map(|t| t.header.generated_at)
        .unwrap_or_else(|_| chrono::Utc::now());

    let rendered = render(&entries, format, generated_at)?;
    print!("{rendered}");
    if !rendered.ends_with('\n') {
        println!();
    }
    Ok(())
}
