use anyhow::{Context, Result};
use gdk_launcher_core::{Lobby, RefreshSummary};
use notify::{RecursiveMode, Watcher};
use std::path::{Component, Path};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::load_config;
use crate::display::{print_compilation_failures, print_game_list, print_outcomes};

const WATCH_DEBOUNCE: Duration = Duration::from_millis(750);

pub fn discover_command(config: Option<&Path>, watch: bool, json: bool) -> Result<()> {
    let config = load_config(config)?;
    let modules_dir = config.modules_dir.clone();
    let mut lobby = Lobby::new(config);

    if !json {
        println!("🔍 Discovering modules in: {}", modules_dir.display());
    }
    let summary = lobby.refresh_now();
    report(&lobby, &summary, json)?;

    if watch {
        watch_modules(&mut lobby, &modules_dir, json)?;
    }
    Ok(())
}

fn report(lobby: &Lobby, summary: &RefreshSummary, json: bool) -> Result<()> {
    let games = lobby.games();
    if json {
        let rendered = serde_json::to_string_pretty(&games).context("Failed to serialize games")?;
        println!("{rendered}");
    } else {
        print_outcomes(&summary.outcomes);
        println!();
        print_game_list(&games, lobby.selected());
    }
    print_compilation_failures(&lobby.take_compilation_failures());
    Ok(())
}

fn watch_modules(lobby: &mut Lobby, modules_dir: &Path, json: bool) -> Result<()> {
    let (tx, rx) = mpsc::channel::<notify::Result<notify::Event>>();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })
    .context("Failed to create file watcher")?;
    watcher
        .watch(modules_dir, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", modules_dir.display()))?;

    println!("\n👀 Watching {} (Ctrl-C to stop)", modules_dir.display());

    let refresh_timeout = lobby.config().batch_timeout() + Duration::from_secs(5);
    let mut debounce_deadline: Option<Instant> = None;
    loop {
        let wait = debounce_deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::from_secs(3600));

        match rx.recv_timeout(wait) {
            Ok(Ok(event)) => {
                if event.paths.iter().any(|path| is_source_change(modules_dir, path)) {
                    debug!("Module change: {:?}", event.paths);
                    debounce_deadline = Some(Instant::now() + WATCH_DEBOUNCE);
                }
            }
            Ok(Err(e)) => tracing::warn!("Watch error: {}", e),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if debounce_deadline.take().is_some() {
                    if !json {
                        println!("\n🔄 Change detected, rediscovering...");
                    }
                    lobby.refresh();
                    if let Some(summary) = lobby.wait_refresh(refresh_timeout) {
                        report(lobby, &summary, json)?;
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}

/// Build output under `target/` must not trigger another discovery
fn is_source_change(modules_dir: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(modules_dir).unwrap_or(path);
    !relative.components().any(|component| match component {
        Component::Normal(name) => name == "target" || name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}
