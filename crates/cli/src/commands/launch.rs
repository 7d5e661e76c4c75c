use anyhow::{Context, Result, bail};
use gdk_launcher_core::{Error, Lobby};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Instant;

use super::load_config;
use crate::display::{print_compilation_failures, print_displayed_message};
use crate::surface::TerminalSurface;

const HELP: &str = "Type a JSON object and press enter to send it.\n\
    :last  resend the last message\n\
    :pace  toggle pacing of displayed messages\n\
    :help  show this help\n\
    :quit  stop the game";

pub fn launch_command(config: Option<&Path>, name: &str, config_json: Option<&str>) -> Result<()> {
    let config = load_config(config)?;
    let launch_config = config_json.map(read_config_json).transpose()?;

    let mut lobby = Lobby::new(config);
    let summary = lobby.refresh_now();
    print_compilation_failures(&lobby.take_compilation_failures());
    if summary.loaded == 0 {
        bail!(
            "No games found in {}",
            lobby.config().modules_dir.display()
        );
    }

    let mut surface = TerminalSurface::stdout();
    let scene = match lobby.launch(name, launch_config.as_deref(), &mut surface) {
        Ok(scene) => scene,
        Err(Error::ModuleNotFound(_)) => {
            let available: Vec<String> = lobby.games().into_iter().map(|g| g.module).collect();
            bail!("Game '{}' not found. Available: {}", name, available.join(", "));
        }
        Err(e) => return Err(e).context("Failed to launch game"),
    };
    if let Some(body) = scene.body {
        println!("{body}");
    }
    println!("{HELP}");

    console(&mut lobby)?;

    let saved = lobby.stop();
    for path in saved {
        println!("💾 Transcript saved: {}", path.display());
    }
    Ok(())
}

/// `@path` reads the configuration from a file
fn read_config_json(arg: &str) -> Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read launch configuration from {path}")),
        None => Ok(arg.to_string()),
    }
}

fn console(lobby: &mut Lobby) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush().ok();

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.context("Failed to read from stdin")?;
        let input = line.trim();

        let json = match input {
            "" => continue,
            ":quit" | ":q" => break,
            ":pace" => {
                let paced = !lobby.paced_display();
                lobby.set_paced_display(paced);
                println!("⏱️  Paced display {}", if paced { "on" } else { "off" });
                continue;
            }
            ":help" | ":h" => {
                println!("{HELP}");
                continue;
            }
            ":last" => match lobby.store().last_json_input() {
                Some(last) => last,
                None => {
                    println!("⚠️  Nothing sent yet");
                    continue;
                }
            },
            other => other.to_string(),
        };

        match lobby.send_message(&json) {
            Ok(exchange) => {
                show_queued(lobby);
                if exchange.session_ended {
                    println!("🏁 Session ended");
                    for path in &exchange.saved_transcripts {
                        println!("💾 Transcript saved: {}", path.display());
                    }
                }
            }
            Err(Error::InvalidJson(reason)) => println!("❌ Not sent, invalid JSON: {reason}"),
            Err(e) => println!("❌ {e}"),
        }
    }
    Ok(())
}

/// Print queued messages, at the pace the queue allows when pacing is on
fn show_queued(lobby: &mut Lobby) {
    if !lobby.paced_display() {
        for message in lobby.queue_mut().drain_all() {
            print_displayed_message(&message);
        }
        return;
    }

    let queue = lobby.queue_mut();
    loop {
        for message in queue.drain_ready(Instant::now()) {
            print_displayed_message(&message);
        }
        match queue.next_ready_in(Instant::now()) {
            Some(wait) => std::thread::sleep(wait),
            None => break,
        }
    }
}
