use chrono::{DateTime, Utc};
use gdk_api::{Message, is_end_message};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::entry::{Direction, TranscriptEntry};
use super::format::{TranscriptFormat, render};

/// What happened to a recorded message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// No session is open
    Ignored,
    Recorded,
    /// The message was the end sentinel; the session was closed and written
    /// to `saved` (empty when every write failed)
    SessionEnded { saved: Vec<PathBuf> },
}

#[derive(Debug, Default)]
struct SessionState {
    in_session: bool,
    entries: Vec<TranscriptEntry>,
    game_name: Option<String>,
}

/// Records the messages of one game session at a time.
///
/// Checking the session flag, appending and the end-of-session save happen
/// under one lock, so a concurrent recorder never sees a half-closed session.
#[derive(Debug)]
pub struct TranscriptSession {
    state: Mutex<SessionState>,
    dir: PathBuf,
    formats: Vec<TranscriptFormat>,
}

impl TranscriptSession {
    /// Sessions ending on their own are written to `dir` in each of `formats`
    pub fn new(dir: impl Into<PathBuf>, formats: Vec<TranscriptFormat>) -> Self {
        let formats = if formats.is_empty() {
            vec![TranscriptFormat::Json]
        } else {
            formats
        };
        Self {
            state: Mutex::new(SessionState::default()),
            dir: dir.into(),
            formats,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn start_session(&self, game_name: Option<&str>, game_version: Option<&str>) {
        let mut state = self.lock();
        if state.in_session {
            tracing::debug!("Discarding unfinished transcript of {:?}", state.game_name);
        }
        state.entries.clear();
        state.in_session = true;
        state.game_name = game_name.map(str::to_string);
        state.entries.push(TranscriptEntry::session_start(
            Utc::now(),
            game_name.map(str::to_string),
            game_version.map(str::to_string),
        ));
        tracing::debug!("Transcript session started for {:?}", game_name);
    }

    pub fn record_to_game(&self, message: &Message) -> RecordOutcome {
        self.record(Direction::ToGame, message)
    }

    pub fn record_from_game(&self, message: &Message) -> RecordOutcome {
        self.record(Direction::FromGame, message)
    }

    fn record(&self, direction: Direction, message: &Message) -> RecordOutcome {
        let mut state = self.lock();
        if !state.in_session {
            return RecordOutcome::Ignored;
        }

        state
            .entries
            .push(TranscriptEntry::message(direction, Utc::now(), message.clone()));

        if is_end_message(message) {
            let saved = self.close(&mut state);
            return RecordOutcome::SessionEnded { saved };
        }
        RecordOutcome::Recorded
    }

    /// End an open session and write it out; empty when none was open
    pub fn end_session(&self) -> Vec<PathBuf> {
        let mut state = self.lock();
        if !state.in_session {
            return Vec::new();
        }
        self.close(&mut state)
    }

    fn close(&self, state: &mut SessionState) -> Vec<PathBuf> {
        let now = Utc::now();
        state.entries.push(TranscriptEntry::session_end(now));
        state.in_session = false;

        let stem = file_stem(state.game_name.as_deref(), now);
        let saved: Vec<PathBuf> = self
            .formats
            .iter()
            .filter_map(|format| {
                let path = self.dir.join(format!("{stem}.{}", format.extension()));
                write_entries(&state.entries, *format, &path, now)
            })
            .collect();

        tracing::info!("Transcript session ended, saved {} file(s)", saved.len());
        saved
    }

    /// Write the current entries as a JSON document to `path`, or to the
    /// transcripts directory. `None` when the write failed.
    pub fn save(&self, path: Option<&Path>) -> Option<PathBuf> {
        let state = self.lock();
        let now = Utc::now();
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => self.dir.join(format!(
                "{}.{}",
                file_stem(state.game_name.as_deref(), now),
                TranscriptFormat::Json.extension()
            )),
        };
        write_entries(&state.entries, TranscriptFormat::Json, &path, now)
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.in_session = false;
        state.game_name = None;
    }

    pub fn is_in_session(&self) -> bool {
        self.lock().in_session
    }

    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn write_entries(
    entries: &[TranscriptEntry],
    format: TranscriptFormat,
    path: &Path,
    now: DateTime<Utc>,
) -> Option<PathBuf> {
    let contents = match render(entries, format, now) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!("Cannot render transcript as {}: {}", format, e);
            return None;
        }
    };

    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Cannot create transcript directory {:?}: {}", parent, e);
            return None;
        }
    }

    match std::fs::write(path, contents) {
        Ok(()) => {
            tracing::info!("Transcript written to {:?}", path);
            Some(path.to_path_buf())
        }
        Err(e) => {
            tracing::warn!("Cannot write transcript {:?}: {}", path, e);
            None
        }
    }
}

/// `transcript-<game>-<timestamp>`, safe on every file system
pub fn file_stem(game_name: Option<&str>, at: DateTime<Utc>) -> String {
    let game = sanitize(game_name.unwrap_or("unknown"));
    let game = if game.is_empty() { "unknown".to_string() } else { game };
    format!("transcript-{}-{}", game, at.format("%Y%m%d-%H%M%S-%3f"))
}

fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
