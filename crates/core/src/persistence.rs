//! Small pieces of UI state kept between runs, one flat file each

use std::path::{Path, PathBuf};

const TOGGLE_STATE_FILE: &str = "toggle_state.txt";
const LAST_GAME_FILE: &str = "last_game.txt";
const LAST_JSON_INPUT_FILE: &str = "last_json_input.txt";

/// Reads never fail: a missing or unreadable file yields the default.
/// Writes report success as `bool` and log the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceStore {
    dir: PathBuf,
}

impl PersistenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the console paces displayed messages; off by default
    pub fn toggle_state(&self) -> bool {
        self.read(TOGGLE_STATE_FILE)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
    }

    pub fn save_toggle_state(&self, enabled: bool) -> bool {
        self.write(TOGGLE_STATE_FILE, if enabled { "true" } else { "false" })
    }

    pub fn last_game(&self) -> Option<String> {
        self.read(LAST_GAME_FILE)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    pub fn save_last_game(&self, name: &str) -> bool {
        self.write(LAST_GAME_FILE, name)
    }

    pub fn last_json_input(&self) -> Option<String> {
        self.read(LAST_JSON_INPUT_FILE)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn save_last_json_input(&self, json: &str) -> bool {
        self.write(LAST_JSON_INPUT_FILE, json)
    }

    fn read(&self, file: &str) -> Option<String> {
        let path = self.dir.join(file);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Cannot read {:?}: {}", path, e);
                None
            }
        }
    }

    fn write(&self, file: &str, contents: &str) -> bool {
        let path = self.dir.join(file);
        let result =
            std::fs::create_dir_all(&self.dir).and_then(|_| std::fs::write(&path, contents));
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Cannot write {:?}: {}", path, e);
                false
            }
        }
    }
}
