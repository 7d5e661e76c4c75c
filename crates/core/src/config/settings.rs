use crate::{
    error::{Error, Result},
    transcript::TranscriptFormat,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up when searching for a launcher configuration
pub const CONFIG_FILE_NAME: &str = "gdk-launcher.json";

const HIDDEN_CONFIG_FILE_NAME: &str = ".gdk-launcher.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct LauncherConfig {
    /// Directory whose immediate subdirectories are module candidates
    pub modules_dir: PathBuf,

    /// Directory for transcripts and persisted UI state
    pub saved_dir: PathBuf,

    pub build: BuildConfig,

    /// Extra directories searched for module libraries after the module's
    /// own output directory. Defaults to `<modules_dir>/../runtime/lib` and
    /// `<modules_dir>/../shared/lib`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_library_dirs: Option<Vec<PathBuf>>,

    /// Directory names under `modules_dir` that are never modules
    pub skip_dirs: Vec<String>,

    pub batch_timeout_secs: u64,
    pub module_timeout_secs: u64,
    pub failure_cooldown_secs: u64,

    /// Minimum delay between two messages shown by the console
    pub message_interval_ms: u64,

    /// Formats written when a session ends
    pub transcript_formats: Vec<TranscriptFormat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct BuildConfig {
    pub command: String,
    pub args: Vec<String>,

    /// Cargo profile directory the artifacts land in (`target/<profile>`)
    pub profile: String,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            command: "cargo".to_string(),
            args: vec![
                "build".to_string(),
                "--release".to_string(),
                "--quiet".to_string(),
            ],
            profile: "release".to_string(),
            env: BTreeMap::new(),
        }
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            modules_dir: PathBuf::from("modules"),
            saved_dir: PathBuf::from("saved"),
            build: BuildConfig::default(),
            shared_library_dirs: None,
            skip_dirs: vec![
                "target".to_string(),
                "runtime".to_string(),
                "shared".to_string(),
            ],
            batch_timeout_secs: 15,
            module_timeout_secs: 10,
            failure_cooldown_secs: 30,
            message_interval_ms: 150,
            transcript_formats: vec![TranscriptFormat::Json],
        }
    }
}

impl LauncherConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&contents)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn find_config_file(start_path: &Path) -> Option<PathBuf> {
        let mut current = start_path;

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Some(config_path);
            }

            let config_path = current.join(HIDDEN_CONFIG_FILE_NAME);
            if config_path.exists() {
                return Some(config_path);
            }

            current = current.parent()?;
        }
    }

    /// Load the nearest configuration above `start_path`, or the defaults
    /// rooted at `start_path` when there is none.
    pub fn discover(start_path: &Path) -> Result<Self> {
        match Self::find_config_file(start_path) {
            Some(path) => {
                tracing::debug!("Using config file {:?}", path);
                Self::load_from_file(&path)
            }
            None => {
                tracing::debug!("No config file found above {:?}, using defaults", start_path);
                let mut config = Self::default();
                config.resolve_relative_to(start_path);
                Ok(config)
            }
        }
    }

    /// Make every relative path absolute against `base`
    pub fn resolve_relative_to(&mut self, base: &Path) {
        fn absolutize(base: &Path, path: &mut PathBuf) {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }

        absolutize(base, &mut self.modules_dir);
        absolutize(base, &mut self.saved_dir);
        if let Some(dirs) = self.shared_library_dirs.as_mut() {
            for dir in dirs.iter_mut() {
                absolutize(base, dir);
            }
        }
    }

    pub fn shared_library_dirs(&self) -> Vec<PathBuf> {
        if let Some(dirs) = &self.shared_library_dirs {
            return dirs.clone();
        }
        let parent = self
            .modules_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        vec![
            parent.join("runtime").join("lib"),
            parent.join("shared").join("lib"),
        ]
    }

    pub fn transcripts_dir(&self) -> PathBuf {
        self.saved_dir.join("transcripts")
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn module_timeout(&self) -> Duration {
        Duration::from_secs(self.module_timeout_secs)
    }

    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_secs(self.failure_cooldown_secs)
    }

    pub fn message_interval(&self) -> Duration {
        Duration::from_millis(self.message_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_values() {
        let config = LauncherConfig::default();
        assert_eq!(config.batch_timeout(), Duration::from_secs(15));
        assert_eq!(config.module_timeout(), Duration::from_secs(10));
        assert_eq!(config.failure_cooldown(), Duration::from_secs(30));
        assert_eq!(config.build.command, "cargo");
        assert_eq!(config.build.profile, "release");
        assert_eq!(config.transcript_formats, vec![TranscriptFormat::Json]);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LauncherConfig =
            serde_json::from_str(r#"{"module_timeout_secs": 3, "build": {"profile": "debug"}}"#)
                .unwrap();
        assert_eq!(config.module_timeout_secs, 3);
        assert_eq!(config.batch_timeout_secs, 15);
        assert_eq!(config.build.profile, "debug");
        assert_eq!(config.build.command, "cargo");
    }

    #[test]
    fn test_save_and_load_resolves_paths() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join(CONFIG_FILE_NAME);

        let config = LauncherConfig {
            transcript_formats: vec![TranscriptFormat::Json, TranscriptFormat::Text],
            ..Default::default()
        };
        config.save_to_file(&path)?;

        let loaded = LauncherConfig::load_from_file(&path)?;
        assert_eq!(loaded.modules_dir, temp_dir.path().join("modules"));
        assert_eq!(loaded.saved_dir, temp_dir.path().join("saved"));
        assert_eq!(loaded.transcript_formats.len(), 2);
        Ok(())
    }

    #[test]
    fn test_find_config_file_walks_up() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let nested = temp_dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested)?;
        std::fs::write(temp_dir.path().join(HIDDEN_CONFIG_FILE_NAME), "{}")?;

        let found = LauncherConfig::find_config_file(&nested);
        assert_eq!(found, Some(temp_dir.path().join(HIDDEN_CONFIG_FILE_NAME)));
        Ok(())
    }

    #[test]
    fn test_invalid_config_is_config_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ not json")?;

        let err = LauncherConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        Ok(())
    }

    #[test]
    fn test_default_shared_library_dirs_are_siblings() {
        let mut config = LauncherConfig::default();
        config.resolve_relative_to(Path::new("/opt/gdk"));
        assert_eq!(
            config.shared_library_dirs(),
            vec![
                PathBuf::from("/opt/gdk/runtime/lib"),
                PathBuf::from("/opt/gdk/shared/lib"),
            ]
        );
    }
}
