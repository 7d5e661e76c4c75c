//! In-process games and builders for unit tests

use gdk_api::{GameMetadata, GameModule, GameSurface, Message, ModuleError, Scene};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::ModuleCandidate;
use crate::build::{BuildOutput, ModuleBuilder};
use crate::error::Result;

pub struct EchoInfo {
    name: String,
}

impl GameMetadata for EchoInfo {
    fn game_name(&self) -> String {
        self.name.clone()
    }

    fn game_version(&self) -> String {
        "1.0".to_string()
    }

    fn game_description(&self) -> String {
        "Replies with what it receives".to_string()
    }

    fn game_author(&self) -> String {
        "GDK".to_string()
    }

    fn min_players(&self) -> u32 {
        1
    }

    fn max_players(&self) -> u32 {
        2
    }

    fn min_difficulty(&self) -> u32 {
        1
    }

    fn max_difficulty(&self) -> u32 {
        3
    }

    fn estimated_duration_minutes(&self) -> u32 {
        5
    }

    fn required_resources(&self) -> Vec<String> {
        Vec::new()
    }

    fn supports_online_multiplayer(&self) -> bool {
        false
    }

    fn supports_local_multiplayer(&self) -> bool {
        true
    }

    fn supports_single_player(&self) -> bool {
        true
    }
}

/// Echoes every message back with `"echo": true`
pub struct EchoGame {
    info: EchoInfo,
    pub running: bool,
}

impl EchoGame {
    pub fn new(name: &str) -> Self {
        Self {
            info: EchoInfo {
                name: name.to_string(),
            },
            running: false,
        }
    }
}

impl GameModule for EchoGame {
    fn game_id(&self) -> String {
        self.info.name.to_lowercase()
    }

    fn metadata(&self) -> &dyn GameMetadata {
        &self.info
    }

    fn launch(
        &mut self,
        surface: &mut dyn GameSurface,
        config: Option<&Message>,
    ) -> std::result::Result<Scene, ModuleError> {
        if config.is_some_and(|c| c.get("fail") == Some(&Value::Bool(true))) {
            return Err(ModuleError::new("refused to start"));
        }
        self.running = true;
        surface.set_title(&self.info.name);
        Ok(Scene::new(self.info.name.clone()))
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn handle_message(&mut self, message: &Message) -> Message {
        let mut reply = message.clone();
        reply.insert("echo".to_string(), Value::Bool(true));
        reply
    }
}

/// Pretends to build: succeeds or fails without running anything
#[derive(Clone, Default)]
pub struct FakeBuilder {
    pub fail: bool,
    pub delay: Option<Duration>,
    pub calls: Arc<AtomicUsize>,
}

impl FakeBuilder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModuleBuilder for FakeBuilder {
    fn build(&self, candidate: &ModuleCandidate) -> Result<BuildOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if !self.fail {
            std::fs::create_dir_all(&candidate.output_dir)?;
            std::fs::write(candidate.artifact_path(), b"")?;
        }
        Ok(BuildOutput {
            success: !self.fail,
            exit_code: Some(if self.fail { 101 } else { 0 }),
            output: if self.fail {
                "error: could not compile".to_string()
            } else {
                String::new()
            },
            duration: Duration::ZERO,
        })
    }
}
