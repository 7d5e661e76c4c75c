//! The lobby: the list of discovered games, the running game and its
//! message console

mod message_queue;
mod refresh;

pub use message_queue::{DisplayedMessage, MessageQueue};

use gdk_api::{GameSurface, Message, Scene};
use serde::Serialize;
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::{
    config::LauncherConfig,
    error::{Error, Result},
    loader::{BuildFailure, DiscoveryReport, ModuleLoader, ModuleOutcome, PluginInstance},
    persistence::PersistenceStore,
    transcript::{Direction, RecordOutcome, TranscriptSession},
};
use refresh::RefreshTracker;

/// What the lobby shows for one game
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameSummary {
    pub module: String,
    pub game_id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub min_players: u32,
    pub max_players: u32,
    pub min_difficulty: u32,
    pub max_difficulty: u32,
    pub estimated_duration_minutes: u32,
    pub required_resources: Vec<String>,
    pub supports_online_multiplayer: bool,
    pub supports_local_multiplayer: bool,
    pub supports_single_player: bool,
    pub running: bool,
}

impl GameSummary {
    pub fn from_instance(instance: &PluginInstance, running: bool) -> Self {
        let game = instance.game();
        let metadata = game.metadata();
        Self {
            module: instance.module_name().to_string(),
            game_id: game.game_id(),
            name: metadata.game_name(),
            version: metadata.game_version(),
            description: metadata.game_description(),
            author: metadata.game_author(),
            min_players: metadata.min_players(),
            max_players: metadata.max_players(),
            min_difficulty: metadata.min_difficulty(),
            max_difficulty: metadata.max_difficulty(),
            estimated_duration_minutes: metadata.estimated_duration_minutes(),
            required_resources: metadata.required_resources(),
            supports_online_multiplayer: metadata.supports_online_multiplayer(),
            supports_local_multiplayer: metadata.supports_local_multiplayer(),
            supports_single_player: metadata.supports_single_player(),
            running,
        }
    }
}

/// Result of applying a finished refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSummary {
    pub id: u64,
    pub loaded: usize,
    pub outcomes: Vec<ModuleOutcome>,
}

/// One message sent to the running game and its reply
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub request: Message,
    pub response: Message,
    /// Transcript files written because either message ended the session
    pub saved_transcripts: Vec<PathBuf>,
    pub session_ended: bool,
}

pub struct Lobby {
    config: LauncherConfig,
    loader: ModuleLoader,
    transcript: TranscriptSession,
    store: PersistenceStore,
    queue: MessageQueue,
    refresh: RefreshTracker,
    games: Vec<PluginInstance>,
    running: Option<PluginInstance>,
    selected: Option<String>,
}

impl Lobby {
    pub fn new(config: LauncherConfig) -> Self {
        let loader = ModuleLoader::from_config(&config);
        Self::with_loader(config, loader)
    }

    pub fn with_loader(config: LauncherConfig, loader: ModuleLoader) -> Self {
        let store = PersistenceStore::new(&config.saved_dir);
        let selected = store.last_game();
        Self {
            transcript: TranscriptSession::new(
                config.transcripts_dir(),
                config.transcript_formats.clone(),
            ),
            queue: MessageQueue::new(config.message_interval()),
            refresh: RefreshTracker::new(),
            games: Vec::new(),
            running: None,
            selected,
            store,
            loader,
            config,
        }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    pub fn transcript(&self) -> &TranscriptSession {
        &self.transcript
    }

    pub fn store(&self) -> &PersistenceStore {
        &self.store
    }

    pub fn queue_mut(&mut self) -> &mut MessageQueue {
        &mut self.queue
    }

    /// Whether displayed messages wait for the queue interval; kept between runs
    pub fn paced_display(&self) -> bool {
        self.store.toggle_state()
    }

    pub fn set_paced_display(&mut self, paced: bool) -> bool {
        tracing::debug!("Paced display {}", if paced { "on" } else { "off" });
        self.store.save_toggle_state(paced)
    }

    /// Start discovery in the background, superseding any running refresh
    pub fn refresh(&mut self) -> u64 {
        let root = self.config.modules_dir.clone();
        let id = self.refresh.spawn(self.loader.clone(), root);
        tracing::info!("Refreshing game list (refresh {})", id);
        id
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh.is_running()
    }

    /// Apply the newest finished refresh, if it has arrived
    pub fn poll_refresh(&mut self) -> Option<RefreshSummary> {
        let report = self.refresh.try_take()?;
        Some(self.apply(report))
    }

    pub fn wait_refresh(&mut self, timeout: Duration) -> Option<RefreshSummary> {
        let report = self.refresh.wait(timeout)?;
        Some(self.apply(report))
    }

    /// Discover on the calling thread
    pub fn refresh_now(&mut self) -> RefreshSummary {
        let (_, cancel) = self.refresh.begin();
        let report = self
            .loader
            .discover_with_report(&self.config.modules_dir, &cancel);
        self.refresh.cancel();
        self.apply(report)
    }

    pub fn cancel_refresh(&mut self) {
        self.refresh.cancel();
    }

    fn apply(&mut self, report: DiscoveryReport) -> RefreshSummary {
        let DiscoveryReport {
            instances,
            outcomes,
            ..
        } = report;
        self.games = instances;
        tracing::info!("Game list updated: {} game(s)", self.games.len());
        RefreshSummary {
            id: self.refresh.latest_id(),
            loaded: self.games.len(),
            outcomes,
        }
    }

    /// Games available to launch, plus the running one
    pub fn games(&self) -> Vec<GameSummary> {
        let mut games: Vec<GameSummary> = self
            .games
            .iter()
            .map(|instance| GameSummary::from_instance(instance, false))
            .chain(
                self.running
                    .iter()
                    .map(|instance| GameSummary::from_instance(instance, true)),
            )
            .collect();
        games.sort_by(|a, b| a.module.cmp(&b.module));
        games
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Remember `name` as the chosen game, here and across runs
    pub fn select(&mut self, name: &str) -> Result<()> {
        let module = self
            .find_game(name)
            .map(|index| self.games[index].module_name().to_string())
            .or_else(|| {
                self.running
                    .as_ref()
                    .filter(|instance| matches_name(instance, name))
                    .map(|instance| instance.module_name().to_string())
            })
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))?;
        self.store.save_last_game(&module);
        self.selected = Some(module);
        Ok(())
    }

    pub fn running_game(&self) -> Option<&PluginInstance> {
        self.running.as_ref()
    }

    pub fn launch(
        &mut self,
        name: &str,
        config_json: Option<&str>,
        surface: &mut dyn GameSurface,
    ) -> Result<Scene> {
        let config = match config_json.map(str::trim).filter(|json| !json.is_empty()) {
            Some(json) => Some(parse_message(json)?),
            None => None,
        };

        let running_matches = self
            .running
            .as_ref()
            .is_some_and(|instance| matches_name(instance, name));
        if self.find_game(name).is_none() && !running_matches {
            return Err(Error::ModuleNotFound(name.to_string()));
        }

        self.stop();
        let index = self
            .find_game(name)
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))?;
        let mut instance = self.games.remove(index);

        let game_name = instance.game().metadata().game_name();
        let launched = guarded(&game_name, || {
            instance.game_mut().launch(surface, config.as_ref())
        })
        .and_then(|result| {
            result.map_err(|e| Error::PluginError(format!("{game_name} failed to launch: {e}")))
        });

        match launched {
            Ok(scene) => {
                let version = instance.game().metadata().game_version();
                tracing::info!("Launched {} {}", game_name, version);
                self.transcript
                    .start_session(Some(&game_name), Some(&version));
                self.store.save_last_game(instance.module_name());
                self.selected = Some(instance.module_name().to_string());
                self.running = Some(instance);
                Ok(scene)
            }
            Err(e) => {
                tracing::warn!("{}", e);
                self.games.insert(index, instance);
                Err(e)
            }
        }
    }

    /// Send one JSON message to the running game
    pub fn send_message(&mut self, json_text: &str) -> Result<Exchange> {
        let request = parse_message(json_text)?;
        let Some(instance) = self.running.as_mut() else {
            return Err(Error::NoActiveGame);
        };

        self.store.save_last_json_input(json_text);
        let mut saved_transcripts = Vec::new();
        let mut session_ended = false;
        if let RecordOutcome::SessionEnded { saved } = self.transcript.record_to_game(&request) {
            saved_transcripts.extend(saved);
            session_ended = true;
        }

        let game_id = instance.game().game_id();
        let response = guarded(&game_id, || instance.game_mut().handle_message(&request))?;

        if let RecordOutcome::SessionEnded { saved } = self.transcript.record_from_game(&response) {
            saved_transcripts.extend(saved);
            session_ended = true;
        }

        let now = Instant::now();
        self.queue.push_at(Direction::ToGame, request.clone(), now);
        self.queue.push_at(Direction::FromGame, response.clone(), now);

        Ok(Exchange {
            request,
            response,
            saved_transcripts,
            session_ended,
        })
    }

    /// Stop the running game and close its transcript. Returns the files the
    /// transcript was written to.
    pub fn stop(&mut self) -> Vec<PathBuf> {
        let Some(mut instance) = self.running.take() else {
            return Vec::new();
        };

        let game_id = instance.game().game_id();
        if let Err(e) = guarded(&game_id, || instance.game_mut().stop()) {
            tracing::warn!("{}", e);
        }
        tracing::info!("Stopped {}", game_id);
        let saved = self.transcript.end_session();

        // A refresh may have loaded a newer instance of the same module
        let module = instance.module_name().to_string();
        if !self.games.iter().any(|g| g.module_name() == module) {
            self.games.push(instance);
            self.games
                .sort_by(|a, b| a.module_name().cmp(b.module_name()));
        }
        saved
    }

    /// Build failures not yet shown to the user
    pub fn take_compilation_failures(&self) -> Vec<BuildFailure> {
        self.loader.failures().take_unreported()
    }

    fn find_game(&self, name: &str) -> Option<usize> {
        self.games
            .iter()
            .position(|instance| matches_name(instance, name))
    }
}

impl Drop for Lobby {
    fn drop(&mut self) {
        self.refresh.cancel();
        self.stop();
    }
}

fn matches_name(instance: &PluginInstance, name: &str) -> bool {
    let game = instance.game();
    instance.module_name() == name
        || game.game_id() == name
        || game.metadata().game_name().eq_ignore_ascii_case(name)
}

/// A JSON object, or `Error::InvalidJson`
pub fn parse_message(json_text: &str) -> Result<Message> {
    match serde_json::from_str::<Value>(json_text) {
        Ok(Value::Object(message)) => Ok(message),
        Ok(other) => Err(Error::InvalidJson(format!(
            "expected a JSON object, got {}",
            json_type(&other)
        ))),
        Err(e) => Err(Error::InvalidJson(e.to_string())),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Run a call into game code, turning a panic into an error
fn guarded<T>(game: &str, call: impl FnOnce() -> T) -> Result<T> {
    catch_unwind(AssertUnwindSafe(call))
        .map_err(|_| Error::PluginError(format!("{game} panicked")))
}
