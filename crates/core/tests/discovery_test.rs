use gdk_api::{GameMetadata, GameModule, GameSurface, Message, ModuleError, Scene};
use gdk_launcher_core::{
    BuildOutput, BuiltinFactory, CandidateOutcome, FailureTracker, LauncherConfig,
    LoaderSettings, ModuleBuilder, ModuleCandidate, ModuleLoader, Result,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const METADATA_METHODS: &[(&str, &str, &str)] = &[
    ("game_name", "String", "\"Tetris\".into()"),
    ("game_version", "String", "\"2.1\".into()"),
    ("game_description", "String", "\"Falling blocks\".into()"),
    ("game_author", "String", "\"GDK\".into()"),
    ("min_players", "u32", "1"),
    ("max_players", "u32", "1"),
    ("min_difficulty", "u32", "1"),
    ("max_difficulty", "u32", "10"),
    ("estimated_duration_minutes", "u32", "15"),
    ("required_resources", "Vec<String>", "vec![]"),
    ("supports_online_multiplayer", "bool", "false"),
    ("supports_local_multiplayer", "bool", "false"),
    ("supports_single_player", "bool", "true"),
];

fn write_module(root: &Path, name: &str, with_metadata: bool) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::write(
        dir.join("Cargo.toml"),
        format!(
            "[package]\nname = \"{name}\"\nversion = \"0.1.0\"\nedition = \"2024\"\n\n[lib]\ncrate-type = [\"cdylib\"]\n"
        ),
    )
    .unwrap();
    fs::write(
        dir.join("src/lib.rs"),
        "mod metadata;\n\npub struct Game;\n\nimpl gdk_api::GameModule for Game {}\n\ngdk_api::export_game_module!(Game::new);\n",
    )
    .unwrap();

    if with_metadata {
        let mut metadata = String::from("pub struct Info;\n\nimpl gdk_api::GameMetadata for Info {\n");
        for (method, ty, body) in METADATA_METHODS {
            metadata.push_str(&format!("    fn {method}(&self) -> {ty} {{ {body} }}\n"));
        }
        metadata.push_str("}\n");
        fs::write(dir.join("src/metadata.rs"), metadata).unwrap();
    }
    dir
}

struct Tetris;

impl GameMetadata for Tetris {
    fn game_name(&self) -> String {
        "Tetris".into()
    }
    fn game_version(&self) -> String {
        "2.1".into()
    }
    fn game_description(&self) -> String {
        "Falling blocks".into()
    }
    fn game_author(&self) -> String {
        "GDK".into()
    }
    fn min_players(&self) -> u32 {
        1
    }
    fn max_players(&self) -> u32 {
        1
    }
    fn min_difficulty(&self) -> u32 {
        1
    }
    fn max_difficulty(&self) -> u32 {
        10
    }
    fn estimated_duration_minutes(&self) -> u32 {
        15
    }
    fn required_resources(&self) -> Vec<String> {
        Vec::new()
    }
    fn supports_online_multiplayer(&self) -> bool {
        false
    }
    fn supports_local_multiplayer(&self) -> bool {
        false
    }
    fn supports_single_player(&self) -> bool {
        true
    }
}

impl GameModule for Tetris {
    fn game_id(&self) -> String {
        "tetris".into()
    }
    fn metadata(&self) -> &dyn GameMetadata {
        self
    }
    fn launch(
        &mut self,
        _surface: &mut dyn GameSurface,
        _config: Option<&Message>,
    ) -> std::result::Result<Scene, ModuleError> {
        Ok(Scene::new("Tetris"))
    }
    fn stop(&mut self) {}
    fn handle_message(&mut self, message: &Message) -> Message {
        message.clone()
    }
}

/// Records which modules it was asked to build
#[derive(Default)]
struct RecordingBuilder {
    fail: bool,
    built: Mutex<Vec<String>>,
}

impl RecordingBuilder {
    fn built(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }
}

impl ModuleBuilder for RecordingBuilder {
    fn build(&self, candidate: &ModuleCandidate) -> Result<BuildOutput> {
        self.built.lock().unwrap().push(candidate.name.clone());
        if !self.fail {
            fs::create_dir_all(&candidate.output_dir)?;
            fs::write(candidate.artifact_path(), b"")?;
        }
        Ok(BuildOutput {
            success: !self.fail,
            exit_code: Some(if self.fail { 101 } else { 0 }),
            output: if self.fail {
                "   Compiling tetris v0.1.0\nerror[E0308]: mismatched types\nerror: could not compile `tetris`\n".into()
            } else {
                String::new()
            },
            duration: Duration::ZERO,
        })
    }
}

fn loader(builder: Arc<RecordingBuilder>) -> ModuleLoader {
    let factory = BuiltinFactory::new()
        .with_module("tetris", || Box::new(Tetris))
        .with_module("snake", || Box::new(Tetris));
    ModuleLoader::new(
        LoaderSettings::from_config(&LauncherConfig::default()),
        builder,
        Arc::new(factory),
        FailureTracker::new(Duration::from_secs(30)),
    )
}

#[test]
fn test_only_structurally_valid_modules_are_loaded() {
    let temp_dir = TempDir::new().unwrap();
    write_module(temp_dir.path(), "tetris", true);
    write_module(temp_dir.path(), "snake", false);

    let builder = Arc::new(RecordingBuilder::default());
    let loader = loader(builder.clone());
    let report = loader.discover_with_report(temp_dir.path(), &CancellationToken::new());

    assert_eq!(report.instances.len(), 1);
    assert_eq!(report.instances[0].game().metadata().game_name(), "Tetris");
    assert_eq!(builder.built(), vec!["tetris"]);
    assert!(matches!(
        report.outcome("snake"),
        Some(CandidateOutcome::StructurallyInvalid(_))
    ));
}

#[test]
fn test_each_discovery_creates_new_instances() {
    let temp_dir = TempDir::new().unwrap();
    write_module(temp_dir.path(), "tetris", true);

    let builder = Arc::new(RecordingBuilder::default());
    let loader = loader(builder.clone());
    assert_eq!(loader.discover(temp_dir.path()).len(), 1);
    assert_eq!(loader.discover(temp_dir.path()).len(), 1);
    // Second pass finds the fresh build marker
    assert_eq!(builder.built(), vec!["tetris"]);
}

#[test]
fn test_failed_build_is_not_retried_during_cooldown() {
    let temp_dir = TempDir::new().unwrap();
    write_module(temp_dir.path(), "tetris", true);

    let builder = Arc::new(RecordingBuilder {
        fail: true,
        ..RecordingBuilder::default()
    });
    let loader = loader(builder.clone());

    assert!(loader.discover(temp_dir.path()).is_empty());
    assert!(loader.discover(temp_dir.path()).is_empty());
    assert_eq!(builder.built().len(), 1);

    let failures = loader.failures().take_unreported();
    assert_eq!(failures.len(), 1);
    assert_eq!(
        failures[0].summary,
        vec![
            "error[E0308]: mismatched types",
            "error: could not compile `tetris`"
        ]
    );
    assert!(loader.failures().take_unreported().is_empty());
    assert!(loader.failures().is_cooling_down("tetris"));
}

#[test]
fn test_module_with_comment_only_impl_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let dir = write_module(temp_dir.path(), "tetris", true);
    fs::write(
        dir.join("src/lib.rs"),
        "// impl GameModule for Game\npub struct Game;\nconst NOTE: &str = \"impl GameModule for Game\";\n",
    )
    .unwrap();

    let builder = Arc::new(RecordingBuilder::default());
    let report =
        loader(builder.clone()).discover_with_report(temp_dir.path(), &CancellationToken::new());
    assert!(report.instances.is_empty());
    assert!(builder.built().is_empty());
}
