//! gdk-api - The contract between the GDK launcher and its game modules
//!
//! A game module is a `cdylib` crate that:
//! - implements [`GameModule`] for its entry type (in `src/lib.rs`)
//! - implements [`GameMetadata`] for its metadata type (in `src/metadata.rs`)
//! - exports a [`ModuleDeclaration`] with [`export_game_module!`]
//!
//! Modules and launcher must be built against the same version of this crate;
//! the launcher refuses declarations whose versions do not match its own.

use std::fmt;

/// A protocol message: a JSON object keyed by field name.
///
/// By convention every message carries a `"function"` field naming the
/// operation, e.g. `{"function": "move", "x": 1, "y": 2}`.
pub type Message = serde_json::Map<String, serde_json::Value>;

/// Version of the module ABI described by this crate.
pub const MODULE_API_VERSION: u32 = 1;

/// Version of this crate, baked into every exported declaration.
pub const API_CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the exported declaration symbol (NUL-terminated for `dlsym`).
pub const MODULE_DECLARATION_SYMBOL: &[u8] = b"GDK_MODULE_DECLARATION\0";

/// Name of the message field that selects the operation.
pub const FUNCTION_FIELD: &str = "function";

/// `function` value that ends a game session.
pub const END_FUNCTION: &str = "end";

/// Descriptive information about a game.
pub trait GameMetadata: Send + Sync {
    fn game_name(&self) -> String;

    fn game_version(&self) -> String;

    fn game_description(&self) -> String;

    fn game_author(&self) -> String;

    fn min_players(&self) -> u32;

    fn max_players(&self) -> u32;

    fn min_difficulty(&self) -> u32;

    fn max_difficulty(&self) -> u32;

    fn estimated_duration_minutes(&self) -> u32;

    /// Resources (assets, services) the game expects to be available
    fn required_resources(&self) -> Vec<String>;

    fn supports_online_multiplayer(&self) -> bool;

    fn supports_local_multiplayer(&self) -> bool;

    fn supports_single_player(&self) -> bool;
}

/// The display surface handed to a game when it is launched.
pub trait GameSurface {
    /// Set the title shown for the running game
    fn set_title(&mut self, title: &str);

    /// Show a block of text to the player
    fn show(&mut self, text: &str);
}

/// What a game reports back after a successful launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    /// Title of the initial scene
    pub title: String,

    /// Optional initial content, already shown on the surface
    pub body: Option<String>,
}

impl Scene {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Error reported by a game module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleError(String);

impl ModuleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ModuleError {}

impl From<String> for ModuleError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for ModuleError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Main game interface
pub trait GameModule: Send {
    /// Stable identifier of the game
    fn game_id(&self) -> String;

    /// Descriptive metadata
    fn metadata(&self) -> &dyn GameMetadata;

    /// Start the game on the given surface, with an optional JSON configuration
    fn launch(
        &mut self,
        surface: &mut dyn GameSurface,
        config: Option<&Message>,
    ) -> Result<Scene, ModuleError>;

    /// Stop the game and release what `launch` acquired
    fn stop(&mut self);

    /// Handle one protocol message and produce the reply
    fn handle_message(&mut self, message: &Message) -> Message;
}

/// The entry point a module exports under [`MODULE_DECLARATION_SYMBOL`].
pub struct ModuleDeclaration {
    pub api_version: u32,
    pub api_crate_version: &'static str,
    pub create: fn() -> Box<dyn GameModule>,
}

/// Returns the `function` field of a message, if it is a string.
pub fn message_function(message: &Message) -> Option<&str> {
    message.get(FUNCTION_FIELD).and_then(|v| v.as_str())
}

/// Whether the message is the end-of-session sentinel.
pub fn is_end_message(message: &Message) -> bool {
    message_function(message) == Some(END_FUNCTION)
}

/// Export a module's entry type.
///
/// The argument is a no-argument constructor returning the type that
/// implements [`GameModule`]:
///
/// ```ignore
/// gdk_api::export_game_module!(Chess::new);
/// ```
#[macro_export]
macro_rules! export_game_module {
    ($constructor:path) => {
        #[unsafe(no_mangle)]
        pub static GDK_MODULE_DECLARATION: $crate::ModuleDeclaration = $crate::ModuleDeclaration {
            api_version: $crate::MODULE_API_VERSION,
            api_crate_version: $crate::API_CRATE_VERSION,
            create: {
                fn __gdk_create_module() -> ::std::boxed::Box<dyn $crate::GameModule> {
                    ::std::boxed::Box::new($constructor())
                }
                __gdk_create_module
            },
        };
    };
}
