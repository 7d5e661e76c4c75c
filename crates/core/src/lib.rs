//! gdk-launcher-core - Discovery, build and loading of GDK game modules
//!
//! This crate provides functionality to:
//! - Validate module sources against the plugin contract without compiling them
//! - Build modules with an external build tool and load the resulting libraries
//! - Run a lobby of discovered games with a JSON message console
//! - Record the exchanged messages as transcripts
pub mod build;
pub mod config;
pub mod error;
pub mod lobby;
pub mod loader;
pub mod parser;
pub mod persistence;
pub mod transcript;
pub mod validator;

// Re-export commonly used types
pub use error::{Error, Result};

// Re-export main API components
pub use build::{BuildCommand, BuildOutput, CommandBuilder, ModuleBuilder};
pub use config::{BuildConfig, CONFIG_FILE_NAME, LauncherConfig};
pub use lobby::{Exchange, GameSummary, Lobby, RefreshSummary, parse_message};
pub use loader::{
    BuiltinFactory, CandidateOutcome, DiscoveryReport, FailureTracker, LoaderSettings,
    ModuleCandidate, ModuleFactory, ModuleLoader, PluginInstance,
};
pub use persistence::PersistenceStore;
pub use transcript::{RecordOutcome, Transcript, TranscriptFormat, TranscriptSession};
pub use validator::{StructuralValidator, ValidationFailure, ValidationReport};
