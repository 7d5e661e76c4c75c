//! Configuration management for the GDK launcher

mod settings;

pub use settings::{BuildConfig, CONFIG_FILE_NAME, LauncherConfig};
