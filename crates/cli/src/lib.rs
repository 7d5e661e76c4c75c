pub mod cli;
pub mod commands;
pub mod display;
pub mod surface;

// Re-export commonly used items
pub use cli::{Cli, Commands};
