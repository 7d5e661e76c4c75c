//! Rust source code parsing and analysis using tree-sitter

pub mod outline;
pub mod rust_parser;
pub mod utils;

// Re-export commonly used items
pub use outline::{SourceOutline, TraitImpl};
pub use rust_parser::RustParser;
pub use utils::{last_path_segment, node_line};
