//! Recording of the messages exchanged with a running game

pub mod entry;
pub mod format;
pub mod session;

pub use entry::{Direction, SessionEvent, TranscriptEntry};
pub use format::{
    Transcript, TranscriptFormat, TranscriptHeader, TranscriptMessage, parse_entries, render,
};
pub use session::{RecordOutcome, TranscriptSession, file_stem};
