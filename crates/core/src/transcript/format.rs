use chrono::{DateTime, SecondsFormat, Utc};
use gdk_api::Message;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::entry::{Direction, SessionEvent, TranscriptEntry};
use crate::error::{Error, Result};

const BANNER: &str = "==================================================";
const DELIMITER: &str = "--------------------------------------------------";

/// Envelope keys of a document message; payload fields with these names are
/// dropped when the document is written
const RESERVED_FIELDS: &[&str] = &["timestamp", "direction"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptFormat {
    /// One JSON document with a header and the messages
    Json,
    /// One entry per line, session events included
    Jsonl,
    /// Human readable log
    Text,
}

impl TranscriptFormat {
    pub const ALL: [TranscriptFormat; 3] = [
        TranscriptFormat::Json,
        TranscriptFormat::Jsonl,
        TranscriptFormat::Text,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            TranscriptFormat::Json => "json",
            TranscriptFormat::Jsonl => "jsonl",
            TranscriptFormat::Text => "txt",
        }
    }
}

impl fmt::Display for TranscriptFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptFormat::Json => write!(f, "json"),
            TranscriptFormat::Jsonl => write!(f, "jsonl"),
            TranscriptFormat::Text => write!(f, "text"),
        }
    }
}

impl FromStr for TranscriptFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(TranscriptFormat::Json),
            "jsonl" | "ndjson" => Ok(TranscriptFormat::Jsonl),
            "text" | "txt" => Ok(TranscriptFormat::Text),
            other => Err(Error::ParseError(format!(
                "unknown transcript format '{other}' (expected json, jsonl or text)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptHeader {
    pub generated_at: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub game_name: Option<String>,
    #[serde(default)]
    pub game_version: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    /// The message itself, `function` included
    #[serde(flatten)]
    pub fields: Message,
}

/// The JSON document a session is saved as.
///
/// Message payload fields named `timestamp` or `direction` collide with the
/// message envelope and are not written, so such fields do not survive a
/// round trip through this format. [`TranscriptFormat::Jsonl`] keeps them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub header: TranscriptHeader,
    #[serde(default)]
    pub messages: Vec<TranscriptMessage>,
}

impl Transcript {
    pub fn from_entries(entries: &[TranscriptEntry], generated_at: DateTime<Utc>) -> Self {
        let mut header = TranscriptHeader {
            generated_at,
            title: String::new(),
            game_name: None,
            game_version: None,
            started_at: None,
            ended_at: None,
        };
        let mut messages = Vec::new();

        for entry in entries {
            match entry {
                TranscriptEntry::Meta {
                    event: SessionEvent::SessionStart,
                    timestamp,
                    game_name,
                    game_version,
                } => {
                    header.started_at = Some(*timestamp);
                    header.game_name = game_name.clone();
                    header.game_version = game_version.clone();
                }
                TranscriptEntry::Meta {
                    event: SessionEvent::SessionEnd,
                    timestamp,
                    ..
                } => header.ended_at = Some(*timestamp),
                TranscriptEntry::Message {
                    direction,
                    timestamp,
                    payload,
                } => {
                    let mut fields = payload.clone();
                    for reserved in RESERVED_FIELDS {
                        if fields.remove(*reserved).is_some() {
                            tracing::warn!(
                                "Message field '{}' collides with the envelope, not saved",
                                reserved
                            );
                        }
                    }
                    messages.push(TranscriptMessage {
                        timestamp: *timestamp,
                        direction: *direction,
                        fields,
                    });
                }
            }
        }

        header.title = title(header.game_name.as_deref(), header.game_version.as_deref());
        Self { header, messages }
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Entries the document describes, session events rebuilt from the header
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        let mut entries = Vec::with_capacity(self.messages.len() + 2);
        if let Some(started_at) = self.header.started_at {
            entries.push(TranscriptEntry::session_start(
                started_at,
                self.header.game_name.clone(),
                self.header.game_version.clone(),
            ));
        }
        entries.extend(self.messages.iter().map(|m| {
            TranscriptEntry::message(m.direction, m.timestamp, m.fields.clone())
        }));
        if let Some(ended_at) = self.header.ended_at {
            entries.push(TranscriptEntry::session_end(ended_at));
        }
        entries
    }
}

fn title(game_name: Option<&str>, game_version: Option<&str>) -> String {
    match (game_name, game_version) {
        (Some(name), Some(version)) => format!("{name} {version} transcript"),
        (Some(name), None) => format!("{name} transcript"),
        _ => "GDK transcript".to_string(),
    }
}

/// Parse a JSON document or a JSONL file back into entries
pub fn parse_entries(contents: &str) -> Result<Vec<TranscriptEntry>> {
    let trimmed = contents.trim_start();
    if trimmed.starts_with('{') {
        if let Ok(transcript) = Transcript::from_json(contents) {
            return Ok(transcript.entries());
        }
    }

    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| {
                Error::ParseError(format!("transcript line {}: {e}", index + 1))
            })
        })
        .collect()
}

pub fn render(
    entries: &[TranscriptEntry],
    format: TranscriptFormat,
    generated_at: DateTime<Utc>,
) -> Result<String> {
    match format {
        TranscriptFormat::Json => Transcript::from_entries(entries, generated_at).to_json_pretty(),
        TranscriptFormat::Jsonl => render_jsonl(entries),
        TranscriptFormat::Text => Ok(render_text(entries, generated_at)),
    }
}

fn render_jsonl(entries: &[TranscriptEntry]) -> Result<String> {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&serde_json::to_string(entry)?);
        out.push('\n');
    }
    Ok(out)
}

fn render_text(entries: &[TranscriptEntry], generated_at: DateTime<Utc>) -> String {
    let transcript = Transcript::from_entries(entries, generated_at);
    let mut out = String::new();
    out.push_str(BANNER);
    out.push('\n');
    out.push_str(&format!(" {}\n", transcript.header.title));
    out.push_str(&format!(" Generated {}\n", stamp(generated_at)));
    out.push_str(BANNER);
    out.push('\n');

    for entry in entries {
        match entry {
            TranscriptEntry::Meta {
                event: SessionEvent::SessionStart,
                timestamp,
                game_name,
                game_version,
            } => {
                let game = [game_name.as_deref(), game_version.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                let line = format!("[{}] SESSION START {}", stamp(*timestamp), game);
                out.push_str(line.trim_end());
                out.push('\n');
                out.push_str(DELIMITER);
                out.push('\n');
            }
            TranscriptEntry::Meta {
                event: SessionEvent::SessionEnd,
                timestamp,
                ..
            } => {
                out.push_str(DELIMITER);
                out.push('\n');
                out.push_str(&format!("[{}] SESSION END\n", stamp(*timestamp)));
            }
            TranscriptEntry::Message {
                direction,
                timestamp,
                payload,
            } => {
                let arrow = match direction {
                    Direction::ToGame => ">> to game  ",
                    Direction::FromGame => "<< from game",
                };
                let body = serde_json::to_string(payload).unwrap_or_default();
                out.push_str(&format!("[{}] {} {}\n", stamp(*timestamp), arrow, body));
            }
        }
    }
    out
}

fn stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
