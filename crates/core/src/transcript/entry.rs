use chrono::{DateTime, Utc};
use gdk_api::Message;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which way a message travelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    ToGame,
    FromGame,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ToGame => write!(f, "toGame"),
            Direction::FromGame => write!(f, "fromGame"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionEvent {
    SessionStart,
    SessionEnd,
}

/// One line of a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TranscriptEntry {
    Meta {
        event: SessionEvent,
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        game_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        game_version: Option<String>,
    },
    Message {
        direction: Direction,
        timestamp: DateTime<Utc>,
        payload: Message,
    },
}

impl TranscriptEntry {
    pub fn session_start(
        timestamp: DateTime<Utc>,
        game_name: Option<String>,
        game_version: Option<String>,
    ) -> Self {
        TranscriptEntry::Meta {
            event: SessionEvent::SessionStart,
            timestamp,
            game_name,
            game_version,
        }
    }

    pub fn session_end(timestamp: DateTime<Utc>) -> Self {
        TranscriptEntry::Meta {
            event: SessionEvent::SessionEnd,
            timestamp,
            game_name: None,
            game_version: None,
        }
    }

    pub fn message(direction: Direction, timestamp: DateTime<Utc>, payload: Message) -> Self {
        TranscriptEntry::Message {
            direction,
            timestamp,
            payload,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            TranscriptEntry::Meta { timestamp, .. }
            | TranscriptEntry::Message { timestamp, .. } => {
                *timestamp
            }
        }
    }

    pub fn is_event(&self, wanted: SessionEvent) -> bool {
        matches!(self, TranscriptEntry::Meta { event, .. } if *event == wanted)
    }

    pub fn is_message(&self) -> bool {
        matches!(self, TranscriptEntry::Message { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_entry_json_shape() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let payload = json!({"function": "ping"}).as_object().cloned().unwrap();

        let message = TranscriptEntry::message(Direction::ToGame, at, payload);
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "type": "message",
                "direction": "toGame",
                "timestamp": "2024-05-01T12:00:00Z",
                "payload": {"function": "ping"}
            })
        );

        let start = TranscriptEntry::session_start(at, Some("Chess".into()), None);
        assert_eq!(
            serde_json::to_value(&start).unwrap(),
            json!({
                "type": "meta",
                "event": "sessionStart",
                "timestamp": "2024-05-01T12:00:00Z",
                "gameName": "Chess"
            })
        );
    }

    #[test]
    fn test_event_predicates() {
        let at = Utc::now();
        assert!(TranscriptEntry::session_end(at).is_event(SessionEvent::SessionEnd));
        assert!(!TranscriptEntry::session_end(at).is_event(SessionEvent::SessionStart));
        assert!(!TranscriptEntry::session_end(at).is_message());
    }
}
