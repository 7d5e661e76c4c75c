use gdk_api::Message;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::transcript::Direction;

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayedMessage {
    pub direction: Direction,
    pub message: Message,
    pub queued_at: Instant,
}

/// Paces messages for display: two messages are never shown closer together
/// than `interval`.
#[derive(Debug)]
pub struct MessageQueue {
    interval: Duration,
    pending: VecDeque<DisplayedMessage>,
    last_shown: Option<Instant>,
}

impl MessageQueue {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: VecDeque::new(),
            last_shown: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn push(&mut self, direction: Direction, message: Message) {
        self.push_at(direction, message, Instant::now());
    }

    pub fn push_at(&mut self, direction: Direction, message: Message, now: Instant) {
        self.pending.push_back(DisplayedMessage {
            direction,
            message,
            queued_at: now,
        });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Messages whose display slot has come by `now`, oldest first
    pub fn drain_ready(&mut self, now: Instant) -> Vec<DisplayedMessage> {
        let mut ready = Vec::new();
        while let Some(slot) = self.next_slot() {
            if slot > now {
                break;
            }
            if let Some(message) = self.pending.pop_front() {
                self.last_shown = Some(slot);
                ready.push(message);
            }
        }
        ready
    }

    /// How long until the next message may be shown
    pub fn next_ready_in(&self, now: Instant) -> Option<Duration> {
        self.next_slot()
            .map(|slot| slot.saturating_duration_since(now))
    }

    /// Everything still queued, ignoring the pacing
    pub fn drain_all(&mut self) -> Vec<DisplayedMessage> {
        if !self.pending.is_empty() {
            self.last_shown = Some(Instant::now());
        }
        self.pending.drain(..).collect()
    }

    fn next_slot(&self) -> Option<Instant> {
        let front = self.pending.front()?;
        Some(match self.last_shown {
            Some(last) => (last + self.interval).max(front.queued_at),
            None => front.queued_at,
        })
    }
}
