use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use uuid::Uuid;
use crate::models::navigation::MoveAction;

pub const DEFAULT_UNDO_CAPACITY: usize = 10;
pub const DEFAULT_UNDO_TTL_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct UndoEntry {
    pub action: MoveAction,
    pub expires_at: DateTime<Utc>,
}

impl UndoEntry {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Bounded history of structural moves. Oldest entries are evicted first and
/// entries past their TTL are never handed out, swept or not.
#[derive(Debug)]
pub struct UndoStack {
    entries: VecDeque<UndoEntry>,
    capacity: usize,
    ttl: Duration,
}

impl Default for UndoStack {
    fn default() -> Self {
        UndoStack::new(DEFAULT_UNDO_CAPACITY, Duration::seconds(DEFAULT_UNDO_TTL_SECS))
    }
}

impl UndoStack {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        UndoStack {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn push(&mut self, action: MoveAction, now: DateTime<Utc>) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(UndoEntry {
            action,
            expires_at: now + self.ttl,
        });
    }

    /// Most recent entry that has not expired.
    pub fn latest(&self, now: DateTime<Utc>) -> Option<&UndoEntry> {
        self.entries.iter().rev().find(|entry| entry.is_live(now))
    }

    pub fn remove(&mut self, action_id: Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.action.id != action_id);
        self.entries.len() < before
    }

    /// Drops expired entries and returns how many were removed.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.is_live(now));
        before - self.entries.len()
    }

    pub fn live_len(&self, now: DateTime<Utc>) -> usize {
        self.entries.iter().filter(|entry| entry.is_live(now)).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
