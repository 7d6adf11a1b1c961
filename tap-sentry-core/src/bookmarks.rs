//! Resumable per-stream positions.
//!
//! The store is shared by every fetch in a run. Values only ever move
//! forward: [`BookmarkStore::advance`] ignores a value that sorts at or
//! before the one already stored, and persists the full state through a
//! [`StateWriter`] each time it does move. A stored value in a format the
//! tap no longer writes (an older run's page URL, say) is replaced.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::contract::StateWriter;
use crate::error::OutputError;

/// Serialized shape of the state document: `{"bookmarks": {stream: {field: value}}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkState {
    #[serde(default)]
    pub bookmarks: BTreeMap<String, BTreeMap<String, String>>,
}

impl BookmarkState {
    pub fn get(&self, stream: &str, field: &str) -> Option<&str> {
        self.bookmarks
            .get(stream)
            .and_then(|fields| fields.get(field))
            .map(String::as_str)
    }
}

pub struct BookmarkStore {
    state: Mutex<BookmarkState>,
    writer: Arc<dyn StateWriter>,
}

impl BookmarkStore {
    pub fn new(writer: Arc<dyn StateWriter>) -> Self {
        Self::with_state(BookmarkState::default(), writer)
    }

    /// Seeds the store with state persisted by an earlier run.
    pub fn with_state(state: BookmarkState, writer: Arc<dyn StateWriter>) -> Self {
        Self {
            state: Mutex::new(state),
            writer,
        }
    }

    pub fn get(&self, stream: &str, field: &str) -> Option<String> {
        self.lock().get(stream, field).map(str::to_string)
    }

    pub fn snapshot(&self) -> BookmarkState {
        self.lock().clone()
    }

    /// Moves `stream.field` to `value` if that is a later position.
    ///
    /// Returns whether the bookmark moved. The state is written while the
    /// lock is held so persisted snapshots never go backwards either.
    pub fn advance(&self, stream: &str, field: &str, value: &str) -> Result<bool, OutputError> {
        let mut state = self.lock();
        if let Some(current) = state.get(stream, field) {
            if !supersedes(value, current) {
                debug!(
                    stream,
                    field,
                    current,
                    candidate = value,
                    "Bookmark not advanced"
                );
                return Ok(false);
            }
        }

        state
            .bookmarks
            .entry(stream.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        self.writer.write_state(&state)?;
        info!(stream, field, value, "Bookmark advanced");
        Ok(true)
    }

    fn lock(&self) -> MutexGuard<'_, BookmarkState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug, PartialEq)]
enum Position {
    Timestamp(DateTime<FixedOffset>),
    Cursor((i64, u64, u8)),
    Opaque,
}

impl Position {
    fn parse(value: &str) -> Self {
        if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
            return Position::Timestamp(timestamp);
        }
        parse_cursor(value).map_or(Position::Opaque, Position::Cursor)
    }
}

/// Whether `candidate` is a later position than `current`.
///
/// RFC 3339 timestamps compare temporally and Sentry cursors
/// (`value:offset:is_prev`) compare numerically field by field. When the two
/// values are of different kinds, a recognised candidate replaces the stored
/// value and an unrecognised one never does. Two unrecognised values compare
/// as text.
pub fn supersedes(candidate: &str, current: &str) -> bool {
    match (Position::parse(candidate), Position::parse(current)) {
        (Position::Timestamp(x), Position::Timestamp(y)) => x > y,
        (Position::Cursor(x), Position::Cursor(y)) => x > y,
        (Position::Opaque, Position::Opaque) => candidate > current,
        (Position::Opaque, _) => false,
        _ => {
            warn!(current, candidate, "Stored bookmark has another format, replacing it");
            true
        }
    }
}

fn parse_cursor(value: &str) -> Option<(i64, u64, u8)> {
    let mut parts = value.split(':');
    let position = parts.next()?.parse().ok()?;
    let offset = parts.next()?.parse().ok()?;
    let is_prev = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((position, offset, is_prev))
}
