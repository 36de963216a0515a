//! Conversation turns and their identifiers.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Assistant,
    /// Errors and notices surfaced inline in the transcript.
    System,
}

impl Role {
    /// Label used when rendering a turn into prompt text.
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Sortable turn identifier: milliseconds since the epoch, bumped to stay
/// unique when several turns are created within the same millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a turn with a fresh id and timestamp from `clock`.
    pub fn new(role: Role, content: impl Into<String>, clock: &TurnClock) -> Self {
        let (id, timestamp) = clock.next();
        Self {
            id,
            content: content.into(),
            role,
            timestamp,
        }
    }

    pub fn user(content: impl Into<String>, clock: &TurnClock) -> Self {
        Self::new(Role::User, content, clock)
    }

    pub fn assistant(content: impl Into<String>, clock: &TurnClock) -> Self {
        Self::new(Role::Assistant, content, clock)
    }

    pub fn system(content: impl Into<String>, clock: &TurnClock) -> Self {
        Self::new(Role::System, content, clock)
    }
}

/// Issues turn ids and timestamps.
///
/// Ids are strictly increasing (saturating at `u64::MAX`) and timestamps
/// non-decreasing for every turn created through the same clock, even if the
/// wall clock steps backwards.
#[derive(Debug, Default)]
pub struct TurnClock {
    last: AtomicU64,
}

impl TurnClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id together with the timestamp it encodes.
    pub fn next(&self) -> (TurnId, DateTime<Utc>) {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        let id = now.max(prev.saturating_add(1));

        let millis = i64::try_from(id).unwrap_or(i64::MAX);
        let timestamp = Utc
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        (TurnId(id), timestamp)
    }

    /// Make sure later ids sort after `id` (e.g. turns loaded from a store).
    pub fn observe(&self, id: TurnId) {
        self.last.fetch_max(id.0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_strictly_increase() {
        let clock = TurnClock::new();
        let turns: Vec<Turn> = (0..50).map(|i| Turn::user(i.to_string(), &clock)).collect();

        for pair in turns.windows(2) {
            assert!(pair[0].id < pair[1].id);
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn test_observe_moves_clock_forward() {
        let clock = TurnClock::new();
        let future = TurnId(Utc::now().timestamp_millis() as u64 + 60_000);
        clock.observe(future);

        let turn = Turn::assistant("later", &clock);
        assert!(turn.id > future);
    }

    #[test]
    fn test_observe_saturates_at_max_id() {
        let clock = TurnClock::new();
        clock.observe(TurnId(u64::MAX));

        let first = Turn::user("a", &clock);
        let second = Turn::user("b", &clock);
        assert_eq!(first.id, TurnId(u64::MAX));
        assert_eq!(second.id, TurnId(u64::MAX));
        assert_eq!(first.timestamp, DateTime::<Utc>::MAX_UTC);
        assert_eq!(first.timestamp, second.timestamp);
    }

    #[test]
    fn test_role_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"ASSISTANT\"");
        assert_eq!(Role::System.label(), "System");
    }
}
