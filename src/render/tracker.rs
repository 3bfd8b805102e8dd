//! Per-message render lifecycle tracking

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// Visible state of a message's template render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderState {
    InProgress,
    /// Missing templates are being fetched; show a spinner
    Downloading,
    Loaded,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderStatus {
    pub state: RenderState,
    pub updated_at: DateTime<Utc>,
}

/// Tracks render state by message ID
#[derive(Default)]
pub struct RenderTracker {
    states: DashMap<i64, RenderStatus>,
}

impl RenderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, message_id: i64, state: RenderState) {
        tracing::trace!(message_id = message_id, state = ?state, "Render state changed");
        self.states.insert(
            message_id,
            RenderStatus {
                state,
                updated_at: Utc::now(),
            },
        );
    }

    pub fn get(&self, message_id: i64) -> Option<RenderStatus> {
        self.states.get(&message_id).map(|s| s.clone())
    }

    pub fn state(&self, message_id: i64) -> Option<RenderState> {
        self.states.get(&message_id).map(|s| s.state)
    }

    /// True while a reload for this message is in flight
    pub fn is_downloading(&self, message_id: i64) -> bool {
        self.state(message_id) == Some(RenderState::Downloading)
    }

    /// Drop states not updated within `max_age`.
    /// Returns the number of states removed.
    pub fn cleanup_expired(&self, max_age: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return 0;
        };

        let mut expired = 0;
        self.states.retain(|_, status| {
            if status.updated_at <= cutoff {
                expired += 1;
                false
            } else {
                true
            }
        });

        if expired > 0 {
            tracing::debug!(
                expired = expired,
                remaining = self.states.len(),
                "Cleaned up expired render states"
            );
        }

        expired
    }

    pub fn forget(&self, message_id: i64) {
        self.states.remove(&message_id);
    }

    pub fn clear(&self) {
        self.states.clear();
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let tracker = RenderTracker::new();
        assert!(tracker.state(7).is_none());

        tracker.set(7, RenderState::InProgress);
        tracker.set(7, RenderState::Downloading);
        assert!(tracker.is_downloading(7));

        tracker.set(7, RenderState::Loaded);
        assert_eq!(tracker.state(7), Some(RenderState::Loaded));
        assert_eq!(tracker.len(), 1);

        tracker.forget(7);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_cleanup_expired_keeps_recent_states() {
        let tracker = RenderTracker::new();
        tracker.set(1, RenderState::Loaded);
        tracker.states.insert(
            2,
            RenderStatus {
                state: RenderState::Error,
                updated_at: Utc::now() - chrono::Duration::minutes(10),
            },
        );

        assert_eq!(tracker.cleanup_expired(Duration::from_secs(300)), 1);
        assert_eq!(tracker.state(1), Some(RenderState::Loaded));
        assert!(tracker.state(2).is_none());

        assert_eq!(tracker.cleanup_expired(Duration::ZERO), 1);
        assert!(tracker.is_empty());
    }
}
