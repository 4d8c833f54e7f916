//! Event types for the Hearth event system
//!
//! **[HEAT-EVT-010]** Engine progress and tier transitions are broadcast on
//! an in-process bus. The notification collaborator subscribes for
//! `TierChanged` (and decides there whether a downgrade reaches push);
//! the SSE endpoint bridges the same stream to HTTP consumers.

use crate::db::models::TierTransition;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Hearth engine event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HeatEvent {
    /// Nightly batch started for a target date
    BatchStarted {
        date: NaiveDate,
        group_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// One group's pipeline persisted successfully
    GroupCompleted {
        group_guid: String,
        date: NaiveDate,
        score: f64,
        tier: u8,
        timestamp: DateTime<Utc>,
    },

    /// One group's pipeline failed; isolated, queued for retry
    GroupFailed {
        group_guid: String,
        date: NaiveDate,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A cycle moved a group across a tier boundary
    ///
    /// Emitted only when tiers differ [HEAT-EVT-020]
    TierChanged {
        transition: TierTransition,
        timestamp: DateTime<Utc>,
    },

    /// Nightly batch finished (after retry passes)
    BatchCompleted {
        date: NaiveDate,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast event bus
///
/// Thin wrapper over `tokio::sync::broadcast`; emitting with no subscribers
/// is not an error (the batch runs the same with or without listeners).
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<HeatEvent>,
}

impl EventBus {
    /// Create a new bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<HeatEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all current subscribers
    pub fn emit(&self, event: HeatEvent) {
        // send() errors only when there are no receivers; that's fine
        let _ = self.tx.send(event);
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition() -> TierTransition {
        TierTransition {
            group_guid: "g-1".to_string(),
            old_tier: 1,
            new_tier: 2,
            date: "2026-03-01".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.emit(HeatEvent::TierChanged {
            transition: transition(),
            timestamp: Utc::now(),
        });
        match rx.recv().await.unwrap() {
            HeatEvent::TierChanged { transition: t, .. } => {
                assert_eq!(t.group_guid, "g-1");
                assert_eq!(t.new_tier, 2);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.emit(HeatEvent::BatchStarted {
            date: "2026-03-01".parse().unwrap(),
            group_count: 0,
            timestamp: Utc::now(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_string(&HeatEvent::TierChanged {
            transition: transition(),
            timestamp: Utc::now(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"TierChanged\""));
    }
}
