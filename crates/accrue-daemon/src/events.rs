//! Event emission system.
//!
//! Every committed ledger write is announced on the bus. Subscribers
//! receive events as JSON-RPC notifications on their connection; each
//! subscriber has an independent buffer sized by `rpc.event_capacity`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event type names.
pub mod kind {
    pub const DAEMON_STARTED: &str = "DaemonStarted";
    pub const LEDGER_INITIALIZED: &str = "LedgerInitialized";
    pub const PRODUCER_REGISTERED: &str = "ProducerRegistered";
    pub const DEPOSIT_RECEIVED: &str = "DepositReceived";
    pub const VOTES_CHANGED: &str = "VotesChanged";
    pub const PRODUCERS_VOTED: &str = "ProducersVoted";
    pub const REWARDS_CLAIMED: &str = "RewardsClaimed";
}

/// An event emitted by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event type name, one of [`kind`].
    pub event_type: String,
    /// Unix timestamp.
    pub timestamp: u64,
    /// Type-specific payload.
    pub payload: serde_json::Value,
}

impl Event {
    /// Build an event stamped with the given time.
    pub fn new(event_type: &str, timestamp: u64, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.to_string(),
            timestamp,
            payload,
        }
    }
}

/// Filter for event subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Only these event types. `None` = all.
    #[serde(default)]
    pub event_types: Option<Vec<String>>,
    /// Only events touching these accounts (as voter, producer or
    /// recipient). `None` = all.
    #[serde(default)]
    pub accounts: Option<Vec<String>>,
}

/// Event bus for broadcasting events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: Event) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Get the current sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl EventFilter {
    /// Check if an event matches this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref types) = self.event_types {
            if !types.iter().any(|t| t == &event.event_type) {
                return false;
            }
        }

        if let Some(ref accounts) = self.accounts {
            let touched = ["voter", "producer", "claimer"]
                .iter()
                .filter_map(|key| event.payload.get(*key).and_then(|v| v.as_str()));
            let mut touched = touched.peekable();
            if touched.peek().is_none() {
                return false;
            }
            if !touched.any(|account| accounts.iter().any(|a| a == account)) {
                return false;
            }
        }

        true
    }
}
