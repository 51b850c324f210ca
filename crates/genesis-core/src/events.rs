//! Outbound events.
//!
//! The orchestrator reports what it did on a bounded channel. Emission never
//! blocks an operation: when the channel is full the event is dropped and
//! counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use genesis_cap::RiskTier;
use genesis_identity::{Fingerprint, IdentityStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Something the orchestrator did.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum GenesisEvent {
    /// A new identity was bound.
    #[serde(rename_all = "camelCase")]
    Registered {
        /// The new identity.
        fingerprint: Fingerprint,
        /// Its initial status.
        status: IdentityStatus,
    },
    /// An identity changed status.
    #[serde(rename_all = "camelCase")]
    StatusChanged {
        /// The identity.
        fingerprint: Fingerprint,
        /// Previous status.
        from: IdentityStatus,
        /// New status.
        to: IdentityStatus,
    },
    /// A session moved to a higher risk tier.
    #[serde(rename_all = "camelCase")]
    RiskEscalated {
        /// The session.
        session_id: String,
        /// Identity of the session.
        fingerprint: Fingerprint,
        /// Previous tier.
        from: RiskTier,
        /// New tier.
        to: RiskTier,
        /// Score after the batch.
        risk_score: f64,
    },
    /// A session ended.
    #[serde(rename_all = "camelCase")]
    SessionEnded {
        /// The session.
        session_id: String,
        /// Identity of the session.
        fingerprint: Fingerprint,
        /// Why it ended.
        reason: SessionEndReason,
    },
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEndReason {
    /// The caller ended it.
    Closed,
    /// No activity within the idle timeout.
    Idle,
    /// Its identity was frozen.
    IdentityFrozen,
}

/// Sending half of the event channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: mpsc::Sender<GenesisEvent>,
    rx: Arc<Mutex<Option<mpsc::Receiver<GenesisEvent>>>>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a channel with room for `capacity` undelivered events.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(Some(rx))),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Take the event receiver (can only be called once).
    ///
    /// A slot poisoned by a panicking taker is recovered, so the receiver is
    /// never lost.
    pub fn take_receiver(&self) -> Option<mpsc::Receiver<GenesisEvent>> {
        let mut slot = self.rx.lock().unwrap_or_else(|poisoned| {
            warn!("Event receiver slot was poisoned; recovering");
            poisoned.into_inner()
        });
        slot.take()
    }

    /// Publish an event without waiting.
    pub fn emit(&self, event: GenesisEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(?event, dropped, "Event channel full; event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Events dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
