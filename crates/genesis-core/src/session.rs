//! Live session registry.
//!
//! Holds the [`SessionRiskState`] of every live session. At most one
//! session is live per fingerprint; a second session either shares the
//! first one's risk state or is rejected, per [`SessionPolicy`]. Nothing
//! here is persisted.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use genesis_cap::{RiskScorer, RiskTier, SessionRiskState, SignalBatch};
use genesis_identity::Fingerprint;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{CoreError, Result};

/// Bytes of randomness in a generated session id.
const SESSION_ID_BYTES: usize = 16;

/// Cap on the idle timeout.
const MAX_IDLE_DAYS: i64 = 365;

/// What happens when a second session starts for an identity that already
/// has a live one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPolicy {
    /// Join the live session and share its risk state.
    #[default]
    Share,
    /// Refuse with `SessionRejected`.
    Reject,
}

/// Outcome of scoring a batch against a session.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    /// State after the batch.
    pub state: SessionRiskState,
    /// Tier before the batch.
    pub previous_tier: RiskTier,
    /// Whether the session was created by this call.
    pub created: bool,
}

impl Evaluation {
    /// Whether the batch moved the session to a higher tier.
    pub fn escalated(&self) -> bool {
        self.state.tier > self.previous_tier
    }
}

#[derive(Debug)]
struct SessionEntry {
    state: SessionRiskState,
    last_seen: DateTime<Utc>,
}

impl SessionEntry {
    fn fresh(session_id: String, fingerprint: &Fingerprint, now: DateTime<Utc>) -> Self {
        Self {
            state: SessionRiskState::new(session_id, fingerprint.clone(), now),
            last_seen: now,
        }
    }
}

/// Registry of live sessions.
///
/// Sessions are sharded by fingerprint; scoring one identity's session never
/// waits on another identity's. Lock order is `sessions` then `owners`.
#[derive(Debug)]
pub struct SessionRegistry {
    policy: SessionPolicy,
    idle_timeout: chrono::Duration,
    /// The live session of each identity.
    sessions: DashMap<Fingerprint, SessionEntry>,
    /// Session id to the identity that owns it.
    owners: DashMap<String, Fingerprint>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new(policy: SessionPolicy, idle_timeout: Duration) -> Self {
        let idle_timeout = chrono::Duration::from_std(idle_timeout)
            .unwrap_or_else(|_| chrono::Duration::days(MAX_IDLE_DAYS));
        Self {
            policy,
            idle_timeout,
            sessions: DashMap::new(),
            owners: DashMap::new(),
        }
    }

    /// The second-session policy.
    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Current state of a session.
    pub fn get(&self, session_id: &str) -> Option<SessionRiskState> {
        let owner = self.owners.get(session_id)?.value().clone();
        self.sessions
            .get(&owner)
            .filter(|e| e.state.session_id == session_id)
            .map(|e| e.state.clone())
    }

    /// Live session for a fingerprint, if any.
    pub fn session_for(&self, fingerprint: &Fingerprint) -> Option<SessionRiskState> {
        self.sessions.get(fingerprint).map(|e| e.state.clone())
    }

    /// Resolve the session for a request, score `batch` against it and store
    /// the result.
    ///
    /// Resolution:
    /// - a live session for `fingerprint` is resumed when `requested` names
    ///   it, and otherwise shared or rejected per policy
    /// - otherwise a new session is created, under `requested` if given
    ///
    /// Idle sessions are treated as ended. Risk decays on the server clock:
    /// the batch time is clamped between the session's last evaluation and
    /// now, and a new session starts now.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if `requested` belongs to another identity
    /// - `SessionRejected` under [`SessionPolicy::Reject`]
    pub fn evaluate(
        &self,
        requested: Option<&str>,
        fingerprint: &Fingerprint,
        batch: &SignalBatch,
        scorer: &RiskScorer,
    ) -> Result<Evaluation> {
        self.evaluate_at(requested, fingerprint, batch, scorer, Utc::now())
    }

    fn evaluate_at(
        &self,
        requested: Option<&str>,
        fingerprint: &Fingerprint,
        batch: &SignalBatch,
        scorer: &RiskScorer,
        now: DateTime<Utc>,
    ) -> Result<Evaluation> {
        if let Some(id) = requested {
            self.release_foreign_id(id, fingerprint, now)?;
        }

        let (mut entry, created) = match self.sessions.entry(fingerprint.clone()) {
            Entry::Occupied(live) if !self.is_idle(live.get(), now) => {
                let active = &live.get().state.session_id;
                if self.policy == SessionPolicy::Reject && requested != Some(active.as_str()) {
                    return Err(CoreError::SessionRejected {
                        active_session: active.clone(),
                    });
                }
                (live.into_ref(), false)
            }
            Entry::Occupied(mut idle) => {
                let stale_id = idle.get().state.session_id.clone();
                let session_id = self.claim(requested, fingerprint)?;
                if session_id != stale_id {
                    self.owners.remove_if(&stale_id, |_, owner| owner == fingerprint);
                }
                debug!(session_id = %stale_id, "Idle session expired");
                idle.insert(SessionEntry::fresh(session_id, fingerprint, now));
                (idle.into_ref(), true)
            }
            Entry::Vacant(slot) => {
                let session_id = self.claim(requested, fingerprint)?;
                (slot.insert(SessionEntry::fresh(session_id, fingerprint, now)), true)
            }
        };

        let prior = entry.state.clone();
        let observed_at = batch.observed_at.min(now).max(prior.last_evaluated_at);
        let state = scorer.score(&prior, &SignalBatch::at(observed_at, batch.signals.clone()));
        entry.state = state.clone();
        entry.last_seen = now;

        Ok(Evaluation {
            state,
            previous_tier: prior.tier,
            created,
        })
    }

    fn is_idle(&self, entry: &SessionEntry, now: DateTime<Utc>) -> bool {
        now - entry.last_seen >= self.idle_timeout
    }

    /// Free `session_id` if another identity owns it but its session has
    /// gone idle or ended.
    fn release_foreign_id(
        &self,
        session_id: &str,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some(owner) = self.owners.get(session_id).map(|o| o.value().clone()) else {
            return Ok(());
        };
        if owner == *fingerprint {
            return Ok(());
        }

        let expired = self
            .sessions
            .remove_if(&owner, |_, e| {
                e.state.session_id == session_id && self.is_idle(e, now)
            })
            .is_some();
        let live = !expired
            && self
                .sessions
                .get(&owner)
                .is_some_and(|e| e.state.session_id == session_id);
        if live {
            return Err(CoreError::InvalidRequest(format!(
                "session {} belongs to another identity",
                session_id
            )));
        }
        if expired {
            debug!(session_id, "Idle session expired");
        }
        self.owners.remove_if(session_id, |_, o| *o == owner);
        Ok(())
    }

    /// Reserve a session id for `fingerprint`.
    fn claim(&self, requested: Option<&str>, fingerprint: &Fingerprint) -> Result<String> {
        let session_id = requested.map_or_else(generate_session_id, str::to_string);
        match self.owners.entry(session_id.clone()) {
            Entry::Occupied(owner) if owner.get() != fingerprint => Err(
                CoreError::InvalidRequest(format!(
                    "session {} belongs to another identity",
                    session_id
                )),
            ),
            Entry::Occupied(_) => Ok(session_id),
            Entry::Vacant(slot) => {
                slot.insert(fingerprint.clone());
                Ok(session_id)
            }
        }
    }

    /// End a session.
    pub fn end(&self, session_id: &str) -> Option<SessionRiskState> {
        let (_, owner) = self.owners.remove(session_id)?;
        self.sessions
            .remove_if(&owner, |_, e| e.state.session_id == session_id)
            .map(|(_, e)| e.state)
    }

    /// End every session of an identity.
    pub fn end_for(&self, fingerprint: &Fingerprint) -> Vec<SessionRiskState> {
        let Some((_, entry)) = self.sessions.remove(fingerprint) else {
            return Vec::new();
        };
        self.owners
            .remove_if(&entry.state.session_id, |_, owner| owner == fingerprint);
        vec![entry.state]
    }

    /// Remove sessions idle for longer than the timeout.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> Vec<SessionRiskState> {
        let mut evicted = Vec::new();
        self.sessions.retain(|_, e| {
            if self.is_idle(e, now) {
                evicted.push(e.state.clone());
                false
            } else {
                true
            }
        });
        for state in &evicted {
            self.owners
                .remove_if(&state.session_id, |_, owner| *owner == state.fingerprint);
        }
        evicted
    }
}

fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
