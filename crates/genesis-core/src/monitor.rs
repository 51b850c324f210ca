//! Background maintenance.
//!
//! [`LedgerMonitor`] periodically purges expired lock leases and evicts
//! idle sessions. It only runs when its owner spawns it, and stops when the
//! returned [`MonitorHandle`] is shut down or dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use genesis_ledger::IdentityLedger;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::events::{EventBus, GenesisEvent, SessionEndReason};
use crate::orchestrator::Orchestrator;
use crate::session::SessionRegistry;

/// What one maintenance pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MonitorReport {
    /// Expired leases deleted.
    pub purged_locks: usize,
    /// Idle sessions ended.
    pub evicted_sessions: usize,
}

/// Running totals across passes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Passes completed.
    pub ticks: u64,
    /// Expired leases deleted.
    pub purged_locks: u64,
    /// Idle sessions ended.
    pub evicted_sessions: u64,
    /// Passes in which the ledger could not be reached.
    pub failed_ticks: u64,
}

/// Periodic ledger and session maintenance.
#[derive(Clone, Debug)]
pub struct LedgerMonitor {
    ledger: IdentityLedger,
    sessions: Arc<SessionRegistry>,
    events: EventBus,
}

impl LedgerMonitor {
    /// Monitor the orchestrator's ledger and sessions.
    pub fn new(orchestrator: &Orchestrator) -> Self {
        Self {
            ledger: orchestrator.ledger().clone(),
            sessions: Arc::clone(orchestrator.sessions()),
            events: orchestrator.events().clone(),
        }
    }

    /// Run one maintenance pass.
    ///
    /// # Errors
    ///
    /// Returns the ledger error if expired leases could not be purged.
    /// Idle sessions are evicted either way.
    pub async fn tick(&self) -> crate::Result<MonitorReport> {
        let evicted = self.sessions.evict_idle(Utc::now());
        for state in &evicted {
            debug!(session_id = %state.session_id, "Idle session evicted");
            self.events.emit(GenesisEvent::SessionEnded {
                session_id: state.session_id.clone(),
                fingerprint: state.fingerprint.clone(),
                reason: SessionEndReason::Idle,
            });
        }

        let purged_locks = self.ledger.purge_expired_locks().await?;
        Ok(MonitorReport {
            purged_locks,
            evicted_sessions: evicted.len(),
        })
    }

    /// Run [`tick`](Self::tick) every `period` on the current runtime.
    pub fn spawn(self, period: Duration) -> MonitorHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let period = period.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            info!(period_ms = period.as_millis() as u64, "Ledger monitor started");
            let mut stats = MonitorStats::default();
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        stats.ticks += 1;
                        match self.tick().await {
                            Ok(report) => {
                                stats.purged_locks += report.purged_locks as u64;
                                stats.evicted_sessions += report.evicted_sessions as u64;
                                if report != MonitorReport::default() {
                                    debug!(
                                        purged_locks = report.purged_locks,
                                        evicted_sessions = report.evicted_sessions,
                                        "Maintenance pass"
                                    );
                                }
                            }
                            Err(e) => {
                                stats.failed_ticks += 1;
                                warn!(error = %e, "Maintenance pass failed");
                            }
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!(
                ticks = stats.ticks,
                purged_locks = stats.purged_locks,
                evicted_sessions = stats.evicted_sessions,
                "Ledger monitor stopped"
            );
            stats
        });

        MonitorHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a running monitor.
///
/// Dropping the handle also stops the monitor, at its next wake-up.
#[derive(Debug)]
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<MonitorStats>,
}

impl MonitorHandle {
    /// Stop the monitor and wait for it to finish.
    ///
    /// Returns the totals, or `None` if the task panicked or was aborted.
    pub async fn shutdown(self) -> Option<MonitorStats> {
        let _ = self.shutdown.send(true);
        self.task.await.ok()
    }

    /// Whether the monitor task has finished.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenesisConfigBuilder;
    use genesis_cap::SignalBatch;
    use genesis_identity::Fingerprint;

    fn orchestrator() -> Orchestrator {
        Orchestrator::open(
            GenesisConfigBuilder::new()
                .with_in_memory_storage()
                .with_session_idle_timeout(Duration::from_secs(1))
                .build(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_tick_purges_expired_locks() {
        let orch = orchestrator();
        let fp = Fingerprint::from_bytes(&[1u8; 64]).unwrap();
        orch.ledger()
            .acquire_lock(&fp, "crashed-node", Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let monitor = LedgerMonitor::new(&orch);
        let report = monitor.tick().await.unwrap();
        assert_eq!(report.purged_locks, 1);
        assert_eq!(orch.ledger().lock_count(), 0);
    }

    #[tokio::test]
    async fn test_tick_evicts_idle_sessions() {
        let orch = orchestrator();
        let mut events = orch.take_event_receiver().unwrap();
        let fp = Fingerprint::from_bytes(&[2u8; 64]).unwrap();
        orch.sessions()
            .evaluate(Some("idle"), &fp, &SignalBatch::nominal(), &Default::default())
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let report = LedgerMonitor::new(&orch).tick().await.unwrap();
        assert_eq!(report.evicted_sessions, 1);
        assert!(orch.sessions().is_empty());
        assert!(matches!(
            events.recv().await.unwrap(),
            GenesisEvent::SessionEnded {
                reason: SessionEndReason::Idle,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_spawn_and_shutdown() {
        let orch = orchestrator();
        let fp = Fingerprint::from_bytes(&[3u8; 64]).unwrap();
        orch.ledger()
            .acquire_lock(&fp, "crashed-node", Duration::from_millis(1))
            .await
            .unwrap();

        let handle = LedgerMonitor::new(&orch).spawn(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());

        let stats = handle.shutdown().await.unwrap();
        assert!(stats.ticks >= 2);
        assert_eq!(stats.purged_locks, 1);
        assert_eq!(orch.ledger().lock_count(), 0);
    }
}
