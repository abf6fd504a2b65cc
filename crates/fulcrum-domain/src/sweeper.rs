//! Background reconciliation.
//!
//! On every tick the sweeper fails timed-out jobs, releases services
//! left without an active job, purges old finished jobs and disconnects
//! agents that stopped reporting. A failing step
//! is logged and does not stop the others or later ticks.

use fulcrum_core::repository::Store;
use tokio::sync::watch;

use crate::agent::AgentCommander;
use crate::config::DomainConfig;
use crate::job::JobManager;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub timed_out: usize,
    pub released: usize,
    pub purged: u64,
    pub disconnected: usize,
}

pub struct Sweeper<S: Store> {
    jobs: JobManager<S>,
    agents: AgentCommander<S>,
    config: DomainConfig,
}

impl<S: Store> Sweeper<S> {
    pub fn new(store: S, config: DomainConfig) -> Self {
        Self {
            jobs: JobManager::new(store.clone(), config.clone()),
            agents: AgentCommander::new(store),
            config,
        }
    }

    pub async fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();

        match self.jobs.fail_timed_out(self.config.job_timeout()).await {
            Ok(n) => report.timed_out = n,
            Err(e) => tracing::error!(error = %e, "job timeout sweep failed"),
        }
        match self.jobs.release_stranded(self.config.stranded_grace()).await {
            Ok(n) => report.released = n,
            Err(e) => tracing::error!(error = %e, "stranded service sweep failed"),
        }
        match self.jobs.purge_finished(self.config.job_retention()).await {
            Ok(n) => report.purged = n,
            Err(e) => tracing::error!(error = %e, "finished job purge failed"),
        }
        match self
            .agents
            .disconnect_stale(self.config.agent_heartbeat_timeout())
            .await
        {
            Ok(n) => report.disconnected = n,
            Err(e) => tracing::error!(error = %e, "agent heartbeat sweep failed"),
        }

        if report != SweepReport::default() {
            tracing::info!(
                timed_out = report.timed_out,
                released = report.released,
                purged = report.purged,
                disconnected = report.disconnected,
                "sweep finished"
            );
        }
        report
    }

    /// Sweeps on a fixed interval until `shutdown` flips to `true` or
    /// its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.sweep_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            interval_secs = self.config.sweep_interval().as_secs(),
            "sweeper started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }

        tracing::info!("sweeper stopped");
    }
}
