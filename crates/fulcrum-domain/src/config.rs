//! Domain configuration.

use chrono::Duration;
use serde::Deserialize;

/// Upper bound for every configured duration (ten years).
const MAX_SECS: u64 = 10 * 365 * 24 * 3600;

fn secs(value: u64) -> Duration {
    Duration::seconds(value.min(MAX_SECS) as i64)
}

/// Tunables for the job lifecycle and the background sweeper.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Claimed jobs older than this are failed by the sweeper (default: 600).
    pub job_timeout_secs: u64,
    /// In-flight services without an active job are released once their
    /// transition is older than this (default: 60).
    pub stranded_grace_secs: u64,
    /// Time between sweeper passes (default: 30).
    pub sweep_interval_secs: u64,
    /// Finished jobs are purged after this long (default: 7 days).
    pub job_retention_secs: u64,
    /// Priority of newly enqueued jobs; lower is served first (default: 1).
    pub default_job_priority: i32,
    /// Upper bound for one pending-jobs poll (default: 100).
    pub max_pending_limit: u64,
    /// Connected agents silent for this long are marked disconnected
    /// (default: 300).
    pub agent_heartbeat_timeout_secs: u64,
    /// Default lifetime of issued tokens (default: 30 days).
    pub token_lifetime_secs: u64,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            job_timeout_secs: 600,
            stranded_grace_secs: 60,
            sweep_interval_secs: 30,
            job_retention_secs: 7 * 24 * 3600,
            default_job_priority: 1,
            max_pending_limit: 100,
            agent_heartbeat_timeout_secs: 300,
            token_lifetime_secs: 30 * 24 * 3600,
        }
    }
}

impl DomainConfig {
    pub fn job_timeout(&self) -> Duration {
        secs(self.job_timeout_secs)
    }

    pub fn stranded_grace(&self) -> Duration {
        secs(self.stranded_grace_secs)
    }

    pub fn job_retention(&self) -> Duration {
        secs(self.job_retention_secs)
    }

    pub fn agent_heartbeat_timeout(&self) -> Duration {
        secs(self.agent_heartbeat_timeout_secs)
    }

    pub fn token_lifetime(&self) -> Duration {
        secs(self.token_lifetime_secs)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Clamps a requested poll size to `[1, max_pending_limit]`.
    pub fn pending_limit(&self, requested: Option<u64>) -> u64 {
        let max = self.max_pending_limit.max(1);
        requested.unwrap_or(max).clamp(1, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_limit_is_clamped() {
        let config = DomainConfig {
            max_pending_limit: 5,
            ..DomainConfig::default()
        };
        assert_eq!(config.pending_limit(None), 5);
        assert_eq!(config.pending_limit(Some(0)), 1);
        assert_eq!(config.pending_limit(Some(3)), 3);
        assert_eq!(config.pending_limit(Some(1000)), 5);
    }

    #[test]
    fn durations_saturate() {
        let config = DomainConfig {
            job_timeout_secs: u64::MAX,
            sweep_interval_secs: 0,
            ..DomainConfig::default()
        };
        assert_eq!(config.job_timeout(), Duration::seconds(MAX_SECS as i64));
        assert_eq!(config.sweep_interval(), std::time::Duration::from_secs(1));
    }
}
