//! Job lifecycle manager.
//!
//! Agents poll their pending jobs, claim one, and report completion or
//! failure. Every step is a compare-and-set on the job; the winning
//! step then reconciles the owning service. The sweeper uses
//! [`JobManager::fail_timed_out`], [`JobManager::release_stranded`] and
//! [`JobManager::purge_finished`].

use chrono::{Duration, Utc};
use fulcrum_core::auth::{Action, AuthIdentity, AuthTargetScope, Subject};
use fulcrum_core::error::{FulcrumError, FulcrumResult};
use fulcrum_core::models::audit::EventType;
use fulcrum_core::models::job::{CompleteJob, FailJob, Job};
use fulcrum_core::models::service::ServiceCompletion;
use fulcrum_core::models::validate_json_object;
use fulcrum_core::repository::{
    JobRepository, PaginatedResult, Pagination, ServiceRepository, Store,
};
use serde_json::json;
use uuid::Uuid;

use crate::access::{authorize_resource, authorize_static};
use crate::audit::{AuditLog, Authority};
use crate::config::DomainConfig;

#[derive(Clone)]
pub struct JobManager<S: Store> {
    store: S,
    config: DomainConfig,
    audit: AuditLog<S>,
}

/// The agent acting on a job: the caller itself, or the job's owner
/// when an admin acts on its behalf.
fn acting_agent(identity: &AuthIdentity, target: &AuthTargetScope) -> FulcrumResult<Uuid> {
    identity
        .scope()
        .agent_id
        .or(target.agent_id)
        .ok_or_else(|| FulcrumError::Internal("job has no owning agent".into()))
}

fn job_scope(job: &Job) -> AuthTargetScope {
    AuthTargetScope::service(job.provider_id, job.agent_id, job.broker_id)
}

impl<S: Store> JobManager<S> {
    pub fn new(store: S, config: DomainConfig) -> Self {
        Self {
            audit: AuditLog::new(store.clone()),
            store,
            config,
        }
    }

    pub async fn get(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<Job> {
        let jobs = self.store.jobs();
        authorize_resource(identity, Subject::Job, Action::Read, jobs.auth_scope(id)).await?;
        jobs.get_by_id(id).await
    }

    pub async fn list(
        &self,
        identity: &AuthIdentity,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<Job>> {
        authorize_static(identity, Subject::Job, Action::List)?;
        self.store.jobs().list(identity.scope(), pagination).await
    }

    /// The calling agent's pending jobs, lowest priority value first
    /// and FIFO within a priority.
    pub async fn list_pending(
        &self,
        identity: &AuthIdentity,
        limit: Option<u64>,
    ) -> FulcrumResult<Vec<Job>> {
        authorize_static(identity, Subject::Job, Action::ListPending)?;
        let agent_id = identity.scope().agent_id.ok_or_else(|| {
            FulcrumError::validation("pending jobs can only be polled by an agent")
        })?;

        self.store
            .jobs()
            .list_pending_for_agent(agent_id, self.config.pending_limit(limit))
            .await
    }

    pub async fn claim(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<Job> {
        let jobs = self.store.jobs();
        let target =
            authorize_resource(identity, Subject::Job, Action::Claim, jobs.auth_scope(id)).await?;
        let agent_id = acting_agent(identity, &target)?;

        let job = jobs.claim(id, agent_id).await?;
        tracing::info!(job_id = %id, agent_id = %agent_id, action = %job.action, "job claimed");

        self.audit
            .record(
                identity,
                EventType::JobClaimed,
                id,
                target,
                json!({ "service_id": job.service_id }),
            )
            .await;
        Ok(job)
    }

    /// Completes a claimed job and moves the service to its target.
    pub async fn complete(
        &self,
        identity: &AuthIdentity,
        id: Uuid,
        report: CompleteJob,
    ) -> FulcrumResult<Job> {
        let jobs = self.store.jobs();
        let target =
            authorize_resource(identity, Subject::Job, Action::Complete, jobs.auth_scope(id))
                .await?;
        let agent_id = acting_agent(identity, &target)?;
        if let Some(resources) = &report.resources {
            validate_json_object("resources", resources)?;
        }

        let result_data = json!({
            "resources": report.resources,
            "external_id": report.external_id,
        });
        let job = jobs.complete(id, agent_id, result_data).await?;
        tracing::info!(job_id = %id, service_id = %job.service_id, "job completed");

        if let Err(e) = self
            .reconcile_completion(
                &job,
                ServiceCompletion {
                    resources: report.resources,
                    external_id: report.external_id,
                },
            )
            .await
        {
            tracing::error!(job_id = %id, service_id = %job.service_id, error = %e, "service not reconciled after completion");
        }

        self.audit
            .record(
                identity,
                EventType::JobCompleted,
                id,
                target,
                json!({ "service_id": job.service_id, "action": job.action }),
            )
            .await;
        Ok(job)
    }

    /// Fails a claimed job and records the failure on the service.
    pub async fn fail(
        &self,
        identity: &AuthIdentity,
        id: Uuid,
        report: FailJob,
    ) -> FulcrumResult<Job> {
        let jobs = self.store.jobs();
        let target =
            authorize_resource(identity, Subject::Job, Action::Fail, jobs.auth_scope(id)).await?;
        let agent_id = acting_agent(identity, &target)?;
        if report.error_message.trim().is_empty() {
            return Err(FulcrumError::validation("error_message cannot be empty"));
        }

        let job = jobs
            .fail(id, Some(agent_id), report.error_message.clone())
            .await?;
        tracing::warn!(job_id = %id, service_id = %job.service_id, error = %report.error_message, "job failed");

        if let Err(e) = self
            .reconcile_failure(&job, report.error_message.clone())
            .await
        {
            tracing::error!(job_id = %id, service_id = %job.service_id, error = %e, "service not reconciled after failure");
        }

        self.audit
            .record(
                identity,
                EventType::JobFailed,
                id,
                target,
                json!({
                    "service_id": job.service_id,
                    "action": job.action,
                    "error_message": report.error_message,
                }),
            )
            .await;
        Ok(job)
    }

    /// Fails every job claimed longer than `timeout` ago. Jobs finished
    /// concurrently by their agent are skipped. Returns how many jobs
    /// were failed.
    pub async fn fail_timed_out(&self, timeout: Duration) -> FulcrumResult<usize> {
        let cutoff = Utc::now() - timeout;
        let candidates = self.store.jobs().list_timed_out(cutoff).await?;
        let message = format!("job timed out after {}s", timeout.num_seconds());

        let mut failed = 0;
        for candidate in candidates {
            let job = match self.store.jobs().fail(candidate.id, None, message.clone()).await {
                Ok(job) => job,
                Err(FulcrumError::Conflict { .. }) | Err(FulcrumError::NotFound { .. }) => {
                    tracing::debug!(job_id = %candidate.id, "job finished before timeout sweep");
                    continue;
                }
                Err(e) => {
                    tracing::error!(job_id = %candidate.id, error = %e, "cannot fail timed-out job");
                    continue;
                }
            };
            tracing::warn!(job_id = %job.id, agent_id = %job.agent_id, "job timed out");

            if let Err(e) = self.reconcile_failure(&job, message.clone()).await {
                tracing::error!(job_id = %job.id, service_id = %job.service_id, error = %e, "service not reconciled after timeout");
            }
            self.audit
                .record(
                    Authority::system(),
                    EventType::JobTimedOut,
                    job.id,
                    job_scope(&job),
                    json!({ "service_id": job.service_id, "claimed_at": job.claimed_at }),
                )
                .await;
            failed += 1;
        }
        Ok(failed)
    }

    /// Releases services that have a transition in flight but no
    /// pending or claimed job behind it, which happens when the service
    /// write after a job outcome failed. The transition is recorded as
    /// failed so it can be retried. Services begun within `grace` are
    /// skipped while their job is being enqueued.
    pub async fn release_stranded(&self, grace: Duration) -> FulcrumResult<usize> {
        let services = self.store.services();
        let candidates = services.list_in_flight_before(Utc::now() - grace).await?;

        let mut released = 0;
        for service in candidates {
            let (Some(target), Some(action)) = (service.target_state, service.in_flight_action())
            else {
                continue;
            };
            match self.store.jobs().count_active_for_service(service.id).await {
                Ok(0) => {}
                Ok(_) => continue,
                Err(e) => {
                    tracing::error!(service_id = %service.id, error = %e, "cannot count active jobs");
                    continue;
                }
            }

            let message = format!("{action} lost its job before the service was updated");
            match services
                .fail_transition(service.id, target, action, message)
                .await
            {
                Ok(_) => {}
                Err(FulcrumError::InvalidState { .. }) | Err(FulcrumError::NotFound { .. }) => {
                    continue;
                }
                Err(e) => {
                    tracing::error!(service_id = %service.id, error = %e, "cannot release service");
                    continue;
                }
            }
            tracing::warn!(service_id = %service.id, %action, "released service without an active job");

            self.audit
                .record(
                    Authority::system(),
                    EventType::ServiceReleased,
                    service.id,
                    AuthTargetScope::service(
                        service.provider_id,
                        service.agent_id,
                        service.broker_id,
                    ),
                    json!({ "action": action, "target_state": target }),
                )
                .await;
            released += 1;
        }
        Ok(released)
    }

    /// Deletes finished jobs older than `retention`.
    pub async fn purge_finished(&self, retention: Duration) -> FulcrumResult<u64> {
        let purged = self
            .store
            .jobs()
            .delete_finished_before(Utc::now() - retention)
            .await?;
        if purged > 0 {
            tracing::info!(purged, "purged finished jobs");
        }
        Ok(purged)
    }

    async fn reconcile_completion(
        &self,
        job: &Job,
        completion: ServiceCompletion,
    ) -> FulcrumResult<()> {
        let services = self.store.services();
        let service = services.get_by_id(job.service_id).await?;
        let Some(target) = service.target_state else {
            tracing::warn!(job_id = %job.id, service_id = %service.id, "completed job has no transition in flight");
            return Ok(());
        };

        match services
            .complete_transition(service.id, target, completion)
            .await
        {
            Ok(service) => {
                tracing::info!(service_id = %service.id, state = %service.current_state, "service reconciled");
                Ok(())
            }
            Err(FulcrumError::InvalidState { message }) => {
                tracing::warn!(job_id = %job.id, %message, "service changed before reconciliation");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn reconcile_failure(&self, job: &Job, error_message: String) -> FulcrumResult<()> {
        let services = self.store.services();
        let service = services.get_by_id(job.service_id).await?;
        let Some(target) = service.target_state else {
            tracing::warn!(job_id = %job.id, service_id = %service.id, "failed job has no transition in flight");
            return Ok(());
        };

        match services
            .fail_transition(service.id, target, job.action, error_message)
            .await
        {
            Ok(_) => Ok(()),
            Err(FulcrumError::InvalidState { message }) => {
                tracing::warn!(job_id = %job.id, %message, "service changed before reconciliation");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
