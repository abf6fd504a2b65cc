//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. List operations take the
//! caller's [`AuthScope`] and return only rows inside it (an empty scope
//! means unfiltered). `auth_scope` lookups return the ownership chain of
//! a single row and are what the authorizer compares against.
//!
//! Service and job mutations are conditional: the update only applies
//! if the persisted state still matches the guard, otherwise the call
//! fails with `InvalidState` (services) or `Conflict` (jobs).

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::{AuthScope, AuthTargetScope};
use crate::error::FulcrumResult;
use crate::models::{
    agent::{Agent, AgentState, CreateAgent, UpdateAgent},
    agent_type::{AgentType, CreateAgentType},
    audit::{AuditEntry, CreateAuditEntry},
    job::{CreateJob, Job},
    metric::{CreateMetricEntry, CreateMetricType, MetricEntry, MetricType, UpdateMetricType},
    provider::{CreateProvider, Provider, UpdateProvider},
    service::{CreateService, Service, ServiceAction, ServiceCompletion, ServiceState, UpdateService},
    service_group::{CreateServiceGroup, ServiceGroup, UpdateServiceGroup},
    service_type::{CreateServiceType, ServiceType},
    token::{CreateToken, Token, UpdateToken},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenants and agents
// ---------------------------------------------------------------------------

pub trait ProviderRepository: Send + Sync {
    fn create(&self, input: CreateProvider) -> impl Future<Output = FulcrumResult<Provider>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FulcrumResult<Provider>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateProvider,
    ) -> impl Future<Output = FulcrumResult<Provider>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = FulcrumResult<()>> + Send;
    fn list(
        &self,
        scope: &AuthScope,
        pagination: Pagination,
    ) -> impl Future<Output = FulcrumResult<PaginatedResult<Provider>>> + Send;
    fn auth_scope(&self, id: Uuid) -> impl Future<Output = FulcrumResult<AuthTargetScope>> + Send;
    fn exists(&self, id: Uuid) -> impl Future<Output = FulcrumResult<bool>> + Send;
}

pub trait AgentRepository: Send + Sync {
    fn create(&self, input: CreateAgent) -> impl Future<Output = FulcrumResult<Agent>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FulcrumResult<Agent>> + Send;
    fn get_by_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = FulcrumResult<Agent>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateAgent,
    ) -> impl Future<Output = FulcrumResult<Agent>> + Send;
    /// Self-reported state; also refreshes `last_status_update`.
    fn update_state(
        &self,
        id: Uuid,
        state: AgentState,
    ) -> impl Future<Output = FulcrumResult<Agent>> + Send;
    fn rotate_token_hash(
        &self,
        id: Uuid,
        token_hash: String,
    ) -> impl Future<Output = FulcrumResult<Agent>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = FulcrumResult<()>> + Send;
    fn list(
        &self,
        scope: &AuthScope,
        pagination: Pagination,
    ) -> impl Future<Output = FulcrumResult<PaginatedResult<Agent>>> + Send;
    fn count_by_provider(&self, provider_id: Uuid)
    -> impl Future<Output = FulcrumResult<u64>> + Send;
    /// Marks `Connected` agents silent since `cutoff` as `Disconnected`
    /// and returns them.
    fn disconnect_stale(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = FulcrumResult<Vec<Agent>>> + Send;
    fn auth_scope(&self, id: Uuid) -> impl Future<Output = FulcrumResult<AuthTargetScope>> + Send;
    fn exists(&self, id: Uuid) -> impl Future<Output = FulcrumResult<bool>> + Send;
}

// ---------------------------------------------------------------------------
// Catalog (global scope)
// ---------------------------------------------------------------------------

pub trait AgentTypeRepository: Send + Sync {
    fn create(
        &self,
        input: CreateAgentType,
    ) -> impl Future<Output = FulcrumResult<AgentType>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FulcrumResult<AgentType>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = FulcrumResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = FulcrumResult<PaginatedResult<AgentType>>> + Send;
    fn exists(&self, id: Uuid) -> impl Future<Output = FulcrumResult<bool>> + Send;
}

pub trait ServiceTypeRepository: Send + Sync {
    fn create(
        &self,
        input: CreateServiceType,
    ) -> impl Future<Output = FulcrumResult<ServiceType>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FulcrumResult<ServiceType>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = FulcrumResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = FulcrumResult<PaginatedResult<ServiceType>>> + Send;
    fn exists(&self, id: Uuid) -> impl Future<Output = FulcrumResult<bool>> + Send;
}

// ---------------------------------------------------------------------------
// Services and jobs
// ---------------------------------------------------------------------------

pub trait ServiceGroupRepository: Send + Sync {
    fn create(
        &self,
        input: CreateServiceGroup,
    ) -> impl Future<Output = FulcrumResult<ServiceGroup>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FulcrumResult<ServiceGroup>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateServiceGroup,
    ) -> impl Future<Output = FulcrumResult<ServiceGroup>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = FulcrumResult<()>> + Send;
    fn list(
        &self,
        scope: &AuthScope,
        pagination: Pagination,
    ) -> impl Future<Output = FulcrumResult<PaginatedResult<ServiceGroup>>> + Send;
    fn auth_scope(&self, id: Uuid) -> impl Future<Output = FulcrumResult<AuthTargetScope>> + Send;
    fn exists(&self, id: Uuid) -> impl Future<Output = FulcrumResult<bool>> + Send;
}

pub trait ServiceRepository: Send + Sync {
    /// Persists with `current_state = Created`, `target_state = Created`.
    fn create(&self, input: CreateService) -> impl Future<Output = FulcrumResult<Service>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FulcrumResult<Service>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateService,
    ) -> impl Future<Output = FulcrumResult<Service>> + Send;
    fn list(
        &self,
        scope: &AuthScope,
        pagination: Pagination,
    ) -> impl Future<Output = FulcrumResult<PaginatedResult<Service>>> + Send;
    fn count_by_group(&self, group_id: Uuid) -> impl Future<Output = FulcrumResult<u64>> + Send;
    /// Services of the agent that are not `Deleted`.
    fn count_live_by_agent(&self, agent_id: Uuid)
    -> impl Future<Output = FulcrumResult<u64>> + Send;

    /// Sets `target_state` (and `target_properties`) if nothing is in
    /// flight and `current_state == expected_current`. Clears
    /// `failed_action` and `error_message`.
    fn begin_transition(
        &self,
        id: Uuid,
        expected_current: ServiceState,
        target: ServiceState,
        target_properties: Option<serde_json::Value>,
    ) -> impl Future<Output = FulcrumResult<Service>> + Send;

    /// Like [`ServiceRepository::begin_transition`] but only for a
    /// service whose last attempt failed with `failed_action`; keeps the
    /// retained `target_properties` and increments `retry_count`.
    fn begin_retry(
        &self,
        id: Uuid,
        failed_action: ServiceAction,
        target: ServiceState,
    ) -> impl Future<Output = FulcrumResult<Service>> + Send;

    /// Applies a completed job if `target_state == expected_target`.
    fn complete_transition(
        &self,
        id: Uuid,
        expected_target: ServiceState,
        completion: ServiceCompletion,
    ) -> impl Future<Output = FulcrumResult<Service>> + Send;

    /// Records a failed job if `target_state == expected_target`. Also
    /// used to release a begun transition whose job could not be
    /// enqueued.
    fn fail_transition(
        &self,
        id: Uuid,
        expected_target: ServiceState,
        action: ServiceAction,
        error_message: String,
    ) -> impl Future<Output = FulcrumResult<Service>> + Send;

    /// Services with a transition in flight that was begun or last
    /// touched before `cutoff`.
    fn list_in_flight_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = FulcrumResult<Vec<Service>>> + Send;

    fn auth_scope(&self, id: Uuid) -> impl Future<Output = FulcrumResult<AuthTargetScope>> + Send;
    fn exists(&self, id: Uuid) -> impl Future<Output = FulcrumResult<bool>> + Send;
}

pub trait JobRepository: Send + Sync {
    fn create(&self, input: CreateJob) -> impl Future<Output = FulcrumResult<Job>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FulcrumResult<Job>> + Send;
    fn list(
        &self,
        scope: &AuthScope,
        pagination: Pagination,
    ) -> impl Future<Output = FulcrumResult<PaginatedResult<Job>>> + Send;
    /// Pending jobs of one agent, by priority then creation order.
    fn list_pending_for_agent(
        &self,
        agent_id: Uuid,
        limit: u64,
    ) -> impl Future<Output = FulcrumResult<Vec<Job>>> + Send;
    /// `Pending -> Claimed` for the named agent.
    fn claim(&self, id: Uuid, agent_id: Uuid) -> impl Future<Output = FulcrumResult<Job>> + Send;
    /// `Claimed -> Completed` for the named agent.
    fn complete(
        &self,
        id: Uuid,
        agent_id: Uuid,
        result_data: serde_json::Value,
    ) -> impl Future<Output = FulcrumResult<Job>> + Send;
    /// `Claimed -> Failed`. `agent_id` is `None` for system-initiated
    /// failures such as timeouts.
    fn fail(
        &self,
        id: Uuid,
        agent_id: Option<Uuid>,
        error_message: String,
    ) -> impl Future<Output = FulcrumResult<Job>> + Send;
    /// Claimed jobs whose `claimed_at` is older than `cutoff`.
    fn list_timed_out(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = FulcrumResult<Vec<Job>>> + Send;
    /// Removes terminal jobs finished before `cutoff`.
    fn delete_finished_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = FulcrumResult<u64>> + Send;
    /// Jobs of the service that are `Pending` or `Claimed`.
    fn count_active_for_service(
        &self,
        service_id: Uuid,
    ) -> impl Future<Output = FulcrumResult<u64>> + Send;
    fn auth_scope(&self, id: Uuid) -> impl Future<Output = FulcrumResult<AuthTargetScope>> + Send;
    fn exists(&self, id: Uuid) -> impl Future<Output = FulcrumResult<bool>> + Send;
}

// ---------------------------------------------------------------------------
// Credentials, metrics, audit
// ---------------------------------------------------------------------------

pub trait TokenRepository: Send + Sync {
    fn create(&self, input: CreateToken) -> impl Future<Output = FulcrumResult<Token>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FulcrumResult<Token>> + Send;
    fn get_by_hash(&self, hashed_value: &str) -> impl Future<Output = FulcrumResult<Token>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateToken,
    ) -> impl Future<Output = FulcrumResult<Token>> + Send;
    fn regenerate(
        &self,
        id: Uuid,
        hashed_value: String,
    ) -> impl Future<Output = FulcrumResult<Token>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = FulcrumResult<()>> + Send;
    fn delete_by_provider(&self, provider_id: Uuid)
    -> impl Future<Output = FulcrumResult<()>> + Send;
    fn delete_by_agent(&self, agent_id: Uuid) -> impl Future<Output = FulcrumResult<()>> + Send;
    fn list(
        &self,
        scope: &AuthScope,
        pagination: Pagination,
    ) -> impl Future<Output = FulcrumResult<PaginatedResult<Token>>> + Send;
    fn auth_scope(&self, id: Uuid) -> impl Future<Output = FulcrumResult<AuthTargetScope>> + Send;
    fn exists(&self, id: Uuid) -> impl Future<Output = FulcrumResult<bool>> + Send;
}

pub trait MetricTypeRepository: Send + Sync {
    fn create(
        &self,
        input: CreateMetricType,
    ) -> impl Future<Output = FulcrumResult<MetricType>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FulcrumResult<MetricType>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateMetricType,
    ) -> impl Future<Output = FulcrumResult<MetricType>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = FulcrumResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = FulcrumResult<PaginatedResult<MetricType>>> + Send;
    fn exists(&self, id: Uuid) -> impl Future<Output = FulcrumResult<bool>> + Send;
}

pub trait MetricEntryRepository: Send + Sync {
    fn create(
        &self,
        input: CreateMetricEntry,
    ) -> impl Future<Output = FulcrumResult<MetricEntry>> + Send;
    fn list(
        &self,
        scope: &AuthScope,
        pagination: Pagination,
    ) -> impl Future<Output = FulcrumResult<PaginatedResult<MetricEntry>>> + Send;
}

/// Append-only audit sink.
pub trait AuditEntryRepository: Send + Sync {
    fn append(
        &self,
        input: CreateAuditEntry,
    ) -> impl Future<Output = FulcrumResult<AuditEntry>> + Send;
    fn list(
        &self,
        scope: &AuthScope,
        pagination: Pagination,
    ) -> impl Future<Output = FulcrumResult<PaginatedResult<AuditEntry>>> + Send;
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Bundle of all repositories, so commanders take a single type
/// parameter.
pub trait Store: Clone + Send + Sync + 'static {
    type Providers: ProviderRepository;
    type Agents: AgentRepository;
    type AgentTypes: AgentTypeRepository;
    type ServiceTypes: ServiceTypeRepository;
    type ServiceGroups: ServiceGroupRepository;
    type Services: ServiceRepository;
    type Jobs: JobRepository;
    type Tokens: TokenRepository;
    type MetricTypes: MetricTypeRepository;
    type MetricEntries: MetricEntryRepository;
    type AuditEntries: AuditEntryRepository;

    fn providers(&self) -> &Self::Providers;
    fn agents(&self) -> &Self::Agents;
    fn agent_types(&self) -> &Self::AgentTypes;
    fn service_types(&self) -> &Self::ServiceTypes;
    fn service_groups(&self) -> &Self::ServiceGroups;
    fn services(&self) -> &Self::Services;
    fn jobs(&self) -> &Self::Jobs;
    fn tokens(&self) -> &Self::Tokens;
    fn metric_types(&self) -> &Self::MetricTypes;
    fn metric_entries(&self) -> &Self::MetricEntries;
    fn audit_entries(&self) -> &Self::AuditEntries;
}
