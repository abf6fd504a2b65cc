//! [`Store`] implementation bundling every SurrealDB repository.

use fulcrum_core::repository::Store;
use surrealdb::{Connection, Surreal};

use crate::repository::{
    SurrealAgentRepository, SurrealAgentTypeRepository, SurrealAuditEntryRepository,
    SurrealJobRepository, SurrealMetricEntryRepository, SurrealMetricTypeRepository,
    SurrealProviderRepository, SurrealServiceGroupRepository, SurrealServiceRepository,
    SurrealServiceTypeRepository, SurrealTokenRepository,
};

/// All repositories over one SurrealDB connection. Cloning is cheap;
/// every repository shares the same client.
#[derive(Clone)]
pub struct SurrealStore<C: Connection> {
    providers: SurrealProviderRepository<C>,
    agents: SurrealAgentRepository<C>,
    agent_types: SurrealAgentTypeRepository<C>,
    service_types: SurrealServiceTypeRepository<C>,
    service_groups: SurrealServiceGroupRepository<C>,
    services: SurrealServiceRepository<C>,
    jobs: SurrealJobRepository<C>,
    tokens: SurrealTokenRepository<C>,
    metric_types: SurrealMetricTypeRepository<C>,
    metric_entries: SurrealMetricEntryRepository<C>,
    audit_entries: SurrealAuditEntryRepository<C>,
}

impl<C: Connection> SurrealStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            providers: SurrealProviderRepository::new(db.clone()),
            agents: SurrealAgentRepository::new(db.clone()),
            agent_types: SurrealAgentTypeRepository::new(db.clone()),
            service_types: SurrealServiceTypeRepository::new(db.clone()),
            service_groups: SurrealServiceGroupRepository::new(db.clone()),
            services: SurrealServiceRepository::new(db.clone()),
            jobs: SurrealJobRepository::new(db.clone()),
            tokens: SurrealTokenRepository::new(db.clone()),
            metric_types: SurrealMetricTypeRepository::new(db.clone()),
            metric_entries: SurrealMetricEntryRepository::new(db.clone()),
            audit_entries: SurrealAuditEntryRepository::new(db),
        }
    }
}

impl<C: Connection + Clone> Store for SurrealStore<C> {
    type Providers = SurrealProviderRepository<C>;
    type Agents = SurrealAgentRepository<C>;
    type AgentTypes = SurrealAgentTypeRepository<C>;
    type ServiceTypes = SurrealServiceTypeRepository<C>;
    type ServiceGroups = SurrealServiceGroupRepository<C>;
    type Services = SurrealServiceRepository<C>;
    type Jobs = SurrealJobRepository<C>;
    type Tokens = SurrealTokenRepository<C>;
    type MetricTypes = SurrealMetricTypeRepository<C>;
    type MetricEntries = SurrealMetricEntryRepository<C>;
    type AuditEntries = SurrealAuditEntryRepository<C>;

    fn providers(&self) -> &Self::Providers {
        &self.providers
    }

    fn agents(&self) -> &Self::Agents {
        &self.agents
    }

    fn agent_types(&self) -> &Self::AgentTypes {
        &self.agent_types
    }

    fn service_types(&self) -> &Self::ServiceTypes {
        &self.service_types
    }

    fn service_groups(&self) -> &Self::ServiceGroups {
        &self.service_groups
    }

    fn services(&self) -> &Self::Services {
        &self.services
    }

    fn jobs(&self) -> &Self::Jobs {
        &self.jobs
    }

    fn tokens(&self) -> &Self::Tokens {
        &self.tokens
    }

    fn metric_types(&self) -> &Self::MetricTypes {
        &self.metric_types
    }

    fn metric_entries(&self) -> &Self::MetricEntries {
        &self.metric_entries
    }

    fn audit_entries(&self) -> &Self::AuditEntries {
        &self.audit_entries
    }
}
