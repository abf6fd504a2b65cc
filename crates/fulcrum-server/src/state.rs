//! Shared handler state.

use std::sync::Arc;

use fulcrum_auth::{AuthConfig, TokenAuthenticator};
use fulcrum_core::repository::Store;
use fulcrum_domain::{
    AgentCommander, AuditLog, CatalogCommander, DomainConfig, JobManager, MetricCommander,
    ProviderCommander, ServiceCommander, ServiceGroupCommander, TokenCommander,
};

/// Everything a request handler needs. Cloned per request; every
/// member shares the same store.
#[derive(Clone)]
pub struct AppState<S: Store> {
    pub authenticator: Arc<TokenAuthenticator<S>>,
    pub providers: ProviderCommander<S>,
    pub agents: AgentCommander<S>,
    pub catalog: CatalogCommander<S>,
    pub service_groups: ServiceGroupCommander<S>,
    pub services: ServiceCommander<S>,
    pub jobs: JobManager<S>,
    pub tokens: TokenCommander<S>,
    pub metrics: MetricCommander<S>,
    pub audit: AuditLog<S>,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, auth: AuthConfig, domain: DomainConfig) -> Self {
        Self {
            authenticator: Arc::new(TokenAuthenticator::new(store.clone(), auth)),
            providers: ProviderCommander::new(store.clone()),
            agents: AgentCommander::new(store.clone()),
            catalog: CatalogCommander::new(store.clone()),
            service_groups: ServiceGroupCommander::new(store.clone()),
            services: ServiceCommander::new(store.clone(), domain.clone()),
            jobs: JobManager::new(store.clone(), domain.clone()),
            tokens: TokenCommander::new(store.clone(), domain),
            metrics: MetricCommander::new(store.clone()),
            audit: AuditLog::new(store),
        }
    }
}
