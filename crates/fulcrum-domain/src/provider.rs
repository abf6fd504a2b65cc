//! Provider commander.

use fulcrum_core::auth::{Action, AuthIdentity, AuthTargetScope, Subject};
use fulcrum_core::error::{FulcrumError, FulcrumResult};
use fulcrum_core::models::audit::EventType;
use fulcrum_core::models::provider::{CreateProvider, Provider, UpdateProvider};
use fulcrum_core::models::{validate_attributes, validate_country_code, validate_name};
use fulcrum_core::repository::{
    AgentRepository, PaginatedResult, Pagination, ProviderRepository, Store, TokenRepository,
};
use serde_json::json;
use uuid::Uuid;

use crate::access::{authorize_resource, authorize_static, authorize_target};
use crate::audit::AuditLog;

#[derive(Clone)]
pub struct ProviderCommander<S: Store> {
    store: S,
    audit: AuditLog<S>,
}

impl<S: Store> ProviderCommander<S> {
    pub fn new(store: S) -> Self {
        Self {
            audit: AuditLog::new(store.clone()),
            store,
        }
    }

    pub async fn create(
        &self,
        identity: &AuthIdentity,
        input: CreateProvider,
    ) -> FulcrumResult<Provider> {
        authorize_static(identity, Subject::Provider, Action::Create)?;
        validate_name("provider", &input.name)?;
        if let Some(code) = &input.country_code {
            validate_country_code(code)?;
        }
        validate_attributes(&input.attributes)?;

        let provider = self.store.providers().create(input).await?;
        tracing::info!(provider_id = %provider.id, name = %provider.name, "provider created");

        self.audit
            .record(
                identity,
                EventType::ProviderCreated,
                provider.id,
                AuthTargetScope::provider(provider.id),
                json!({ "name": provider.name }),
            )
            .await;
        Ok(provider)
    }

    pub async fn get(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<Provider> {
        let providers = self.store.providers();
        authorize_resource(identity, Subject::Provider, Action::Read, providers.auth_scope(id))
            .await?;
        providers.get_by_id(id).await
    }

    pub async fn update(
        &self,
        identity: &AuthIdentity,
        id: Uuid,
        input: UpdateProvider,
    ) -> FulcrumResult<Provider> {
        let providers = self.store.providers();
        let target = authorize_resource(
            identity,
            Subject::Provider,
            Action::Update,
            providers.auth_scope(id),
        )
        .await?;

        // Disabling a provider locks out its credentials.
        if input.state.is_some() {
            authorize_target(identity, Subject::Provider, Action::SetState, &target)?;
        }
        if let Some(name) = &input.name {
            validate_name("provider", name)?;
        }
        if let Some(code) = &input.country_code {
            validate_country_code(code)?;
        }
        if let Some(attributes) = &input.attributes {
            validate_attributes(attributes)?;
        }

        let provider = providers.update(id, input).await?;
        self.audit
            .record(
                identity,
                EventType::ProviderUpdated,
                id,
                target,
                json!({ "name": provider.name, "state": provider.state }),
            )
            .await;
        Ok(provider)
    }

    /// Removes a provider without agents, together with its tokens.
    pub async fn delete(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<()> {
        let providers = self.store.providers();
        let target = authorize_resource(
            identity,
            Subject::Provider,
            Action::Delete,
            providers.auth_scope(id),
        )
        .await?;

        let agents = self.store.agents().count_by_provider(id).await?;
        if agents > 0 {
            return Err(FulcrumError::conflict(format!(
                "provider {id} still has {agents} agent(s)"
            )));
        }

        self.store.tokens().delete_by_provider(id).await?;
        providers.delete(id).await?;
        tracing::info!(provider_id = %id, "provider deleted");

        self.audit
            .record(identity, EventType::ProviderDeleted, id, target, json!({}))
            .await;
        Ok(())
    }

    pub async fn list(
        &self,
        identity: &AuthIdentity,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<Provider>> {
        authorize_static(identity, Subject::Provider, Action::List)?;
        self.store
            .providers()
            .list(identity.scope(), pagination)
            .await
    }
}
