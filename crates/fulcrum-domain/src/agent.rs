//! Agent commander.

use fulcrum_auth::token::{generate_token, hash_token};
use fulcrum_core::auth::{Action, AuthIdentity, AuthTargetScope, Subject};
use fulcrum_core::authz::Authorizer;
use fulcrum_core::error::{FulcrumError, FulcrumResult};
use fulcrum_core::models::agent::{Agent, AgentState, CreateAgent, UpdateAgent};
use fulcrum_core::models::audit::EventType;
use fulcrum_core::models::{validate_attributes, validate_country_code, validate_name};
use fulcrum_core::repository::{
    AgentRepository, AgentTypeRepository, PaginatedResult, Pagination, ProviderRepository,
    ServiceRepository, Store, TokenRepository,
};
use serde_json::json;
use uuid::Uuid;

use crate::access::{authorize_resource, authorize_static, authorize_target, resolve_reference};
use crate::audit::{AuditLog, Authority};

#[derive(Clone)]
pub struct AgentCommander<S: Store> {
    store: S,
    audit: AuditLog<S>,
}

impl<S: Store> AgentCommander<S> {
    pub fn new(store: S) -> Self {
        Self {
            audit: AuditLog::new(store.clone()),
            store,
        }
    }

    async fn ensure_agent_type(&self, agent_type_id: Uuid) -> FulcrumResult<()> {
        if self.store.agent_types().exists(agent_type_id).await? {
            Ok(())
        } else {
            Err(FulcrumError::validation(format!(
                "agent type {agent_type_id} does not exist"
            )))
        }
    }

    /// Creates an agent and returns it with its bearer token, which is
    /// not retrievable afterwards.
    pub async fn create(&self, identity: &AuthIdentity, mut input: CreateAgent) -> FulcrumResult<Agent> {
        let target = resolve_reference(
            identity,
            Subject::Agent,
            Action::Create,
            self.store.providers().auth_scope(input.provider_id),
        )
        .await?;
        authorize_target(identity, Subject::Agent, Action::Create, &target)?;

        validate_name("agent", &input.name)?;
        if let Some(code) = &input.country_code {
            validate_country_code(code)?;
        }
        validate_attributes(&input.attributes)?;
        self.ensure_agent_type(input.agent_type_id).await?;

        let token = generate_token();
        input.token_hash = hash_token(&token);

        let mut agent = self.store.agents().create(input).await?;
        tracing::info!(agent_id = %agent.id, provider_id = %agent.provider_id, "agent created");

        self.audit
            .record(
                identity,
                EventType::AgentCreated,
                agent.id,
                AuthTargetScope::agent(agent.provider_id, agent.id),
                json!({ "name": agent.name, "agent_type_id": agent.agent_type_id }),
            )
            .await;

        agent.token = Some(token);
        Ok(agent)
    }

    pub async fn get(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<Agent> {
        let agents = self.store.agents();
        authorize_resource(identity, Subject::Agent, Action::Read, agents.auth_scope(id)).await?;
        agents.get_by_id(id).await
    }

    /// The calling agent's own record.
    pub async fn me(&self, identity: &AuthIdentity) -> FulcrumResult<Agent> {
        let id = self_agent_id(identity, Action::Read)?;
        self.get(identity, id).await
    }

    pub async fn update(
        &self,
        identity: &AuthIdentity,
        id: Uuid,
        input: UpdateAgent,
    ) -> FulcrumResult<Agent> {
        let agents = self.store.agents();
        let target =
            authorize_resource(identity, Subject::Agent, Action::Update, agents.auth_scope(id))
                .await?;

        if let Some(name) = &input.name {
            validate_name("agent", name)?;
        }
        if let Some(code) = &input.country_code {
            validate_country_code(code)?;
        }
        if let Some(attributes) = &input.attributes {
            validate_attributes(attributes)?;
        }
        if let Some(agent_type_id) = input.agent_type_id {
            self.ensure_agent_type(agent_type_id).await?;
        }

        let agent = agents.update(id, input).await?;
        self.audit
            .record(
                identity,
                EventType::AgentUpdated,
                id,
                target,
                json!({ "name": agent.name }),
            )
            .await;
        Ok(agent)
    }

    /// Agent self-report. Refreshes the heartbeat used by
    /// [`AgentCommander::disconnect_stale`].
    pub async fn update_status(
        &self,
        identity: &AuthIdentity,
        state: AgentState,
    ) -> FulcrumResult<Agent> {
        let id = self_agent_id(identity, Action::UpdateState)?;
        let agents = self.store.agents();
        let target = authorize_resource(
            identity,
            Subject::Agent,
            Action::UpdateState,
            agents.auth_scope(id),
        )
        .await?;

        if !matches!(
            state,
            AgentState::Connected | AgentState::Disconnected | AgentState::Error
        ) {
            return Err(FulcrumError::validation(format!(
                "agents cannot report state {state}"
            )));
        }

        let current = agents.get_by_id(id).await?;
        if current.state == AgentState::Disabled {
            return Err(FulcrumError::invalid_state(format!("agent {id} is disabled")));
        }

        let agent = agents.update_state(id, state).await?;
        if current.state != state {
            tracing::info!(agent_id = %id, from = %current.state, to = %state, "agent state changed");
            self.audit
                .record(
                    identity,
                    EventType::AgentStatusUpdated,
                    id,
                    target,
                    json!({ "from": current.state, "to": state }),
                )
                .await;
        }
        Ok(agent)
    }

    /// Administrative override of the agent state. Disabling an agent
    /// locks out its credential and every token issued for it until an
    /// admin sets another state.
    pub async fn set_state(
        &self,
        identity: &AuthIdentity,
        id: Uuid,
        state: AgentState,
    ) -> FulcrumResult<Agent> {
        let agents = self.store.agents();
        let target =
            authorize_resource(identity, Subject::Agent, Action::SetState, agents.auth_scope(id))
                .await?;

        let current = agents.get_by_id(id).await?;
        let agent = agents.update_state(id, state).await?;
        if current.state != state {
            tracing::warn!(agent_id = %id, from = %current.state, to = %state, "agent state overridden");
            self.audit
                .record(
                    identity,
                    EventType::AgentStatusUpdated,
                    id,
                    target,
                    json!({ "from": current.state, "to": state, "override": true }),
                )
                .await;
        }
        Ok(agent)
    }

    /// Replaces the agent's bearer token; the old one stops working
    /// immediately.
    pub async fn rotate_token(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<Agent> {
        let agents = self.store.agents();
        let target = authorize_resource(
            identity,
            Subject::Agent,
            Action::RotateToken,
            agents.auth_scope(id),
        )
        .await?;

        let token = generate_token();
        let mut agent = agents.rotate_token_hash(id, hash_token(&token)).await?;

        self.audit
            .record(identity, EventType::AgentTokenRotated, id, target, json!({}))
            .await;

        agent.token = Some(token);
        Ok(agent)
    }

    pub async fn rotate_own_token(&self, identity: &AuthIdentity) -> FulcrumResult<Agent> {
        let id = self_agent_id(identity, Action::RotateToken)?;
        self.rotate_token(identity, id).await
    }

    /// Removes an agent without live services, together with its tokens.
    pub async fn delete(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<()> {
        let agents = self.store.agents();
        let target =
            authorize_resource(identity, Subject::Agent, Action::Delete, agents.auth_scope(id))
                .await?;

        let live = self.store.services().count_live_by_agent(id).await?;
        if live > 0 {
            return Err(FulcrumError::conflict(format!(
                "agent {id} still has {live} service(s) that are not deleted"
            )));
        }

        self.store.tokens().delete_by_agent(id).await?;
        agents.delete(id).await?;
        tracing::info!(agent_id = %id, "agent deleted");

        self.audit
            .record(identity, EventType::AgentDeleted, id, target, json!({}))
            .await;
        Ok(())
    }

    pub async fn list(
        &self,
        identity: &AuthIdentity,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<Agent>> {
        authorize_static(identity, Subject::Agent, Action::List)?;
        self.store.agents().list(identity.scope(), pagination).await
    }

    /// Marks connected agents that missed their heartbeat as
    /// disconnected. Returns how many were changed.
    pub async fn disconnect_stale(&self, heartbeat_timeout: chrono::Duration) -> FulcrumResult<usize> {
        let cutoff = chrono::Utc::now() - heartbeat_timeout;
        let agents = self.store.agents().disconnect_stale(cutoff).await?;

        for agent in &agents {
            tracing::warn!(agent_id = %agent.id, "agent missed its heartbeat, marked disconnected");
            self.audit
                .record(
                    Authority::system(),
                    EventType::AgentDisconnected,
                    agent.id,
                    AuthTargetScope::agent(agent.provider_id, agent.id),
                    json!({ "last_status_update": agent.last_status_update }),
                )
                .await;
        }
        Ok(agents.len())
    }
}

/// The agent id of an agent identity; other roles have no "own" agent.
fn self_agent_id(identity: &AuthIdentity, action: Action) -> FulcrumResult<Uuid> {
    identity
        .scope()
        .agent_id
        .ok_or_else(|| Authorizer::scope_denied(identity, Subject::Agent, action))
}
