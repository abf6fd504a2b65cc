//! Token commander.
//!
//! The ownership chain stored on a token is always resolved from its
//! scope id here, never taken from the request.

use chrono::{DateTime, Utc};
use fulcrum_auth::token::{generate_token, hash_token};
use fulcrum_core::auth::{Action, AuthIdentity, AuthTargetScope, Role, Subject};
use fulcrum_core::error::{FulcrumError, FulcrumResult};
use fulcrum_core::models::audit::EventType;
use fulcrum_core::models::token::{CreateToken, Token, UpdateToken};
use fulcrum_core::models::validate_name;
use fulcrum_core::repository::{
    AgentRepository, PaginatedResult, Pagination, ProviderRepository, Store, TokenRepository,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::access::{authorize_resource, authorize_static, authorize_target, resolve_reference};
use crate::audit::AuditLog;
use crate::config::DomainConfig;

/// Request to issue a token.
#[derive(Debug, Clone, Deserialize)]
pub struct NewToken {
    pub name: String,
    pub role: Role,
    /// Provider id for participant tokens, agent id for agent tokens.
    pub scope_id: Option<Uuid>,
    pub expire_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct TokenCommander<S: Store> {
    store: S,
    config: DomainConfig,
    audit: AuditLog<S>,
}

fn ensure_future(expire_at: DateTime<Utc>) -> FulcrumResult<()> {
    if expire_at <= Utc::now() {
        return Err(FulcrumError::validation("expire_at must be in the future"));
    }
    Ok(())
}

impl<S: Store> TokenCommander<S> {
    pub fn new(store: S, config: DomainConfig) -> Self {
        Self {
            audit: AuditLog::new(store.clone()),
            store,
            config,
        }
    }

    /// Works out the ownership chain of a new token and authorizes it.
    async fn resolve_scope(
        &self,
        identity: &AuthIdentity,
        role: Role,
        scope_id: Option<Uuid>,
    ) -> FulcrumResult<AuthTargetScope> {
        let target = match (role, scope_id) {
            (Role::Admin, None) => AuthTargetScope::empty(),
            (Role::Admin, Some(_)) => {
                return Err(FulcrumError::validation("admin tokens take no scope_id"));
            }
            (_, None) => {
                return Err(FulcrumError::validation(format!(
                    "{role} tokens require a scope_id"
                )));
            }
            (Role::Participant, Some(provider_id)) => {
                resolve_reference(
                    identity,
                    Subject::Token,
                    Action::Create,
                    self.store.providers().auth_scope(provider_id),
                )
                .await?
            }
            (Role::Agent, Some(agent_id)) => {
                resolve_reference(
                    identity,
                    Subject::Token,
                    Action::Create,
                    self.store.agents().auth_scope(agent_id),
                )
                .await?
            }
        };

        authorize_target(identity, Subject::Token, Action::Create, &target)?;
        Ok(target)
    }

    /// Issues a token and returns it with its plain value, which is not
    /// retrievable afterwards.
    pub async fn create(&self, identity: &AuthIdentity, input: NewToken) -> FulcrumResult<Token> {
        let target = self
            .resolve_scope(identity, input.role, input.scope_id)
            .await?;
        validate_name("token", &input.name)?;
        let expire_at = input
            .expire_at
            .unwrap_or_else(|| Utc::now() + self.config.token_lifetime());
        ensure_future(expire_at)?;

        let plain = generate_token();
        let mut token = self
            .store
            .tokens()
            .create(CreateToken {
                name: input.name,
                role: input.role,
                scope_id: input.scope_id,
                provider_id: target.provider_id,
                agent_id: target.agent_id,
                expire_at,
                hashed_value: hash_token(&plain),
            })
            .await?;
        tracing::info!(token_id = %token.id, role = %token.role, "token issued");

        self.audit
            .record(
                identity,
                EventType::TokenCreated,
                token.id,
                target,
                json!({ "name": token.name, "role": token.role, "expire_at": token.expire_at }),
            )
            .await;

        token.plain_value = Some(plain);
        Ok(token)
    }

    pub async fn get(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<Token> {
        let tokens = self.store.tokens();
        authorize_resource(identity, Subject::Token, Action::Read, tokens.auth_scope(id)).await?;
        tokens.get_by_id(id).await
    }

    pub async fn update(
        &self,
        identity: &AuthIdentity,
        id: Uuid,
        input: UpdateToken,
    ) -> FulcrumResult<Token> {
        let tokens = self.store.tokens();
        let target =
            authorize_resource(identity, Subject::Token, Action::Update, tokens.auth_scope(id))
                .await?;
        if let Some(name) = &input.name {
            validate_name("token", name)?;
        }
        if let Some(expire_at) = input.expire_at {
            ensure_future(expire_at)?;
        }

        let token = tokens.update(id, input).await?;
        self.audit
            .record(
                identity,
                EventType::TokenUpdated,
                id,
                target,
                json!({ "name": token.name, "expire_at": token.expire_at }),
            )
            .await;
        Ok(token)
    }

    /// Replaces the token's value; the old value stops working
    /// immediately.
    pub async fn regenerate(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<Token> {
        let tokens = self.store.tokens();
        let target = authorize_resource(
            identity,
            Subject::Token,
            Action::Regenerate,
            tokens.auth_scope(id),
        )
        .await?;

        let plain = generate_token();
        let mut token = tokens.regenerate(id, hash_token(&plain)).await?;
        self.audit
            .record(identity, EventType::TokenRegenerated, id, target, json!({}))
            .await;

        token.plain_value = Some(plain);
        Ok(token)
    }

    pub async fn delete(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<()> {
        let tokens = self.store.tokens();
        let target =
            authorize_resource(identity, Subject::Token, Action::Delete, tokens.auth_scope(id))
                .await?;

        tokens.delete(id).await?;
        self.audit
            .record(identity, EventType::TokenDeleted, id, target, json!({}))
            .await;
        Ok(())
    }

    pub async fn list(
        &self,
        identity: &AuthIdentity,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<Token>> {
        authorize_static(identity, Subject::Token, Action::List)?;
        self.store.tokens().list(identity.scope(), pagination).await
    }
}
