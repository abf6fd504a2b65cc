//! Resolution of bearer values into [`AuthIdentity`] values.

use std::future::Future;

use chrono::Utc;
use fulcrum_core::auth::{AuthIdentity, Role};
use fulcrum_core::error::{FulcrumError, FulcrumResult};
use fulcrum_core::models::agent::AgentState;
use fulcrum_core::models::provider::ProviderState;
use fulcrum_core::models::token::Token;
use fulcrum_core::repository::{AgentRepository, ProviderRepository, Store, TokenRepository};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::token::hash_token;

/// Turns a bearer value into an identity.
///
/// `Ok(None)` means the credential is unknown or expired, or that the
/// agent or provider behind it is disabled or gone;
/// `Err` is reserved for infrastructure failures.
pub trait Authenticator: Send + Sync {
    fn authenticate(
        &self,
        bearer: &str,
    ) -> impl Future<Output = FulcrumResult<Option<AuthIdentity>>> + Send;
}

/// Authenticates against the bootstrap admin token, issued tokens and
/// agent credentials, in that order.
#[derive(Clone)]
pub struct TokenAuthenticator<S: Store> {
    store: S,
    config: AuthConfig,
}

impl<S: Store> TokenAuthenticator<S> {
    pub fn new(store: S, config: AuthConfig) -> Self {
        Self { store, config }
    }

    fn bootstrap_admin(&self, hashed: &str) -> Option<AuthIdentity> {
        let admin_token = self.config.bootstrap_admin_token.as_deref()?;
        if admin_token.is_empty() || hash_token(admin_token) != hashed {
            return None;
        }
        Some(AuthIdentity::admin(
            Uuid::nil(),
            self.config.bootstrap_admin_name.as_str(),
        ))
    }

    async fn from_token(&self, hashed: &str) -> FulcrumResult<Option<AuthIdentity>> {
        let token = match self.store.tokens().get_by_hash(hashed).await {
            Ok(token) => token,
            Err(FulcrumError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        if token.is_expired(Utc::now()) {
            tracing::debug!(token_id = %token.id, "rejected expired token");
            return Ok(None);
        }

        Ok(identity_for_token(&token))
    }

    async fn from_agent(&self, hashed: &str) -> FulcrumResult<Option<AuthIdentity>> {
        let agent = match self.store.agents().get_by_token_hash(hashed).await {
            Ok(agent) => agent,
            Err(FulcrumError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(Some(AuthIdentity::agent(
            agent.id,
            agent.name,
            agent.provider_id,
            agent.id,
        )))
    }

    /// Whether the agent and provider an identity acts for still exist
    /// and are not disabled. Admins have neither and always pass.
    async fn is_active(&self, identity: &AuthIdentity) -> FulcrumResult<bool> {
        if let Some(agent_id) = identity.scope().agent_id {
            match self.store.agents().get_by_id(agent_id).await {
                Ok(agent) if agent.state == AgentState::Disabled => {
                    tracing::debug!(agent_id = %agent_id, "rejected credential of disabled agent");
                    return Ok(false);
                }
                Ok(_) => {}
                Err(FulcrumError::NotFound { .. }) => return Ok(false),
                Err(e) => return Err(e),
            }
        }
        if let Some(provider_id) = identity.scope().provider_id {
            match self.store.providers().get_by_id(provider_id).await {
                Ok(provider) if provider.state == ProviderState::Disabled => {
                    tracing::debug!(provider_id = %provider_id, "rejected credential of disabled provider");
                    return Ok(false);
                }
                Ok(_) => {}
                Err(FulcrumError::NotFound { .. }) => return Ok(false),
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }
}

/// Builds the identity a stored token grants. Tokens whose ownership
/// chain is incomplete for their role grant nothing.
fn identity_for_token(token: &Token) -> Option<AuthIdentity> {
    match (token.role, token.provider_id, token.agent_id) {
        (Role::Admin, _, _) => Some(AuthIdentity::admin(token.id, token.name.as_str())),
        (Role::Participant, Some(provider_id), _) => Some(AuthIdentity::participant(
            token.id,
            token.name.as_str(),
            provider_id,
        )),
        (Role::Agent, Some(provider_id), Some(agent_id)) => Some(AuthIdentity::agent(
            token.id,
            token.name.as_str(),
            provider_id,
            agent_id,
        )),
        _ => {
            tracing::warn!(
                token_id = %token.id,
                role = %token.role,
                "token has an incomplete scope"
            );
            None
        }
    }
}

impl<S: Store> Authenticator for TokenAuthenticator<S> {
    async fn authenticate(&self, bearer: &str) -> FulcrumResult<Option<AuthIdentity>> {
        let hashed = hash_token(bearer);

        if let Some(admin) = self.bootstrap_admin(&hashed) {
            return Ok(Some(admin));
        }
        let identity = match self.from_token(&hashed).await? {
            Some(identity) => identity,
            None => match self.from_agent(&hashed).await? {
                Some(identity) => identity,
                None => return Ok(None),
            },
        };

        if self.is_active(&identity).await? {
            Ok(Some(identity))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(role: Role, provider_id: Option<Uuid>, agent_id: Option<Uuid>) -> Token {
        let now = Utc::now();
        Token {
            id: Uuid::new_v4(),
            name: "t".into(),
            role,
            scope_id: None,
            provider_id,
            agent_id,
            expire_at: now,
            hashed_value: String::new(),
            plain_value: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn token_identity_follows_role() {
        let p = Uuid::new_v4();
        let a = Uuid::new_v4();

        let admin = identity_for_token(&token(Role::Admin, None, None)).unwrap();
        assert!(admin.is_admin());

        let participant = identity_for_token(&token(Role::Participant, Some(p), None)).unwrap();
        assert_eq!(participant.scope().provider_id, Some(p));
        assert_eq!(participant.scope().agent_id, None);

        let agent = identity_for_token(&token(Role::Agent, Some(p), Some(a))).unwrap();
        assert_eq!(agent.scope().agent_id, Some(a));
    }

    #[test]
    fn incomplete_scope_grants_nothing() {
        assert!(identity_for_token(&token(Role::Participant, None, None)).is_none());
        assert!(identity_for_token(&token(Role::Agent, Some(Uuid::new_v4()), None)).is_none());
    }
}
