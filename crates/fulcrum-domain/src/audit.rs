//! Audit trail.

use fulcrum_core::auth::{Action, AuthIdentity, AuthTargetScope, Subject};
use fulcrum_core::error::FulcrumResult;
use fulcrum_core::models::audit::{AuditEntry, AuthorityType, CreateAuditEntry, EventType};
use fulcrum_core::repository::{AuditEntryRepository, PaginatedResult, Pagination, Store};
use uuid::Uuid;

use crate::access::authorize_static;

/// Who performed an audited action.
#[derive(Debug, Clone)]
pub struct Authority {
    kind: AuthorityType,
    id: String,
}

impl Authority {
    /// Background reconciliation.
    pub fn system() -> Self {
        Self {
            kind: AuthorityType::System,
            id: "system".into(),
        }
    }
}

impl From<&AuthIdentity> for Authority {
    fn from(identity: &AuthIdentity) -> Self {
        Self {
            kind: identity.role().into(),
            id: identity.id().to_string(),
        }
    }
}

/// Append-only audit log over the store's audit repository.
#[derive(Clone)]
pub struct AuditLog<S: Store> {
    store: S,
}

impl<S: Store> AuditLog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Appends an entry. Failures are logged and swallowed; the audited
    /// operation has already happened.
    pub async fn record(
        &self,
        authority: impl Into<Authority>,
        event_type: EventType,
        entity_id: Uuid,
        scope: AuthTargetScope,
        properties: serde_json::Value,
    ) {
        let authority = authority.into();
        let entry = CreateAuditEntry {
            authority_type: authority.kind,
            authority_id: authority.id,
            event_type,
            properties,
            entity_id: Some(entity_id),
            provider_id: scope.provider_id,
            agent_id: scope.agent_id,
            broker_id: scope.broker_id,
        };

        if let Err(e) = self.store.audit_entries().append(entry).await {
            tracing::warn!(
                event = %event_type,
                entity_id = %entity_id,
                error = %e,
                "failed to append audit entry"
            );
        }
    }

    pub async fn list(
        &self,
        identity: &AuthIdentity,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<AuditEntry>> {
        authorize_static(identity, Subject::AuditEntry, Action::List)?;
        self.store
            .audit_entries()
            .list(identity.scope(), pagination)
            .await
    }
}
