//! Caller identity and ownership scopes.
//!
//! An [`AuthIdentity`] is produced once per request by the authenticator
//! and is immutable afterwards: there is no way to widen its scope.
//! An [`AuthTargetScope`] describes the ownership chain of the resource
//! being acted upon and is always derived server-side.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    /// Global administrator, bypasses scope checks.
    Admin,
    /// Administrator of a single provider (which may also act as broker).
    Participant,
    /// A remote agent acting on its own behalf.
    Agent,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Participant, Role::Agent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Participant => "Participant",
            Role::Agent => "Agent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Participant" => Ok(Role::Participant),
            "Agent" => Ok(Role::Agent),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The ownership scope an identity is confined to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthScope {
    pub provider_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
}

/// An authenticated caller.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuthIdentity {
    id: Uuid,
    name: String,
    role: Role,
    scope: AuthScope,
}

impl AuthIdentity {
    pub fn admin(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role: Role::Admin,
            scope: AuthScope::default(),
        }
    }

    pub fn participant(id: Uuid, name: impl Into<String>, provider_id: Uuid) -> Self {
        Self {
            id,
            name: name.into(),
            role: Role::Participant,
            scope: AuthScope {
                provider_id: Some(provider_id),
                agent_id: None,
            },
        }
    }

    pub fn agent(id: Uuid, name: impl Into<String>, provider_id: Uuid, agent_id: Uuid) -> Self {
        Self {
            id,
            name: name.into(),
            role: Role::Agent,
            scope: AuthScope {
                provider_id: Some(provider_id),
                agent_id: Some(agent_id),
            },
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn scope(&self) -> &AuthScope {
        &self.scope
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Ownership chain of a concrete resource.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthTargetScope {
    pub provider_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub broker_id: Option<Uuid>,
}

impl AuthTargetScope {
    /// Scope of global resources and list endpoints.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn provider(provider_id: Uuid) -> Self {
        Self {
            provider_id: Some(provider_id),
            ..Self::default()
        }
    }

    pub fn broker(broker_id: Uuid) -> Self {
        Self {
            broker_id: Some(broker_id),
            ..Self::default()
        }
    }

    pub fn agent(provider_id: Uuid, agent_id: Uuid) -> Self {
        Self {
            provider_id: Some(provider_id),
            agent_id: Some(agent_id),
            broker_id: None,
        }
    }

    pub fn service(provider_id: Uuid, agent_id: Uuid, broker_id: Uuid) -> Self {
        Self {
            provider_id: Some(provider_id),
            agent_id: Some(agent_id),
            broker_id: Some(broker_id),
        }
    }
}

/// Kinds of resources the authorizer knows about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Subject {
    Provider,
    Agent,
    AgentType,
    ServiceType,
    ServiceGroup,
    Service,
    Job,
    Token,
    MetricType,
    MetricEntry,
    AuditEntry,
}

impl Subject {
    pub const ALL: [Subject; 11] = [
        Subject::Provider,
        Subject::Agent,
        Subject::AgentType,
        Subject::ServiceType,
        Subject::ServiceGroup,
        Subject::Service,
        Subject::Job,
        Subject::Token,
        Subject::MetricType,
        Subject::MetricEntry,
        Subject::AuditEntry,
    ];
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    List,
    Start,
    Stop,
    Retry,
    UpdateState,
    RotateToken,
    Claim,
    Complete,
    Fail,
    ListPending,
    Regenerate,
    /// Administrative state override, such as disabling an agent.
    SetState,
}

impl Action {
    pub const ALL: [Action; 16] = [
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
        Action::List,
        Action::Start,
        Action::Stop,
        Action::Retry,
        Action::UpdateState,
        Action::RotateToken,
        Action::Claim,
        Action::Complete,
        Action::Fail,
        Action::ListPending,
        Action::Regenerate,
        Action::SetState,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_fix_scope_by_role() {
        let p = Uuid::new_v4();
        let a = Uuid::new_v4();

        let admin = AuthIdentity::admin(Uuid::new_v4(), "root");
        assert!(admin.is_admin());
        assert_eq!(*admin.scope(), AuthScope::default());

        let participant = AuthIdentity::participant(Uuid::new_v4(), "acme", p);
        assert_eq!(participant.role(), Role::Participant);
        assert_eq!(participant.scope().provider_id, Some(p));
        assert_eq!(participant.scope().agent_id, None);

        let agent = AuthIdentity::agent(Uuid::new_v4(), "edge-1", p, a);
        assert_eq!(agent.role(), Role::Agent);
        assert_eq!(agent.scope().provider_id, Some(p));
        assert_eq!(agent.scope().agent_id, Some(a));
    }

    #[test]
    fn role_string_roundtrip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("root".parse::<Role>().is_err());
    }
}
