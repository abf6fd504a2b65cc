//! Scope-based authorization.
//!
//! [`Authorizer::authorize`] is a pure decision function: global admins
//! are always allowed, every other role needs an entry in [`POLICIES`]
//! for the `(role, subject, action)` triple and the entry's
//! [`ScopeRule`] must hold between the identity scope and the target
//! scope. Missing entries deny.

use crate::auth::{Action, AuthIdentity, AuthScope, AuthTargetScope, Role, Subject};
use crate::error::{FulcrumError, FulcrumResult};

/// How an identity scope must relate to a target scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRule {
    /// No id comparison; the query behind the action is scope-filtered.
    Unscoped,
    /// identity.provider_id == target.provider_id
    Provider,
    /// identity.provider_id == target.broker_id
    Broker,
    /// Either [`ScopeRule::Provider`] or [`ScopeRule::Broker`] holds.
    ProviderOrBroker,
    /// identity.agent_id == target.agent_id
    Agent,
}

fn same(a: Option<uuid::Uuid>, b: Option<uuid::Uuid>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

impl ScopeRule {
    pub fn allows(&self, identity: &AuthScope, target: &AuthTargetScope) -> bool {
        match self {
            ScopeRule::Unscoped => true,
            ScopeRule::Provider => same(identity.provider_id, target.provider_id),
            ScopeRule::Broker => same(identity.provider_id, target.broker_id),
            ScopeRule::ProviderOrBroker => {
                same(identity.provider_id, target.provider_id)
                    || same(identity.provider_id, target.broker_id)
            }
            ScopeRule::Agent => same(identity.agent_id, target.agent_id),
        }
    }
}

pub struct Policy {
    pub role: Role,
    pub subject: Subject,
    pub actions: &'static [Action],
    pub rule: ScopeRule,
}

const fn policy(
    role: Role,
    subject: Subject,
    actions: &'static [Action],
    rule: ScopeRule,
) -> Policy {
    Policy {
        role,
        subject,
        actions,
        rule,
    }
}

use Action as A;
use Role::{Agent as AgentRole, Participant};
use ScopeRule as R;
use Subject as S;

/// Policy table for non-admin roles.
pub static POLICIES: &[Policy] = &[
    // Participant
    policy(Participant, S::Provider, &[A::Read, A::Update], R::Provider),
    policy(Participant, S::Provider, &[A::List], R::Unscoped),
    policy(
        Participant,
        S::Agent,
        &[A::Create, A::Read, A::Update, A::Delete, A::RotateToken],
        R::Provider,
    ),
    policy(Participant, S::Agent, &[A::List], R::Unscoped),
    policy(Participant, S::AgentType, &[A::Read, A::List], R::Unscoped),
    policy(Participant, S::ServiceType, &[A::Read, A::List], R::Unscoped),
    policy(Participant, S::MetricType, &[A::Read, A::List], R::Unscoped),
    policy(
        Participant,
        S::ServiceGroup,
        &[A::Create, A::Read, A::Update, A::Delete],
        R::Broker,
    ),
    policy(Participant, S::ServiceGroup, &[A::List], R::Unscoped),
    policy(Participant, S::Service, &[A::Create], R::Broker),
    policy(
        Participant,
        S::Service,
        &[A::Read, A::Update, A::Start, A::Stop, A::Delete, A::Retry],
        R::ProviderOrBroker,
    ),
    policy(Participant, S::Service, &[A::List], R::Unscoped),
    policy(Participant, S::Job, &[A::Read], R::ProviderOrBroker),
    policy(Participant, S::Job, &[A::List], R::Unscoped),
    policy(
        Participant,
        S::Token,
        &[A::Create, A::Read, A::Update, A::Delete, A::Regenerate],
        R::Provider,
    ),
    policy(Participant, S::Token, &[A::List], R::Unscoped),
    policy(Participant, S::MetricEntry, &[A::List], R::Unscoped),
    policy(Participant, S::AuditEntry, &[A::List], R::Unscoped),
    // Agent
    policy(
        AgentRole,
        S::Agent,
        &[A::Read, A::UpdateState, A::RotateToken],
        R::Agent,
    ),
    policy(AgentRole, S::AgentType, &[A::Read, A::List], R::Unscoped),
    policy(AgentRole, S::ServiceType, &[A::Read, A::List], R::Unscoped),
    policy(AgentRole, S::MetricType, &[A::Read, A::List], R::Unscoped),
    policy(AgentRole, S::Service, &[A::Read], R::Agent),
    policy(AgentRole, S::Service, &[A::List], R::Unscoped),
    policy(
        AgentRole,
        S::Job,
        &[A::Read, A::Claim, A::Complete, A::Fail],
        R::Agent,
    ),
    policy(AgentRole, S::Job, &[A::List, A::ListPending], R::Unscoped),
    policy(AgentRole, S::MetricEntry, &[A::Create], R::Agent),
    policy(AgentRole, S::MetricEntry, &[A::List], R::Unscoped),
];

/// Looks up the scope rule for a non-admin triple.
pub fn policy_for(role: Role, subject: Subject, action: Action) -> Option<ScopeRule> {
    POLICIES
        .iter()
        .find(|p| p.role == role && p.subject == subject && p.actions.contains(&action))
        .map(|p| p.rule)
}

/// Stateless authorization decision point.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authorizer;

impl Authorizer {
    pub fn new() -> Self {
        Self
    }

    /// The error for a scope mismatch. Also used to mask targets that
    /// could not be resolved, so both cases look the same to the caller.
    pub fn scope_denied(identity: &AuthIdentity, subject: Subject, action: Action) -> FulcrumError {
        FulcrumError::forbidden(format!(
            "{} {} may not {:?} this {:?}",
            identity.role(),
            identity.id(),
            action,
            subject
        ))
    }

    pub fn authorize(
        &self,
        identity: &AuthIdentity,
        subject: Subject,
        action: Action,
        target: &AuthTargetScope,
    ) -> FulcrumResult<()> {
        if identity.is_admin() {
            return Ok(());
        }

        match policy_for(identity.role(), subject, action) {
            Some(rule) if rule.allows(identity.scope(), target) => Ok(()),
            Some(_) => Err(Self::scope_denied(identity, subject, action)),
            None => Err(FulcrumError::forbidden(format!(
                "{} may not {:?} {:?}",
                identity.role(),
                action,
                subject
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use uuid::Uuid;

    use super::*;
    use crate::error::ErrorKind;

    fn participant(provider: Uuid) -> AuthIdentity {
        AuthIdentity::participant(Uuid::new_v4(), "participant", provider)
    }

    fn agent(provider: Uuid, agent: Uuid) -> AuthIdentity {
        AuthIdentity::agent(Uuid::new_v4(), "agent", provider, agent)
    }

    /// A target scope that matches the identity on every axis.
    fn matching_target(identity: &AuthIdentity) -> AuthTargetScope {
        AuthTargetScope {
            provider_id: identity.scope().provider_id,
            agent_id: identity.scope().agent_id,
            broker_id: identity.scope().provider_id,
        }
    }

    #[test]
    fn admin_is_always_allowed() {
        let admin = AuthIdentity::admin(Uuid::new_v4(), "root");
        let foreign = AuthTargetScope::service(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        for subject in Subject::ALL {
            for action in Action::ALL {
                for target in [AuthTargetScope::empty(), foreign] {
                    assert!(
                        Authorizer.authorize(&admin, subject, action, &target).is_ok(),
                        "admin denied {action:?} on {subject:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn missing_policy_denies_even_with_matching_scope() {
        let identities = [
            participant(Uuid::new_v4()),
            agent(Uuid::new_v4(), Uuid::new_v4()),
        ];
        for identity in &identities {
            let target = matching_target(identity);
            for subject in Subject::ALL {
                for action in Action::ALL {
                    let decision = Authorizer.authorize(identity, subject, action, &target);
                    match policy_for(identity.role(), subject, action) {
                        None => {
                            let err = decision.unwrap_err();
                            assert_eq!(err.kind(), ErrorKind::Forbidden);
                        }
                        Some(_) => assert!(
                            decision.is_ok(),
                            "{:?} denied {action:?} on {subject:?} with matching scope",
                            identity.role()
                        ),
                    }
                }
            }
        }
    }

    #[test]
    fn scoped_policies_deny_foreign_targets() {
        let identities = [
            participant(Uuid::new_v4()),
            agent(Uuid::new_v4(), Uuid::new_v4()),
        ];
        let foreign = AuthTargetScope::service(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        for identity in &identities {
            for subject in Subject::ALL {
                for action in Action::ALL {
                    let Some(rule) = policy_for(identity.role(), subject, action) else {
                        continue;
                    };
                    let decision = Authorizer.authorize(identity, subject, action, &foreign);
                    if rule == ScopeRule::Unscoped {
                        assert!(decision.is_ok());
                    } else {
                        assert_eq!(decision.unwrap_err().kind(), ErrorKind::Forbidden);
                    }
                }
            }
        }
    }

    #[test]
    fn scoped_policies_deny_empty_targets() {
        let identity = agent(Uuid::new_v4(), Uuid::new_v4());
        assert!(
            Authorizer
                .authorize(
                    &identity,
                    Subject::Job,
                    Action::Claim,
                    &AuthTargetScope::empty()
                )
                .is_err()
        );
    }

    #[test]
    fn state_overrides_are_admin_only() {
        let provider = Uuid::new_v4();
        let agent_id = Uuid::new_v4();
        let own = AuthTargetScope::agent(provider, agent_id);
        for identity in [participant(provider), agent(provider, agent_id)] {
            let err = Authorizer
                .authorize(&identity, Subject::Agent, Action::SetState, &own)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Forbidden);
        }
    }

    #[test]
    fn admin_role_never_appears_in_table() {
        assert!(POLICIES.iter().all(|p| p.role != Role::Admin));
    }

    #[test]
    fn policy_table_has_no_duplicate_triples() {
        let mut seen = HashSet::new();
        for p in POLICIES {
            for action in p.actions {
                assert!(
                    seen.insert((p.role, p.subject, *action)),
                    "duplicate policy for {:?} {:?} {:?}",
                    p.role,
                    p.subject,
                    action
                );
            }
        }
    }

    #[test]
    fn participant_owns_its_provider_only() {
        let p = Uuid::new_v4();
        let q = Uuid::new_v4();
        let identity = participant(q);
        let own = AuthTargetScope::provider(q);
        let other = AuthTargetScope::provider(p);

        assert!(
            Authorizer
                .authorize(&identity, Subject::Agent, Action::Read, &own)
                .is_ok()
        );
        assert!(
            Authorizer
                .authorize(&identity, Subject::Agent, Action::Read, &other)
                .is_err()
        );
        // Participants never create providers, not even their own.
        assert!(
            Authorizer
                .authorize(&identity, Subject::Provider, Action::Create, &own)
                .is_err()
        );
    }

    #[test]
    fn service_access_from_either_side_of_the_chain() {
        let provider = Uuid::new_v4();
        let broker = Uuid::new_v4();
        let target = AuthTargetScope::service(provider, Uuid::new_v4(), broker);

        for owner in [provider, broker] {
            let identity = participant(owner);
            assert!(
                Authorizer
                    .authorize(&identity, Subject::Service, Action::Start, &target)
                    .is_ok()
            );
        }
        // Creating into a group requires the broker side.
        assert!(
            Authorizer
                .authorize(
                    &participant(provider),
                    Subject::Service,
                    Action::Create,
                    &target
                )
                .is_err()
        );
        assert!(
            Authorizer
                .authorize(
                    &participant(broker),
                    Subject::Service,
                    Action::Create,
                    &target
                )
                .is_ok()
        );
        assert!(
            Authorizer
                .authorize(
                    &participant(Uuid::new_v4()),
                    Subject::Service,
                    Action::Read,
                    &target
                )
                .is_err()
        );
    }

    #[test]
    fn agents_only_touch_their_own_jobs() {
        let provider = Uuid::new_v4();
        let me = Uuid::new_v4();
        let identity = agent(provider, me);

        let mine = AuthTargetScope::agent(provider, me);
        let sibling = AuthTargetScope::agent(provider, Uuid::new_v4());

        for action in [Action::Claim, Action::Complete, Action::Fail] {
            assert!(
                Authorizer
                    .authorize(&identity, Subject::Job, action, &mine)
                    .is_ok()
            );
            assert!(
                Authorizer
                    .authorize(&identity, Subject::Job, action, &sibling)
                    .is_err()
            );
        }
        // Agents cannot drive service transitions themselves.
        assert!(
            Authorizer
                .authorize(&identity, Subject::Service, Action::Start, &mine)
                .is_err()
        );
    }
}
