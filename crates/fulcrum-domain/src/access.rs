//! Target scope derivation.
//!
//! The target scope is always derived server-side, before the
//! authorizer runs. Non-admin callers never learn whether a resource
//! outside their scope exists: a failed lookup produces the same error
//! as a scope mismatch.

use std::future::Future;

use fulcrum_core::auth::{Action, AuthIdentity, AuthTargetScope, Subject};
use fulcrum_core::authz::Authorizer;
use fulcrum_core::error::{FulcrumError, FulcrumResult};

/// Authorizes an action on an existing resource addressed by id.
///
/// `scope` is the repository's `auth_scope(id)` lookup. Admins see a
/// missing resource as `NotFound`; everyone else gets `Forbidden`.
pub async fn authorize_resource(
    identity: &AuthIdentity,
    subject: Subject,
    action: Action,
    scope: impl Future<Output = FulcrumResult<AuthTargetScope>>,
) -> FulcrumResult<AuthTargetScope> {
    let target = match scope.await {
        Ok(target) => target,
        Err(FulcrumError::NotFound { .. }) if !identity.is_admin() => {
            return Err(Authorizer::scope_denied(identity, subject, action));
        }
        Err(e) => return Err(e),
    };

    Authorizer.authorize(identity, subject, action, &target)?;
    Ok(target)
}

/// Resolves an entity referenced from a request body.
///
/// A dangling reference is masked as `Forbidden` for non-admins and
/// reported as a validation error to admins.
pub async fn resolve_reference<T>(
    identity: &AuthIdentity,
    subject: Subject,
    action: Action,
    lookup: impl Future<Output = FulcrumResult<T>>,
) -> FulcrumResult<T> {
    match lookup.await {
        Ok(value) => Ok(value),
        Err(FulcrumError::NotFound { entity, id }) => {
            if identity.is_admin() {
                Err(FulcrumError::validation(format!(
                    "referenced {entity} {id} does not exist"
                )))
            } else {
                Err(Authorizer::scope_denied(identity, subject, action))
            }
        }
        Err(e) => Err(e),
    }
}

/// Authorizes a create request against a scope built from its body.
pub fn authorize_target(
    identity: &AuthIdentity,
    subject: Subject,
    action: Action,
    target: &AuthTargetScope,
) -> FulcrumResult<()> {
    Authorizer.authorize(identity, subject, action, target)
}

/// Authorizes list and catalog actions against the empty scope.
pub fn authorize_static(
    identity: &AuthIdentity,
    subject: Subject,
    action: Action,
) -> FulcrumResult<()> {
    Authorizer.authorize(identity, subject, action, &AuthTargetScope::empty())
}

#[cfg(test)]
mod tests {
    use fulcrum_core::error::ErrorKind;
    use uuid::Uuid;

    use super::*;

    fn missing() -> impl Future<Output = FulcrumResult<AuthTargetScope>> {
        std::future::ready(Err(FulcrumError::not_found("agent", Uuid::new_v4())))
    }

    #[tokio::test]
    async fn missing_resource_is_masked_for_participants() {
        let identity = AuthIdentity::participant(Uuid::new_v4(), "p", Uuid::new_v4());
        let err = authorize_resource(&identity, Subject::Agent, Action::Read, missing())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        // Same message as a plain scope mismatch.
        let foreign = std::future::ready(Ok(AuthTargetScope::provider(Uuid::new_v4())));
        let mismatch = authorize_resource(&identity, Subject::Agent, Action::Read, foreign)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), mismatch.to_string());
    }

    #[tokio::test]
    async fn missing_resource_is_not_found_for_admins() {
        let admin = AuthIdentity::admin(Uuid::new_v4(), "root");
        let err = authorize_resource(&admin, Subject::Agent, Action::Read, missing())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn dangling_reference() {
        let lookup = || std::future::ready(Err::<(), _>(FulcrumError::not_found("agent", "x")));

        let admin = AuthIdentity::admin(Uuid::new_v4(), "root");
        let err = resolve_reference(&admin, Subject::Service, Action::Create, lookup())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let participant = AuthIdentity::participant(Uuid::new_v4(), "p", Uuid::new_v4());
        let err = resolve_reference(&participant, Subject::Service, Action::Create, lookup())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn static_actions_use_empty_scope() {
        let agent = AuthIdentity::agent(Uuid::new_v4(), "a", Uuid::new_v4(), Uuid::new_v4());
        assert!(authorize_static(&agent, Subject::Job, Action::ListPending).is_ok());
        assert!(authorize_static(&agent, Subject::Provider, Action::Create).is_err());
    }
}
