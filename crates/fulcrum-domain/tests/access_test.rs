//! Tenant isolation and referential rules enforced by the commanders.

use chrono::{Duration, Utc};
use fulcrum_core::auth::{AuthIdentity, Role};
use fulcrum_core::error::{ErrorKind, FulcrumError};
use fulcrum_core::models::Attributes;
use fulcrum_core::models::agent::{Agent, AgentState, CreateAgent, UpdateAgent};
use fulcrum_core::models::agent_type::CreateAgentType;
use fulcrum_core::models::audit::EventType;
use fulcrum_core::models::metric::{CreateMetricType, MetricEntityType};
use fulcrum_core::models::provider::{CreateProvider, Provider, ProviderState, UpdateProvider};
use fulcrum_core::models::service::Service;
use fulcrum_core::models::service_group::CreateServiceGroup;
use fulcrum_core::models::service_type::CreateServiceType;
use fulcrum_core::repository::Pagination;
use fulcrum_db::SurrealStore;
use fulcrum_domain::metric::NewMetricEntry;
use fulcrum_domain::service::NewService;
use fulcrum_domain::token::NewToken;
use fulcrum_domain::{
    AgentCommander, AuditLog, CatalogCommander, DomainConfig, MetricCommander, ProviderCommander,
    ServiceCommander, ServiceGroupCommander, TokenCommander,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

type TestStore = SurrealStore<Db>;

struct World {
    store: TestStore,
    admin: AuthIdentity,
    providers: ProviderCommander<TestStore>,
    agents: AgentCommander<TestStore>,
    catalog: CatalogCommander<TestStore>,
    groups: ServiceGroupCommander<TestStore>,
    services: ServiceCommander<TestStore>,
    tokens: TokenCommander<TestStore>,
    p: Provider,
    q: Provider,
    agent_type_id: Uuid,
    service_type_id: Uuid,
}

async fn setup() -> World {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    fulcrum_db::run_migrations(&db).await.unwrap();
    let store = SurrealStore::new(db);
    let config = DomainConfig::default();
    let admin = AuthIdentity::admin(Uuid::new_v4(), "root");

    let providers = ProviderCommander::new(store.clone());
    let mut created = Vec::new();
    for name in ["P", "Q"] {
        let provider = providers
            .create(
                &admin,
                CreateProvider {
                    name: name.into(),
                    state: ProviderState::Enabled,
                    country_code: None,
                    attributes: Attributes::new(),
                },
            )
            .await
            .unwrap();
        created.push(provider);
    }
    let q = created.pop().unwrap();
    let p = created.pop().unwrap();

    let catalog = CatalogCommander::new(store.clone());
    let service_type = catalog
        .create_service_type(&admin, CreateServiceType { name: "redis".into() })
        .await
        .unwrap();
    let agent_type = catalog
        .create_agent_type(
            &admin,
            CreateAgentType {
                name: "vm".into(),
                service_type_ids: vec![service_type.id, service_type.id],
            },
        )
        .await
        .unwrap();
    assert_eq!(agent_type.service_type_ids, vec![service_type.id]);

    World {
        providers,
        agents: AgentCommander::new(store.clone()),
        groups: ServiceGroupCommander::new(store.clone()),
        services: ServiceCommander::new(store.clone(), config.clone()),
        tokens: TokenCommander::new(store.clone(), config),
        catalog,
        store,
        admin,
        p,
        q,
        agent_type_id: agent_type.id,
        service_type_id: service_type.id,
    }
}

fn participant(provider: &Provider) -> AuthIdentity {
    AuthIdentity::participant(Uuid::new_v4(), format!("{}-admin", provider.name), provider.id)
}

fn agent_identity(agent: &Agent) -> AuthIdentity {
    AuthIdentity::agent(agent.id, agent.name.clone(), agent.provider_id, agent.id)
}

fn assert_forbidden(err: FulcrumError) {
    assert_eq!(err.kind(), ErrorKind::Forbidden, "unexpected error: {err}");
}

impl World {
    async fn agent_of(&self, provider: &Provider, name: &str) -> Agent {
        self.agents
            .create(
                &participant(provider),
                CreateAgent {
                    name: name.into(),
                    provider_id: provider.id,
                    agent_type_id: self.agent_type_id,
                    country_code: None,
                    attributes: Attributes::new(),
                    token_hash: String::new(),
                },
            )
            .await
            .unwrap()
    }

    /// A service on `agent`, brokered by Q.
    async fn service_on(&self, agent: &Agent) -> Service {
        let broker = participant(&self.q);
        let group = self
            .groups
            .create(
                &broker,
                CreateServiceGroup {
                    name: "shop".into(),
                    broker_id: self.q.id,
                },
            )
            .await
            .unwrap();
        self.services
            .create(
                &broker,
                NewService {
                    name: "cache".into(),
                    agent_id: agent.id,
                    service_type_id: self.service_type_id,
                    group_id: group.id,
                    attributes: Attributes::new(),
                    properties: None,
                },
            )
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn foreign_and_missing_resources_look_the_same() {
    let w = setup().await;
    let agent = w.agent_of(&w.p, "a1").await;
    let outsider = participant(&w.q);

    assert_forbidden(w.agents.get(&outsider, agent.id).await.unwrap_err());
    assert_forbidden(w.agents.get(&outsider, Uuid::new_v4()).await.unwrap_err());

    // Admins pass authorization and learn what is missing.
    let err = w.agents.get(&w.admin, Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let owner = participant(&w.p);
    assert_eq!(w.agents.get(&owner, agent.id).await.unwrap().id, agent.id);
}

#[tokio::test]
async fn lists_are_scoped_to_the_caller() {
    let w = setup().await;
    w.agent_of(&w.p, "a1").await;
    w.agent_of(&w.p, "a2").await;
    w.agent_of(&w.q, "b1").await;

    let page = w
        .agents
        .list(&participant(&w.p), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert!(page.items.iter().all(|a| a.provider_id == w.p.id));

    let page = w.agents.list(&w.admin, Pagination::default()).await.unwrap();
    assert_eq!(page.total, 3);

    let providers = w
        .providers
        .list(&participant(&w.q), Pagination::default())
        .await
        .unwrap();
    assert_eq!(providers.items.len(), 1);
    assert_eq!(providers.items[0].id, w.q.id);
}

#[tokio::test]
async fn agents_act_only_on_themselves() {
    let w = setup().await;
    let a1 = w.agent_of(&w.p, "a1").await;
    let a2 = w.agent_of(&w.p, "a2").await;
    let me = agent_identity(&a1);

    assert_eq!(w.agents.me(&me).await.unwrap().id, a1.id);
    assert_forbidden(w.agents.get(&me, a2.id).await.unwrap_err());
    assert_forbidden(
        w.agents
            .update(
                &me,
                a1.id,
                UpdateAgent {
                    name: Some("renamed".into()),
                    agent_type_id: None,
                    country_code: None,
                    attributes: None,
                },
            )
            .await
            .unwrap_err(),
    );

    let err = w
        .agents
        .update_status(&me, AgentState::Disabled)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let rotated = w.agents.rotate_own_token(&me).await.unwrap();
    assert!(rotated.token.is_some());
    assert_ne!(rotated.token, a1.token);
}

#[tokio::test]
async fn only_admins_disable_and_enable_agents() {
    let w = setup().await;
    let agent = w.agent_of(&w.p, "a1").await;
    let me = agent_identity(&agent);

    assert_forbidden(
        w.agents
            .set_state(&participant(&w.p), agent.id, AgentState::Disabled)
            .await
            .unwrap_err(),
    );
    assert_forbidden(
        w.agents
            .set_state(&me, agent.id, AgentState::Disabled)
            .await
            .unwrap_err(),
    );

    let disabled = w
        .agents
        .set_state(&w.admin, agent.id, AgentState::Disabled)
        .await
        .unwrap();
    assert_eq!(disabled.state, AgentState::Disabled);

    let err = w
        .agents
        .update_status(&me, AgentState::Connected)
        .await
        .unwrap_err();
    assert!(matches!(err, FulcrumError::InvalidState { .. }));

    let broker = participant(&w.q);
    let group = w
        .groups
        .create(
            &broker,
            CreateServiceGroup {
                name: "shop".into(),
                broker_id: w.q.id,
            },
        )
        .await
        .unwrap();
    let err = w
        .services
        .create(
            &broker,
            NewService {
                name: "cache".into(),
                agent_id: agent.id,
                service_type_id: w.service_type_id,
                group_id: group.id,
                attributes: Attributes::new(),
                properties: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FulcrumError::InvalidState { .. }));

    w.agents
        .set_state(&w.admin, agent.id, AgentState::Disconnected)
        .await
        .unwrap();
    let back = w
        .agents
        .update_status(&me, AgentState::Connected)
        .await
        .unwrap();
    assert_eq!(back.state, AgentState::Connected);
}

#[tokio::test]
async fn provider_state_is_an_admin_decision() {
    let w = setup().await;
    let owner = participant(&w.p);
    let disable = UpdateProvider {
        name: None,
        state: Some(ProviderState::Disabled),
        country_code: None,
        attributes: None,
    };

    assert_forbidden(
        w.providers
            .update(&owner, w.p.id, disable.clone())
            .await
            .unwrap_err(),
    );
    let renamed = w
        .providers
        .update(
            &owner,
            w.p.id,
            UpdateProvider {
                name: Some("P2".into()),
                state: None,
                country_code: None,
                attributes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.state, ProviderState::Enabled);

    let disabled = w.providers.update(&w.admin, w.p.id, disable).await.unwrap();
    assert_eq!(disabled.state, ProviderState::Disabled);
}

#[tokio::test]
async fn service_creation_is_a_broker_operation() {
    let w = setup().await;
    let agent = w.agent_of(&w.p, "a1").await;
    let group = w
        .groups
        .create(
            &participant(&w.q),
            CreateServiceGroup {
                name: "shop".into(),
                broker_id: w.q.id,
            },
        )
        .await
        .unwrap();

    // P owns the agent but does not own the group.
    let err = w
        .services
        .create(
            &participant(&w.p),
            NewService {
                name: "cache".into(),
                agent_id: agent.id,
                service_type_id: w.service_type_id,
                group_id: group.id,
                attributes: Attributes::new(),
                properties: None,
            },
        )
        .await
        .unwrap_err();
    assert_forbidden(err);

    // Both sides can read the service; the agent can read but not steer it.
    let service = w.service_on(&agent).await;
    w.services.get(&participant(&w.p), service.id).await.unwrap();
    w.services.get(&agent_identity(&agent), service.id).await.unwrap();
    assert_forbidden(
        w.services
            .stop(&agent_identity(&agent), service.id)
            .await
            .unwrap_err(),
    );
}

#[tokio::test]
async fn unsupported_service_type_is_rejected() {
    let w = setup().await;
    let agent = w.agent_of(&w.p, "a1").await;
    let other_type = w
        .catalog
        .create_service_type(&w.admin, CreateServiceType { name: "kafka".into() })
        .await
        .unwrap();
    let group = w
        .groups
        .create(
            &participant(&w.q),
            CreateServiceGroup {
                name: "shop".into(),
                broker_id: w.q.id,
            },
        )
        .await
        .unwrap();

    let err = w
        .services
        .create(
            &participant(&w.q),
            NewService {
                name: "stream".into(),
                agent_id: agent.id,
                service_type_id: other_type.id,
                group_id: group.id,
                attributes: Attributes::new(),
                properties: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FulcrumError::Validation { .. }));
}

#[tokio::test]
async fn deletes_refuse_while_dependents_exist() {
    let w = setup().await;
    let agent = w.agent_of(&w.p, "a1").await;
    let service = w.service_on(&agent).await;

    let err = w.providers.delete(&w.admin, w.p.id).await.unwrap_err();
    assert!(matches!(err, FulcrumError::Conflict { .. }));

    let err = w
        .agents
        .delete(&participant(&w.p), agent.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FulcrumError::Conflict { .. }));

    let err = w
        .groups
        .delete(&participant(&w.q), service.group_id)
        .await
        .unwrap_err();
    assert!(matches!(err, FulcrumError::Conflict { .. }));
}

#[tokio::test]
async fn empty_provider_is_deleted_with_its_tokens() {
    let w = setup().await;
    let token = w
        .tokens
        .create(
            &w.admin,
            NewToken {
                name: "ci".into(),
                role: Role::Participant,
                scope_id: Some(w.q.id),
                expire_at: None,
            },
        )
        .await
        .unwrap();

    w.providers.delete(&w.admin, w.q.id).await.unwrap();
    let err = w.tokens.get(&w.admin, token.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn token_scope_is_resolved_server_side() {
    let w = setup().await;
    let agent = w.agent_of(&w.p, "a1").await;
    let owner = participant(&w.p);

    let token = w
        .tokens
        .create(
            &owner,
            NewToken {
                name: "agent-cred".into(),
                role: Role::Agent,
                scope_id: Some(agent.id),
                expire_at: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(token.provider_id, Some(w.p.id));
    assert_eq!(token.agent_id, Some(agent.id));
    assert!(token.plain_value.is_some());
    assert!(token.expire_at > Utc::now() + Duration::days(29));

    // Participants cannot mint admin tokens or tokens for other tenants.
    let admin_token = NewToken {
        name: "escalate".into(),
        role: Role::Admin,
        scope_id: None,
        expire_at: None,
    };
    assert_forbidden(w.tokens.create(&owner, admin_token).await.unwrap_err());

    let foreign = NewToken {
        name: "foreign".into(),
        role: Role::Participant,
        scope_id: Some(w.q.id),
        expire_at: None,
    };
    assert_forbidden(w.tokens.create(&owner, foreign).await.unwrap_err());

    let expired = NewToken {
        name: "stale".into(),
        role: Role::Participant,
        scope_id: Some(w.p.id),
        expire_at: Some(Utc::now() - Duration::hours(1)),
    };
    let err = w.tokens.create(&owner, expired).await.unwrap_err();
    assert!(matches!(err, FulcrumError::Validation { .. }));

    let regenerated = w.tokens.regenerate(&owner, token.id).await.unwrap();
    assert_ne!(regenerated.plain_value, token.plain_value);
    assert_forbidden(
        w.tokens
            .delete(&participant(&w.q), token.id)
            .await
            .unwrap_err(),
    );
}

#[tokio::test]
async fn metric_entries_come_from_the_serving_agent() {
    let w = setup().await;
    let agent = w.agent_of(&w.p, "a1").await;
    let stranger = w.agent_of(&w.p, "a2").await;
    let service = w.service_on(&agent).await;

    let metrics = MetricCommander::new(w.store.clone());
    let metric_type = metrics
        .create_type(
            &w.admin,
            CreateMetricType {
                name: "cpu".into(),
                entity_type: MetricEntityType::Service,
            },
        )
        .await
        .unwrap();
    let entry = |value: f64| NewMetricEntry {
        type_id: metric_type.id,
        service_id: service.id,
        resource_id: "node-0".into(),
        value,
    };

    let recorded = metrics
        .create_entry(&agent_identity(&agent), entry(0.42))
        .await
        .unwrap();
    assert_eq!(recorded.broker_id, w.q.id);
    assert_eq!(recorded.provider_id, w.p.id);

    assert_forbidden(
        metrics
            .create_entry(&agent_identity(&stranger), entry(0.1))
            .await
            .unwrap_err(),
    );
    let err = metrics
        .create_entry(&agent_identity(&agent), entry(f64::NAN))
        .await
        .unwrap_err();
    assert!(matches!(err, FulcrumError::Validation { .. }));

    // The broker sees the entry; an unrelated provider does not.
    let seen = metrics
        .list_entries(&participant(&w.q), Pagination::default())
        .await
        .unwrap();
    assert_eq!(seen.total, 1);
    let other = w
        .providers
        .create(
            &w.admin,
            CreateProvider {
                name: "R".into(),
                state: ProviderState::Enabled,
                country_code: None,
                attributes: Attributes::new(),
            },
        )
        .await
        .unwrap();
    let unseen = metrics
        .list_entries(&participant(&other), Pagination::default())
        .await
        .unwrap();
    assert_eq!(unseen.total, 0);
}

#[tokio::test]
async fn commands_leave_an_audit_trail() {
    let w = setup().await;
    let agent = w.agent_of(&w.p, "a1").await;
    w.service_on(&agent).await;

    let audit = AuditLog::new(w.store.clone());
    let page = audit
        .list(&participant(&w.p), Pagination::default())
        .await
        .unwrap();
    let events: Vec<EventType> = page.items.iter().map(|e| e.event_type).collect();
    assert!(events.contains(&EventType::AgentCreated));
    assert!(events.contains(&EventType::ServiceCreated));
    assert!(!events.contains(&EventType::ServiceGroupCreated));

    assert_forbidden(
        audit
            .list(&agent_identity(&agent), Pagination::default())
            .await
            .unwrap_err(),
    );
}
