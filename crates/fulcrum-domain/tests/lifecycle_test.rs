//! Service and job lifecycle through the commanders.

use chrono::Duration;
use fulcrum_core::auth::AuthIdentity;
use fulcrum_core::error::{ErrorKind, FulcrumError};
use fulcrum_core::models::Attributes;
use fulcrum_core::models::agent::{Agent, AgentState, CreateAgent};
use fulcrum_core::models::agent_type::CreateAgentType;
use fulcrum_core::models::job::{CompleteJob, CreateJob, FailJob, JobAction, JobState};
use fulcrum_core::models::provider::{CreateProvider, ProviderState};
use fulcrum_core::models::service::{Service, ServiceAction, ServicePhase, ServiceState};
use fulcrum_core::models::service_group::CreateServiceGroup;
use fulcrum_core::models::service_type::CreateServiceType;
use fulcrum_core::repository::{JobRepository, ServiceRepository, Store};
use fulcrum_db::SurrealStore;
use fulcrum_domain::service::NewService;
use fulcrum_domain::{
    AgentCommander, CatalogCommander, DomainConfig, JobManager, ProviderCommander,
    ServiceCommander, ServiceGroupCommander, Sweeper,
};
use serde_json::json;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

struct Fixture {
    store: SurrealStore<Db>,
    services: ServiceCommander<SurrealStore<Db>>,
    jobs: JobManager<SurrealStore<Db>>,
    agents: AgentCommander<SurrealStore<Db>>,
    /// Participant of the broker that owns the group.
    broker: AuthIdentity,
    agent: Agent,
    agent_identity: AuthIdentity,
    service_type_id: Uuid,
    group_id: Uuid,
}

/// In-memory store with a provider running one agent and a separate
/// broker owning one service group.
async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    fulcrum_db::run_migrations(&db).await.unwrap();
    let store = SurrealStore::new(db);
    let config = DomainConfig::default();
    let admin = AuthIdentity::admin(Uuid::new_v4(), "root");

    let providers = ProviderCommander::new(store.clone());
    let new_provider = |name: &str| CreateProvider {
        name: name.into(),
        state: ProviderState::Enabled,
        country_code: Some("DE".into()),
        attributes: Attributes::new(),
    };
    let provider = providers.create(&admin, new_provider("P")).await.unwrap();
    let broker = providers.create(&admin, new_provider("B")).await.unwrap();

    let catalog = CatalogCommander::new(store.clone());
    let service_type = catalog
        .create_service_type(
            &admin,
            CreateServiceType {
                name: "postgres".into(),
            },
        )
        .await
        .unwrap();
    let agent_type = catalog
        .create_agent_type(
            &admin,
            CreateAgentType {
                name: "k8s".into(),
                service_type_ids: vec![service_type.id],
            },
        )
        .await
        .unwrap();

    let agents = AgentCommander::new(store.clone());
    let agent = agents
        .create(
            &admin,
            CreateAgent {
                name: "edge-1".into(),
                provider_id: provider.id,
                agent_type_id: agent_type.id,
                country_code: None,
                attributes: Attributes::new(),
                token_hash: String::new(),
            },
        )
        .await
        .unwrap();
    assert!(agent.token.is_some());

    let broker_identity = AuthIdentity::participant(Uuid::new_v4(), "broker-admin", broker.id);
    let group = ServiceGroupCommander::new(store.clone())
        .create(
            &broker_identity,
            CreateServiceGroup {
                name: "g".into(),
                broker_id: broker.id,
            },
        )
        .await
        .unwrap();

    Fixture {
        services: ServiceCommander::new(store.clone(), config.clone()),
        jobs: JobManager::new(store.clone(), config),
        agents,
        agent_identity: AuthIdentity::agent(agent.id, "edge-1", provider.id, agent.id),
        broker: broker_identity,
        agent,
        service_type_id: service_type.id,
        group_id: group.id,
        store,
    }
}

impl Fixture {
    async fn create_service(&self) -> Service {
        self.services
            .create(
                &self.broker,
                NewService {
                    name: "db".into(),
                    agent_id: self.agent.id,
                    service_type_id: self.service_type_id,
                    group_id: self.group_id,
                    attributes: Attributes::new(),
                    properties: Some(json!({"size": 1})),
                },
            )
            .await
            .unwrap()
    }

    async fn only_pending_job(&self) -> fulcrum_core::models::job::Job {
        let mut pending = self
            .jobs
            .list_pending(&self.agent_identity, None)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        pending.remove(0)
    }

    /// target_state is set iff exactly one job is pending or claimed.
    async fn assert_single_active_job(&self, service_id: Uuid) {
        let service = self.store.services().get_by_id(service_id).await.unwrap();
        let active = self
            .store
            .jobs()
            .count_active_for_service(service_id)
            .await
            .unwrap();
        assert_eq!(service.target_state.is_some(), active == 1);
        assert!(active <= 1);
    }

    async fn run_job_to_completion(&self) {
        let job = self.only_pending_job().await;
        self.jobs.claim(&self.agent_identity, job.id).await.unwrap();
        self.jobs
            .complete(&self.agent_identity, job.id, CompleteJob::default())
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn create_claim_complete_round_trip() {
    let fx = setup().await;
    let service = fx.create_service().await;
    assert_eq!(service.phase(), ServicePhase::Creating);
    fx.assert_single_active_job(service.id).await;

    let job = fx.only_pending_job().await;
    assert_eq!(job.action, JobAction::Create);
    assert_eq!(job.service_id, service.id);
    assert_eq!(job.priority, 1);
    assert_eq!(job.request_data.as_ref().unwrap()["properties"]["size"], 1);

    let claimed = fx.jobs.claim(&fx.agent_identity, job.id).await.unwrap();
    assert_eq!(claimed.state, JobState::Claimed);
    fx.assert_single_active_job(service.id).await;

    let done = fx
        .jobs
        .complete(
            &fx.agent_identity,
            job.id,
            CompleteJob {
                resources: Some(json!({"host": "10.0.0.7"})),
                external_id: Some("pg-42".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(done.state, JobState::Completed);

    let service = fx.services.get(&fx.broker, service.id).await.unwrap();
    assert_eq!(service.current_state, ServiceState::Created);
    assert!(service.target_state.is_none());
    assert!(service.target_properties.is_none());
    assert_eq!(service.current_properties, Some(json!({"size": 1})));
    assert_eq!(service.resources, Some(json!({"host": "10.0.0.7"})));
    assert_eq!(service.external_id.as_deref(), Some("pg-42"));
    fx.assert_single_active_job(service.id).await;

    // Start and stop through the same loop.
    let starting = fx.services.start(&fx.broker, service.id).await.unwrap();
    assert_eq!(starting.target_state, Some(ServiceState::Started));
    fx.assert_single_active_job(service.id).await;
    fx.run_job_to_completion().await;

    let stopping = fx.services.stop(&fx.broker, service.id).await.unwrap();
    assert_eq!(stopping.phase(), ServicePhase::Stopping);
    fx.run_job_to_completion().await;
    let stopped = fx.services.get(&fx.broker, service.id).await.unwrap();
    assert_eq!(stopped.current_state, ServiceState::Stopped);
    assert_eq!(stopped.external_id.as_deref(), Some("pg-42"));
}

#[tokio::test]
async fn in_flight_service_rejects_new_transitions() {
    let fx = setup().await;
    let service = fx.create_service().await;

    let err = fx.services.start(&fx.broker, service.id).await.unwrap_err();
    assert!(matches!(err, FulcrumError::InvalidState { .. }));
    fx.assert_single_active_job(service.id).await;

    fx.run_job_to_completion().await;
    let err = fx.services.stop(&fx.broker, service.id).await.unwrap_err();
    assert!(matches!(err, FulcrumError::InvalidState { .. }));
}

#[tokio::test]
async fn properties_update_enqueues_update_job() {
    let fx = setup().await;
    let service = fx.create_service().await;
    fx.run_job_to_completion().await;

    let updating = fx
        .services
        .update(
            &fx.broker,
            service.id,
            fulcrum_domain::service::ServiceChanges {
                name: Some("db-main".into()),
                attributes: None,
                properties: Some(json!({"size": 2})),
            },
        )
        .await
        .unwrap();
    assert_eq!(updating.name, "db-main");
    assert_eq!(updating.phase(), ServicePhase::Updating);

    let job = fx.only_pending_job().await;
    assert_eq!(job.action, JobAction::Update);
    assert_eq!(job.request_data.as_ref().unwrap()["properties"]["size"], 2);

    fx.jobs.claim(&fx.agent_identity, job.id).await.unwrap();
    fx.jobs
        .complete(&fx.agent_identity, job.id, CompleteJob::default())
        .await
        .unwrap();
    let service = fx.services.get(&fx.broker, service.id).await.unwrap();
    assert_eq!(service.current_properties, Some(json!({"size": 2})));
    assert_eq!(service.current_state, ServiceState::Created);
}

#[tokio::test]
async fn double_claim_is_a_conflict() {
    let fx = setup().await;
    fx.create_service().await;
    let job = fx.only_pending_job().await;

    fx.jobs.claim(&fx.agent_identity, job.id).await.unwrap();
    let err = fx
        .jobs
        .claim(&fx.agent_identity, job.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FulcrumError::Conflict { .. }));

    let job = fx.jobs.get(&fx.agent_identity, job.id).await.unwrap();
    assert_eq!(job.state, JobState::Claimed);
}

#[tokio::test]
async fn completing_unclaimed_job_changes_nothing() {
    let fx = setup().await;
    let service = fx.create_service().await;
    let job = fx.only_pending_job().await;

    let err = fx
        .jobs
        .complete(&fx.agent_identity, job.id, CompleteJob::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FulcrumError::Conflict { .. }));

    let after = fx.services.get(&fx.broker, service.id).await.unwrap();
    assert_eq!(after.current_state, service.current_state);
    assert_eq!(after.target_state, Some(ServiceState::Created));
    assert_eq!(
        fx.jobs.get(&fx.agent_identity, job.id).await.unwrap().state,
        JobState::Pending
    );
}

#[tokio::test]
async fn failure_then_retry() {
    let fx = setup().await;
    let service = fx.create_service().await;
    let job = fx.only_pending_job().await;
    fx.jobs.claim(&fx.agent_identity, job.id).await.unwrap();
    fx.jobs
        .fail(
            &fx.agent_identity,
            job.id,
            FailJob {
                error_message: "quota exceeded".into(),
            },
        )
        .await
        .unwrap();

    let failed = fx.services.get(&fx.broker, service.id).await.unwrap();
    assert_eq!(failed.phase(), ServicePhase::Failed);
    assert_eq!(failed.failed_action, Some(ServiceAction::Create));
    assert_eq!(failed.error_message.as_deref(), Some("quota exceeded"));
    assert_eq!(failed.target_properties, Some(json!({"size": 1})));
    fx.assert_single_active_job(service.id).await;

    // A never-provisioned service cannot be started.
    let err = fx.services.start(&fx.broker, service.id).await.unwrap_err();
    assert!(matches!(err, FulcrumError::InvalidState { .. }));

    let retried = fx.services.retry(&fx.broker, service.id).await.unwrap();
    assert!(retried.failed_action.is_none());
    assert!(retried.error_message.is_none());
    assert_eq!(retried.retry_count, 1);
    assert_eq!(retried.target_state, Some(ServiceState::Created));

    let job = fx.only_pending_job().await;
    assert_eq!(job.action, JobAction::Create);
    assert_eq!(job.retry_count, 1);
    fx.assert_single_active_job(service.id).await;

    let err = fx.services.retry(&fx.broker, service.id).await.unwrap_err();
    assert!(matches!(err, FulcrumError::InvalidState { .. }));
}

#[tokio::test]
async fn timeout_sweep_is_idempotent() {
    let fx = setup().await;
    let service = fx.create_service().await;
    let job = fx.only_pending_job().await;
    fx.jobs.claim(&fx.agent_identity, job.id).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    assert_eq!(fx.jobs.fail_timed_out(Duration::zero()).await.unwrap(), 1);
    assert_eq!(fx.jobs.fail_timed_out(Duration::zero()).await.unwrap(), 0);

    let job = fx.jobs.get(&fx.agent_identity, job.id).await.unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.error_message.as_deref(), Some("job timed out after 0s"));

    let service = fx.services.get(&fx.broker, service.id).await.unwrap();
    assert_eq!(service.failed_action, Some(ServiceAction::Create));
    assert!(service.target_state.is_none());

    // The agent reporting late loses.
    let err = fx
        .jobs
        .complete(&fx.agent_identity, job.id, CompleteJob::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FulcrumError::Conflict { .. }));
}

#[tokio::test]
async fn service_left_without_a_job_is_released_for_retry() {
    let fx = setup().await;
    let service = fx.create_service().await;
    let job = fx.only_pending_job().await;
    fx.jobs.claim(&fx.agent_identity, job.id).await.unwrap();

    // The job is finished but the service write never happened.
    fx.store
        .jobs()
        .complete(job.id, fx.agent.id, json!({}))
        .await
        .unwrap();
    let stuck = fx.services.get(&fx.broker, service.id).await.unwrap();
    assert_eq!(stuck.target_state, Some(ServiceState::Created));
    let err = fx.services.retry(&fx.broker, service.id).await.unwrap_err();
    assert!(matches!(err, FulcrumError::InvalidState { .. }));

    // Still inside the grace period.
    assert_eq!(fx.jobs.release_stranded(Duration::hours(1)).await.unwrap(), 0);

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let sweeper = Sweeper::new(
        fx.store.clone(),
        DomainConfig {
            stranded_grace_secs: 0,
            ..DomainConfig::default()
        },
    );
    assert_eq!(sweeper.sweep_once().await.released, 1);
    assert_eq!(sweeper.sweep_once().await.released, 0);

    let released = fx.services.get(&fx.broker, service.id).await.unwrap();
    assert_eq!(released.phase(), ServicePhase::Failed);
    assert_eq!(released.failed_action, Some(ServiceAction::Create));
    fx.assert_single_active_job(service.id).await;

    fx.services.retry(&fx.broker, service.id).await.unwrap();
    fx.assert_single_active_job(service.id).await;

    // A transition with a live job is left alone.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(fx.jobs.release_stranded(Duration::zero()).await.unwrap(), 0);
    fx.run_job_to_completion().await;
    let created = fx.services.get(&fx.broker, service.id).await.unwrap();
    assert_eq!(created.phase(), ServicePhase::Created);
}

#[tokio::test]
async fn pending_poll_orders_by_priority_then_age() {
    let fx = setup().await;
    let service = fx.create_service().await;
    let first = fx.only_pending_job().await;

    // The Create job already sits at priority 1; add the rest.
    let mut expected = vec![first.id];
    for priority in [3, 1, 5, 2, 3, 3] {
        let job = fx
            .store
            .jobs()
            .create(CreateJob {
                service_id: service.id,
                agent_id: service.agent_id,
                provider_id: service.provider_id,
                broker_id: service.broker_id,
                action: JobAction::Update,
                priority,
                request_data: None,
                retry_count: 0,
            })
            .await
            .unwrap();
        expected.push(job.id);
    }

    let pending = fx
        .jobs
        .list_pending(&fx.agent_identity, Some(5))
        .await
        .unwrap();
    let priorities: Vec<i32> = pending.iter().map(|j| j.priority).collect();
    assert_eq!(priorities, vec![1, 1, 2, 3, 3]);
    // FIFO within a priority.
    assert_eq!(pending[0].id, expected[0]);
    assert_eq!(pending[1].id, expected[2]);
    assert_eq!(pending[3].id, expected[1]);
    assert_eq!(pending[4].id, expected[5]);

    // Participants do not poll.
    let err = fx.jobs.list_pending(&fx.broker, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn sweeper_disconnects_silent_agents() {
    let fx = setup().await;
    let agent = fx
        .agents
        .update_status(&fx.agent_identity, AgentState::Connected)
        .await
        .unwrap();
    assert_eq!(agent.state, AgentState::Connected);
    assert!(agent.last_status_update.is_some());
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let sweeper = Sweeper::new(
        fx.store.clone(),
        DomainConfig {
            agent_heartbeat_timeout_secs: 0,
            ..DomainConfig::default()
        },
    );
    let report = sweeper.sweep_once().await;
    assert_eq!(report.disconnected, 1);
    assert_eq!(report.timed_out, 0);

    let agent = fx.agents.me(&fx.agent_identity).await.unwrap();
    assert_eq!(agent.state, AgentState::Disconnected);
    assert_eq!(sweeper.sweep_once().await.disconnected, 0);
}

#[tokio::test]
async fn sweeper_stops_on_shutdown() {
    let fx = setup().await;
    let (tx, rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(Sweeper::new(fx.store.clone(), DomainConfig::default()).run(rx));

    tx.send(true).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
