//! Fulcrum Domain — the commanders behind every API operation, the job
//! lifecycle manager and the background sweeper.
//!
//! Every public operation takes the caller's [`AuthIdentity`] first,
//! derives the target scope server-side and authorizes before touching
//! state.
//!
//! [`AuthIdentity`]: fulcrum_core::auth::AuthIdentity

pub mod access;
pub mod agent;
pub mod audit;
pub mod catalog;
pub mod config;
pub mod job;
pub mod metric;
pub mod provider;
pub mod service;
pub mod service_group;
pub mod sweeper;
pub mod token;

pub use agent::AgentCommander;
pub use audit::AuditLog;
pub use catalog::CatalogCommander;
pub use config::DomainConfig;
pub use job::JobManager;
pub use metric::MetricCommander;
pub use provider::ProviderCommander;
pub use service::ServiceCommander;
pub use service_group::ServiceGroupCommander;
pub use sweeper::Sweeper;
pub use token::TokenCommander;
