//! SurrealDB repository implementations.

mod agent;
mod agent_type;
mod audit;
mod job;
mod metric;
mod provider;
mod service;
mod service_group;
mod service_type;
mod support;
mod token;

pub use agent::SurrealAgentRepository;
pub use agent_type::SurrealAgentTypeRepository;
pub use audit::SurrealAuditEntryRepository;
pub use job::SurrealJobRepository;
pub use metric::{SurrealMetricEntryRepository, SurrealMetricTypeRepository};
pub use provider::SurrealProviderRepository;
pub use service::SurrealServiceRepository;
pub use service_group::SurrealServiceGroupRepository;
pub use service_type::SurrealServiceTypeRepository;
pub use token::SurrealTokenRepository;
