//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode. UUIDs are stored as
//! strings and enums as their string names, asserted where the field is
//! mandatory.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Providers (global scope; a provider also acts as broker)
-- =======================================================================
DEFINE TABLE provider SCHEMAFULL;
DEFINE FIELD name ON TABLE provider TYPE string;
DEFINE FIELD state ON TABLE provider TYPE string \
    ASSERT $value IN ['Enabled', 'Disabled'];
DEFINE FIELD country_code ON TABLE provider TYPE option<string>;
DEFINE FIELD attributes ON TABLE provider TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON TABLE provider TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE provider TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Catalog: service types and agent types (global scope)
-- =======================================================================
DEFINE TABLE service_type SCHEMAFULL;
DEFINE FIELD name ON TABLE service_type TYPE string;
DEFINE FIELD created_at ON TABLE service_type TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE service_type TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_service_type_name ON TABLE service_type \
    COLUMNS name UNIQUE;

DEFINE TABLE agent_type SCHEMAFULL;
DEFINE FIELD name ON TABLE agent_type TYPE string;
DEFINE FIELD service_type_ids ON TABLE agent_type TYPE array<string> \
    DEFAULT [];
DEFINE FIELD created_at ON TABLE agent_type TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE agent_type TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_agent_type_name ON TABLE agent_type \
    COLUMNS name UNIQUE;

-- =======================================================================
-- Agents (provider scope)
-- =======================================================================
DEFINE TABLE agent SCHEMAFULL;
DEFINE FIELD name ON TABLE agent TYPE string;
DEFINE FIELD provider_id ON TABLE agent TYPE string;
DEFINE FIELD agent_type_id ON TABLE agent TYPE string;
DEFINE FIELD state ON TABLE agent TYPE string \
    ASSERT $value IN ['New', 'Connected', 'Disconnected', 'Error', \
    'Disabled'];
DEFINE FIELD country_code ON TABLE agent TYPE option<string>;
DEFINE FIELD attributes ON TABLE agent TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD token_hash ON TABLE agent TYPE string;
DEFINE FIELD last_status_update ON TABLE agent TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE agent TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE agent TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_agent_provider ON TABLE agent COLUMNS provider_id;
DEFINE INDEX idx_agent_token_hash ON TABLE agent \
    COLUMNS token_hash UNIQUE;

-- =======================================================================
-- Service groups (broker scope)
-- =======================================================================
DEFINE TABLE service_group SCHEMAFULL;
DEFINE FIELD name ON TABLE service_group TYPE string;
DEFINE FIELD broker_id ON TABLE service_group TYPE string;
DEFINE FIELD created_at ON TABLE service_group TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE service_group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_service_group_broker ON TABLE service_group \
    COLUMNS broker_id;

-- =======================================================================
-- Services (provider + broker scope)
-- =======================================================================
DEFINE TABLE service SCHEMAFULL;
DEFINE FIELD name ON TABLE service TYPE string;
DEFINE FIELD agent_id ON TABLE service TYPE string;
DEFINE FIELD service_type_id ON TABLE service TYPE string;
DEFINE FIELD group_id ON TABLE service TYPE string;
DEFINE FIELD provider_id ON TABLE service TYPE string;
DEFINE FIELD broker_id ON TABLE service TYPE string;
DEFINE FIELD external_id ON TABLE service TYPE option<string>;
DEFINE FIELD attributes ON TABLE service TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD current_state ON TABLE service TYPE string \
    ASSERT $value IN ['Created', 'Started', 'Stopped', 'Deleted'];
DEFINE FIELD target_state ON TABLE service TYPE option<string>;
DEFINE FIELD current_properties ON TABLE service \
    TYPE option<object> FLEXIBLE;
DEFINE FIELD target_properties ON TABLE service \
    TYPE option<object> FLEXIBLE;
DEFINE FIELD resources ON TABLE service TYPE option<object> FLEXIBLE;
DEFINE FIELD failed_action ON TABLE service TYPE option<string>;
DEFINE FIELD error_message ON TABLE service TYPE option<string>;
DEFINE FIELD retry_count ON TABLE service TYPE int DEFAULT 0;
DEFINE FIELD created_at ON TABLE service TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE service TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_service_agent ON TABLE service COLUMNS agent_id;
DEFINE INDEX idx_service_group ON TABLE service COLUMNS group_id;
DEFINE INDEX idx_service_provider ON TABLE service COLUMNS provider_id;
DEFINE INDEX idx_service_broker ON TABLE service COLUMNS broker_id;

-- =======================================================================
-- Jobs (dispatched to one agent)
-- =======================================================================
DEFINE TABLE job SCHEMAFULL;
DEFINE FIELD service_id ON TABLE job TYPE string;
DEFINE FIELD agent_id ON TABLE job TYPE string;
DEFINE FIELD provider_id ON TABLE job TYPE string;
DEFINE FIELD broker_id ON TABLE job TYPE string;
DEFINE FIELD action ON TABLE job TYPE string \
    ASSERT $value IN ['Create', 'Start', 'Stop', 'Delete', 'Update'];
DEFINE FIELD state ON TABLE job TYPE string \
    ASSERT $value IN ['Pending', 'Claimed', 'Completed', 'Failed'];
DEFINE FIELD priority ON TABLE job TYPE int DEFAULT 1;
DEFINE FIELD request_data ON TABLE job TYPE option<object> FLEXIBLE;
DEFINE FIELD result_data ON TABLE job TYPE option<object> FLEXIBLE;
DEFINE FIELD error_message ON TABLE job TYPE option<string>;
DEFINE FIELD claimed_at ON TABLE job TYPE option<datetime>;
DEFINE FIELD completed_at ON TABLE job TYPE option<datetime>;
DEFINE FIELD retry_count ON TABLE job TYPE int DEFAULT 0;
DEFINE FIELD created_at ON TABLE job TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE job TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_job_agent_state ON TABLE job \
    COLUMNS agent_id, state, priority;
DEFINE INDEX idx_job_service_state ON TABLE job \
    COLUMNS service_id, state;

-- =======================================================================
-- API tokens
-- =======================================================================
DEFINE TABLE token SCHEMAFULL;
DEFINE FIELD name ON TABLE token TYPE string;
DEFINE FIELD role ON TABLE token TYPE string \
    ASSERT $value IN ['Admin', 'Participant', 'Agent'];
DEFINE FIELD scope_id ON TABLE token TYPE option<string>;
DEFINE FIELD provider_id ON TABLE token TYPE option<string>;
DEFINE FIELD agent_id ON TABLE token TYPE option<string>;
DEFINE FIELD expire_at ON TABLE token TYPE datetime;
DEFINE FIELD hashed_value ON TABLE token TYPE string;
DEFINE FIELD created_at ON TABLE token TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE token TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_token_hash ON TABLE token COLUMNS hashed_value UNIQUE;
DEFINE INDEX idx_token_provider ON TABLE token COLUMNS provider_id;

-- =======================================================================
-- Metrics
-- =======================================================================
DEFINE TABLE metric_type SCHEMAFULL;
DEFINE FIELD name ON TABLE metric_type TYPE string;
DEFINE FIELD entity_type ON TABLE metric_type TYPE string \
    ASSERT $value IN ['Agent', 'Service', 'Resource'];
DEFINE FIELD created_at ON TABLE metric_type TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE metric_type TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_metric_type_name ON TABLE metric_type \
    COLUMNS name UNIQUE;

DEFINE TABLE metric_entry SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD type_id ON TABLE metric_entry TYPE string;
DEFINE FIELD agent_id ON TABLE metric_entry TYPE string;
DEFINE FIELD service_id ON TABLE metric_entry TYPE string;
DEFINE FIELD provider_id ON TABLE metric_entry TYPE string;
DEFINE FIELD broker_id ON TABLE metric_entry TYPE string;
DEFINE FIELD resource_id ON TABLE metric_entry TYPE string;
DEFINE FIELD value ON TABLE metric_entry TYPE float;
DEFINE FIELD created_at ON TABLE metric_entry TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_metric_entry_service ON TABLE metric_entry \
    COLUMNS service_id, created_at;

-- =======================================================================
-- Audit entries (append-only)
-- =======================================================================
DEFINE TABLE audit_entry SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD authority_type ON TABLE audit_entry TYPE string \
    ASSERT $value IN ['Admin', 'Participant', 'Agent', 'System'];
DEFINE FIELD authority_id ON TABLE audit_entry TYPE string;
DEFINE FIELD event_type ON TABLE audit_entry TYPE string;
DEFINE FIELD properties ON TABLE audit_entry TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD entity_id ON TABLE audit_entry TYPE option<string>;
DEFINE FIELD provider_id ON TABLE audit_entry TYPE option<string>;
DEFINE FIELD agent_id ON TABLE audit_entry TYPE option<string>;
DEFINE FIELD broker_id ON TABLE audit_entry TYPE option<string>;
DEFINE FIELD created_at ON TABLE audit_entry TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_provider_time ON TABLE audit_entry \
    COLUMNS provider_id, created_at;
";

/// Run all pending migrations against the given database.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

        info!(version = migration.version, "Migration applied");
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
