//! Database-specific error types and conversions.

use fulcrum_core::error::FulcrumError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    /// A unique index rejected the write.
    #[error("Duplicate {entity}")]
    Duplicate { entity: String },

    /// A stored value could not be mapped back onto a domain type.
    #[error("Corrupt {entity} row: {message}")]
    Decode { entity: String, message: String },

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl DbError {
    /// Classifies a failed statement, recognising unique index
    /// violations.
    pub(crate) fn from_statement(entity: &str, err: surrealdb::Error) -> Self {
        let message = err.to_string();
        if message.contains("already contains") {
            DbError::Duplicate {
                entity: entity.to_string(),
            }
        } else {
            DbError::Query(message)
        }
    }

    pub(crate) fn decode(entity: &str, message: impl ToString) -> Self {
        DbError::Decode {
            entity: entity.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<DbError> for FulcrumError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => FulcrumError::NotFound { entity, id },
            DbError::Duplicate { entity } => FulcrumError::AlreadyExists { entity },
            other => FulcrumError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_become_already_exists() {
        let err: FulcrumError = DbError::Duplicate {
            entity: "metric_type".into(),
        }
        .into();
        assert!(matches!(err, FulcrumError::AlreadyExists { .. }));
    }

    #[test]
    fn decode_errors_are_database_errors() {
        let err: FulcrumError = DbError::decode("job", "bad state").into();
        assert!(matches!(err, FulcrumError::Database(_)));
    }
}
