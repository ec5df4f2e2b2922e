//! Database error types.

use thiserror::Error;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Snapshot serialization failed
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A case cannot be created from zero messages
    #[error("case draft contains no messages")]
    EmptyCaseDraft,

    /// Case number generation kept colliding
    #[error("could not generate a unique case number after {attempts} attempts")]
    CaseNumberExhausted { attempts: u32 },
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
