//! Pipeline error types.

use thiserror::Error;
use tipline_database::DatabaseError;

/// Errors that abort processing of a single inbound event.
///
/// Collaborator failures (profile lookup, media upload, enrichment,
/// replies, notifications) are degraded in place and never surface here;
/// only persistence failures are fatal for an event.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The durable transaction failed and was rolled back.
    #[error("persistence error: {0}")]
    Database(#[from] DatabaseError),
}
