//! Collaborator traits for external services.
//!
//! The pipeline treats all of these as degradable: a failing profile
//! lookup, media upload, or enrichment call never aborts ingestion, and a
//! reply or notification failure never rolls back a committed transaction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::EntitySet;
use crate::event::{MediaRef, MessageKind};
use crate::scoring::Category;

/// Errors returned by external collaborators.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The request to the external service failed.
    #[error("request failed: {0}")]
    Request(String),

    /// The service responded with something unusable.
    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    /// The collaborator is not configured in this deployment.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// A sender's channel profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Display name as known to the channel.
    pub display_name: String,
}

/// Output of the external enrichment scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    /// Short human-readable case title.
    pub title: String,
    /// Summary of the report so far.
    pub summary: String,
    /// Key points extracted from the report.
    pub key_points: Vec<String>,
}

/// Kind of a downstream case notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// A new case was materialized.
    NewCase,
    /// A message was appended to an existing case.
    Appended,
}

/// Payload emitted for downstream fan-out after a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseNotification {
    /// Notification kind.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Durable case id.
    pub case_id: i64,
    /// Human-readable case number.
    pub case_number: String,
}

/// Looks up a sender's profile on the channel.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    /// Fetch the profile for a sender. Failure is non-fatal; callers fall
    /// back to an unknown display name.
    async fn get_profile(&self, sender_id: &str) -> Result<Profile, CollaboratorError>;
}

/// Uploads channel media content to blob storage.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Fetch the content behind a media message from the channel and store
    /// it, returning where it landed. Failure is non-fatal; ingestion
    /// proceeds without the media reference.
    async fn upload(
        &self,
        external_message_id: &str,
        kind: MessageKind,
    ) -> Result<MediaRef, CollaboratorError>;
}

/// External scorer that produces a title/summary for a new case.
#[async_trait]
pub trait EnrichmentScorer: Send + Sync {
    /// Summarize the accumulated report text. `Ok(None)` and `Err` are
    /// both treated as "no enrichment".
    async fn summarize(
        &self,
        text: &str,
        entities: &EntitySet,
        category: Category,
    ) -> Result<Option<Enrichment>, CollaboratorError>;
}

/// Sends outbound replies to the channel.
#[async_trait]
pub trait ReplySender: Send + Sync {
    /// Send one or more reply messages using a one-shot reply token.
    /// Fire-and-forget relative to persistence.
    async fn reply(&self, reply_token: &str, messages: &[String]) -> Result<(), CollaboratorError>;
}

/// Emits case notifications for downstream fan-out (dashboard, websocket).
#[async_trait]
pub trait CaseNotifier: Send + Sync {
    /// Deliver a notification. Best-effort, outside any transaction.
    async fn notify(&self, notification: CaseNotification) -> Result<(), CollaboratorError>;
}

/// Profile lookup that always reports the sender as unknown.
#[derive(Debug, Clone, Default)]
pub struct NoOpProfileLookup;

#[async_trait]
impl ProfileLookup for NoOpProfileLookup {
    async fn get_profile(&self, _sender_id: &str) -> Result<Profile, CollaboratorError> {
        Err(CollaboratorError::NotConfigured("profile lookup"))
    }
}

/// Media store that never stores anything.
#[derive(Debug, Clone, Default)]
pub struct NoOpMediaStore;

#[async_trait]
impl MediaStore for NoOpMediaStore {
    async fn upload(
        &self,
        _external_message_id: &str,
        _kind: MessageKind,
    ) -> Result<MediaRef, CollaboratorError> {
        Err(CollaboratorError::NotConfigured("media storage"))
    }
}

/// Enrichment scorer that never enriches.
#[derive(Debug, Clone, Default)]
pub struct NoOpEnrichmentScorer;

#[async_trait]
impl EnrichmentScorer for NoOpEnrichmentScorer {
    async fn summarize(
        &self,
        _text: &str,
        _entities: &EntitySet,
        _category: Category,
    ) -> Result<Option<Enrichment>, CollaboratorError> {
        Ok(None)
    }
}

/// A no-op reply sender for testing that discards all replies.
#[derive(Debug, Clone, Default)]
pub struct NoOpReplySender;

#[async_trait]
impl ReplySender for NoOpReplySender {
    async fn reply(
        &self,
        _reply_token: &str,
        _messages: &[String],
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// A logging reply sender for debugging that logs every reply.
#[derive(Debug, Clone, Default)]
pub struct LoggingReplySender;

#[async_trait]
impl ReplySender for LoggingReplySender {
    async fn reply(&self, reply_token: &str, messages: &[String]) -> Result<(), CollaboratorError> {
        tracing::info!("Replying with token {}: {:?}", reply_token, messages);
        Ok(())
    }
}

/// Notifier that drops all notifications.
#[derive(Debug, Clone, Default)]
pub struct NoOpNotifier;

#[async_trait]
impl CaseNotifier for NoOpNotifier {
    async fn notify(&self, _notification: CaseNotification) -> Result<(), CollaboratorError> {
        Ok(())
    }
}
