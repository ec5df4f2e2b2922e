//! Database models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

/// A durable case record, created once per session materialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Case {
    /// Auto-incrementing ID.
    pub id: i64,
    /// Human-readable number (e.g. "TL-202405-1234").
    pub case_number: String,
    /// Stable external identity of the reporting sender.
    pub sender_id: String,
    /// Sender display name at creation time.
    pub display_name: String,
    /// Case title (enrichment title or first-message truncation).
    pub title: String,
    /// Report category (wire form, see `case_core::Category`).
    pub category: String,
    /// Current urgency level (wire form, upgrade-only).
    pub urgency_level: String,
    /// Workflow status (e.g. "open").
    pub status: String,
    /// Categorizer confidence at creation, 0-100.
    pub confidence_score: i64,
    /// Durable message count.
    pub total_messages: i64,
    /// Whether any message carried an attachment.
    pub has_attachments: bool,
    /// Channel timestamp of the first message.
    pub first_message_at: DateTime<Utc>,
    /// Channel timestamp of the latest message.
    pub last_message_at: DateTime<Utc>,
    /// Primary reported loss amount, stored as a decimal string.
    pub total_loss_amount: Option<String>,
    /// First extracted contact phone (never overwritten).
    pub contact_phone: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

impl Case {
    /// The reported loss amount as a decimal, if recorded and parsable.
    pub fn loss_amount(&self) -> Option<Decimal> {
        self.total_loss_amount
            .as_deref()
            .and_then(|s| Decimal::from_str(s).ok())
    }
}

/// One stored inbound message, unique on `external_message_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MessageRecord {
    /// Auto-incrementing ID.
    pub id: i64,
    /// Owning case.
    pub case_id: i64,
    /// Channel-unique message id (deduplication key).
    pub external_message_id: String,
    /// 1-based position within the case, assigned at persistence time.
    pub sequence_number: i64,
    /// Message kind (wire form, see `case_core::MessageKind`).
    pub kind: String,
    /// Text content, if any.
    pub text: Option<String>,
    /// Blob storage location, if media was uploaded.
    pub media_location: Option<String>,
    /// Media MIME type.
    pub media_content_type: Option<String>,
    /// Media size in bytes.
    pub media_size_bytes: Option<i64>,
    /// Channel-supplied timestamp.
    pub occurred_at: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: String,
}

/// Analysis snapshot taken when the case was materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AnalysisRecord {
    /// Auto-incrementing ID.
    pub id: i64,
    /// Owning case (one snapshot per case).
    pub case_id: i64,
    /// Category at creation (wire form).
    pub category: String,
    /// Categorizer confidence, 0-100.
    pub confidence: i64,
    /// JSON map of category to raw score.
    pub category_scores: String,
    /// Urgency level at creation (wire form).
    pub urgency_level: String,
    /// Raw urgency score, 0-100.
    pub urgency_score: i64,
    /// JSON blob of the extracted entity set, kept for audit.
    pub entities: String,
    /// Creation timestamp.
    pub created_at: String,
}

/// External-scorer output captured at case creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct EnrichmentRecord {
    /// Auto-incrementing ID.
    pub id: i64,
    /// Owning case (one enrichment per case).
    pub case_id: i64,
    /// Scorer-provided title.
    pub title: String,
    /// Scorer-provided summary.
    pub summary: String,
    /// JSON array of key points.
    pub key_points: String,
    /// Creation timestamp.
    pub created_at: String,
}
