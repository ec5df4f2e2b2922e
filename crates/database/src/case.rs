//! Case persistence: the transactional create/append coordinator.
//!
//! Both operations here are single transactions. `create_case` either
//! commits a complete case (row, messages, analysis snapshot, optional
//! enrichment) or nothing; `append_message` recomputes durable state
//! inside the transaction so it stays correct across process restarts.

use case_core::{CategoryResult, Enrichment, EntitySet, Message, UrgencyLevel, UrgencyResult};
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::case_number;
use crate::error::{DatabaseError, Result};
use crate::models::{AnalysisRecord, Case, EnrichmentRecord, MessageRecord};

/// Attempts at generating a unique case number before giving up.
const CASE_NUMBER_ATTEMPTS: u32 = 3;

/// Maximum title length in characters when truncating message text.
const TITLE_MAX_CHARS: usize = 60;

/// Title used when a case is materialized from messages with no text.
const FALLBACK_TITLE: &str = "เรื่องร้องเรียนใหม่";

/// Everything needed to materialize a case, snapshotted from a session.
#[derive(Debug, Clone)]
pub struct CaseDraft {
    /// Stable external identity of the sender.
    pub sender_id: String,
    /// Sender display name (fallback applied by the caller).
    pub display_name: String,
    /// Ordered session messages.
    pub messages: Vec<Message>,
    /// Entities extracted from the accumulated text.
    pub entities: EntitySet,
    /// Categorization result.
    pub category: CategoryResult,
    /// Urgency result.
    pub urgency: UrgencyResult,
    /// External-scorer output, when the scorer succeeded.
    pub enrichment: Option<Enrichment>,
}

/// Identity of a committed case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCase {
    /// Durable case id.
    pub id: i64,
    /// Human-readable case number.
    pub case_number: String,
}

/// Per-append analysis context.
#[derive(Debug, Clone)]
pub struct AppendContext {
    /// Primary phone from the latest extraction, used only to backfill a
    /// case with no contact phone yet.
    pub phone: Option<String>,
    /// Latest urgency level; applied only as a strict upgrade.
    pub urgency: UrgencyLevel,
}

/// Result of appending one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Sequence number assigned to the message (durable count + 1).
    pub sequence_number: i64,
    /// Whether a new row was stored (false on duplicate redelivery).
    pub inserted: bool,
    /// Durable message count after the append.
    pub total_messages: i64,
}

fn default_title(messages: &[Message]) -> String {
    let Some(text) = messages
        .iter()
        .find_map(|m| m.text.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        return FALLBACK_TITLE.to_string();
    };

    let mut title: String = text.chars().take(TITLE_MAX_CHARS).collect();
    if text.chars().count() > TITLE_MAX_CHARS {
        title.push('…');
    }
    title
}

async fn insert_message(
    tx: &mut Transaction<'_, Sqlite>,
    case_id: i64,
    sequence_number: i64,
    message: &Message,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO case_messages
            (case_id, external_message_id, sequence_number, kind, text,
             media_location, media_content_type, media_size_bytes, occurred_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(external_message_id) DO NOTHING
        "#,
    )
    .bind(case_id)
    .bind(&message.external_message_id)
    .bind(sequence_number)
    .bind(message.kind.as_str())
    .bind(&message.text)
    .bind(message.media_ref.as_ref().map(|m| m.location.as_str()))
    .bind(message.media_ref.as_ref().map(|m| m.content_type.as_str()))
    .bind(message.media_ref.as_ref().map(|m| m.size_bytes))
    .bind(message.occurred_at)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn count_case_messages(tx: &mut Transaction<'_, Sqlite>, case_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM case_messages WHERE case_id = ?
        "#,
    )
    .bind(case_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(count)
}

/// Materialize a case from a session snapshot as one transaction.
///
/// Inserts the case row, every session message (conflict-ignoring on
/// `external_message_id`), the analysis snapshot, and the enrichment when
/// present. On any failure the transaction rolls back and no partial case
/// is ever visible. The id and number are returned only after commit.
pub async fn create_case(
    pool: &SqlitePool,
    number_prefix: &str,
    draft: &CaseDraft,
) -> Result<CreatedCase> {
    let first = draft.messages.first().ok_or(DatabaseError::EmptyCaseDraft)?;
    let last = draft.messages.last().ok_or(DatabaseError::EmptyCaseDraft)?;

    let title = draft
        .enrichment
        .as_ref()
        .map(|e| e.title.clone())
        .unwrap_or_else(|| default_title(&draft.messages));
    let has_attachments = draft.messages.iter().any(Message::has_attachment);
    let total_loss_amount = draft.entities.max_amount().map(|d| d.to_string());
    let contact_phone = draft.entities.primary_phone().map(str::to_string);
    let entities_json = serde_json::to_string(&draft.entities)?;
    let scores_json = serde_json::to_string(&draft.category.scores)?;

    let mut tx = pool.begin().await?;

    let mut created: Option<CreatedCase> = None;
    for attempt in 1..=CASE_NUMBER_ATTEMPTS {
        let case_number = case_number::generate(number_prefix, Utc::now(), &mut rand::thread_rng());
        let result = sqlx::query(
            r#"
            INSERT INTO cases
                (case_number, sender_id, display_name, title, category,
                 urgency_level, status, confidence_score, has_attachments,
                 first_message_at, last_message_at, total_loss_amount,
                 contact_phone)
            VALUES (?, ?, ?, ?, ?, ?, 'open', ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&case_number)
        .bind(&draft.sender_id)
        .bind(&draft.display_name)
        .bind(&title)
        .bind(draft.category.category.as_str())
        .bind(draft.urgency.level.as_str())
        .bind(draft.category.confidence as i64)
        .bind(has_attachments)
        .bind(first.occurred_at)
        .bind(last.occurred_at)
        .bind(&total_loss_amount)
        .bind(&contact_phone)
        .execute(&mut *tx)
        .await;

        match result {
            Ok(res) => {
                created = Some(CreatedCase {
                    id: res.last_insert_rowid(),
                    case_number,
                });
                break;
            }
            Err(sqlx::Error::Database(db_err))
                if db_err.is_unique_violation()
                    && db_err.message().contains("cases.case_number") =>
            {
                tracing::warn!(
                    "Case number {} collided, retrying ({}/{})",
                    case_number,
                    attempt,
                    CASE_NUMBER_ATTEMPTS
                );
            }
            Err(e) => return Err(DatabaseError::Sqlx(e)),
        }
    }
    let Some(created) = created else {
        return Err(DatabaseError::CaseNumberExhausted {
            attempts: CASE_NUMBER_ATTEMPTS,
        });
    };

    for (idx, message) in draft.messages.iter().enumerate() {
        insert_message(&mut tx, created.id, (idx + 1) as i64, message).await?;
    }

    let total_messages = count_case_messages(&mut tx, created.id).await?;
    sqlx::query(
        r#"
        UPDATE cases SET total_messages = ? WHERE id = ?
        "#,
    )
    .bind(total_messages)
    .bind(created.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO case_analyses
            (case_id, category, confidence, category_scores, urgency_level,
             urgency_score, entities)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(created.id)
    .bind(draft.category.category.as_str())
    .bind(draft.category.confidence as i64)
    .bind(&scores_json)
    .bind(draft.urgency.level.as_str())
    .bind(draft.urgency.score as i64)
    .bind(&entities_json)
    .execute(&mut *tx)
    .await?;

    if let Some(enrichment) = &draft.enrichment {
        let key_points_json = serde_json::to_string(&enrichment.key_points)?;
        sqlx::query(
            r#"
            INSERT INTO case_enrichments (case_id, title, summary, key_points)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(created.id)
        .bind(&enrichment.title)
        .bind(&enrichment.summary)
        .bind(&key_points_json)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        "Created case {} ({}) for {} with {} messages",
        created.case_number,
        created.id,
        draft.sender_id,
        total_messages
    );

    Ok(created)
}

/// Append one message to an existing case as one transaction.
///
/// The sequence number is recomputed from the durable message count, the
/// insert ignores a duplicate `external_message_id`, the contact phone is
/// backfilled only when currently unset, and the urgency level moves only
/// upward.
pub async fn append_message(
    pool: &SqlitePool,
    case_id: i64,
    message: &Message,
    ctx: &AppendContext,
) -> Result<AppendOutcome> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, (String, Option<String>)>(
        r#"
        SELECT urgency_level, contact_phone FROM cases WHERE id = ?
        "#,
    )
    .bind(case_id)
    .fetch_optional(&mut *tx)
    .await?;
    let (stored_urgency, stored_phone) = row.ok_or_else(|| DatabaseError::NotFound {
        entity: "Case",
        id: case_id.to_string(),
    })?;

    let count = count_case_messages(&mut tx, case_id).await?;
    let sequence_number = count + 1;

    let inserted = insert_message(&mut tx, case_id, sequence_number, message).await?;
    let total_messages = count + i64::from(inserted);

    let stored_level = UrgencyLevel::parse(&stored_urgency).unwrap_or(UrgencyLevel::Low);
    let urgency_level = stored_level.max(ctx.urgency);

    // First writer wins: an existing phone is never overwritten.
    let contact_phone = stored_phone.or_else(|| ctx.phone.clone());

    sqlx::query(
        r#"
        UPDATE cases
        SET total_messages = ?,
            last_message_at = ?,
            has_attachments = has_attachments OR ?,
            contact_phone = ?,
            urgency_level = ?,
            updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(total_messages)
    .bind(message.occurred_at)
    .bind(message.has_attachment())
    .bind(&contact_phone)
    .bind(urgency_level.as_str())
    .bind(case_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(
        "Appended message {} to case {} (seq {}, inserted: {})",
        message.external_message_id,
        case_id,
        sequence_number,
        inserted
    );

    Ok(AppendOutcome {
        sequence_number,
        inserted,
        total_messages,
    })
}

/// Get a case by ID.
pub async fn get_case(pool: &SqlitePool, id: i64) -> Result<Case> {
    sqlx::query_as::<_, Case>(
        r#"
        SELECT id, case_number, sender_id, display_name, title, category,
               urgency_level, status, confidence_score, total_messages,
               has_attachments, first_message_at, last_message_at,
               total_loss_amount, contact_phone, created_at, updated_at
        FROM cases
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Case",
        id: id.to_string(),
    })
}

/// List a case's messages in sequence order.
pub async fn list_messages(pool: &SqlitePool, case_id: i64) -> Result<Vec<MessageRecord>> {
    let records = sqlx::query_as::<_, MessageRecord>(
        r#"
        SELECT id, case_id, external_message_id, sequence_number, kind, text,
               media_location, media_content_type, media_size_bytes,
               occurred_at, created_at
        FROM case_messages
        WHERE case_id = ?
        ORDER BY sequence_number
        "#,
    )
    .bind(case_id)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Count a case's durable messages.
pub async fn count_messages(pool: &SqlitePool, case_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM case_messages WHERE case_id = ?
        "#,
    )
    .bind(case_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Get the analysis snapshot for a case.
pub async fn get_analysis(pool: &SqlitePool, case_id: i64) -> Result<AnalysisRecord> {
    sqlx::query_as::<_, AnalysisRecord>(
        r#"
        SELECT id, case_id, category, confidence, category_scores,
               urgency_level, urgency_score, entities, created_at
        FROM case_analyses
        WHERE case_id = ?
        "#,
    )
    .bind(case_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "AnalysisRecord",
        id: case_id.to_string(),
    })
}

/// Get the enrichment for a case, if the scorer produced one.
pub async fn get_enrichment(pool: &SqlitePool, case_id: i64) -> Result<Option<EnrichmentRecord>> {
    let record = sqlx::query_as::<_, EnrichmentRecord>(
        r#"
        SELECT id, case_id, title, summary, key_points, created_at
        FROM case_enrichments
        WHERE case_id = ?
        "#,
    )
    .bind(case_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}
