//! Per-sender session accumulation and the materialization decision gate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use case_core::{Category, CategoryResult, EntitySet, Message, UrgencyLevel, UrgencyResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Session lifecycle state.
///
/// `Open -> Materialized` happens exactly once; nothing transitions out of
/// `Materialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accumulating messages, no case yet.
    Open,
    /// A case has been bound; every further message appends to it.
    Materialized,
}

/// Ephemeral per-sender accumulator of messages.
#[derive(Debug, Clone)]
pub struct Session {
    /// Stable external identity of the sender.
    pub sender_id: String,
    /// Messages in arrival order.
    pub messages: Vec<Message>,
    /// Bound case id, set exactly once at materialization.
    pub case_id: Option<i64>,
    /// Bound case number, cached for reply texts.
    pub case_number: Option<String>,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// When the session was started.
    pub created_at: DateTime<Utc>,
    /// When the last message arrived.
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    fn new(sender_id: &str) -> Self {
        let now = Utc::now();
        Self {
            sender_id: sender_id.to_string(),
            messages: Vec::new(),
            case_id: None,
            case_number: None,
            status: SessionStatus::Open,
            created_at: now,
            last_activity_at: now,
        }
    }

    /// Number of accumulated messages.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// All text content in arrival order, joined for analysis.
    pub fn accumulated_text(&self) -> String {
        self.messages
            .iter()
            .filter_map(|m| m.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether a case has been bound.
    pub fn is_materialized(&self) -> bool {
        self.status == SessionStatus::Materialized
    }
}

/// The action the pipeline should take for the current message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    /// Enough information exists: materialize a case now.
    Create,
    /// The session already has a case: append to it.
    Append {
        /// The bound case.
        case_id: i64,
    },
    /// Not enough signal yet: keep accumulating and prompt the sender.
    Wait,
}

/// Tunable policy for when a session materializes.
///
/// Deliberately conservative: prefers another WAIT turn (prompting the
/// sender for detail) over creating a low-quality case from one ambiguous
/// message.
#[derive(Debug, Clone)]
pub struct MaterializationPolicy {
    /// Minimum accumulated messages before the entity/category criteria
    /// can trigger creation. High/critical urgency bypasses this.
    pub min_messages: usize,
}

impl Default for MaterializationPolicy {
    fn default() -> Self {
        Self { min_messages: 2 }
    }
}

impl MaterializationPolicy {
    /// Decide what to do with the session given the current analysis.
    pub fn decide(
        &self,
        session: &Session,
        entities: &EntitySet,
        category: &CategoryResult,
        urgency: &UrgencyResult,
    ) -> Decision {
        if let Some(case_id) = session.case_id {
            return Decision::Append { case_id };
        }

        // Explicit urgency overrides the accumulation threshold.
        if urgency.level >= UrgencyLevel::High {
            return Decision::Create;
        }

        let categorized = category.category != Category::Uncategorized;
        let has_anchor = entities.has_amount() || entities.has_phone();
        if categorized && has_anchor && session.message_count() >= self.min_messages {
            return Decision::Create;
        }

        Decision::Wait
    }
}

#[derive(Debug)]
struct SessionEntry {
    session: Session,
    guard: Arc<Mutex<()>>,
}

/// Thread-safe in-memory store mapping sender ids to sessions.
///
/// Sessions are ephemeral by design: losing one before materialization
/// just restarts accumulation, and durable idempotency is enforced at the
/// store layer, not here.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the per-sender guard, creating the session if needed.
    ///
    /// The pipeline holds this guard for the duration of one event so
    /// concurrent deliveries for the same sender serialize in-process.
    pub async fn guard(&self, sender_id: &str) -> Arc<Mutex<()>> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .entry(sender_id.to_string())
            .or_insert_with(|| SessionEntry {
                session: Session::new(sender_id),
                guard: Arc::new(Mutex::new(())),
            });
        entry.guard.clone()
    }

    /// Get a snapshot of a sender's session.
    pub async fn get(&self, sender_id: &str) -> Option<Session> {
        self.sessions
            .read()
            .await
            .get(sender_id)
            .map(|e| e.session.clone())
    }

    /// Append a message to the sender's session, creating it if needed.
    /// Returns a snapshot including the new message.
    ///
    /// No deduplication happens here; duplicates are absorbed durably by
    /// the message store's unique external id.
    pub async fn append(&self, sender_id: &str, message: Message) -> Session {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .entry(sender_id.to_string())
            .or_insert_with(|| SessionEntry {
                session: Session::new(sender_id),
                guard: Arc::new(Mutex::new(())),
            });

        entry.session.messages.push(message);
        entry.session.last_activity_at = Utc::now();
        entry.session.clone()
    }

    /// Bind a materialized case to the session. The binding is permanent:
    /// a second bind attempt is ignored.
    pub async fn bind_case(&self, sender_id: &str, case_id: i64, case_number: &str) {
        let mut sessions = self.sessions.write().await;
        let Some(entry) = sessions.get_mut(sender_id) else {
            warn!("bind_case for unknown session: {}", sender_id);
            return;
        };

        if let Some(existing) = entry.session.case_id {
            warn!(
                "Session for {} already bound to case {}, ignoring bind to {}",
                sender_id, existing, case_id
            );
            return;
        }

        entry.session.case_id = Some(case_id);
        entry.session.case_number = Some(case_number.to_string());
        entry.session.status = SessionStatus::Materialized;
        debug!("Session for {} materialized into case {}", sender_id, case_id);
    }

    /// Drop a sender's session (e.g. on unfollow).
    pub async fn remove(&self, sender_id: &str) {
        self.sessions.write().await.remove(sender_id);
    }

    /// Remove sessions idle for longer than `ttl`. Returns how many were
    /// dropped.
    pub async fn prune_idle(&self, ttl: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(0));
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, e| e.session.last_activity_at >= cutoff);
        before - sessions.len()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
