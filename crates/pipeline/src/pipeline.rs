//! The conversation-to-case pipeline.

use std::sync::Arc;
use std::time::Duration;

use analysis::{extract, Categorizer, UrgencyScorer};
use case_core::{
    CaseNotification, CaseNotifier, EnrichmentScorer, MediaStore, Message, NoOpEnrichmentScorer,
    NoOpMediaStore, NoOpNotifier, NoOpProfileLookup, NotificationKind, ProfileLookup,
};
use tipline_database::{case, AppendContext, CaseDraft, Database};
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::replies;
use crate::session::{Decision, MaterializationPolicy, Session, SessionStore};

/// Display name used when the profile lookup fails or is unconfigured.
const UNKNOWN_DISPLAY_NAME: &str = "ไม่ทราบชื่อ";

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Prefix for generated case numbers (e.g. "TL").
    pub case_number_prefix: String,
    /// Materialization policy for the decision gate.
    pub policy: MaterializationPolicy,
    /// How long an idle session survives before pruning.
    pub session_ttl: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            case_number_prefix: "TL".to_string(),
            policy: MaterializationPolicy::default(),
            session_ttl: Duration::from_secs(30 * 60),
        }
    }
}

/// What the pipeline did with one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Still accumulating; the sender should be prompted for more detail.
    Waiting {
        /// Prompt texts for the acknowledgment reply.
        reply: Vec<String>,
    },
    /// A case was materialized from the session.
    CaseCreated {
        /// Durable case id.
        case_id: i64,
        /// Human-readable case number.
        case_number: String,
        /// Confirmation texts for the acknowledgment reply.
        reply: Vec<String>,
    },
    /// The message was appended to the session's case.
    Appended {
        /// Durable case id.
        case_id: i64,
        /// Human-readable case number.
        case_number: String,
        /// Whether this was a redelivered duplicate (stored nothing new).
        duplicate: bool,
        /// Confirmation texts for the acknowledgment reply.
        reply: Vec<String>,
    },
}

impl PipelineOutcome {
    /// The acknowledgment reply texts for this outcome.
    pub fn reply(&self) -> &[String] {
        match self {
            PipelineOutcome::Waiting { reply }
            | PipelineOutcome::CaseCreated { reply, .. }
            | PipelineOutcome::Appended { reply, .. } => reply,
        }
    }
}

/// Coordinates session accumulation, analysis, the materialization
/// decision, and durable persistence for inbound messages.
///
/// Collaborators are degradable: profile lookup, media upload, enrichment,
/// and notifications all fail soft. Only a persistence failure aborts an
/// event, and then the transaction has already rolled back.
pub struct Pipeline {
    db: Database,
    sessions: SessionStore,
    categorizer: Categorizer,
    urgency: UrgencyScorer,
    profile: Arc<dyn ProfileLookup>,
    media: Arc<dyn MediaStore>,
    enrichment: Arc<dyn EnrichmentScorer>,
    notifier: Arc<dyn CaseNotifier>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline with default scorers and no-op collaborators.
    pub fn new(db: Database, config: PipelineConfig) -> Self {
        Self {
            db,
            sessions: SessionStore::new(),
            categorizer: Categorizer::default(),
            urgency: UrgencyScorer::default(),
            profile: Arc::new(NoOpProfileLookup),
            media: Arc::new(NoOpMediaStore),
            enrichment: Arc::new(NoOpEnrichmentScorer),
            notifier: Arc::new(NoOpNotifier),
            config,
        }
    }

    /// Replace the profile lookup collaborator.
    pub fn with_profile_lookup(mut self, profile: Arc<dyn ProfileLookup>) -> Self {
        self.profile = profile;
        self
    }

    /// Replace the media store collaborator.
    pub fn with_media_store(mut self, media: Arc<dyn MediaStore>) -> Self {
        self.media = media;
        self
    }

    /// Replace the enrichment scorer collaborator.
    pub fn with_enrichment_scorer(mut self, enrichment: Arc<dyn EnrichmentScorer>) -> Self {
        self.enrichment = enrichment;
        self
    }

    /// Replace the case notifier collaborator.
    pub fn with_notifier(mut self, notifier: Arc<dyn CaseNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replace the categorizer (e.g. with fixture keyword tables).
    pub fn with_categorizer(mut self, categorizer: Categorizer) -> Self {
        self.categorizer = categorizer;
        self
    }

    /// Replace the urgency scorer.
    pub fn with_urgency_scorer(mut self, urgency: UrgencyScorer) -> Self {
        self.urgency = urgency;
        self
    }

    /// Process one inbound message end-to-end.
    ///
    /// This method:
    /// 1. Uploads media content (fail-soft) for attachment messages
    /// 2. Appends the message to the sender's session
    /// 3. Extracts entities and scores category/urgency over the full
    ///    accumulated text
    /// 4. Runs the decision gate and executes the chosen transaction
    /// 5. Emits a best-effort notification after commit
    pub async fn handle_message(
        &self,
        sender_id: &str,
        mut message: Message,
    ) -> Result<PipelineOutcome, PipelineError> {
        if message.kind.is_media() && message.media_ref.is_none() {
            match self
                .media
                .upload(&message.external_message_id, message.kind)
                .await
            {
                Ok(media_ref) => message.media_ref = Some(media_ref),
                Err(e) => {
                    warn!(
                        "Media upload failed for {}, continuing without it: {}",
                        message.external_message_id, e
                    );
                }
            }
        }

        // Serialize events for the same sender in-process; concurrent
        // deliveries take turns through the decision gate.
        let guard = self.sessions.guard(sender_id).await;
        let _held = guard.lock().await;

        let session = self.sessions.append(sender_id, message.clone()).await;
        let text = session.accumulated_text();
        let entities = extract(&text);
        let category = self.categorizer.categorize(&text, &entities);
        let urgency = self.urgency.detect(&text, &entities);

        let decision = self
            .config
            .policy
            .decide(&session, &entities, &category, &urgency);
        debug!(
            "Decision for {} at message {}: {:?} (category: {:?}, urgency: {:?})",
            sender_id,
            session.message_count(),
            decision,
            category.category,
            urgency.level
        );

        match decision {
            Decision::Wait => Ok(PipelineOutcome::Waiting {
                reply: replies::wait_prompt(&entities, &category),
            }),

            Decision::Create => {
                let display_name = match self.profile.get_profile(sender_id).await {
                    Ok(profile) => profile.display_name,
                    Err(e) => {
                        warn!("Profile lookup failed for {}: {}", sender_id, e);
                        UNKNOWN_DISPLAY_NAME.to_string()
                    }
                };

                let enrichment = match self
                    .enrichment
                    .summarize(&text, &entities, category.category)
                    .await
                {
                    Ok(enrichment) => enrichment,
                    Err(e) => {
                        warn!("Enrichment failed for {}: {}", sender_id, e);
                        None
                    }
                };

                let draft = CaseDraft {
                    sender_id: sender_id.to_string(),
                    display_name,
                    messages: session.messages.clone(),
                    entities,
                    category,
                    urgency,
                    enrichment,
                };
                let created =
                    case::create_case(self.db.pool(), &self.config.case_number_prefix, &draft)
                        .await?;

                self.sessions
                    .bind_case(sender_id, created.id, &created.case_number)
                    .await;
                self.notify(NotificationKind::NewCase, created.id, &created.case_number)
                    .await;

                info!(
                    "Materialized case {} for {} after {} messages",
                    created.case_number,
                    sender_id,
                    session.message_count()
                );

                Ok(PipelineOutcome::CaseCreated {
                    case_id: created.id,
                    reply: replies::case_created(&created.case_number),
                    case_number: created.case_number,
                })
            }

            Decision::Append { case_id } => {
                let ctx = AppendContext {
                    phone: entities.primary_phone().map(str::to_string),
                    urgency: urgency.level,
                };
                let outcome = case::append_message(self.db.pool(), case_id, &message, &ctx).await?;

                let case_number = match &session.case_number {
                    Some(number) => number.clone(),
                    None => case::get_case(self.db.pool(), case_id).await?.case_number,
                };

                self.notify(NotificationKind::Appended, case_id, &case_number)
                    .await;

                Ok(PipelineOutcome::Appended {
                    case_id,
                    reply: replies::appended(&case_number),
                    duplicate: !outcome.inserted,
                    case_number,
                })
            }
        }
    }

    /// Handle a follow event: greet the sender.
    pub fn handle_follow(&self, sender_id: &str) -> Vec<String> {
        debug!("Sender {} followed", sender_id);
        replies::welcome()
    }

    /// Handle an unfollow event: drop the sender's session.
    pub async fn handle_unfollow(&self, sender_id: &str) {
        debug!("Sender {} unfollowed, dropping session", sender_id);
        self.sessions.remove(sender_id).await;
    }

    /// Snapshot a sender's session, if one exists.
    pub async fn session(&self, sender_id: &str) -> Option<Session> {
        self.sessions.get(sender_id).await
    }

    /// Prune sessions idle past the configured TTL. Returns how many were
    /// dropped.
    pub async fn prune_idle_sessions(&self) -> usize {
        let pruned = self.sessions.prune_idle(self.config.session_ttl).await;
        if pruned > 0 {
            debug!("Pruned {} idle sessions", pruned);
        }
        pruned
    }

    async fn notify(&self, kind: NotificationKind, case_id: i64, case_number: &str) {
        let notification = CaseNotification {
            kind,
            case_id,
            case_number: case_number.to_string(),
        };
        if let Err(e) = self.notifier.notify(notification).await {
            warn!("Failed to deliver case notification for {}: {}", case_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use case_core::{async_trait, CollaboratorError, MessageKind};
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;
    use tipline_database::Database;

    async fn test_pipeline() -> Pipeline {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        Pipeline::new(db, PipelineConfig::default())
    }

    fn message(id: &str, text: &str, minute: u32) -> Message {
        Message::text(
            id,
            text,
            Utc.with_ymd_and_hms(2024, 5, 7, 10, minute, 0).unwrap(),
        )
    }

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<CaseNotification>>,
    }

    #[async_trait]
    impl CaseNotifier for RecordingNotifier {
        async fn notify(&self, notification: CaseNotification) -> Result<(), CollaboratorError> {
            self.seen.lock().unwrap().push(notification);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_three_waits_then_create_on_fourth() {
        let pipeline = test_pipeline().await;

        let vague = [
            ("m1", "สวัสดีครับ"),
            ("m2", "ผมมีเรื่องจะแจ้ง"),
            ("m3", "เกี่ยวกับการลงทุนออนไลน์"),
        ];
        for (i, (id, text)) in vague.iter().enumerate() {
            let outcome = pipeline
                .handle_message("U1", message(id, text, i as u32))
                .await
                .unwrap();
            assert!(
                matches!(outcome, PipelineOutcome::Waiting { .. }),
                "message {} should wait",
                id
            );
        }

        let outcome = pipeline
            .handle_message(
                "U1",
                message("m4", "โดนหลอกให้โอนเงิน 50000 บาท เบอร์คนร้าย 0812345678", 3),
            )
            .await
            .unwrap();

        let PipelineOutcome::CaseCreated {
            case_id,
            case_number,
            ..
        } = outcome
        else {
            panic!("fourth message should materialize a case");
        };
        assert!(case_number.starts_with("TL-"));

        let stored = case::get_case(pipeline.db.pool(), case_id).await.unwrap();
        assert_eq!(stored.total_messages, 4);
        assert_eq!(stored.category, "fraud");
        assert_eq!(stored.contact_phone.as_deref(), Some("0812345678"));
        assert_eq!(stored.display_name, UNKNOWN_DISPLAY_NAME);
    }

    #[tokio::test]
    async fn test_urgent_message_creates_immediately() {
        let pipeline = test_pipeline().await;

        let outcome = pipeline
            .handle_message("U1", message("m1", "ด่วนที่สุด โดนขู่ฆ่าให้โอนเงิน", 0))
            .await
            .unwrap();

        assert!(matches!(outcome, PipelineOutcome::CaseCreated { .. }));
    }

    #[tokio::test]
    async fn test_appends_after_materialization() {
        let pipeline = test_pipeline().await;
        pipeline
            .handle_message("U1", message("m1", "โดนโกงครับ", 0))
            .await
            .unwrap();
        let created = pipeline
            .handle_message("U1", message("m2", "โอนไป 9000 บาท ให้เบอร์ 0899999999", 1))
            .await
            .unwrap();
        let PipelineOutcome::CaseCreated { case_id, .. } = created else {
            panic!("expected case creation");
        };

        let outcome = pipeline
            .handle_message("U1", message("m3", "มีสลิปโอนเงินด้วยครับ", 2))
            .await
            .unwrap();

        let PipelineOutcome::Appended {
            case_id: appended_to,
            duplicate,
            ..
        } = outcome
        else {
            panic!("expected append");
        };
        assert_eq!(appended_to, case_id);
        assert!(!duplicate);

        let stored = case::get_case(pipeline.db.pool(), case_id).await.unwrap();
        assert_eq!(stored.total_messages, 3);
    }

    #[tokio::test]
    async fn test_redelivered_append_is_flagged_duplicate() {
        let pipeline = test_pipeline().await;
        pipeline
            .handle_message("U1", message("m1", "โดนโกงครับ", 0))
            .await
            .unwrap();
        pipeline
            .handle_message("U1", message("m2", "โอนไป 9000 บาท ให้เบอร์ 0899999999", 1))
            .await
            .unwrap();
        pipeline
            .handle_message("U1", message("m3", "เพิ่มเติม", 2))
            .await
            .unwrap();

        // Same external id redelivered.
        let outcome = pipeline
            .handle_message("U1", message("m3", "เพิ่มเติม", 2))
            .await
            .unwrap();

        let PipelineOutcome::Appended {
            case_id, duplicate, ..
        } = outcome
        else {
            panic!("expected append");
        };
        assert!(duplicate);

        let count = case::count_messages(pipeline.db.pool(), case_id)
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_notifications_emitted_for_create_and_append() {
        let notifier = Arc::new(RecordingNotifier::default());
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        let pipeline =
            Pipeline::new(db, PipelineConfig::default()).with_notifier(notifier.clone());

        pipeline
            .handle_message("U1", message("m1", "โดนโกงครับ", 0))
            .await
            .unwrap();
        pipeline
            .handle_message("U1", message("m2", "โอนไป 9000 บาท ให้เบอร์ 0899999999", 1))
            .await
            .unwrap();
        pipeline
            .handle_message("U1", message("m3", "เพิ่มเติม", 2))
            .await
            .unwrap();

        let seen = notifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].kind, NotificationKind::NewCase);
        assert_eq!(seen[1].kind, NotificationKind::Appended);
        assert_eq!(seen[0].case_id, seen[1].case_id);
    }

    #[tokio::test]
    async fn test_media_message_without_store_still_counts() {
        let pipeline = test_pipeline().await;
        let ts = Utc.with_ymd_and_hms(2024, 5, 7, 10, 0, 0).unwrap();

        let outcome = pipeline
            .handle_message("U1", Message::media("m1", MessageKind::Image, ts))
            .await
            .unwrap();
        assert!(matches!(outcome, PipelineOutcome::Waiting { .. }));

        let session = pipeline.session("U1").await.unwrap();
        assert_eq!(session.message_count(), 1);
        assert!(session.messages[0].media_ref.is_none());
    }

    #[tokio::test]
    async fn test_unfollow_drops_session() {
        let pipeline = test_pipeline().await;
        pipeline
            .handle_message("U1", message("m1", "สวัสดี", 0))
            .await
            .unwrap();
        pipeline.handle_unfollow("U1").await;
        assert!(pipeline.session("U1").await.is_none());
    }
}
