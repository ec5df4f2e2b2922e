//! Event processor that connects normalized webhook events to the pipeline.

use std::sync::Arc;

use case_core::{InboundEvent, ReplySender};
use pipeline::{processing_problem, Pipeline, PipelineError, PipelineOutcome};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::normalize::{parse_events, NormalizeError};

/// Configuration for the event processor.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Whether to send acknowledgment replies back to the channel.
    pub send_acknowledgments: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            send_acknowledgments: true,
        }
    }
}

/// Errors that can occur while processing an event.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The pipeline failed; the transaction has rolled back and the
    /// platform may redeliver the event.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Result of processing a single event.
#[derive(Debug)]
pub enum ProcessResult {
    /// A message went through the pipeline.
    Handled {
        /// The sender the message came from.
        sender: String,
        /// What the pipeline did with it.
        outcome: PipelineOutcome,
    },
    /// A follow event was greeted.
    Greeted {
        /// The sender who followed.
        sender: String,
    },
    /// An unfollow event dropped the sender's session.
    Forgotten {
        /// The sender who unfollowed.
        sender: String,
    },
    /// Error occurred during processing.
    Error(ProcessorError),
}

/// Processes normalized events through the pipeline and sends
/// acknowledgment replies.
pub struct EventProcessor<R: ReplySender> {
    pipeline: Arc<Pipeline>,
    reply_sender: R,
    config: ProcessorConfig,
}

impl<R: ReplySender> EventProcessor<R> {
    /// Create a new event processor.
    pub fn new(pipeline: Arc<Pipeline>, reply_sender: R, config: ProcessorConfig) -> Self {
        Self {
            pipeline,
            reply_sender,
            config,
        }
    }

    /// Create a processor with default configuration.
    pub fn with_defaults(pipeline: Arc<Pipeline>, reply_sender: R) -> Self {
        Self::new(pipeline, reply_sender, ProcessorConfig::default())
    }

    /// Get a reference to the pipeline.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Normalize a raw webhook body and process every event in it.
    ///
    /// Returns an error only when the body itself is unparsable; per-event
    /// failures are reported in the result list so one bad event never
    /// blocks the rest of the batch.
    pub async fn process_payload(&self, body: &str) -> Result<Vec<ProcessResult>, NormalizeError> {
        let events = parse_events(body)?;
        let mut results = Vec::with_capacity(events.len());
        for event in events {
            results.push(self.process_event(event).await);
        }
        Ok(results)
    }

    /// Process a single normalized event and return the result.
    pub async fn process_event(&self, event: InboundEvent) -> ProcessResult {
        match event {
            InboundEvent::Message {
                sender_id,
                reply_token,
                message,
            } => {
                debug!(
                    "Processing message {} from {}",
                    message.external_message_id, sender_id
                );
                match self.pipeline.handle_message(&sender_id, message).await {
                    Ok(outcome) => {
                        self.send_reply(reply_token.as_deref(), outcome.reply()).await;
                        ProcessResult::Handled {
                            sender: sender_id,
                            outcome,
                        }
                    }
                    Err(e) => {
                        error!("Pipeline failed for {}: {}", sender_id, e);
                        // The sender still gets an acknowledgment; the
                        // failure is reported to the caller for redelivery.
                        self.send_reply(reply_token.as_deref(), &processing_problem())
                            .await;
                        ProcessResult::Error(ProcessorError::Pipeline(e))
                    }
                }
            }

            InboundEvent::Follow {
                sender_id,
                reply_token,
                ..
            } => {
                let greeting = self.pipeline.handle_follow(&sender_id);
                self.send_reply(reply_token.as_deref(), &greeting).await;
                ProcessResult::Greeted { sender: sender_id }
            }

            InboundEvent::Unfollow { sender_id, .. } => {
                self.pipeline.handle_unfollow(&sender_id).await;
                ProcessResult::Forgotten { sender: sender_id }
            }
        }
    }

    /// Send an acknowledgment reply. Failures are logged and swallowed: a
    /// reply problem never affects a completed persistence transaction.
    async fn send_reply(&self, reply_token: Option<&str>, messages: &[String]) {
        if !self.config.send_acknowledgments || messages.is_empty() {
            return;
        }
        let Some(token) = reply_token else {
            debug!("No reply token on event, skipping acknowledgment");
            return;
        };
        if let Err(e) = self.reply_sender.reply(token, messages).await {
            warn!("Failed to send acknowledgment reply: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use case_core::{async_trait, CollaboratorError, NoOpReplySender};
    use pipeline::PipelineConfig;
    use std::sync::Mutex;
    use tipline_database::Database;

    async fn test_processor<R: ReplySender>(reply_sender: R) -> EventProcessor<R> {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        let pipeline = Arc::new(Pipeline::new(db, PipelineConfig::default()));
        EventProcessor::with_defaults(pipeline, reply_sender)
    }

    #[derive(Default)]
    struct RecordingReplySender {
        replies: Mutex<Vec<(String, Vec<String>)>>,
    }

    #[async_trait]
    impl ReplySender for RecordingReplySender {
        async fn reply(
            &self,
            reply_token: &str,
            messages: &[String],
        ) -> Result<(), CollaboratorError> {
            self.replies
                .lock()
                .unwrap()
                .push((reply_token.to_string(), messages.to_vec()));
            Ok(())
        }
    }

    fn message_body(id: &str, reply_token: &str, text: &str) -> String {
        format!(
            r#"{{"events": [{{
                "type": "message",
                "replyToken": "{}",
                "source": {{"userId": "U1"}},
                "timestamp": 1715070000000,
                "message": {{"id": "{}", "type": "text", "text": "{}"}}
            }}]}}"#,
            reply_token, id, text
        )
    }

    #[tokio::test]
    async fn test_waiting_message_gets_prompt_reply() {
        let processor = test_processor(RecordingReplySender::default()).await;

        let results = processor
            .process_payload(&message_body("m1", "rt-1", "สวัสดีครับ"))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(matches!(
            &results[0],
            ProcessResult::Handled {
                outcome: PipelineOutcome::Waiting { .. },
                ..
            }
        ));

        let replies = processor.reply_sender.replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "rt-1");
        assert!(!replies[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_materialization_confirms_with_case_number() {
        let processor = test_processor(RecordingReplySender::default()).await;

        processor
            .process_payload(&message_body("m1", "rt-1", "โดนโกงครับ"))
            .await
            .unwrap();
        let results = processor
            .process_payload(&message_body(
                "m2",
                "rt-2",
                "โอนไป 50000 บาท เบอร์ 0812345678",
            ))
            .await
            .unwrap();

        let ProcessResult::Handled {
            outcome: PipelineOutcome::CaseCreated { case_number, .. },
            ..
        } = &results[0]
        else {
            panic!("expected case creation");
        };

        let replies = processor.reply_sender.replies.lock().unwrap();
        let confirmation = &replies.last().unwrap().1;
        assert!(confirmation[0].contains(case_number.as_str()));
    }

    #[tokio::test]
    async fn test_follow_is_greeted() {
        let processor = test_processor(RecordingReplySender::default()).await;

        let body = r#"{"events": [{"type": "follow", "replyToken": "rt-f",
            "source": {"userId": "U1"}, "timestamp": 1715070000000}]}"#;
        let results = processor.process_payload(body).await.unwrap();

        assert!(matches!(&results[0], ProcessResult::Greeted { sender } if sender == "U1"));
        let replies = processor.reply_sender.replies.lock().unwrap();
        assert_eq!(replies[0].0, "rt-f");
    }

    #[tokio::test]
    async fn test_unfollow_forgets_session() {
        let processor = test_processor(NoOpReplySender).await;

        processor
            .process_payload(&message_body("m1", "rt-1", "สวัสดี"))
            .await
            .unwrap();
        assert!(processor.pipeline().session("U1").await.is_some());

        let body = r#"{"events": [{"type": "unfollow",
            "source": {"userId": "U1"}, "timestamp": 1715070001000}]}"#;
        let results = processor.process_payload(body).await.unwrap();

        assert!(matches!(&results[0], ProcessResult::Forgotten { sender } if sender == "U1"));
        assert!(processor.pipeline().session("U1").await.is_none());
    }

    #[tokio::test]
    async fn test_acknowledgments_can_be_disabled() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        let pipeline = Arc::new(Pipeline::new(db, PipelineConfig::default()));
        let processor = EventProcessor::new(
            pipeline,
            RecordingReplySender::default(),
            ProcessorConfig {
                send_acknowledgments: false,
            },
        );

        processor
            .process_payload(&message_body("m1", "rt-1", "สวัสดี"))
            .await
            .unwrap();

        assert!(processor.reply_sender.replies.lock().unwrap().is_empty());
    }
}
