//! Webhook payload normalization.
//!
//! Raw channel payloads are duck-typed JSON with many optional fields.
//! This module converts them into [`InboundEvent`] values in one explicit
//! validation step; everything downstream works with required, typed
//! fields only. Individual events that fail validation are skipped with a
//! warning so one malformed event never drops a whole delivery batch.

use case_core::{InboundEvent, Message, MessageKind};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors for an unparsable webhook body.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The payload was not valid JSON of the expected overall shape.
    #[error("invalid webhook payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(rename = "replyToken")]
    reply_token: Option<String>,
    source: Option<RawSource>,
    timestamp: Option<i64>,
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<String>,
}

fn parse_timestamp(millis: Option<i64>) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis?).single()
}

fn message_kind(raw: &str) -> Option<MessageKind> {
    match raw {
        "text" => Some(MessageKind::Text),
        "image" => Some(MessageKind::Image),
        "video" => Some(MessageKind::Video),
        "audio" => Some(MessageKind::Audio),
        "file" => Some(MessageKind::File),
        _ => None,
    }
}

fn normalize_event(raw: RawEvent) -> Option<InboundEvent> {
    let kind = raw.kind.as_deref()?;
    let sender_id = raw.source.and_then(|s| s.user_id)?;
    let occurred_at = parse_timestamp(raw.timestamp)?;

    match kind {
        "message" => {
            let message = raw.message?;
            let external_message_id = message.id?;
            let message_kind = message_kind(message.kind.as_deref()?)?;

            let message = match message_kind {
                MessageKind::Text => {
                    Message::text(external_message_id, message.text?, occurred_at)
                }
                kind => Message::media(external_message_id, kind, occurred_at),
            };

            Some(InboundEvent::Message {
                sender_id,
                reply_token: raw.reply_token,
                message,
            })
        }
        "follow" => Some(InboundEvent::Follow {
            sender_id,
            reply_token: raw.reply_token,
            occurred_at,
        }),
        "unfollow" => Some(InboundEvent::Unfollow {
            sender_id,
            occurred_at,
        }),
        other => {
            debug!("Ignoring unsupported event type: {}", other);
            None
        }
    }
}

/// Parse a raw webhook body into normalized events.
///
/// Returns an error only when the body itself is unparsable; events that
/// are missing required fields or carry unsupported types are skipped.
pub fn parse_events(body: &str) -> Result<Vec<InboundEvent>, NormalizeError> {
    let payload: RawPayload = serde_json::from_str(body)?;
    let total = payload.events.len();

    let events: Vec<InboundEvent> = payload
        .events
        .into_iter()
        .filter_map(normalize_event)
        .collect();

    if events.len() < total {
        warn!(
            "Skipped {} of {} webhook events during normalization",
            total - events.len(),
            total
        );
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_event_body() -> String {
        r#"{
            "destination": "Ubot",
            "events": [{
                "type": "message",
                "replyToken": "rt-1",
                "source": {"type": "user", "userId": "U1"},
                "timestamp": 1715070000000,
                "message": {"id": "m1", "type": "text", "text": "โดนโกงครับ"}
            }]
        }"#
        .to_string()
    }

    #[test]
    fn test_parse_text_message_event() {
        let events = parse_events(&text_event_body()).unwrap();
        assert_eq!(events.len(), 1);

        let InboundEvent::Message {
            sender_id,
            reply_token,
            message,
        } = &events[0]
        else {
            panic!("expected message event");
        };
        assert_eq!(sender_id, "U1");
        assert_eq!(reply_token.as_deref(), Some("rt-1"));
        assert_eq!(message.external_message_id, "m1");
        assert_eq!(message.text.as_deref(), Some("โดนโกงครับ"));
        assert_eq!(message.occurred_at.timestamp_millis(), 1715070000000);
    }

    #[test]
    fn test_parse_media_message_event() {
        let body = r#"{
            "events": [{
                "type": "message",
                "replyToken": "rt-1",
                "source": {"userId": "U1"},
                "timestamp": 1715070000000,
                "message": {"id": "m2", "type": "image"}
            }]
        }"#;

        let events = parse_events(body).unwrap();
        let InboundEvent::Message { message, .. } = &events[0] else {
            panic!("expected message event");
        };
        assert_eq!(message.kind, MessageKind::Image);
        assert!(message.text.is_none());
    }

    #[test]
    fn test_follow_and_unfollow_events() {
        let body = r#"{
            "events": [
                {"type": "follow", "replyToken": "rt-1",
                 "source": {"userId": "U1"}, "timestamp": 1715070000000},
                {"type": "unfollow",
                 "source": {"userId": "U2"}, "timestamp": 1715070001000}
            ]
        }"#;

        let events = parse_events(body).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], InboundEvent::Follow { sender_id, .. } if sender_id == "U1"));
        assert!(
            matches!(&events[1], InboundEvent::Unfollow { sender_id, .. } if sender_id == "U2")
        );
    }

    #[test]
    fn test_unsupported_and_incomplete_events_skipped() {
        let body = r#"{
            "events": [
                {"type": "message", "source": {"userId": "U1"},
                 "timestamp": 1715070000000,
                 "message": {"id": "m1", "type": "sticker"}},
                {"type": "message", "timestamp": 1715070000000,
                 "message": {"id": "m2", "type": "text", "text": "no sender"}},
                {"type": "beacon", "source": {"userId": "U3"},
                 "timestamp": 1715070000000}
            ]
        }"#;

        let events = parse_events(body).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_empty_events_list() {
        let events = parse_events(r#"{"events": []}"#).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_unparsable_body_is_an_error() {
        assert!(parse_events("not json").is_err());
    }
}
