//! Normalized inbound events and message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain text message.
    Text,
    /// Image attachment.
    Image,
    /// Video attachment.
    Video,
    /// Audio attachment.
    Audio,
    /// Generic file attachment.
    File,
}

impl MessageKind {
    /// Database/wire representation of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
            MessageKind::Audio => "audio",
            MessageKind::File => "file",
        }
    }

    /// Parse a kind from its wire representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(MessageKind::Text),
            "image" => Some(MessageKind::Image),
            "video" => Some(MessageKind::Video),
            "audio" => Some(MessageKind::Audio),
            "file" => Some(MessageKind::File),
            _ => None,
        }
    }

    /// Whether this kind carries media content.
    pub fn is_media(&self) -> bool {
        !matches!(self, MessageKind::Text)
    }
}

/// Reference to an uploaded media object in blob storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Storage location (URL or object key).
    pub location: String,
    /// MIME content type as reported by the channel.
    pub content_type: String,
    /// Object size in bytes.
    pub size_bytes: i64,
}

/// One inbound message unit from the channel.
///
/// `sequence_number` is deliberately absent here: it is assigned at
/// persistence time from the durable message count, never in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Channel-unique message id, used for durable deduplication.
    pub external_message_id: String,
    /// Message kind.
    pub kind: MessageKind,
    /// Text content (present only for text messages).
    pub text: Option<String>,
    /// Uploaded media reference (present only once upload succeeded).
    pub media_ref: Option<MediaRef>,
    /// Timestamp supplied by the channel, not by ingestion time.
    pub occurred_at: DateTime<Utc>,
}

impl Message {
    /// Create a text message.
    pub fn text(
        external_message_id: impl Into<String>,
        text: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            external_message_id: external_message_id.into(),
            kind: MessageKind::Text,
            text: Some(text.into()),
            media_ref: None,
            occurred_at,
        }
    }

    /// Create a media message without an uploaded reference yet.
    pub fn media(
        external_message_id: impl Into<String>,
        kind: MessageKind,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            external_message_id: external_message_id.into(),
            kind,
            text: None,
            media_ref: None,
            occurred_at,
        }
    }

    /// Whether this message is an attachment (anything but text).
    pub fn has_attachment(&self) -> bool {
        self.kind.is_media()
    }
}

/// A normalized inbound channel event.
///
/// Raw webhook payloads are converted into this tagged union in one
/// validation step at the boundary; everything past the listener works
/// with required, typed fields only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A message from a sender.
    Message {
        /// Stable external identity of the sender.
        sender_id: String,
        /// One-shot token for replying to this event, if the channel
        /// provided one.
        reply_token: Option<String>,
        /// The message content.
        message: Message,
    },

    /// The sender added the bot as a contact.
    Follow {
        /// Stable external identity of the sender.
        sender_id: String,
        /// One-shot reply token, if provided.
        reply_token: Option<String>,
        /// Channel-supplied timestamp.
        occurred_at: DateTime<Utc>,
    },

    /// The sender removed or blocked the bot.
    Unfollow {
        /// Stable external identity of the sender.
        sender_id: String,
        /// Channel-supplied timestamp.
        occurred_at: DateTime<Utc>,
    },
}

impl InboundEvent {
    /// The sender this event belongs to.
    pub fn sender_id(&self) -> &str {
        match self {
            InboundEvent::Message { sender_id, .. }
            | InboundEvent::Follow { sender_id, .. }
            | InboundEvent::Unfollow { sender_id, .. } => sender_id,
        }
    }

    /// The reply token, if this event kind carries one.
    pub fn reply_token(&self) -> Option<&str> {
        match self {
            InboundEvent::Message { reply_token, .. }
            | InboundEvent::Follow { reply_token, .. } => reply_token.as_deref(),
            InboundEvent::Unfollow { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_message_kind_roundtrip() {
        for kind in [
            MessageKind::Text,
            MessageKind::Image,
            MessageKind::Video,
            MessageKind::Audio,
            MessageKind::File,
        ] {
            assert_eq!(MessageKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MessageKind::parse("sticker"), None);
    }

    #[test]
    fn test_text_message_has_no_attachment() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let msg = Message::text("m1", "สวัสดีครับ", ts);
        assert!(!msg.has_attachment());
        assert_eq!(msg.text.as_deref(), Some("สวัสดีครับ"));
    }

    #[test]
    fn test_media_message_has_attachment() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let msg = Message::media("m2", MessageKind::Image, ts);
        assert!(msg.has_attachment());
        assert!(msg.text.is_none());
    }

    #[test]
    fn test_event_serde_tagging() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let event = InboundEvent::Message {
            sender_id: "U123".to_string(),
            reply_token: Some("tok".to_string()),
            message: Message::text("m1", "hello", ts),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"message""#));

        let parsed: InboundEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.sender_id(), "U123");
        assert_eq!(parsed.reply_token(), Some("tok"));
    }

    #[test]
    fn test_unfollow_has_no_reply_token() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let event = InboundEvent::Unfollow {
            sender_id: "U123".to_string(),
            occurred_at: ts,
        };
        assert!(event.reply_token().is_none());
    }
}
