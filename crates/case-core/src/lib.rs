//! Core types and collaborator traits for the Tipline case pipeline.
//!
//! This crate provides the shared interface between the ingestion side
//! (webhook listener) and the processing side (pipeline, persistence):
//!
//! - [`InboundEvent`] - Normalized channel events, validated at the boundary
//! - [`Message`] / [`MediaRef`] - One inbound message unit
//! - [`EntitySet`] - Structured signals extracted from free text
//! - [`CategoryResult`] / [`UrgencyResult`] - Classification outputs
//! - Collaborator traits ([`ProfileLookup`], [`MediaStore`],
//!   [`EnrichmentScorer`], [`ReplySender`], [`CaseNotifier`]) for the
//!   external services the pipeline degrades gracefully without
//!
//! # Example
//!
//! ```rust
//! use case_core::{InboundEvent, Message};
//! use chrono::Utc;
//!
//! let event = InboundEvent::Message {
//!     sender_id: "U4af4980629".to_string(),
//!     reply_token: Some("b60d432864f4".to_string()),
//!     message: Message::text("468789577898262530", "ถูกโกงโอนเงิน", Utc::now()),
//! };
//! assert_eq!(event.sender_id(), "U4af4980629");
//! ```

mod collaborators;
mod entities;
mod event;
mod scoring;

pub use collaborators::{
    CaseNotification, CaseNotifier, CollaboratorError, Enrichment, EnrichmentScorer,
    LoggingReplySender, MediaStore, NoOpEnrichmentScorer, NoOpMediaStore, NoOpNotifier,
    NoOpProfileLookup, NoOpReplySender, NotificationKind, Profile, ProfileLookup, ReplySender,
};
pub use entities::EntitySet;
pub use event::{InboundEvent, MediaRef, Message, MessageKind};
pub use scoring::{Category, CategoryResult, UrgencyLevel, UrgencyResult};

// Re-export async_trait for convenience
pub use async_trait::async_trait;
