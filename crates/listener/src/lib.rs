//! Webhook listener utilities for Tipline.
//!
//! This crate is the boundary between the raw messaging-channel webhook
//! and the typed pipeline:
//!
//! - [`parse_events`] normalizes a raw JSON body into [`InboundEvent`]s
//!   in one validation step
//! - [`EventProcessor`] runs each event through the [`Pipeline`] and
//!   sends acknowledgment replies
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use case_core::LoggingReplySender;
//! use listener::EventProcessor;
//! use pipeline::{Pipeline, PipelineConfig};
//! use tipline_database::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("sqlite:tipline.db?mode=rwc").await?;
//! db.migrate().await?;
//!
//! let pipeline = Arc::new(Pipeline::new(db, PipelineConfig::default()));
//! let processor = EventProcessor::with_defaults(pipeline, LoggingReplySender);
//!
//! let results = processor.process_payload(r#"{"events": []}"#).await?;
//! println!("processed {} events", results.len());
//! # Ok(())
//! # }
//! ```

mod normalize;
mod processor;

pub use normalize::{parse_events, NormalizeError};
pub use processor::{EventProcessor, ProcessResult, ProcessorConfig, ProcessorError};

// Re-export the event type for users
pub use case_core::InboundEvent;
