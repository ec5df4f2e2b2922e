//! Conversation-to-case pipeline.
//!
//! This crate coordinates the path from an inbound chat message to a
//! durable case record:
//!
//! - [`SessionStore`] accumulates messages per sender until enough
//!   information exists to act
//! - [`MaterializationPolicy`] decides Create / Append / Wait from the
//!   extracted entities and scores
//! - [`Pipeline`] wires sessions, analysis, persistence, and the
//!   degradable collaborators together
//!
//! # Example
//!
//! ```no_run
//! use case_core::Message;
//! use chrono::Utc;
//! use pipeline::{Pipeline, PipelineConfig};
//! use tipline_database::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("sqlite:tipline.db?mode=rwc").await?;
//! db.migrate().await?;
//!
//! let pipeline = Pipeline::new(db, PipelineConfig::default());
//! let outcome = pipeline
//!     .handle_message("U1", Message::text("m1", "โดนหลอกโอนเงิน", Utc::now()))
//!     .await?;
//! println!("reply: {:?}", outcome.reply());
//! # Ok(())
//! # }
//! ```

mod error;
mod pipeline;
mod replies;
mod session;

pub use error::PipelineError;
pub use pipeline::{Pipeline, PipelineConfig, PipelineOutcome};
pub use replies::{appended, case_created, processing_problem, wait_prompt, welcome};
pub use session::{Decision, MaterializationPolicy, Session, SessionStatus, SessionStore};
