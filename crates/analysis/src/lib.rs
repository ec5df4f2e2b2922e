//! Entity extraction and classification for accumulated report text.
//!
//! Everything in this crate is pure and synchronous: the same input always
//! produces the same output, with no shared mutable state. The pipeline
//! runs these over the *full* accumulated text of a session, because early
//! messages may carry the phone number while a later one carries the
//! amount.
//!
//! - [`extract`] - One pass over free text producing an [`EntitySet`]
//! - [`Categorizer`] - Keyword scoring into a report [`Category`]
//! - [`UrgencyScorer`] - Keyword tiers plus amount magnitude into an urgency level
//!
//! Keyword tables are configuration, not constants: [`CategoryConfig`] and
//! [`UrgencyConfig`] are handed in at construction so test suites can
//! substitute fixtures. The `Default` impls carry the production Thai
//! tables.

mod categorize;
mod extract;
mod urgency;

pub use categorize::{Categorizer, CategoryConfig};
pub use extract::extract;
pub use urgency::{UrgencyConfig, UrgencyScorer, UrgencyTier};

pub use case_core::{Category, CategoryResult, EntitySet, UrgencyLevel, UrgencyResult};
