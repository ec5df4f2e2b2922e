//! Human-readable case number generation.

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;

/// Generate a case number of the form `PREFIX-YYYYMM-NNNN`.
///
/// The 4-digit suffix is random, so collisions within a month are
/// possible; the caller retries on the unique-constraint violation.
pub fn generate(prefix: &str, now: DateTime<Utc>, rng: &mut impl Rng) -> String {
    format!(
        "{}-{}{:02}-{:04}",
        prefix,
        now.year(),
        now.month(),
        rng.gen_range(0..10_000)
    )
}
