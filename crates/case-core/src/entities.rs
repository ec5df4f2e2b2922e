//! Structured signals extracted from free text.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Entities extracted from the accumulated text of a session.
///
/// Every field is deduplicated. Amounts are kept sorted descending so the
/// first element is the deterministic primary amount; phones, URLs, and
/// external ids keep first-appearance order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EntitySet {
    /// Positive monetary amounts, sorted descending.
    pub amounts: Vec<Decimal>,
    /// Normalized phone numbers (digits only).
    pub phones: Vec<String>,
    /// Scheme-prefixed URLs.
    pub urls: Vec<String>,
    /// Labeled identifiers (e.g. messaging-app handles).
    pub external_ids: Vec<String>,
}

impl EntitySet {
    /// Whether nothing was extracted at all.
    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
            && self.phones.is_empty()
            && self.urls.is_empty()
            && self.external_ids.is_empty()
    }

    /// Whether at least one amount was extracted.
    pub fn has_amount(&self) -> bool {
        !self.amounts.is_empty()
    }

    /// Whether at least one phone number was extracted.
    pub fn has_phone(&self) -> bool {
        !self.phones.is_empty()
    }

    /// The largest extracted amount, used as the primary loss amount.
    pub fn max_amount(&self) -> Option<Decimal> {
        self.amounts.first().copied()
    }

    /// The first phone number that appeared in the text.
    pub fn primary_phone(&self) -> Option<&str> {
        self.phones.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set() {
        let set = EntitySet::default();
        assert!(set.is_empty());
        assert!(!set.has_amount());
        assert!(!set.has_phone());
        assert_eq!(set.max_amount(), None);
        assert_eq!(set.primary_phone(), None);
    }

    #[test]
    fn test_max_amount_is_first() {
        let set = EntitySet {
            amounts: vec![Decimal::from(50000), Decimal::from(1200)],
            ..Default::default()
        };
        assert_eq!(set.max_amount(), Some(Decimal::from(50000)));
    }
}
