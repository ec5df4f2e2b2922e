//! Classification outputs: category and urgency.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Report category.
///
/// Declaration order is significant: ties in category scoring are broken
/// by the first-declared category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Financial fraud or scam report.
    Fraud,
    /// Legal dispute or request for legal help.
    LegalIssue,
    /// Tip-off about illegal activity.
    TipOff,
    /// Not enough signal to classify.
    Uncategorized,
}

impl Category {
    /// Database/wire representation of this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Fraud => "fraud",
            Category::LegalIssue => "legal_issue",
            Category::TipOff => "tip_off",
            Category::Uncategorized => "uncategorized",
        }
    }

    /// Parse a category from its wire representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fraud" => Some(Category::Fraud),
            "legal_issue" => Some(Category::LegalIssue),
            "tip_off" => Some(Category::TipOff),
            "uncategorized" => Some(Category::Uncategorized),
            _ => None,
        }
    }
}

/// Result of categorizing a session's accumulated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryResult {
    /// Winning category (or `Uncategorized` when confidence is too low).
    pub category: Category,
    /// Confidence in the winner, 0-100.
    pub confidence: u8,
    /// Raw score per scorable category.
    pub scores: BTreeMap<Category, u32>,
}

impl CategoryResult {
    /// An uncategorized result with zero confidence.
    pub fn uncategorized() -> Self {
        Self {
            category: Category::Uncategorized,
            confidence: 0,
            scores: BTreeMap::new(),
        }
    }
}

/// Coarse urgency level.
///
/// Ordering is significant: levels compare by severity, which the
/// persistence layer relies on for monotonic upgrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    /// No time pressure.
    Low,
    /// Should be looked at soon.
    Medium,
    /// Active harm or large loss.
    High,
    /// Immediate danger.
    Critical,
}

impl UrgencyLevel {
    /// Database/wire representation of this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyLevel::Low => "low",
            UrgencyLevel::Medium => "medium",
            UrgencyLevel::High => "high",
            UrgencyLevel::Critical => "critical",
        }
    }

    /// Parse a level from its wire representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(UrgencyLevel::Low),
            "medium" => Some(UrgencyLevel::Medium),
            "high" => Some(UrgencyLevel::High),
            "critical" => Some(UrgencyLevel::Critical),
            _ => None,
        }
    }
}

/// Result of scoring a session's urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencyResult {
    /// Banded urgency level.
    pub level: UrgencyLevel,
    /// Raw score, 0-100.
    pub score: u8,
}
