//! Keyword-based report categorization.

use std::collections::BTreeMap;

use case_core::{Category, CategoryResult, EntitySet};

/// Configuration for the categorizer.
///
/// Keyword tables are listed in tie-break order: when two categories score
/// equally, the first-declared one wins.
#[derive(Debug, Clone)]
pub struct CategoryConfig {
    /// Keyword table per scorable category, in tie-break order.
    /// Keywords must be lowercase.
    pub tables: Vec<(Category, Vec<String>)>,
    /// Points added per keyword occurrence.
    pub points_per_hit: u32,
    /// Flat bonus added to the fraud score when the entity set contains
    /// both an amount and a phone number.
    pub amount_phone_bonus: u32,
    /// Confidence at or below which the winner is downgraded to
    /// `Uncategorized`.
    pub min_confidence: u8,
}

fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            tables: vec![
                (
                    Category::Fraud,
                    keywords(&[
                        "โกง",
                        "หลอก",
                        "หลอกลวง",
                        "ฉ้อโกง",
                        "มิจฉาชีพ",
                        "โอนเงิน",
                        "แชร์ลูกโซ่",
                        "ลงทุนปันผล",
                        "บัญชีม้า",
                        "แก๊งคอลเซ็นเตอร์",
                        "scam",
                    ]),
                ),
                (
                    Category::LegalIssue,
                    keywords(&[
                        "ทนาย",
                        "คดี",
                        "ฟ้อง",
                        "ศาล",
                        "กฎหมาย",
                        "สัญญา",
                        "หมายเรียก",
                        "ไกล่เกลี่ย",
                        "มรดก",
                    ]),
                ),
                (
                    Category::TipOff,
                    keywords(&[
                        "เบาะแส",
                        "แจ้งเบาะแส",
                        "ยาเสพติด",
                        "บ่อน",
                        "การพนัน",
                        "เว็บพนัน",
                        "ส่วย",
                        "ทุจริต",
                    ]),
                ),
            ],
            points_per_hit: 10,
            amount_phone_bonus: 15,
            min_confidence: 30,
        }
    }
}

/// Scores accumulated text into a report category.
#[derive(Debug, Clone)]
pub struct Categorizer {
    config: CategoryConfig,
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new(CategoryConfig::default())
    }
}

impl Categorizer {
    /// Create a categorizer with the given keyword configuration.
    pub fn new(config: CategoryConfig) -> Self {
        Self { config }
    }

    /// Categorize accumulated text given its extracted entities.
    ///
    /// Score = `points_per_hit` x case-insensitive keyword occurrences per
    /// category, plus a flat fraud bonus when both an amount and a phone
    /// are present. Confidence is the winner's share of the total score;
    /// at or below `min_confidence` the result is `Uncategorized`.
    pub fn categorize(&self, text: &str, entities: &EntitySet) -> CategoryResult {
        let haystack = text.to_lowercase();

        let mut scores: BTreeMap<Category, u32> = BTreeMap::new();
        let mut winner: Option<(Category, u32)> = None;
        let mut total: u32 = 0;

        for (category, words) in &self.config.tables {
            let hits: u32 = words
                .iter()
                .map(|w| haystack.matches(w.as_str()).count() as u32)
                .sum();
            let mut score = hits * self.config.points_per_hit;

            if *category == Category::Fraud && entities.has_amount() && entities.has_phone() {
                score += self.config.amount_phone_bonus;
            }

            scores.insert(*category, score);
            total += score;

            // Strict comparison keeps the first-declared category on ties.
            match winner {
                Some((_, best)) if score <= best => {}
                _ if score == 0 => {}
                _ => winner = Some((*category, score)),
            }
        }

        let Some((category, winning_score)) = winner else {
            return CategoryResult {
                category: Category::Uncategorized,
                confidence: 0,
                scores,
            };
        };

        let confidence = (((winning_score as u64) * 100 + (total as u64) / 2) / total as u64)
            .min(100) as u8;

        let category = if confidence <= self.config.min_confidence {
            Category::Uncategorized
        } else {
            category
        };

        CategoryResult {
            category,
            confidence,
            scores,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn entities_with_amount_and_phone() -> EntitySet {
        EntitySet {
            amounts: vec![Decimal::from(50_000)],
            phones: vec!["0812345678".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_fraud_scenario_with_bonus() {
        let categorizer = Categorizer::default();
        let result = categorizer.categorize(
            "โอนเงิน 50000 บาท ให้ 0812345678 หลอกลวง",
            &entities_with_amount_and_phone(),
        );

        assert_eq!(result.category, Category::Fraud);
        assert!(result.confidence > 30);
    }

    #[test]
    fn test_no_keywords_is_uncategorized() {
        let categorizer = Categorizer::default();
        let result = categorizer.categorize("สวัสดีครับ", &EntitySet::default());

        assert_eq!(result.category, Category::Uncategorized);
        assert_eq!(result.confidence, 0);
    }

    #[test]
    fn test_confidence_always_in_bounds() {
        let categorizer = Categorizer::default();
        let texts = [
            "",
            "สวัสดี",
            "โกง โกง โกง",
            "ทนาย ฟ้อง ศาล โกง เบาะแส การพนัน",
            "แจ้งเบาะแส เว็บพนัน https://bet.example",
        ];
        for text in texts {
            let result = categorizer.categorize(text, &EntitySet::default());
            assert!(result.confidence <= 100);
            if result.confidence <= 30 {
                assert_eq!(result.category, Category::Uncategorized);
            }
        }
    }

    #[test]
    fn test_low_confidence_downgraded() {
        // Fixture table where two categories tie closely, pushing the
        // winner's share under the threshold.
        let config = CategoryConfig {
            tables: vec![
                (Category::Fraud, keywords(&["alpha"])),
                (Category::LegalIssue, keywords(&["beta"])),
                (Category::TipOff, keywords(&["gamma"])),
            ],
            points_per_hit: 10,
            amount_phone_bonus: 0,
            min_confidence: 40,
        };
        let categorizer = Categorizer::new(config);
        let result = categorizer.categorize("alpha beta gamma", &EntitySet::default());

        // Three-way tie: each has 33% share, below the 40 threshold.
        assert_eq!(result.category, Category::Uncategorized);
        assert_eq!(result.confidence, 33);
    }

    #[test]
    fn test_tie_broken_by_declaration_order() {
        let config = CategoryConfig {
            tables: vec![
                (Category::Fraud, keywords(&["alpha"])),
                (Category::LegalIssue, keywords(&["beta"])),
            ],
            points_per_hit: 10,
            amount_phone_bonus: 0,
            min_confidence: 0,
        };
        let categorizer = Categorizer::new(config);
        let result = categorizer.categorize("alpha beta", &EntitySet::default());

        assert_eq!(result.category, Category::Fraud);
        assert_eq!(result.confidence, 50);
    }

    #[test]
    fn test_bonus_biases_toward_fraud() {
        let categorizer = Categorizer::default();
        // Only a legal keyword, but the amount+phone combination still
        // lands points on fraud.
        let result = categorizer.categorize("มีคดี", &entities_with_amount_and_phone());

        assert_eq!(*result.scores.get(&Category::Fraud).unwrap(), 15);
        assert_eq!(*result.scores.get(&Category::LegalIssue).unwrap(), 10);
    }

    #[test]
    fn test_english_keywords_case_insensitive() {
        let categorizer = Categorizer::default();
        let result = categorizer.categorize("SCAM scam Scam", &EntitySet::default());

        assert_eq!(result.category, Category::Fraud);
        assert_eq!(*result.scores.get(&Category::Fraud).unwrap(), 30);
    }
}
