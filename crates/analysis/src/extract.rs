//! Entity extraction from free-form report text.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::LazyLock;

use case_core::EntitySet;
use regex::Regex;
use rust_decimal::Decimal;

/// Amounts written with a Thai magnitude word multiplying the number,
/// e.g. "5 ล้าน" or "3.5แสน".
static AMOUNT_MAGNITUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9][0-9,]*(?:\.[0-9]+)?)\s*(ล้าน|แสน|หมื่น|พัน)").unwrap()
});

/// Amounts with an explicit currency suffix, e.g. "50,000 บาท" or "1200฿".
static AMOUNT_CURRENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9][0-9,]*(?:\.[0-9]+)?)\s*(?:บาท|฿|(?i:baht))").unwrap()
});

/// Amounts with a currency prefix, e.g. "฿2,500".
static AMOUNT_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"฿\s*([0-9][0-9,]*(?:\.[0-9]+)?)").unwrap());

/// Thai national phone numbers: 9-10 digits starting with 0, either
/// contiguous or grouped with dashes/spaces. The contiguous alternative
/// over-captures up to 11 digits so runs embedded in longer numbers fail
/// validation instead of matching a 10-digit slice.
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9])([0-9]{9,11}|0[0-9]{1,2}[- ][0-9]{3}[- ][0-9]{3,4})").unwrap()
});

/// Scheme-prefixed URLs.
static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://[^\s]+").unwrap());

/// Labeled identifiers such as "ID: somchai_99" or "ไอดี: @mule4".
static EXTERNAL_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?i:\bid)|ไอดี)\s*[:：]\s*@?([A-Za-z0-9_.\-]+)").unwrap()
});

fn magnitude_multiplier(word: &str) -> Decimal {
    match word {
        "ล้าน" => Decimal::from(1_000_000),
        "แสน" => Decimal::from(100_000),
        "หมื่น" => Decimal::from(10_000),
        "พัน" => Decimal::from(1_000),
        _ => Decimal::ONE,
    }
}

/// Parse a number after stripping thousands separators. Non-positive and
/// unparsable values yield `None`; malformed input is expected in free text.
fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned = raw.replace(',', "");
    let value = Decimal::from_str(&cleaned).ok()?;
    (value > Decimal::ZERO).then_some(value)
}

fn extract_amounts(text: &str) -> Vec<Decimal> {
    let mut amounts: Vec<Decimal> = Vec::new();

    for caps in AMOUNT_MAGNITUDE_RE.captures_iter(text) {
        if let Some(value) = parse_amount(&caps[1]) {
            amounts.push(value * magnitude_multiplier(&caps[2]));
        }
    }
    for caps in AMOUNT_CURRENCY_RE.captures_iter(text) {
        if let Some(value) = parse_amount(&caps[1]) {
            amounts.push(value);
        }
    }
    for caps in AMOUNT_PREFIX_RE.captures_iter(text) {
        if let Some(value) = parse_amount(&caps[1]) {
            amounts.push(value);
        }
    }

    // Deduplicate and keep the largest first so callers have a
    // deterministic primary amount.
    amounts.sort_by(|a, b| b.cmp(a));
    amounts.dedup();
    amounts
}

fn extract_phones(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut phones = Vec::new();

    for caps in PHONE_RE.captures_iter(text) {
        let normalized: String = caps[1].chars().filter(char::is_ascii_digit).collect();
        let valid = (9..=10).contains(&normalized.len()) && normalized.starts_with('0');
        if valid && seen.insert(normalized.clone()) {
            phones.push(normalized);
        }
    }
    phones
}

fn extract_urls(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for m in URL_RE.find_iter(text) {
        // Trailing punctuation is almost always sentence structure, not URL.
        let url = m.as_str().trim_end_matches(['.', ',', ')', ']']).to_string();
        if seen.insert(url.clone()) {
            urls.push(url);
        }
    }
    urls
}

fn extract_external_ids(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for caps in EXTERNAL_ID_RE.captures_iter(text) {
        let id = caps[1].to_string();
        if seen.insert(id.clone()) {
            ids.push(id);
        }
    }
    ids
}

/// Extract structured signals from accumulated report text.
///
/// Four independent passes (amounts, phones, URLs, labeled ids) run over
/// the same text; results are deduplicated per field. Amounts come back
/// sorted descending; the other fields keep first-appearance order.
pub fn extract(text: &str) -> EntitySet {
    EntitySet {
        amounts: extract_amounts(text),
        phones: extract_phones(text),
        urls: extract_urls(text),
        external_ids: extract_external_ids(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn test_currency_suffixed_amount() {
        let set = extract("โอนไป 50,000 บาท เมื่อวาน");
        assert_eq!(set.amounts, vec![dec(50_000)]);
    }

    #[test]
    fn test_magnitude_words_multiply() {
        let set = extract("เสียหาย 5 ล้าน กับอีก 3แสน และ 2 หมื่น");
        assert_eq!(set.amounts, vec![dec(5_000_000), dec(300_000), dec(20_000)]);
    }

    #[test]
    fn test_prefix_and_baht_sign() {
        let set = extract("ราคา ฿2,500 หรือ 900฿");
        assert_eq!(set.amounts, vec![dec(2_500), dec(900)]);
    }

    #[test]
    fn test_bare_numbers_are_not_amounts() {
        // No currency suffix and no magnitude word: not monetary.
        let set = extract("เลขพัสดุ 123456 ครับ");
        assert!(set.amounts.is_empty());
    }

    #[test]
    fn test_phone_number_is_not_an_amount() {
        let set = extract("โอนเงิน 50000 บาท ให้ 0812345678 หลอกลวง");
        assert_eq!(set.amounts, vec![dec(50_000)]);
        assert_eq!(set.phones, vec!["0812345678".to_string()]);
    }

    #[test]
    fn test_dashed_phone_is_normalized() {
        let set = extract("ติดต่อ 081-234-5678 หรือ 02 123 4567");
        assert_eq!(
            set.phones,
            vec!["0812345678".to_string(), "021234567".to_string()]
        );
    }

    #[test]
    fn test_phone_requires_leading_zero() {
        let set = extract("บัญชี 9876543210 ธนาคาร");
        assert!(set.phones.is_empty());
    }

    #[test]
    fn test_phones_are_deduplicated() {
        let set = extract("เบอร์ 0812345678 ย้ำ 0812345678");
        assert_eq!(set.phones.len(), 1);
    }

    #[test]
    fn test_adjacent_phones_both_extracted() {
        let set = extract("0812345678 0899999999");
        assert_eq!(
            set.phones,
            vec!["0812345678".to_string(), "0899999999".to_string()]
        );
    }

    #[test]
    fn test_overlong_digit_run_rejected() {
        let set = extract("อ้างอิง 081234567890123");
        assert!(set.phones.is_empty());
    }

    #[test]
    fn test_url_extraction_trims_punctuation() {
        let set = extract("เข้าไปที่ https://scam-invest.example.com/promo. แล้วโดนหลอก");
        assert_eq!(set.urls, vec!["https://scam-invest.example.com/promo".to_string()]);
    }

    #[test]
    fn test_external_id_markers() {
        let set = extract("แอดไลน์ ID: somchai_99 หรือ ไอดี: @mule4");
        assert_eq!(
            set.external_ids,
            vec!["somchai_99".to_string(), "mule4".to_string()]
        );
    }

    #[test]
    fn test_id_label_not_matched_inside_word() {
        let set = extract("paid: 300");
        assert!(set.external_ids.is_empty());
    }

    #[test]
    fn test_non_positive_amounts_discarded() {
        let set = extract("เหลือ 0 บาท ในบัญชี");
        assert!(set.amounts.is_empty());
    }

    #[test]
    fn test_duplicate_amounts_collapse() {
        let set = extract("โอน 500 บาท แล้วก็อีก 500 บาท");
        assert_eq!(set.amounts, vec![dec(500)]);
    }

    #[test]
    fn test_extract_is_deterministic() {
        let text = "โอน 1,000,000 บาท ให้ 0899999999 ดู https://evil.example ID: ghost";
        assert_eq!(extract(text), extract(text));
    }

    #[test]
    fn test_empty_text() {
        assert!(extract("").is_empty());
    }
}
