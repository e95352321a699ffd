//! Exclusion classification for non-merchant transactions
//!
//! Transfers, card payments, and bank fees generate embarrassing false
//! positives in the bank-mode pattern detectors ("new recurring charge:
//! CREDIT CARD AUTOPAY"), so they are filtered out of those detectors.
//! Duplicate detection deliberately ignores this list; a duplicated
//! transfer is still worth flagging.
//!
//! The rules run in priority order and the first match wins. The
//! merchant-indicator override comes first: hiding a real merchant is worse
//! than letting a transfer through, so a known merchant name beats every
//! exclusion pattern below it.

/// Why an entity was excluded, with the pattern that matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub reason: &'static str,
    pub pattern: String,
}

/// Known real-merchant indicators. A hit here overrides all exclusion rules.
const MERCHANT_INDICATORS: &[&str] = &[
    "AMAZON", "NETFLIX", "SPOTIFY", "STARBUCKS", "WALMART", "TARGET", "COSTCO",
    "UBER", "LYFT", "APPLE", "GOOGLE", "HULU", "DISNEY", "MCDONALD", "CHIPOTLE",
    "DOORDASH", "GRUBHUB", "SHELL", "CHEVRON", "CVS", "WALGREENS", "KROGER",
    "SAFEWAY", "HOME DEPOT", "LOWES", "BEST BUY", "VERIZON", "COMCAST",
    "T MOBILE", "ATT",
];

/// Strong P2P/transfer service keywords
const P2P_PATTERNS: &[&str] = &[
    "ZELLE", "VENMO", "CASH APP", "CASHAPP", "MONEYGRAM", "WESTERN UNION",
    "WIRE TRANSFER", "PAYPAL TRANSFER",
];

/// Credit-card payment patterns
const CARD_PAYMENT_PATTERNS: &[&str] = &[
    "AUTOPAY", "AUTO PAY", "MINIMUM PAYMENT", "BILL PAY TO", "CARD PAYMENT",
    "CARDMEMBER", "CREDIT CRD", "EPAY",
];

/// Bank fee/service patterns
const BANK_SERVICE_PATTERNS: &[&str] = &[
    "OVERDRAFT", "NSF FEE", "NSF", "MONTHLY FEE", "SERVICE FEE",
    "MAINTENANCE FEE", "INTEREST CHARGE", "ATM FEE", "WIRE FEE",
    "RETURNED ITEM",
];

/// Weak transfer words: only excluded when they dominate the string
const WEAK_TRANSFER_WORDS: &[&str] = &["PAYMENT", "TRANSFER", "ACH", "WIRE"];

/// A canonical string at or below this length counts as "short" for the
/// weak-transfer rule
const WEAK_SHORT_STRING_MAX: usize = 12;

/// How much longer than the weak word the string may be and still count as
/// "barely longer than the word"
const WEAK_WORD_SLACK: usize = 4;

/// Whether `phrase` appears in `text` as a run of whole words
///
/// Plain substring matching is wrong here: short patterns like "NSF" would
/// fire inside unrelated words ("TRANSFER" contains "NSF").
fn contains_phrase(text: &str, phrase: &str) -> bool {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let wanted: Vec<&str> = phrase.split_whitespace().collect();
    if wanted.is_empty() || tokens.len() < wanted.len() {
        return false;
    }
    tokens.windows(wanted.len()).any(|w| w == wanted.as_slice())
}

/// Classify an entity as excluded (non-merchant) or not
///
/// `canonical` is the canonical entity key; `raw` is the original statement
/// text, used only by the weak-transfer rule for directional context.
pub fn classify(canonical: &str, raw: Option<&str>) -> Option<Exclusion> {
    let text = canonical.to_uppercase();

    // Rule 1: real-merchant override beats everything. Substring matching is
    // deliberate here; the override is meant to be broad ("MCDONALD" covers
    // "MCDONALDS") and a spurious hit only lets a transfer through.
    if MERCHANT_INDICATORS.iter().any(|m| text.contains(m)) {
        return None;
    }

    // Rules 2-4 match whole words only
    // Rule 2: strong P2P keywords
    if let Some(p) = P2P_PATTERNS.iter().find(|p| contains_phrase(&text, p)) {
        return Some(Exclusion {
            reason: "P2P transfer service",
            pattern: (*p).to_string(),
        });
    }

    // Rule 3: card-payment patterns
    if let Some(p) = CARD_PAYMENT_PATTERNS.iter().find(|p| contains_phrase(&text, p)) {
        return Some(Exclusion {
            reason: "Credit card payment",
            pattern: (*p).to_string(),
        });
    }

    // Rule 4: bank fee/service patterns
    if let Some(p) = BANK_SERVICE_PATTERNS.iter().find(|p| contains_phrase(&text, p)) {
        return Some(Exclusion {
            reason: "Bank fee/service",
            pattern: (*p).to_string(),
        });
    }

    // Rule 5: weak transfer words, only when they dominate the string.
    // The word must start the string AND one of: the whole string is short,
    // the string is barely longer than the word, or the raw text shows
    // directional context ("TO "/"FROM ") or trailing account digits.
    for word in WEAK_TRANSFER_WORDS {
        if !text.starts_with(word) {
            continue;
        }
        let short = text.len() <= WEAK_SHORT_STRING_MAX;
        let barely_longer = text.len() <= word.len() + WEAK_WORD_SLACK;
        let raw_context = raw.map(has_transfer_context).unwrap_or(false);
        if short || barely_longer || raw_context {
            return Some(Exclusion {
                reason: "Transfer/payment",
                pattern: (*word).to_string(),
            });
        }
    }

    None
}

/// Convenience wrapper when the reason doesn't matter
pub fn is_excluded(canonical: &str, raw: Option<&str>) -> bool {
    classify(canonical, raw).is_some()
}

/// Directional context in raw statement text: "TO "/"FROM " or a trailing
/// account-number digit run
fn has_transfer_context(raw: &str) -> bool {
    let upper = raw.to_uppercase();
    if upper.contains("TO ") || upper.contains("FROM ") {
        return true;
    }
    let trailing_digits = upper
        .trim_end()
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .count();
    trailing_digits >= 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merchant_indicator_overrides_everything() {
        // "AMAZON PAYMENT" contains a weak transfer word but is a merchant
        assert!(classify("AMAZON PAYMENT", None).is_none());
        // Even strong P2P context loses to a merchant indicator
        assert!(classify("NETFLIX VIA ZELLE", None).is_none());
    }

    #[test]
    fn test_p2p_excluded() {
        let e = classify("ZELLE JOHN SMITH", None).unwrap();
        assert_eq!(e.reason, "P2P transfer service");
        assert_eq!(e.pattern, "ZELLE");
    }

    #[test]
    fn test_card_payment_excluded() {
        let e = classify("CHASE AUTOPAY", None).unwrap();
        assert_eq!(e.reason, "Credit card payment");
    }

    #[test]
    fn test_bank_fee_excluded() {
        let e = classify("OVERDRAFT PROTECTION", None).unwrap();
        assert_eq!(e.reason, "Bank fee/service");
    }

    #[test]
    fn test_weak_word_alone_excluded() {
        // "TRANSFER" is the whole string: dominated
        assert!(is_excluded("TRANSFER", None));
        assert!(is_excluded("ACH", None));
    }

    #[test]
    fn test_weak_word_short_string_excluded() {
        // Starts with the word and the whole string is short
        assert!(is_excluded("TRANSFER IN", None));
    }

    #[test]
    fn test_weak_word_with_raw_context_excluded() {
        assert!(is_excluded(
            "PAYMENT LANDLORD PROPERTIES",
            Some("PAYMENT TO LANDLORD PROPERTIES")
        ));
        assert!(is_excluded(
            "TRANSFER SAVINGS ACCOUNT",
            Some("TRANSFER SAVINGS ACCOUNT 00001234")
        ));
    }

    #[test]
    fn test_patterns_match_whole_words_only() {
        // "TRANSFER" contains "NSF" as a substring; only the weak-transfer
        // rule should fire, not the bank-fee rule
        assert_eq!(classify("TRANSFER", None).unwrap().reason, "Transfer/payment");
        // "BRANSFORD" also embeds "NSF" and must not match at all
        assert!(classify("BRANSFORD GARAGE", None).is_none());
        // Standalone tokens still match
        assert_eq!(classify("NSF", None).unwrap().reason, "Bank fee/service");
        assert_eq!(
            classify("NSF FEE REVERSAL", None).unwrap().pattern,
            "NSF FEE"
        );
    }

    #[test]
    fn test_weak_word_in_long_merchant_not_excluded() {
        // Long string, no directional raw context: let it through
        assert!(!is_excluded("PAYMENT PROCESSING SOLUTIONS GROUP", None));
        // Weak word not at the start: never excluded
        assert!(!is_excluded("ACME TRANSFER PRINTING", None));
    }
}
