//! Entity canonicalization
//!
//! Turns free-text merchant/entity descriptions into a stable grouping key.
//! The whole point of this function is grouping correctness: superficially
//! different descriptions of the same merchant (differing only in payment
//! prefixes, store numbers, dates, trailing IDs) must collapse to one
//! identical canonical string.
//!
//! The steps run in a fixed order, each operating on the previous step's
//! output. Date-like substrings and `#`/`*` marked IDs are stripped while
//! their separators still exist, because the punctuation pass destroys the
//! characters they depend on and leaves bare digits behind.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::Fact;

/// Grouping key used when a fact carries no usable entity information
pub const UNKNOWN_ENTITY_KEY: &str = "_unknown_";

/// Compiled patterns, built once per process and read-only afterwards
struct Patterns {
    date_with_separators: Regex,
    marked_id_run: Regex,
    non_word: Regex,
    bill_pay: Regex,
    metadata_tokens: Regex,
    p2p_prefix: Regex,
    entity_suffixes: Regex,
    store_loc_id: Regex,
    long_digit_run: Regex,
    trailing_digit_run: Regex,
    mmdd_run: Regex,
    trailing_noise_words: Regex,
    trailing_city_state: Regex,
    leading_article: Regex,
}

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| Patterns {
        // MM/DD or MM/DD/YYYY while the slashes are still intact
        date_with_separators: Regex::new(r"\b\d{1,2}/\d{1,2}(/\d{2,4})?\b")
            .expect("valid regex"),
        // "#12" / "*4821" style IDs, while the marker character still exists.
        // "STORE #1234" is taken as a unit so a bare "STORE" is not left
        // behind once the number goes.
        marked_id_run: Regex::new(r"\b(STORE|LOC)\s*#\s*\d+|[#*]\s*\d+")
            .expect("valid regex"),
        non_word: Regex::new(r"[^A-Z0-9]+").expect("valid regex"),
        bill_pay: Regex::new(r"\bBILL PAY\b").expect("valid regex"),
        metadata_tokens: Regex::new(
            r"\b(POS|DEBIT|ACH|VISA|MASTERCARD|AMEX|CHECKCARD|CHECK|CARD|RECURRING|AUTOPAY|PURCHASE|PYMT|WEB|ONLINE)\b",
        )
        .expect("valid regex"),
        // Only strips the service name when something follows it, so a bare
        // "ZELLE" reference is not wiped to empty. The regex crate has no
        // lookahead; the first character of the next token is captured and
        // kept in the replacement.
        p2p_prefix: Regex::new(r"\b(PAYPAL|VENMO|ZELLE|CASH APP)\s+(\S)").expect("valid regex"),
        // Anchored at the end and repeated, so chains like "CORP INC" go too
        entity_suffixes: Regex::new(r"(\s+(INC|LLC|LLP|CORP|CO|LTD|COMPANY|THE))+\s*$")
            .expect("valid regex"),
        store_loc_id: Regex::new(r"\b(STORE|LOC)\s+\d+\b").expect("valid regex"),
        long_digit_run: Regex::new(r"\b\d{5,}\b").expect("valid regex"),
        trailing_digit_run: Regex::new(r"\s\d{3,4}\s*$").expect("valid regex"),
        // Compact residual date fragments: YYYYMMDD falls to the long-run
        // rule; MMDD-shaped 4-digit runs need their own pattern
        mmdd_run: Regex::new(r"\b(0[1-9]|1[0-2])(0[1-9]|[12][0-9]|3[01])\b")
            .expect("valid regex"),
        trailing_noise_words: Regex::new(r"(\s+(LOC|BRANCH|LOCATION))+\s*$")
            .expect("valid regex"),
        trailing_city_state: Regex::new(
            r"\b[A-Z]{5,}\s+(AL|AK|AZ|AR|CA|CO|CT|DE|FL|GA|HI|ID|IL|IN|IA|KS|KY|LA|ME|MD|MA|MI|MN|MS|MO|MT|NE|NV|NH|NJ|NM|NY|NC|ND|OH|OK|OR|PA|RI|SC|SD|TN|TX|UT|VT|VA|WA|WV|WI|WY|DC)\s*$",
        )
        .expect("valid regex"),
        leading_article: Regex::new(r"^(THE|A|AN)\s+").expect("valid regex"),
    })
}

/// Canonicalize a raw entity description into a stable grouping key
///
/// Returns `None` when nothing meaningful remains: empty, shorter than two
/// characters, or purely numeric.
pub fn canonicalize(raw: &str) -> Option<String> {
    let p = patterns();

    let mut s = raw.to_uppercase();

    // Dates and marked IDs first, while their separators and markers survive
    s = p.date_with_separators.replace_all(&s, " ").into_owned();
    s = p.marked_id_run.replace_all(&s, " ").into_owned();

    // Possessives fold into plain S, then punctuation becomes spaces
    s = s.replace("'S", "S");
    s = p.non_word.replace_all(&s, " ").into_owned();

    // Transaction metadata: the compound phrase before the single tokens
    s = p.bill_pay.replace_all(&s, " ").into_owned();
    s = p.metadata_tokens.replace_all(&s, " ").into_owned();

    // P2P service prefixes, only when a merchant follows
    s = p.p2p_prefix.replace_all(&s, "$2").into_owned();

    // Business-entity suffixes anchored at the end
    s = p.entity_suffixes.replace_all(&s, "").into_owned();

    // Location/ID noise: STORE 1234, LOC 2, long digit runs, trailing IDs
    s = p.store_loc_id.replace_all(&s, " ").into_owned();
    s = p.long_digit_run.replace_all(&s, " ").into_owned();
    s = p.trailing_digit_run.replace_all(&s, " ").into_owned();

    // Residual compact date fragments
    s = p.mmdd_run.replace_all(&s, " ").into_owned();

    // Trailing noise words and "CITY ST" pairs
    s = p.trailing_noise_words.replace_all(&s, "").into_owned();
    s = p.trailing_city_state.replace_all(&s, "").into_owned();

    // Final cleanup: collapse whitespace, strip a leading article
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    let s = p.leading_article.replace(&collapsed, "").into_owned();
    let s = s.trim().to_string();

    if s.len() < 2 || s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some(s)
}

/// Grouping key for a fact: canonical form, then raw text, then display name
pub fn entity_key(fact: &Fact) -> String {
    fact.entity_canonical
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(fact.entity_raw.as_deref().filter(|s| !s.is_empty()))
        .or(fact.entity_name.as_deref().filter(|s| !s.is_empty()))
        .unwrap_or(UNKNOWN_ENTITY_KEY)
        .to_string()
}

/// Fill in `entity_canonical` for every fact that has raw text to derive it
/// from. Facts are otherwise untouched.
pub fn canonicalize_facts(facts: &[Fact]) -> Vec<Fact> {
    facts
        .iter()
        .map(|f| {
            let mut fact = f.clone();
            if fact.entity_canonical.is_none() {
                let source = fact
                    .entity_raw
                    .as_deref()
                    .or(fact.entity_name.as_deref());
                fact.entity_canonical = source.and_then(canonicalize);
            }
            fact
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouping_variants_collapse() {
        let variants = [
            "WALMART",
            "WALMART STORE #1234",
            "POS DEBIT WALMART",
            "CHECKCARD WALMART 5678",
            "WALMART INC",
        ];
        for v in variants {
            assert_eq!(canonicalize(v).as_deref(), Some("WALMART"), "input: {v}");
        }
    }

    #[test]
    fn test_distinctness_preserved() {
        assert_ne!(canonicalize("AMAZON"), canonicalize("AMAZON PRIME"));
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "POS DEBIT NETFLIX.COM 02/15",
            "ZELLE PAYMENT TO LANDLORD 8812",
            "Joe's Coffee Shop STORE #12",
            "ACME CORP INC",
        ];
        for input in inputs {
            if let Some(once) = canonicalize(input) {
                assert_eq!(canonicalize(&once).as_deref(), Some(once.as_str()));
            }
        }
    }

    #[test]
    fn test_dates_stripped_before_punctuation() {
        assert_eq!(
            canonicalize("NETFLIX 01/15/2024").as_deref(),
            Some("NETFLIX")
        );
        assert_eq!(canonicalize("SPOTIFY 3/7").as_deref(), Some("SPOTIFY"));
    }

    #[test]
    fn test_possessive_folding() {
        assert_eq!(
            canonicalize("Joe's Coffee"),
            canonicalize("JOES COFFEE")
        );
    }

    #[test]
    fn test_p2p_prefix_needs_follower() {
        // Service prefix with a merchant after it gets stripped
        assert_eq!(canonicalize("VENMO ACME LAWN").as_deref(), Some("ACME LAWN"));
        // A bare reference survives
        assert_eq!(canonicalize("ZELLE").as_deref(), Some("ZELLE"));
    }

    #[test]
    fn test_chained_suffixes() {
        assert_eq!(canonicalize("ACME CORP INC").as_deref(), Some("ACME"));
        assert_eq!(canonicalize("ACME CO").as_deref(), Some("ACME"));
        // Suffix letters inside a word are left alone
        assert_eq!(canonicalize("COSTCO").as_deref(), Some("COSTCO"));
    }

    #[test]
    fn test_city_state_stripping() {
        assert_eq!(
            canonicalize("STARBUCKS SEATTLE WA").as_deref(),
            Some("STARBUCKS")
        );
        // Short city token: not stripped (too risky)
        assert_eq!(
            canonicalize("STARBUCKS KENT WA").as_deref(),
            Some("STARBUCKS KENT WA")
        );
    }

    #[test]
    fn test_compact_date_fragments() {
        assert_eq!(canonicalize("HULU 20240115").as_deref(), Some("HULU"));
        assert_eq!(canonicalize("HULU 0115").as_deref(), Some("HULU"));
    }

    #[test]
    fn test_marked_ids_stripped_anywhere() {
        // Marker + digits goes even without a STORE/LOC keyword
        assert_eq!(canonicalize("WALMART #12").as_deref(), Some("WALMART"));
        assert_eq!(canonicalize("NETFLIX *4821").as_deref(), Some("NETFLIX"));
        // Mid-string IDs leave no orphan digits behind
        assert_eq!(
            canonicalize("ACME #123 MARKET").as_deref(),
            Some("ACME MARKET")
        );
    }

    #[test]
    fn test_nothing_meaningful_is_none() {
        assert_eq!(canonicalize(""), None);
        assert_eq!(canonicalize("  #123  "), None);
        assert_eq!(canonicalize("POS DEBIT"), None);
        assert_eq!(canonicalize("X"), None);
    }

    #[test]
    fn test_leading_article() {
        assert_eq!(canonicalize("THE HOME DEPOT").as_deref(), Some("HOME DEPOT"));
    }

    #[test]
    fn test_entity_key_fallback_chain() {
        let mut fact = crate::test_utils::FactBuilder::payment("x1").build();
        fact.entity_canonical = Some("ACME".into());
        fact.entity_raw = Some("raw".into());
        assert_eq!(entity_key(&fact), "ACME");

        fact.entity_canonical = None;
        assert_eq!(entity_key(&fact), "raw");

        fact.entity_raw = None;
        fact.entity_name = None;
        assert_eq!(entity_key(&fact), UNKNOWN_ENTITY_KEY);
    }
}
