//! Heuristics that separate body text from page furniture.
//!
//! OCR output is full of running headers, bullet labels, stamps and numbering
//! that carry no meaning on their own. Everything here is a pure function over
//! `&str`; none of it ever fails.

use regex::Regex;
use std::sync::LazyLock;

pub const MIN_CHUNK_CHAR_LEN: usize = 30;
pub const MIN_CHUNK_WORDS: usize = 5;
pub const MIN_ALPHA_RATIO: f64 = 0.3;
const MAX_HEADING_WORDS: usize = 6;

const BULLET_PATTERN: &str = r"^(?:[-*•]\s|\d+\s*[.)\-]\s)";
/// Letter categories only (Lu, Ll, Lt, Lm, Lo); combining vowel signs are
/// marks and do not count.
const LETTER_PATTERN: &str = r"\p{L}";

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(BULLET_PATTERN).expect("bullet pattern is valid"));
static LETTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(LETTER_PATTERN).expect("letter pattern is valid"));

fn starts_with_bullet(text: &str) -> bool {
    BULLET_RE.is_match(text)
}

/// Collapses every whitespace run to one space and trims both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn is_mostly_non_alpha(text: &str) -> bool {
    if text.is_empty() {
        return true;
    }

    let total = text.chars().count();
    let letters = LETTER_RE.find_iter(text).count();
    (letters as f64 / total.max(1) as f64) < MIN_ALPHA_RATIO
}

pub fn looks_like_heading(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() <= 2 {
        return true;
    }

    if starts_with_bullet(trimmed) {
        return true;
    }

    if trimmed.ends_with(':') {
        return true;
    }

    word_count(trimmed) <= MAX_HEADING_WORDS
        && (is_all_uppercase(trimmed) || trimmed == title_case(trimmed))
        && !trimmed.contains('.')
        && !trimmed.contains('?')
}

/// True for text that should never reach an index or a prompt.
///
/// The short-text exemption only covers the character-length gate: a short
/// sentence still has to clear the word-count, alphabetic and heading checks.
pub fn is_low_value(text: &str) -> bool {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return true;
    }

    let words = word_count(&normalized);
    if normalized.chars().count() < MIN_CHUNK_CHAR_LEN {
        let sentence_shaped =
            (normalized.contains('.') || normalized.contains('?')) && words >= MIN_CHUNK_WORDS;
        if !sentence_shaped {
            return true;
        }
    }

    words < MIN_CHUNK_WORDS || is_mostly_non_alpha(&normalized) || looks_like_heading(&normalized)
}

/// At least one cased character and no lowercase ones.
fn is_all_uppercase(text: &str) -> bool {
    let mut saw_cased = false;
    for ch in text.chars() {
        if ch.is_lowercase() {
            return false;
        }
        if ch.is_uppercase() {
            saw_cased = true;
        }
    }
    saw_cased
}

/// Uppercases the first cased character of every cased run and lowercases the
/// rest, so `"TENANT's duty"` becomes `"Tenant'S Duty"`.
fn title_case(text: &str) -> String {
    let mut titled = String::with_capacity(text.len());
    let mut previous_cased = false;

    for ch in text.chars() {
        let cased = ch.is_uppercase() || ch.is_lowercase();
        if previous_cased {
            titled.extend(ch.to_lowercase());
        } else {
            titled.extend(ch.to_uppercase());
        }
        previous_cased = cased;
    }

    titled
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn whitespace_is_normalized() {
        assert_eq!(normalize_whitespace("A  \t  lot\nof   spacing "), "A lot of spacing");
        assert_eq!(normalize_whitespace(""), "");
        assert_eq!(normalize_whitespace(" \n\t "), "");
    }

    #[test]
    fn non_alpha_ratio_threshold() {
        assert!(is_mostly_non_alpha(""));
        assert!(is_mostly_non_alpha("12/04/2023 - 45,000.00"));
        assert!(!is_mostly_non_alpha("Rent is due on the 5th"));
    }

    #[test]
    fn patterns_compile() {
        assert!(Regex::new(BULLET_PATTERN).is_ok());
        assert!(Regex::new(LETTER_PATTERN).is_ok());
    }

    #[test]
    fn combining_vowel_signs_are_not_letters() {
        // "किराया" is three letters and three vowel signs.
        assert_eq!(LETTER_RE.find_iter("किराया").count(), 3);
        // 3 letters in 15 chars; counting the signs would give 6 and pass.
        assert!(is_mostly_non_alpha("किराया 12345678"));
    }

    #[test]
    fn headings_are_detected() {
        assert!(looks_like_heading(""));
        assert!(looks_like_heading("ab"));
        assert!(looks_like_heading("- tenant pays for water and electricity"));
        assert!(looks_like_heading("• deposit"));
        assert!(looks_like_heading("12. the landlord may inspect the premises"));
        assert!(looks_like_heading("3 ) subletting is prohibited for all parties"));
        assert!(looks_like_heading("the following terms apply:"));
        assert!(looks_like_heading("RENTAL AGREEMENT"));
        assert!(looks_like_heading("Schedule Of Payments"));
    }

    #[test]
    fn sentences_are_not_headings() {
        assert!(!looks_like_heading("The tenant shall pay rent monthly."));
        assert!(!looks_like_heading("Who Pays The Deposit?"));
        assert!(!looks_like_heading("the tenant must keep the premises clean"));
        assert!(!looks_like_heading(
            "This Agreement Is Made Between The Owner And The Tenant Named Below"
        ));
    }

    #[test]
    fn title_case_follows_cased_runs() {
        assert_eq!(title_case("TENANT's duty"), "Tenant'S Duty");
        assert_eq!(title_case("1st floor"), "1St Floor");
    }

    #[test]
    fn short_sentences_pass_char_gate() {
        // 28 chars, ends with a period and has seven words.
        assert!(!is_low_value("The rent is due on day five."));
    }

    #[test]
    fn short_fragments_are_low_value() {
        assert!(is_low_value("Page 3 of 12"));
        assert!(is_low_value("Signed and sealed by"));
        assert!(is_low_value(""));
    }

    #[test]
    fn word_gate_applies_to_long_text() {
        assert!(is_low_value("Notwithstanding-anything-contained-herein"));
    }

    #[test]
    fn numeric_and_heading_lines_are_low_value() {
        assert!(is_low_value("45,000.00 12/04/2023 99-88-77 11 22 33 44"));
        assert!(is_low_value("TERMS AND CONDITIONS OF THE LEASE"));
        assert!(is_low_value("1. the tenant shall pay the rent on time every month"));
    }

    #[test]
    fn body_text_is_kept() {
        assert!(!is_low_value(
            "The tenant shall pay the monthly rent on or before the fifth day of each month."
        ));
    }

    #[test]
    fn paragraph_concatenation_fragment_is_rejected() {
        assert!(is_low_value("Hello data"));
        assert!(is_low_value("Hellod ext"));
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(input in "\\PC*") {
            let once = normalize_whitespace(&input);
            prop_assert_eq!(normalize_whitespace(&once), once.clone());
        }

        #[test]
        fn accepted_text_meets_every_gate(input in "[A-Za-z .?:\\-0-9\n]{0,80}") {
            if !is_low_value(&input) {
                let normalized = normalize_whitespace(&input);
                let words = word_count(&normalized);
                prop_assert!(words >= MIN_CHUNK_WORDS);
                prop_assert!(!is_mostly_non_alpha(&normalized));
                prop_assert!(!looks_like_heading(&normalized));
                prop_assert!(
                    normalized.chars().count() >= MIN_CHUNK_CHAR_LEN
                        || ((normalized.contains('.') || normalized.contains('?'))
                            && words >= MIN_CHUNK_WORDS)
                );
            }
        }
    }
}
