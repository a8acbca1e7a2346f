//! Heuristic PII obfuscation for displayed text.
//!
//! Three pattern passes run in a fixed order over the progressively
//! redacted string: emails, then phone numbers, then two-word capitalized
//! names. Replacement tokens are all-caps in brackets, so no later pass can
//! match them.
//!
//! This is best-effort redaction. It misses names that are not two
//! capitalized ASCII words, phone numbers in other layouts, and anything
//! else that does not look like the patterns below. Callers must not treat
//! an enabled obfuscator as a compliance guarantee. The stored
//! `pii_tokens_redacted` counters assume exactly this heuristic, so it is
//! kept as-is rather than strengthened.

use crate::error::{DashError, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

pub const EMAIL_TOKEN: &str = "[EMAIL]";
pub const PHONE_TOKEN: &str = "[PHONE]";
pub const NAME_TOKEN: &str = "[NAME]";

/// Pre-compiled PII patterns.
///
/// Word boundaries are ASCII-only, so a non-ASCII letter right after a
/// match (as in "Doeé") still ends the word.
pub struct PiiPatterns;

impl PiiPatterns {
    /// Email-like: local part, `@`, dotted domain, 2+ letter suffix.
    pub fn email() -> &'static Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?-u:\b)[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}(?-u:\b)")
                .expect("Valid email regex")
        });
        &PATTERN
    }

    /// Phone-like: 3 digits, optional `-`/`.`, 3 digits, optional `-`/`.`, 4 digits.
    pub fn phone() -> &'static Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?-u:\b)[0-9]{3}[-.]?[0-9]{3}[-.]?[0-9]{4}(?-u:\b)")
                .expect("Valid phone regex")
        });
        &PATTERN
    }

    /// A run of two or more capitalized words separated by single spaces.
    pub fn capitalized_run() -> &'static Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?-u:\b)[A-Z][a-z]+(?: [A-Z][a-z]+)+(?-u:\b)")
                .expect("Valid name regex")
        });
        &PATTERN
    }
}

/// Redacted text together with how many tokens of each kind were replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redaction {
    pub text: String,
    pub emails: usize,
    pub phones: usize,
    pub names: usize,
}

impl Redaction {
    /// Total number of replaced tokens.
    pub fn total(&self) -> usize {
        self.emails + self.phones + self.names
    }
}

/// Run all three passes over `text`.
pub fn redact(text: &str) -> Redaction {
    let emails = PiiPatterns::email().find_iter(text).count();
    let text = PiiPatterns::email().replace_all(text, EMAIL_TOKEN);

    let phones = PiiPatterns::phone().find_iter(&text).count();
    let text = PiiPatterns::phone().replace_all(&text, PHONE_TOKEN);

    let mut names = 0;
    let text = PiiPatterns::capitalized_run().replace_all(&text, |caps: &Captures<'_>| {
        let (kept, pairs) = pair_names(&caps[0]);
        names += pairs;
        kept
    });

    let redaction = Redaction {
        text: text.into_owned(),
        emails,
        phones,
        names,
    };
    debug!(
        "Redacted {} PII tokens ({} email, {} phone, {} name)",
        redaction.total(),
        redaction.emails,
        redaction.phones,
        redaction.names
    );
    redaction
}

/// Replace consecutive word pairs in a capitalized run with name tokens.
///
/// Pairs are aligned to the end of the run, so an odd leading word (usually
/// a capitalized sentence opener such as "Contact") is left in place.
fn pair_names(run: &str) -> (String, usize) {
    let words: Vec<&str> = run.split(' ').collect();
    let lead = words.len() % 2;
    let pairs = (words.len() - lead) / 2;

    let mut parts: Vec<&str> = words[..lead].to_vec();
    parts.extend(std::iter::repeat(NAME_TOKEN).take(pairs));

    (parts.join(" "), pairs)
}

/// Obfuscate `text` when `enabled`, otherwise return it unchanged.
pub fn obfuscate(text: &str, enabled: bool) -> String {
    if !enabled {
        return text.to_string();
    }
    redact(text).text
}

/// Obfuscate a loosely typed value, rejecting anything that is not a string.
pub fn obfuscate_value(value: Option<&Value>, enabled: bool) -> Result<String> {
    match value {
        Some(Value::String(text)) => Ok(obfuscate(text, enabled)),
        Some(Value::Null) | None => Err(DashError::InvalidInput(
            "cannot obfuscate a null value".to_string(),
        )),
        Some(other) => Err(DashError::InvalidInput(format!(
            "cannot obfuscate a non-string value: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contact_example() {
        assert_eq!(
            obfuscate("Contact Jane Doe at jane@example.com or 555-123-4567", true),
            "Contact [NAME] at [EMAIL] or [PHONE]"
        );
    }

    #[test]
    fn test_disabled_returns_input_unchanged() {
        let samples = [
            "",
            "Contact Jane Doe at jane@example.com or 555-123-4567",
            "no pii here",
            "Ünïcödé Text 555.123.4567",
        ];
        for text in samples {
            assert_eq!(obfuscate(text, false), text);
        }
    }

    #[test]
    fn test_email_variants() {
        assert_eq!(
            obfuscate("mail first.last+tag@mail.example.co.uk now", true),
            "mail [EMAIL] now"
        );
        assert_eq!(
            obfuscate("user@localhost is not matched", true),
            "user@localhost is not matched"
        );
    }

    #[test]
    fn test_phone_variants() {
        assert_eq!(obfuscate("call 555.123.4567", true), "call [PHONE]");
        assert_eq!(obfuscate("call 5551234567", true), "call [PHONE]");
        assert_eq!(obfuscate("call 555-1234567", true), "call [PHONE]");
        // Too long to be a whole-word match
        assert_eq!(obfuscate("id 55512345678", true), "id 55512345678");
    }

    #[test]
    fn test_name_runs() {
        assert_eq!(obfuscate("Jane Doe", true), "[NAME]");
        assert_eq!(obfuscate("met Jane Doe today", true), "met [NAME] today");
        assert_eq!(obfuscate("Ask Mary Smith", true), "Ask [NAME]");
        assert_eq!(obfuscate("Meet Mary Ann Smith", true), "[NAME] [NAME]");
        // Single capitalized words and all-caps words are left alone
        assert_eq!(obfuscate("Hello world", true), "Hello world");
        assert_eq!(obfuscate("NASA Launch", true), "NASA Launch");
    }

    #[test]
    fn test_boundaries_are_ascii() {
        assert_eq!(obfuscate("Jane Doeé", true), "[NAME]é");
        assert_eq!(obfuscate("555-123-4567é", true), "[PHONE]é");
        assert_eq!(obfuscate("jane@example.comé", true), "[EMAIL]é");
        assert_eq!(obfuscate("éJane Doe", true), "é[NAME]");
    }

    #[test]
    fn test_tokens_are_not_rematched() {
        let out = obfuscate("Reach Bob Stone via bob.stone@corp.io", true);
        assert_eq!(out, "Reach [NAME] via [EMAIL]");
        assert_eq!(obfuscate(&out, true), out);
    }

    #[test]
    fn test_redaction_counts() {
        let redaction = redact("Jane Doe: jane@example.com, 555-123-4567, 555.987.6543");
        assert_eq!(redaction.emails, 1);
        assert_eq!(redaction.phones, 2);
        assert_eq!(redaction.names, 1);
        assert_eq!(redaction.total(), 4);
        assert_eq!(redaction.text, "[NAME]: [EMAIL], [PHONE], [PHONE]");
    }

    #[test]
    fn test_obfuscate_value_rejects_non_strings() {
        assert_eq!(
            obfuscate_value(Some(&json!("Jane Doe")), true).unwrap(),
            "[NAME]"
        );
        assert!(matches!(
            obfuscate_value(None, true),
            Err(DashError::InvalidInput(_))
        ));
        assert!(matches!(
            obfuscate_value(Some(&Value::Null), false),
            Err(DashError::InvalidInput(_))
        ));
        assert!(matches!(
            obfuscate_value(Some(&json!(42)), true),
            Err(DashError::InvalidInput(_))
        ));
    }
}
