//! Denylist content filter. Runs before any embedding or generation call.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Offensive terms and phrases. Matched case-insensitively on word boundaries.
const DENYLIST: &[&str] = &[
    "asshole",
    "ass",
    "bastard",
    "bitch",
    "bullshit",
    "crap",
    "cunt",
    "damn you",
    "dickhead",
    "dumbass",
    "fuck",
    "fucking",
    "fucker",
    "go to hell",
    "idiot",
    "kill yourself",
    "moron",
    "motherfucker",
    "piss off",
    "retard",
    "shit",
    "shut up",
    "slut",
    "twat",
    "whore",
];

const REFUSALS: &[&str] = &[
    "I'm here to help you find great books! Please keep our conversation friendly and respectful. What kind of book are you looking for?",
    "Let's keep our chat positive! I'd love to recommend some amazing books. What genres or themes interest you?",
    "I'm designed to help with book recommendations in a friendly environment. What type of story are you in the mood for?",
    "I prefer to keep our conversation respectful. How about we talk about books instead? What's your favorite genre?",
    "Let's focus on finding you some great reading material! What kind of books do you usually enjoy?",
];

static DEFAULT_FILTER: LazyLock<ContentFilter> = LazyLock::new(|| ContentFilter::new(&[]));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterVerdict {
    pub blocked: bool,
    pub matched_terms: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct ContentFilter {
    pattern: Regex,
}

impl ContentFilter {
    /// Builds a filter over the built-in denylist plus `extra_terms`.
    pub fn new(extra_terms: &[String]) -> Self {
        let mut terms: Vec<String> = DENYLIST.iter().map(|t| t.to_string()).collect();
        for term in extra_terms {
            let term = term.trim().to_lowercase();
            if !term.is_empty() && !terms.contains(&term) {
                terms.push(term);
            }
        }
        // Longest first so alternation prefers "fucking" over "fuck".
        terms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let alternation = terms
            .iter()
            .map(|t| {
                t.split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
            .expect("escaped denylist always forms a valid regex");

        Self { pattern }
    }

    pub fn shared() -> &'static ContentFilter {
        &DEFAULT_FILTER
    }

    pub fn classify(&self, text: &str) -> FilterVerdict {
        let matched_terms: BTreeSet<String> = self
            .pattern
            .find_iter(text)
            .map(|m| canonical(m.as_str()))
            .collect();
        FilterVerdict {
            blocked: !matched_terms.is_empty(),
            matched_terms,
        }
    }

    /// A friendly refusal, chosen deterministically from the message.
    pub fn refusal(&self, text: &str) -> &'static str {
        let seed: usize = text.bytes().map(usize::from).sum();
        REFUSALS[seed % REFUSALS.len()]
    }
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::shared().clone()
    }
}

fn canonical(matched: &str) -> String {
    matched
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_denylisted_words() {
        let filter = ContentFilter::default();
        for msg in ["you are an IDIOT", "Shit, what now?", "this is bullshit!", "ass"] {
            assert!(filter.classify(msg).blocked, "expected block: {msg}");
        }
    }

    #[test]
    fn test_word_boundaries_protect_benign_words() {
        let filter = ContentFilter::default();
        for msg in [
            "Recommend a classic novel",
            "A thriller about an assassin",
            "Books set in Scunthorpe or Essex",
            "Something like Dickens",
            "a shitake mushroom cookbook",
            "Mississippi river stories",
        ] {
            let verdict = filter.classify(msg);
            assert!(!verdict.blocked, "unexpected block: {msg} -> {:?}", verdict);
            assert!(verdict.matched_terms.is_empty());
        }
    }

    #[test]
    fn test_matched_terms_are_canonical() {
        let filter = ContentFilter::default();
        let verdict = filter.classify("Shut   UP you Moron");
        assert!(verdict.blocked);
        let expected: BTreeSet<String> = ["moron", "shut up"].iter().map(|s| s.to_string()).collect();
        assert_eq!(verdict.matched_terms, expected);
    }

    #[test]
    fn test_prefers_longest_term() {
        let verdict = ContentFilter::default().classify("what the fucking hell");
        assert!(verdict.matched_terms.contains("fucking"));
        assert!(!verdict.matched_terms.contains("fuck"));
    }

    #[test]
    fn test_extra_terms_extend_denylist() {
        let filter = ContentFilter::new(&["Nitwit".to_string(), "  ".to_string()]);
        assert!(filter.classify("what a nitwit").blocked);
        assert!(filter.classify("idiot").blocked);
        assert!(!ContentFilter::default().classify("what a nitwit").blocked);
    }

    #[test]
    fn test_refusal_is_deterministic() {
        let filter = ContentFilter::default();
        let a = filter.refusal("you idiot");
        assert_eq!(a, filter.refusal("you idiot"));
        assert!(REFUSALS.contains(&a));
    }
}
