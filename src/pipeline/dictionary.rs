use regex::{NoExpand, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A user-defined phrase to replacement mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub phrase: String,
    pub replacement: String,
}

/// Apply dictionary entries to `text`, in entry order.
///
/// Matching is case-insensitive and whole-word: the phrase must be bounded by
/// word boundaries on both sides, so "AI" does not match inside "MAIL". The
/// phrase is escaped before compiling, and the replacement is inserted
/// literally rather than interpreted as a template.
///
/// Substitution is sequential: each entry operates on the text already
/// transformed by the entries before it, so a replacement can itself be
/// matched by a later entry's phrase.
pub fn apply_dictionary(text: &str, entries: &[DictionaryEntry]) -> String {
    let mut out = text.to_string();

    for entry in entries {
        // An empty phrase would compile to a pattern matching every word
        // boundary.
        if entry.phrase.trim().is_empty() {
            continue;
        }

        let pattern = format!(r"\b{}\b", regex::escape(&entry.phrase));
        let re = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(re) => re,
            Err(e) => {
                warn!("skipping unusable dictionary phrase {:?}: {}", entry.phrase, e);
                continue;
            }
        };

        out = re.replace_all(&out, NoExpand(&entry.replacement)).into_owned();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(phrase: &str, replacement: &str) -> DictionaryEntry {
        DictionaryEntry {
            phrase: phrase.to_string(),
            replacement: replacement.to_string(),
        }
    }

    #[test]
    fn respects_word_boundaries() {
        let entries = vec![entry("AI", "artificial intelligence")];
        assert_eq!(
            apply_dictionary("I love AI and mail", &entries),
            "I love artificial intelligence and mail"
        );
    }

    #[test]
    fn matches_case_insensitively() {
        let entries = vec![entry("ai", "artificial intelligence")];
        assert_eq!(
            apply_dictionary("AI is everywhere", &entries),
            "artificial intelligence is everywhere"
        );
    }

    #[test]
    fn escapes_pattern_characters_in_phrase() {
        let entries = vec![entry("node.js", "Node.js")];
        assert_eq!(apply_dictionary("we use node.js here", &entries), "we use Node.js here");
        // The dot must not act as a wildcard.
        assert_eq!(apply_dictionary("nodexjs is not it", &entries), "nodexjs is not it");
    }

    #[test]
    fn replacement_is_inserted_literally() {
        let entries = vec![entry("price", "$100")];
        assert_eq!(apply_dictionary("the price is right", &entries), "the $100 is right");
    }

    #[test]
    fn applies_entries_sequentially() {
        // The first replacement introduces text the second entry then matches.
        let entries = vec![entry("foo", "bar baz"), entry("baz", "qux")];
        assert_eq!(apply_dictionary("say foo", &entries), "say bar qux");
    }

    #[test]
    fn skips_empty_phrases() {
        let entries = vec![entry("", "boom"), entry("ok", "fine")];
        assert_eq!(apply_dictionary("all ok here", &entries), "all fine here");
    }

    #[test]
    fn empty_entry_list_returns_input() {
        assert_eq!(apply_dictionary("unchanged text", &[]), "unchanged text");
    }

    #[test]
    fn replaces_every_occurrence() {
        let entries = vec![entry("gonna", "going to")];
        assert_eq!(
            apply_dictionary("gonna do it, Gonna win", &entries),
            "going to do it, going to win"
        );
    }
}
