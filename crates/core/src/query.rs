//! Turns a free-text context into an upstream search query, and computes
//! the content hash and embedding text used by the cache.

use regex_lite::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

const MAX_KEYWORDS: usize = 24;
const FALLBACK_CHARS: usize = 300;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "that", "this", "into", "using", "use", "what",
    "which", "when", "where", "how", "does", "are", "can", "your", "about",
];

fn word_pattern() -> Regex {
    Regex::new(r"[a-zA-Z0-9][a-zA-Z0-9+\-]{1,}").expect("static regex is valid")
}

/// Builds the query string sent to the upstream search. Extracts
/// alphanumeric tokens, lowercases, drops stop words, dedupes preserving
/// first occurrence, and caps at [`MAX_KEYWORDS`] tokens. If nothing
/// survives, falls back to the first [`FALLBACK_CHARS`] *characters* of
/// the raw context — a deliberately naive fallback kept exactly as the
/// system this was modeled on does it, including the possibility of
/// cutting mid-word.
pub fn build_upstream_query(context: &str) -> String {
    let stop_words: HashSet<&str> = STOP_WORDS.iter().copied().collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut selected: Vec<String> = Vec::new();

    let pattern = word_pattern();
    for m in pattern.find_iter(context) {
        let token = m.as_str().to_lowercase();
        if stop_words.contains(token.as_str()) {
            continue;
        }
        if !seen.insert(token.clone()) {
            continue;
        }
        selected.push(token);
        if selected.len() >= MAX_KEYWORDS {
            break;
        }
    }

    if selected.is_empty() {
        return context.chars().take(FALLBACK_CHARS).collect();
    }

    selected.join(" ")
}

/// SHA-256 hex digest over `trim(title) + "\n\n" + trim(abstract)`.
/// Stable under leading/trailing whitespace changes in either field.
pub fn content_hash(title: &str, abstract_text: &str) -> String {
    let combined = format!("{}\n\n{}", title.trim(), abstract_text.trim());
    let digest = Sha256::digest(combined.as_bytes());
    hex::encode(digest)
}

/// Text that gets embedded for a candidate paper. Empty iff both title
/// and abstract are empty after trimming; callers treat an empty result
/// as "skip this candidate" rather than embedding an empty string.
pub fn build_embedding_text(title: &str, abstract_text: &str) -> String {
    let title = title.trim();
    let abstract_text = abstract_text.trim();
    match (title.is_empty(), abstract_text.is_empty()) {
        (false, false) => format!("{title}\n\n{abstract_text}"),
        (false, true) => title.to_string(),
        (true, false) => abstract_text.to_string(),
        (true, true) => String::new(),
    }
}
