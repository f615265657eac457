//! Title similarity used to spot the same meeting published by two calendars.

use std::collections::HashSet;

/// Words that say nothing about which meeting a title refers to
const STOPWORDS: &[&str] = &[
    "meeting", "call", "sync", "standup", "the", "a", "an", "and", "or", "with", "for", "of",
    "in", "on",
];

/// Share of the smaller title's meaningful words that must also appear in the other
const OVERLAP_THRESHOLD: f64 = 0.7;

fn normalize(title: &str) -> String {
    title.trim().to_lowercase()
}

fn is_meaningful(word: &str) -> bool {
    word.chars().count() > 2 && !STOPWORDS.contains(&word)
}

fn meaningful_words(title: &str) -> Vec<&str> {
    title.split_whitespace().filter(|w| is_meaningful(w)).collect()
}

/// Whether two titles most likely name the same event.
///
/// Matches when the normalized titles are equal, when one contains the other,
/// or when their meaningful words overlap enough.
pub fn titles_similar(a: &str, b: &str) -> bool {
    let a = normalize(a);
    let b = normalize(b);

    if a == b {
        return true;
    }

    if a.is_empty() || b.is_empty() {
        return false;
    }

    if a.contains(b.as_str()) || b.contains(a.as_str()) {
        return true;
    }

    let words_a = meaningful_words(&a);
    let words_b = meaningful_words(&b);
    if words_a.is_empty() || words_b.is_empty() {
        return false;
    }

    let set_b: HashSet<&str> = words_b.iter().copied().collect();
    let common = words_a.iter().filter(|w| set_b.contains(*w)).count();
    if common == 0 {
        return false;
    }

    let smaller = words_a.len().min(words_b.len());
    common as f64 / smaller as f64 >= OVERLAP_THRESHOLD
}
