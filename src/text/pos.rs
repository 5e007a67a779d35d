//! Closed-class word lists standing in for a part-of-speech tagger.
//!
//! `tokenize` needs to discard determiners, coordinating and subordinating
//! conjunctions/prepositions, and infinitival "to" (spec §4.1). No Rust
//! crate in this codebase's dependency graph does POS tagging, so — the
//! same way `discovery::term_extraction::template` filters common words
//! with a closed `STOP_WORDS` list instead of a tagger — the four
//! grammatical classes spec.md names are encoded directly as word lists.

/// Determiners (Penn Treebank tag DT).
const DETERMINERS: &[&str] = &[
    "a", "an", "the", "this", "that", "these", "those", "my", "your", "his", "her", "its", "our",
    "their", "any", "all", "each", "every", "some", "no", "both", "either", "neither", "enough",
    "few", "fewer", "fewest", "little", "less", "least", "many", "more", "most", "much", "other",
    "another", "such", "what", "which", "whose",
];

/// Coordinating conjunctions (tag CC) — the FANBOYS.
const COORDINATING_CONJUNCTIONS: &[&str] = &["for", "and", "nor", "but", "or", "yet", "so"];

/// Subordinating conjunctions and prepositions (tag IN).
const PREPOSITIONS: &[&str] = &[
    "in", "on", "at", "by", "with", "about", "against", "between", "into", "through", "during",
    "before", "after", "above", "below", "from", "up", "down", "over", "under", "again",
    "further", "then", "once", "of", "off", "out", "since", "until", "while", "although",
    "because", "if", "unless", "though", "whereas", "whether", "as", "than",
];

/// Infinitival "to" (tag TO).
const INFINITIVAL_TO: &[&str] = &["to"];

/// True if `word` belongs to a grammatical class `tokenize` filters out.
pub fn is_filtered(word: &str) -> bool {
    DETERMINERS.contains(&word)
        || COORDINATING_CONJUNCTIONS.contains(&word)
        || PREPOSITIONS.contains(&word)
        || INFINITIVAL_TO.contains(&word)
}
