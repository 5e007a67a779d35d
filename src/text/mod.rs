//! HTML-to-tokens text pipeline (spec §4.1): Unicode normalization,
//! punctuation/mark stripping, case folding, closed-class filtering, and
//! lemma reduction.

mod pos;

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};

/// Unicode general categories stripped during normalization: surrogate and
/// every punctuation variant, plus nonspacing marks (accents).
fn strip_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[\p{Pe}\p{Pf}\p{Pi}\p{Po}\p{Ps}\p{Mn}]")
            .expect("strip pattern is a valid regex")
    })
}

/// Decompose to NFD, strip surrogate/punctuation/mark code points, recompose
/// to NFC, then case-fold to lowercase. Whitespace token separators are
/// preserved.
pub fn normalize(bytes: &[u8]) -> Result<String> {
    let input = std::str::from_utf8(bytes).map_err(|e| Error::Text(e.to_string()))?;

    let decomposed: String = input.nfd().collect();
    let stripped = strip_pattern().replace_all(&decomposed, "");
    let recomposed: String = stripped.nfc().collect();

    Ok(recomposed.to_lowercase())
}

/// Segment normalized text into tokens, discard closed-class words
/// (determiner, conjunction, preposition, infinitival "to"), stem the
/// remaining surface forms, and return the set of distinct lemmas.
pub fn tokenize(normalized: &str) -> Result<BTreeSet<String>> {
    let stemmer = Stemmer::create(Algorithm::English);

    let lemmas = normalized
        .unicode_words()
        .filter(|word| !pos::is_filtered(word))
        .map(|word| stemmer.stem(word).into_owned())
        .collect();

    Ok(lemmas)
}
