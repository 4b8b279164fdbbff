//! Trigram similarity, compatible with PostgreSQL's `pg_trgm`.
//!
//! Text is lower-cased and split into words of alphanumeric characters. Each
//! word is padded with two leading spaces and one trailing space and cut
//! into three-character windows. Similarity is the Jaccard index of the two
//! trigram sets, in `0.0..=1.0`.

use std::collections::HashSet;

/// Trigram set of `text`.
pub fn trigrams(text: &str) -> HashSet<[char; 3]> {
    let mut set = HashSet::new();

    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let padded: Vec<char> = "  "
            .chars()
            .chain(word.chars().flat_map(char::to_lowercase))
            .chain(std::iter::once(' '))
            .collect();
        for window in padded.windows(3) {
            set.insert([window[0], window[1], window[2]]);
        }
    }

    set
}

/// Similarity of two strings; `0.0` when either has no trigrams.
pub fn similarity(a: &str, b: &str) -> f32 {
    let (ta, tb) = (trigrams(a), trigrams(b));
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let shared = ta.intersection(&tb).count();
    let union = ta.len() + tb.len() - shared;
    shared as f32 / union as f32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_is_fully_similar() {
        assert!((similarity("Payment failed", "Payment failed") - 1.0).abs() < 1e-6);
    }

    #[test]
    fn case_and_punctuation_are_ignored() {
        assert!((similarity("Payment FAILED!", "payment failed") - 1.0).abs() < 1e-6);
    }

    #[test]
    fn word_trigrams_match_pg_trgm() {
        let set = trigrams("cat");
        let expected: HashSet<[char; 3]> = [
            [' ', ' ', 'c'],
            [' ', 'c', 'a'],
            ['c', 'a', 't'],
            ['a', 't', ' '],
        ]
        .into_iter()
        .collect();
        assert_eq!(set, expected);
    }

    #[test]
    fn small_variation_stays_highly_similar() {
        let a = "Cache refresh failed for tenant acme after retries";
        let b = "Cache refresh failed for tenant acme after retry";
        let score = similarity(a, b);
        assert!(score > 0.8, "score was {score}");
    }

    #[test]
    fn unrelated_text_is_dissimilar() {
        let score = similarity("Disk quota exceeded", "User signed in");
        assert!(score < 0.2, "score was {score}");
    }

    #[test]
    fn empty_text_has_zero_similarity() {
        assert_eq!(similarity("", "anything"), 0.0);
        assert_eq!(similarity("!!", "??"), 0.0);
    }
}
