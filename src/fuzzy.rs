//! Fuzzy matching
//!
//! A `Scorer` rates a candidate string against a query on a 0-100 scale.
//! `FuzzyMatcher` applies a scorer to a candidate set and keeps the best
//! candidates at or above a cutoff.
//!
//! The default scorer is a token-sort ratio: both strings are lowercased,
//! stripped of punctuation, split into tokens, the tokens sorted and
//! re-joined, and the results compared by normalized Levenshtein similarity.
//! Token order therefore does not matter, and `iron (III) chloride` equals
//! `iron(III) chloride`.

use std::cmp::Reverse;

/// String similarity on a 0-100 scale
pub trait Scorer {
    fn score(&self, query: &str, candidate: &str) -> u8;
}

impl<F> Scorer for F
where
    F: Fn(&str, &str) -> u8,
{
    fn score(&self, query: &str, candidate: &str) -> u8 {
        self(query, candidate)
    }
}

/// Order-independent token comparison
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSortRatio;

impl TokenSortRatio {
    /// Lowercase, replace non-alphanumerics with spaces, sort tokens
    pub fn process(text: &str) -> String {
        let cleaned: String = text
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect::<String>()
            .to_lowercase();

        let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
        tokens.sort_unstable();
        tokens.join(" ")
    }
}

impl Scorer for TokenSortRatio {
    fn score(&self, query: &str, candidate: &str) -> u8 {
        let a = Self::process(query);
        let b = Self::process(candidate);
        if a.is_empty() || b.is_empty() {
            return 0;
        }

        let similarity = strsim::normalized_levenshtein(&a, &b);
        (similarity * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

/// A candidate with its score
#[derive(Debug, Clone)]
pub struct Scored<T> {
    pub item: T,
    pub score: u8,
}

/// Ranks candidates against a query
#[derive(Debug, Clone, Default)]
pub struct FuzzyMatcher<S = TokenSortRatio> {
    scorer: S,
}

impl FuzzyMatcher<TokenSortRatio> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: Scorer> FuzzyMatcher<S> {
    /// Use a custom scorer
    pub fn with_scorer(scorer: S) -> Self {
        Self { scorer }
    }

    /// Score a single pair
    pub fn score(&self, query: &str, candidate: &str) -> u8 {
        self.scorer.score(query, candidate)
    }

    /// Top `limit` candidates scoring at least `cutoff`, best first.
    ///
    /// Candidates are `(text, item)` pairs; only the text is scored. Equal
    /// scores keep the order in which candidates were supplied.
    pub fn extract<T, I>(&self, query: &str, candidates: I, cutoff: u8, limit: usize) -> Vec<Scored<T>>
    where
        I: IntoIterator<Item = (String, T)>,
    {
        let mut scored: Vec<Scored<T>> = candidates
            .into_iter()
            .filter_map(|(text, item)| {
                let score = self.scorer.score(query, &text);
                (score >= cutoff).then_some(Scored { item, score })
            })
            .collect();

        // stable: ties stay in candidate order
        scored.sort_by_key(|s| Reverse(s.score));
        scored.truncate(limit);
        scored
    }
}
