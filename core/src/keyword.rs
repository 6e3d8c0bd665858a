use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Term statistics over the indexed corpus: per-document term counts plus
/// corpus-wide document frequencies. Rebuilt wholesale on every index build,
/// read-only afterwards.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct KeywordIndex {
    term_counts: Vec<HashMap<String, u32>>,
    doc_freq: HashMap<String, u32>,
    num_docs: u32,
}

/// How a term set is aggregated into a per-document keyword score.
///
/// `Summed` is the canonical behavior: a plain accumulated tf-idf sum with no
/// length normalization. `LengthNormalized` divides by the document's token
/// count and must be asked for explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeywordScoring {
    #[default]
    Summed,
    LengthNormalized,
}

impl KeywordIndex {
    /// Build statistics over pre-normalized document texts, one per document,
    /// in document-id order.
    pub fn build<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut term_counts: Vec<HashMap<String, u32>> = Vec::new();
        let mut doc_freq: HashMap<String, u32> = HashMap::new();
        for text in texts {
            let mut counts: HashMap<String, u32> = HashMap::new();
            for token in text.as_ref().split_whitespace() {
                *counts.entry(token.to_string()).or_insert(0) += 1;
            }
            for term in counts.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            term_counts.push(counts);
        }
        let num_docs = term_counts.len() as u32;
        Self {
            term_counts,
            doc_freq,
            num_docs,
        }
    }

    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }

    /// `count(term, doc) * ln(num_docs / max(1, df(term)))`; 0 for any
    /// term/document pair the corpus has never seen.
    pub fn tfidf(&self, term: &str, doc: DocId) -> f32 {
        let Some(counts) = self.term_counts.get(doc as usize) else {
            return 0.0;
        };
        let Some(&count) = counts.get(term) else {
            return 0.0;
        };
        let df = self.doc_freq.get(term).copied().unwrap_or(0).max(1);
        count as f32 * ((self.num_docs as f32) / (df as f32)).ln()
    }

    /// Accumulated tf-idf sum over the term set. Not length-normalized.
    pub fn score(&self, terms: &HashSet<String>, doc: DocId) -> f32 {
        terms.iter().map(|t| self.tfidf(t, doc)).sum()
    }

    /// Summed score divided by the document's token count.
    pub fn score_normalized(&self, terms: &HashSet<String>, doc: DocId) -> f32 {
        let tokens: u32 = self
            .term_counts
            .get(doc as usize)
            .map(|c| c.values().sum())
            .unwrap_or(0);
        if tokens == 0 {
            return 0.0;
        }
        self.score(terms, doc) / tokens as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> KeywordIndex {
        KeywordIndex::build([
            "cat small mammal cat",
            "dog loyal companion",
            "space explor rocket",
        ])
    }

    fn set(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn tfidf_zero_for_unseen_pairs() {
        let idx = corpus();
        assert_eq!(idx.tfidf("cat", 1), 0.0);
        assert_eq!(idx.tfidf("unicorn", 0), 0.0);
        assert_eq!(idx.tfidf("cat", 99), 0.0);
    }

    #[test]
    fn tfidf_rewards_frequency_and_rarity() {
        let idx = corpus();
        let cat = idx.tfidf("cat", 0);
        let dog = idx.tfidf("dog", 1);
        // "cat" occurs twice in doc 0, "dog" once in doc 1; both have df 1.
        assert!(cat > dog);
        assert!(dog > 0.0);
    }

    #[test]
    fn tfidf_never_negative() {
        let idx = corpus();
        for doc in 0..3 {
            for term in ["cat", "dog", "rocket", "mammal", "nothing"] {
                assert!(idx.tfidf(term, doc) >= 0.0);
            }
        }
    }

    #[test]
    fn score_is_a_plain_sum() {
        let idx = corpus();
        let terms = set(&["cat", "mammal"]);
        let expected = idx.tfidf("cat", 0) + idx.tfidf("mammal", 0);
        assert_eq!(idx.score(&terms, 0), expected);
    }

    #[test]
    fn normalized_variant_divides_by_length() {
        let idx = corpus();
        let terms = set(&["cat"]);
        let raw = idx.score(&terms, 0);
        // Doc 0 has four tokens.
        assert!((idx.score_normalized(&terms, 0) - raw / 4.0).abs() < 1e-6);
    }

    #[test]
    fn empty_corpus_scores_zero() {
        let idx = KeywordIndex::build(Vec::<String>::new());
        assert_eq!(idx.num_docs(), 0);
        assert_eq!(idx.score(&set(&["cat"]), 0), 0.0);
    }
}
