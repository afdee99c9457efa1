use std::collections::{HashMap, HashSet};

/// Words per retrieval chunk
pub const CHUNK_WORDS: usize = 220;
/// Chunks joined into a question's context
pub const TOP_K: usize = 3;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "did", "do", "does", "for", "from", "had",
    "has", "have", "how", "in", "is", "it", "its", "of", "on", "or", "that", "the", "their",
    "this", "to", "was", "were", "what", "when", "which", "who", "why", "with",
];

/// Lowercased alphanumeric terms without stopwords.
pub fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

pub fn chunk_words(text: &str, size: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words.chunks(size.max(1)).map(|c| c.join(" ")).collect()
}

type SparseVector = HashMap<String, f64>;

fn dot(a: &SparseVector, b: &SparseVector) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(t, w)| large.get(t).map(|v| w * v))
        .sum()
}

/// TF-IDF index over fixed-size word chunks of one document
#[derive(Debug, Clone)]
pub struct Retriever {
    chunks: Vec<String>,
    vectors: Vec<SparseVector>,
    idf: HashMap<String, f64>,
}

impl Retriever {
    pub fn new(text: &str) -> Self {
        Self::from_chunks(chunk_words(text, CHUNK_WORDS))
    }

    pub fn from_chunks(chunks: Vec<String>) -> Self {
        let n = chunks.len() as f64;
        let chunk_terms: Vec<Vec<String>> = chunks.iter().map(|c| terms(c)).collect();

        let mut df: HashMap<&str, usize> = HashMap::new();
        for ts in &chunk_terms {
            for t in ts.iter().map(String::as_str).collect::<HashSet<_>>() {
                *df.entry(t).or_insert(0) += 1;
            }
        }
        // smoothed idf, always positive
        let idf: HashMap<String, f64> = df
            .iter()
            .map(|(t, d)| (t.to_string(), ((1.0 + n) / (1.0 + *d as f64)).ln() + 1.0))
            .collect();

        let vectors = chunk_terms.iter().map(|ts| Self::weigh(ts, &idf)).collect();
        tracing::debug!(chunks = chunks.len(), vocabulary = idf.len(), "retriever built");
        Self { chunks, vectors, idf }
    }

    /// L2-normalized tf-idf vector; terms outside the vocabulary are ignored.
    fn weigh(terms: &[String], idf: &HashMap<String, f64>) -> SparseVector {
        let mut v: SparseVector = HashMap::new();
        for t in terms {
            if let Some(w) = idf.get(t) {
                *v.entry(t.clone()).or_insert(0.0) += w;
            }
        }
        let norm = v.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            v.values_mut().for_each(|w| *w /= norm);
        }
        v
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunk(&self, idx: usize) -> Option<&str> {
        self.chunks.get(idx).map(String::as_str)
    }

    /// Top `k` chunks by cosine similarity, best first; ties keep document order.
    pub fn rank(&self, question: &str, k: usize) -> Vec<(usize, f64)> {
        let q = Self::weigh(&terms(question), &self.idf);
        let mut scored: Vec<(usize, f64)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(&q, v)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// The top chunks joined with spaces, in rank order.
    pub fn context(&self, question: &str, k: usize) -> String {
        self.rank(question, k)
            .into_iter()
            .map(|(i, _)| self.chunks[i].as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terms_drop_stopwords_and_punctuation() {
        assert_eq!(
            terms("What was the Net-Income in 2023?"),
            vec!["net", "income", "2023"]
        );
    }

    #[test]
    fn test_chunking() {
        let text = (0..500).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        let chunks = chunk_words(&text, CHUNK_WORDS);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].split_whitespace().count(), 60);
        assert!(chunks[1].starts_with("w220 "));
        assert!(chunk_words("   ", CHUNK_WORDS).is_empty());
    }

    #[test]
    fn test_rank_finds_relevant_chunk() {
        let retriever = Retriever::from_chunks(vec![
            "The company designs smartphones and tablets.".to_string(),
            "Risk factors include supply chain disruption and tariffs.".to_string(),
            "Net sales increased due to higher iPhone revenue in Greater China.".to_string(),
            "Employees and human capital are described here.".to_string(),
        ]);
        let ranked = retriever.rank("What drove higher revenue in China?", 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0, 2);
        assert!(ranked[0].1 > ranked[1].1);

        let context = retriever.context("supply chain risks", TOP_K);
        assert!(context.starts_with("Risk factors"));
    }

    #[test]
    fn test_unknown_question_keeps_document_order() {
        let retriever = Retriever::from_chunks(vec!["alpha".into(), "beta".into(), "gamma".into()]);
        let ranked = retriever.rank("zeta", 2);
        assert_eq!(ranked, vec![(0, 0.0), (1, 0.0)]);
    }
}
