//! Per-chapter similarity index and the passage chunker that feeds it.

use crate::config::RetrievalConfig;
use crate::services::embedding::Embedder;
use anyhow::Result;

/// Flat in-memory vector index over the passages of a single chapter.
pub struct ChapterIndex {
    passages: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl ChapterIndex {
    /// Splits `text` according to `retrieval` and embeds every passage.
    ///
    /// Without a configured chunk size the whole chapter is a single passage,
    /// so any search returns the full chapter text.
    pub async fn build<E: Embedder>(
        text: &str,
        retrieval: &RetrievalConfig,
        embedder: &E,
    ) -> Result<Self> {
        let passages = match retrieval.chunk_size {
            Some(size) => chunk_text(text, size, retrieval.chunk_overlap),
            None => vec![text.to_string()],
        };
        let inputs: Vec<&str> = passages.iter().map(String::as_str).collect();
        let vectors = embedder.embed(&inputs).await?;
        anyhow::ensure!(
            vectors.len() == passages.len(),
            "expected {} embeddings, got {}",
            passages.len(),
            vectors.len()
        );

        Ok(ChapterIndex { passages, vectors })
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    /// Returns up to `k` passages, most similar to `query` first.
    pub async fn search<E: Embedder>(&self, query: &str, k: usize, embedder: &E) -> Result<Vec<&str>> {
        let query_vector = embedder
            .embed(&[query])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("no embedding returned for query"))?;

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(&query_vector, v)))
            .collect();
        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, _)| self.passages[i].as_str())
            .collect())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Splits text into windows of `chunk_size` words, each sharing `overlap`
/// words with the previous one.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));

        if end >= words.len() {
            break;
        }
        // overlap < chunk_size is enforced by config; guard anyway so we always advance
        start = end.saturating_sub(overlap).max(start + 1);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Embeds text as [count of "rule", count of "story"].
    struct KeywordEmbedder {
        calls: Mutex<usize>,
    }

    impl KeywordEmbedder {
        fn new() -> Self {
            KeywordEmbedder { calls: Mutex::new(0) }
        }
    }

    impl Embedder for KeywordEmbedder {
        async fn embed(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
            *self.calls.lock().unwrap() += 1;
            Ok(inputs
                .iter()
                .map(|text| {
                    let lower = text.to_lowercase();
                    vec![
                        lower.matches("rule").count() as f32,
                        lower.matches("story").count() as f32,
                    ]
                })
                .collect())
        }
    }

    #[test]
    fn chunks_overlap_and_cover_everything() {
        let text = "one two three four five six seven";
        let chunks = chunk_text(text, 3, 1);
        assert_eq!(
            chunks,
            vec!["one two three", "three four five", "five six seven"]
        );
    }

    #[test]
    fn chunking_empty_text_yields_nothing() {
        assert!(chunk_text("   ", 5, 0).is_empty());
    }

    #[test]
    fn cosine_handles_zero_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn unchunked_index_always_returns_whole_chapter() {
        let embedder = KeywordEmbedder::new();
        let text = "A story about a dragon.\nNo rules here.";
        let index = ChapterIndex::build(text, &RetrievalConfig::default(), &embedder)
            .await
            .unwrap();
        assert_eq!(index.len(), 1);

        let hits = index.search("anything at all", 4, &embedder).await.unwrap();
        assert_eq!(hits, vec![text]);
    }

    #[tokio::test]
    async fn chunked_index_ranks_by_similarity() {
        let embedder = KeywordEmbedder::new();
        let retrieval = RetrievalConfig {
            chunk_size: Some(4),
            chunk_overlap: 0,
            top_k: 1,
        };
        let text = "once upon a story the rule is rule number one";
        let index = ChapterIndex::build(text, &retrieval, &embedder).await.unwrap();
        assert_eq!(index.len(), 3);

        let hits = index.search("rule", 1, &embedder).await.unwrap();
        assert_eq!(hits, vec!["the rule is rule"]);
        assert_eq!(*embedder.calls.lock().unwrap(), 2);
    }
}
