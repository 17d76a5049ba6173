use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_LLM_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";
const DEFAULT_EMBEDDING_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai/embeddings";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
const DEFAULT_MOVIE_API_URL: &str = "https://www.omdbapi.com/";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub output_dir: PathBuf,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub movie_api_url: String,
    pub movie_api_key: Option<String>,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// How chapters are split and searched before summarizing.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    /// Words per indexed passage. `None` indexes each chapter as one unit.
    pub chunk_size: Option<usize>,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            chunk_size: None,
            chunk_overlap: 0,
            top_k: 4,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let output_dir = var("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("pagewise"));

        let retrieval = RetrievalConfig {
            chunk_size: parse_opt(var("CHUNK_SIZE"), "CHUNK_SIZE")?,
            chunk_overlap: parse_opt(var("CHUNK_OVERLAP"), "CHUNK_OVERLAP")?.unwrap_or(0),
            top_k: parse_opt(var("RETRIEVAL_TOP_K"), "RETRIEVAL_TOP_K")?.unwrap_or(4),
        };
        anyhow::ensure!(retrieval.top_k > 0, "RETRIEVAL_TOP_K must be at least 1");
        if let Some(size) = retrieval.chunk_size {
            anyhow::ensure!(size > 0, "CHUNK_SIZE must be at least 1");
            anyhow::ensure!(
                retrieval.chunk_overlap < size,
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                retrieval.chunk_overlap,
                size
            );
        }

        Ok(Config {
            bind_addr: or("BIND_ADDR", "0.0.0.0:3000"),
            output_dir,
            llm: LlmConfig {
                api_url: or("LLM_API_URL", DEFAULT_LLM_API_URL),
                api_key: var("LLM_API_KEY"),
                model: or("LLM_MODEL", DEFAULT_LLM_MODEL),
                temperature: parse_opt(var("LLM_TEMPERATURE"), "LLM_TEMPERATURE")?.unwrap_or(0.7),
            },
            embedding: EmbeddingConfig {
                api_url: or("EMBEDDING_API_URL", DEFAULT_EMBEDDING_API_URL),
                // Falls back to the Google key name the embedding endpoint is usually paired with
                api_key: var("EMBEDDING_API_KEY").or_else(|| var("GOOGLE_API_KEY")),
                model: or("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            },
            movie_api_url: or("MOVIE_API_URL", DEFAULT_MOVIE_API_URL),
            movie_api_key: var("MOVIE_API_KEY"),
            retrieval,
        })
    }
}

fn parse_opt<T>(value: Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid value for {}: {:?}", key, raw))
        })
        .transpose()
}
