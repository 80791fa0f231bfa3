use crate::prompt::FALLBACK_ANSWER;
use anyhow::{ensure, Context, Result};
use std::env;
use std::str::FromStr;

pub const DEFAULT_SEPARATOR: &str = "\n";
pub const DEFAULT_CHUNK_SIZE: usize = 1500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;
pub const DEFAULT_TOP_K: usize = 6;

/// Settings for the ingestion and question answering pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct RagConfig {
    pub separator: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per question
    pub top_k: usize,
    /// Maximum number of remembered turns, `None` for unbounded
    pub memory_window: Option<usize>,
    pub fallback_answer: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        RagConfig {
            separator: DEFAULT_SEPARATOR.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            memory_window: None,
            fallback_answer: FALLBACK_ANSWER.to_string(),
        }
    }
}

impl RagConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self> {
        let defaults = RagConfig::default();

        let separator = lookup("RAG_SEPARATOR")
            .map(|s| unescape(&s))
            .unwrap_or(defaults.separator);
        let chunk_size = parse_var(&lookup, "RAG_CHUNK_SIZE")?.unwrap_or(defaults.chunk_size);
        let chunk_overlap =
            parse_var(&lookup, "RAG_CHUNK_OVERLAP")?.unwrap_or(defaults.chunk_overlap);
        let memory_window = parse_var(&lookup, "RAG_MEMORY_WINDOW")?;
        let fallback_answer = lookup("RAG_FALLBACK_ANSWER")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.fallback_answer);

        let config = RagConfig {
            separator,
            chunk_size,
            chunk_overlap,
            top_k: defaults.top_k,
            memory_window,
            fallback_answer,
        };
        config.validate()?;

        Ok(config)
    }

    /// Check settings that cannot be expressed by their types
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.memory_window != Some(0),
            "memory window must keep at least one turn"
        );
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {}: {:?}", key, raw))
        })
        .transpose()
}

/// Allow `\n` and `\t` to be written literally in the environment
fn unescape(raw: &str) -> String {
    raw.replace("\\n", "\n").replace("\\t", "\t")
}
