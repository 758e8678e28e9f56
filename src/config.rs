//! Runtime configuration
//!
//! Everything is read from the process environment (after `.env` is loaded by the
//! binaries). CLI flags override individual fields after loading.

use crate::error::{OceanError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_TOP_K: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub server: ServerSettings,
    pub plot: PlotSettings,
    /// Number of snippets pulled from the vector index per query
    pub top_k: usize,
}

/// Files produced by the data-preparation step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    pub db_path: PathBuf,
    pub index_path: PathBuf,
    pub id_map_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local token hashing, no network
    Hash,
    /// OpenAI-compatible `/embeddings` endpoint
    Http,
    /// all-MiniLM-L6-v2 run locally (needs the `local-embeddings` feature)
    Minilm,
}

impl EmbeddingProvider {
    /// MiniLM when the local model is compiled in, hashing otherwise.
    pub fn default_for_build() -> Self {
        if cfg!(feature = "local-embeddings") {
            EmbeddingProvider::Minilm
        } else {
            EmbeddingProvider::Hash
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub dimension: usize,
    /// Where the local model files are downloaded and cached
    pub cache_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Origins allowed by the CORS layer (the chat frontend)
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlotSettings {
    /// TrueType font for chart text; common system locations are tried when unset
    pub font_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataSettings {
                db_path: PathBuf::from("data/argo.duckdb"),
                index_path: PathBuf::from("data/argo_index.json"),
                id_map_path: PathBuf::from("data/id_map.json"),
            },
            llm: LlmSettings {
                base_url: DEFAULT_LLM_BASE_URL.to_string(),
                model: DEFAULT_LLM_MODEL.to_string(),
                api_key: String::new(),
            },
            embedding: EmbeddingSettings {
                provider: EmbeddingProvider::default_for_build(),
                base_url: "https://api.openai.com/v1".to_string(),
                model: "text-embedding-3-small".to_string(),
                api_key: String::new(),
                dimension: crate::retrieval::embedder::DEFAULT_DIMENSION,
                cache_dir: PathBuf::from(".fastembed_cache"),
            },
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8000,
                cors_origins: vec!["http://localhost:8080".to_string()],
            },
            plot: PlotSettings::default(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl Config {
    /// Load from the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup (lets tests avoid touching the real env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(v) = lookup("OCEAN_DB_PATH") {
            config.data.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("OCEAN_INDEX_PATH") {
            config.data.index_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("OCEAN_ID_MAP_PATH") {
            config.data.id_map_path = PathBuf::from(v);
        }

        if let Some(v) = lookup("LLM_API_KEY").or_else(|| lookup("GROQ_API_KEY")) {
            config.llm.api_key = v;
        }
        if let Some(v) = lookup("LLM_BASE_URL") {
            config.llm.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("LLM_MODEL") {
            config.llm.model = v;
        }

        if let Some(v) = lookup("EMBEDDING_PROVIDER") {
            config.embedding.provider = match v.trim().to_lowercase().as_str() {
                "hash" => EmbeddingProvider::Hash,
                "http" | "openai" => EmbeddingProvider::Http,
                "minilm" | "local" => EmbeddingProvider::Minilm,
                other => {
                    return Err(OceanError::Config(format!(
                        "Unknown EMBEDDING_PROVIDER '{}' (expected 'hash', 'http' or 'minilm')",
                        other
                    )))
                }
            };
        }
        if let Some(v) = lookup("EMBEDDING_BASE_URL") {
            config.embedding.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("EMBEDDING_MODEL") {
            config.embedding.model = v;
        }
        if let Some(v) = lookup("EMBEDDING_API_KEY") {
            config.embedding.api_key = v;
        }
        if let Some(v) = lookup("EMBEDDING_DIMENSION") {
            config.embedding.dimension = parse_number("EMBEDDING_DIMENSION", &v)?;
        }
        if let Some(v) = lookup("EMBEDDING_CACHE_DIR") {
            config.embedding.cache_dir = PathBuf::from(v);
        }

        if let Some(v) = lookup("RETRIEVAL_TOP_K") {
            config.top_k = parse_number("RETRIEVAL_TOP_K", &v)?;
        }

        if let Some(v) = lookup("SERVER_HOST") {
            config.server.host = v;
        }
        if let Some(v) = lookup("SERVER_PORT") {
            config.server.port = parse_number("SERVER_PORT", &v)?;
        }
        if let Some(v) = lookup("CORS_ORIGINS") {
            config.server.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(v) = lookup("OCEAN_PLOT_FONT") {
            config.plot.font_path = Some(PathBuf::from(v));
        }

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| OceanError::Config(format!("{} must be a number, got '{}'", key, value)))
}
