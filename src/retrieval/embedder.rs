//! Query Embedder
//!
//! Interchangeable backends behind one trait: an OpenAI-compatible embeddings API,
//! all-MiniLM-L6-v2 run locally through fastembed (`local-embeddings` feature), and a
//! token-hashing embedder that needs no model or network.

use crate::config::{EmbeddingProvider, EmbeddingSettings};
use crate::error::{OceanError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Dimension of all-MiniLM-L6-v2, which the Argo index was originally built with
pub const DEFAULT_DIMENSION: usize = 384;

/// Vector embedding (simple f32 vector)
pub type Embedding = Vec<f32>;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Embedding>;
}

/// Build the embedder selected in config.
pub fn from_settings(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    match settings.provider {
        EmbeddingProvider::Hash => Ok(Arc::new(HashEmbedder::new(settings.dimension))),
        EmbeddingProvider::Http => Ok(Arc::new(HttpEmbedder::new(
            settings.api_key.clone(),
            settings.base_url.clone(),
            settings.model.clone(),
            settings.dimension,
        ))),
        EmbeddingProvider::Minilm => local_model(settings),
    }
}

#[cfg(feature = "local-embeddings")]
fn local_model(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(MiniLmEmbedder::load(&settings.cache_dir)?))
}

#[cfg(not(feature = "local-embeddings"))]
fn local_model(_settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    Err(OceanError::Config(
        "EMBEDDING_PROVIDER=minilm needs a build with the `local-embeddings` feature".to_string(),
    ))
}

/// all-MiniLM-L6-v2 through fastembed's ONNX runtime.
#[cfg(feature = "local-embeddings")]
pub struct MiniLmEmbedder {
    model: Arc<std::sync::Mutex<fastembed::TextEmbedding>>,
}

#[cfg(feature = "local-embeddings")]
impl MiniLmEmbedder {
    /// Load the model, downloading it into `cache_dir` on first use.
    pub fn load(cache_dir: &std::path::Path) -> Result<Self> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        std::fs::create_dir_all(cache_dir)?;
        tracing::info!("Initializing embedding model (AllMiniLM-L6-V2) from {}", cache_dir.display());

        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_cache_dir(cache_dir.to_path_buf())
            .with_show_download_progress(false);
        let model = TextEmbedding::try_new(options)
            .map_err(|e| OceanError::Embedding(format!("Failed to load MiniLM model: {}", e)))?;

        Ok(Self {
            model: Arc::new(std::sync::Mutex::new(model)),
        })
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl Embedder for MiniLmEmbedder {
    fn dimension(&self) -> usize {
        DEFAULT_DIMENSION
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();

        let mut embeddings = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| OceanError::Embedding("Embedding model lock poisoned".to_string()))?;
            model
                .embed(vec![text], None)
                .map_err(|e| OceanError::Embedding(format!("Failed to generate embedding: {}", e)))
        })
        .await
        .map_err(|e| OceanError::Embedding(format!("Embedding task failed: {}", e)))??;

        if embeddings.is_empty() {
            return Err(OceanError::Embedding("Embedding generation returned empty result".to_string()));
        }
        let embedding = embeddings.remove(0);
        if embedding.len() != DEFAULT_DIMENSION {
            return Err(OceanError::Embedding(format!(
                "Unexpected embedding dimension: {} (expected {})",
                embedding.len(),
                DEFAULT_DIMENSION
            )));
        }
        Ok(embedding)
    }
}

/// Embedding client using an OpenAI-compatible API
pub struct HttpEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(api_key: String, base_url: String, model: String, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
            dimension,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| OceanError::Embedding(format!("Embedding API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OceanError::Embedding(format!(
                "Embedding API error ({}): {}",
                status, error_text
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OceanError::Embedding(format!("Failed to parse embedding response: {}", e)))?;

        parse_embedding_response(&response_json)
    }
}

fn parse_embedding_response(response_json: &serde_json::Value) -> Result<Embedding> {
    let data = response_json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| OceanError::Embedding("No embedding data in response".to_string()))?;

    let embedding: Vec<f32> = data
        .get("embedding")
        .and_then(|e| e.as_array())
        .ok_or_else(|| OceanError::Embedding("No embedding vector in response".to_string()))?
        .iter()
        .filter_map(|v| v.as_f64().map(|f| f as f32))
        .collect();

    Ok(embedding)
}

/// Deterministic bag-of-tokens embedder.
///
/// Each lowercased whitespace token is hashed into a signed bucket and the vector is
/// L2-normalised, so texts sharing words land close together. FNV-1a keeps the
/// buckets identical across builds, which matters because indexes are persisted.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed_sync(&self, text: &str) -> Embedding {
        let mut vec = vec![0.0_f32; self.dimension];
        let mut seen = 0usize;

        for token in text.split_whitespace() {
            let token = token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if token.is_empty() {
                continue;
            }
            let hash = fnv1a(token.as_bytes());
            let idx = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vec[idx] += sign;
            seen += 1;
        }

        if seen == 0 {
            return vec;
        }

        let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vec {
                *value /= norm;
            }
        }

        vec
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.embed_sync(text))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
