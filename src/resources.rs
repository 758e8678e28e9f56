//! Process-wide resources
//!
//! Loaded once at startup ([`Resources::init`]) and released on shutdown
//! ([`Resources::close`]). Request handlers only ever see clones of the pipeline.

use crate::config::Config;
use crate::error::{OceanError, Result};
use crate::execution::Database;
use crate::llm::{ChatModel, LlmClient};
use crate::pipeline::QueryPipeline;
use crate::plot;
use crate::retrieval::{embedder, ContextRetriever, FlatIndex, IdMap};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Resources {
    pipeline: QueryPipeline,
    db: Database,
}

impl Resources {
    /// Load the index, the id map and the database, and build the pipeline.
    pub async fn init(config: &Config) -> Result<Self> {
        let phase_start = std::time::Instant::now();

        plot::load_font(config.plot.font_path.as_deref());

        let embedder = embedder::from_settings(&config.embedding)?;
        let index = FlatIndex::load(&config.data.index_path)?;
        if index.dimension() != embedder.dimension() {
            return Err(OceanError::Index(format!(
                "Index {} has dimension {} but the {:?} embedder produces {}; rebuild it with `build-index`",
                config.data.index_path.display(),
                index.dimension(),
                config.embedding.provider,
                embedder.dimension()
            )));
        }
        let id_map = IdMap::load(&config.data.id_map_path)?;
        info!(
            "Vector index loaded: {} vectors, {} id-map entries ({:.2}ms)",
            index.len(),
            id_map.len(),
            phase_start.elapsed().as_secs_f64() * 1000.0
        );

        let db = Database::open(&config.data.db_path)?;

        if config.llm.api_key.is_empty() {
            warn!("No LLM API key configured; every query will fail until LLM_API_KEY or GROQ_API_KEY is set");
        }
        let llm: Arc<dyn ChatModel> = Arc::new(LlmClient::from_settings(&config.llm));

        let retriever = ContextRetriever::new(embedder, Arc::new(index), Arc::new(id_map));
        let pipeline = QueryPipeline::new(retriever, llm, db.clone(), config.top_k);

        info!(
            "Resources ready (model {}, top_k {}) in {:.2}ms",
            config.llm.model,
            config.top_k,
            phase_start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(Self { pipeline, db })
    }

    /// Assemble from prebuilt parts (tests, embedding in other programs).
    pub fn from_parts(pipeline: QueryPipeline, db: Database) -> Self {
        Self { pipeline, db }
    }

    pub fn pipeline(&self) -> &QueryPipeline {
        &self.pipeline
    }

    /// Release the database connection.
    pub fn close(self) {
        let Resources { pipeline, db } = self;
        drop(pipeline);
        db.close();
        info!("Resources released");
    }
}
