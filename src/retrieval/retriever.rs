//! Context Retriever
//!
//! Embeds the user query, searches the flat index and resolves hits through the id
//! map. Hits pointing past the end of the id map are skipped: an index built from a
//! different map revision degrades retrieval, it never fails the request.

use crate::error::Result;
use crate::retrieval::embedder::Embedder;
use crate::retrieval::entry::{IdMap, RetrievedEntry};
use crate::retrieval::vector_store::{FlatIndex, Metric};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Snippets retrieved for one query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievedContext {
    /// `[source] summary` lines joined with newlines
    pub text: String,
    pub entries: Vec<RetrievedEntry>,
}

impl RetrievedContext {
    pub fn from_entries(entries: Vec<RetrievedEntry>) -> Self {
        let text = entries
            .iter()
            .map(RetrievedEntry::context_line)
            .collect::<Vec<_>>()
            .join("\n");
        Self { text, entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone)]
pub struct ContextRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<FlatIndex>,
    id_map: Arc<IdMap>,
}

impl ContextRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<FlatIndex>, id_map: Arc<IdMap>) -> Self {
        if index.len() != id_map.len() {
            tracing::warn!(
                "Vector index holds {} vectors but id map has {} entries",
                index.len(),
                id_map.len()
            );
        }
        Self {
            embedder,
            index,
            id_map,
        }
    }

    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievedContext> {
        let query_embedding = self.embedder.embed(query).await?;
        let hits = self.index.search(&query_embedding, k)?;

        let mut entries = Vec::with_capacity(hits.len());
        for hit in &hits {
            match self.id_map.get(hit.position) {
                Some(entry) => entries.push(entry.clone()),
                None => debug!(
                    "Skipping index position {} (id map has {} entries)",
                    hit.position,
                    self.id_map.len()
                ),
            }
        }

        info!("Retrieved {} of {} nearest snippets", entries.len(), hits.len());
        Ok(RetrievedContext::from_entries(entries))
    }
}

/// Embed every id-map entry in order and build the matching index.
pub async fn build_index(embedder: &dyn Embedder, id_map: &IdMap, metric: Metric) -> Result<FlatIndex> {
    let mut index = FlatIndex::new(embedder.dimension(), metric);
    for (position, entry) in id_map.entries().iter().enumerate() {
        let vector = embedder.embed(entry.summary()).await?;
        index.add(vector)?;
        if (position + 1) % 1000 == 0 {
            info!("Embedded {} / {} entries", position + 1, id_map.len());
        }
    }
    Ok(index)
}
