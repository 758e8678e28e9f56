//! Context retrieval: embeddings, flat vector index, id map.

pub mod embedder;
pub mod entry;
pub mod retriever;
pub mod vector_store;

pub use embedder::{Embedder, HashEmbedder, HttpEmbedder};
pub use entry::{IdMap, RetrievedEntry};
pub use retriever::{build_index, ContextRetriever, RetrievedContext};
pub use vector_store::{FlatIndex, Metric, Neighbor};
