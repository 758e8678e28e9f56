//! Flat Vector Index
//!
//! Exact nearest-neighbor search over a dense list of vectors. Position `i` in the
//! index corresponds to element `i` of the id map. Persisted as JSON.

use crate::error::{OceanError, Result};
use crate::retrieval::embedder::Embedding;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Squared Euclidean distance, smaller is closer
    #[default]
    L2,
    /// Dot product, larger is closer
    InnerProduct,
}

/// One search hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    #[serde(default)]
    metric: Metric,
    vectors: Vec<Embedding>,
}

impl FlatIndex {
    pub fn new(dimension: usize, metric: Metric) -> Self {
        Self {
            dimension,
            metric,
            vectors: Vec::new(),
        }
    }

    pub fn add(&mut self, vector: Embedding) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(OceanError::Index(format!(
                "Vector dimension {} doesn't match index dimension {}",
                vector.len(),
                self.dimension
            )));
        }
        self.vectors.push(vector);
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// The `k` closest vectors, best first. Fewer than `k` when the index is smaller.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(OceanError::Index(format!(
                "Query embedding dimension {} doesn't match index dimension {}",
                query.len(),
                self.dimension
            )));
        }
        if k == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                score: match self.metric {
                    Metric::L2 => squared_l2(query, vector),
                    Metric::InnerProduct => inner_product(query, vector),
                },
            })
            .collect();

        match self.metric {
            Metric::L2 => hits.sort_by(|a, b| a.score.total_cmp(&b.score)),
            Metric::InnerProduct => hits.sort_by(|a, b| b.score.total_cmp(&a.score)),
        }
        hits.truncate(k);

        Ok(hits)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let encoded = serde_json::to_string(self)?;
        std::fs::write(path, encoded).map_err(|e| {
            OceanError::Index(format!("Failed to write index {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let encoded = std::fs::read_to_string(path).map_err(|e| {
            OceanError::Index(format!("Failed to read index {}: {}", path.display(), e))
        })?;
        let index: FlatIndex = serde_json::from_str(&encoded).map_err(|e| {
            OceanError::Index(format!("Failed to parse index {}: {}", path.display(), e))
        })?;

        if let Some(bad) = index.vectors.iter().position(|v| v.len() != index.dimension) {
            return Err(OceanError::Index(format!(
                "Vector {} has dimension {} but index declares {}",
                bad,
                index.vectors[bad].len(),
                index.dimension
            )));
        }

        Ok(index)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(metric: Metric, vectors: &[[f32; 2]]) -> FlatIndex {
        let mut index = FlatIndex::new(2, metric);
        for v in vectors {
            index.add(v.to_vec()).unwrap();
        }
        index
    }

    #[test]
    fn test_l2_orders_nearest_first() {
        let index = index_of(Metric::L2, &[[10.0, 10.0], [1.0, 0.0], [0.0, 2.0]]);
        let hits = index.search(&[0.9, 0.1], 2).unwrap();
        assert_eq!(hits.iter().map(|h| h.position).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_inner_product_orders_largest_first() {
        let index = index_of(Metric::InnerProduct, &[[0.1, 0.0], [1.0, 0.0], [-1.0, 0.0]]);
        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(hits[0].position, 1);
        assert_eq!(hits[2].position, 2);
    }

    #[test]
    fn test_k_larger_than_index_and_empty_index() {
        let index = index_of(Metric::L2, &[[0.0, 0.0]]);
        assert_eq!(index.search(&[0.0, 0.0], 20).unwrap().len(), 1);

        let empty = FlatIndex::new(2, Metric::L2);
        assert!(empty.search(&[0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let mut index = FlatIndex::new(3, Metric::L2);
        assert!(index.add(vec![1.0]).is_err());
        assert!(matches!(index.search(&[1.0], 1), Err(OceanError::Index(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let index = index_of(Metric::InnerProduct, &[[1.0, 2.0], [3.0, 4.0]]);
        index.save(&path).unwrap();

        let loaded = FlatIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.metric(), Metric::InnerProduct);
        assert_eq!(loaded.dimension(), 2);
    }

    #[test]
    fn test_load_rejects_ragged_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, r#"{"dimension": 2, "vectors": [[1.0, 2.0], [3.0]]}"#).unwrap();
        assert!(FlatIndex::load(&path).is_err());
    }
}
