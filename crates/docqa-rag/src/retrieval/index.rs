//! Exact flat similarity index over contiguous vectors

use std::cmp::Ordering;
use std::collections::HashMap;

use uuid::Uuid;

use crate::config::SimilarityMetric;

/// Brute-force index. Rows are stored contiguously; removal swaps the last
/// row into the hole.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    metric: SimilarityMetric,
    ids: Vec<Uuid>,
    /// Tie-break rank per row (chunk ordinal)
    ranks: Vec<u32>,
    norms: Vec<f32>,
    data: Vec<f32>,
    positions: HashMap<Uuid, usize>,
}

impl FlatIndex {
    /// Create an empty index
    pub fn new(dimension: usize, metric: SimilarityMetric) -> Self {
        Self {
            dimension,
            metric,
            ids: Vec::new(),
            ranks: Vec::new(),
            norms: Vec::new(),
            data: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Vector dimensionality
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Similarity metric
    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the index has no rows
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Insert or replace a row. The caller has validated the length.
    pub fn insert(&mut self, id: Uuid, rank: u32, vector: &[f32]) {
        debug_assert_eq!(vector.len(), self.dimension);
        self.remove(&id);

        self.positions.insert(id, self.ids.len());
        self.ids.push(id);
        self.ranks.push(rank);
        self.norms.push(norm(vector));
        self.data.extend_from_slice(vector);
    }

    /// Remove a row, returning whether it existed
    pub fn remove(&mut self, id: &Uuid) -> bool {
        let Some(pos) = self.positions.remove(id) else {
            return false;
        };
        let last = self.ids.len() - 1;
        let dim = self.dimension;

        if pos != last {
            let moved = self.ids[last];
            self.ids.swap(pos, last);
            self.ranks.swap(pos, last);
            self.norms.swap(pos, last);
            let (head, tail) = self.data.split_at_mut(last * dim);
            head[pos * dim..(pos + 1) * dim].copy_from_slice(&tail[..dim]);
            self.positions.insert(moved, pos);
        }

        self.ids.pop();
        self.ranks.pop();
        self.norms.pop();
        self.data.truncate(last * dim);
        true
    }

    /// Drop every row
    pub fn clear(&mut self) {
        self.ids.clear();
        self.ranks.clear();
        self.norms.clear();
        self.data.clear();
        self.positions.clear();
    }

    /// Stored vector for `id`
    pub fn vector(&self, id: &Uuid) -> Option<&[f32]> {
        self.positions
            .get(id)
            .map(|&pos| &self.data[pos * self.dimension..(pos + 1) * self.dimension])
    }

    /// Iterate over `(id, vector)` rows in storage order
    pub fn rows(&self) -> impl Iterator<Item = (Uuid, &[f32])> + '_ {
        self.ids
            .iter()
            .copied()
            .zip(self.data.chunks_exact(self.dimension.max(1)))
    }

    /// Exact top-k scan.
    ///
    /// Results are ordered by descending score, then ascending rank, then id.
    /// The caller has validated the query length.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(Uuid, f32)> {
        if k == 0 || self.is_empty() {
            return Vec::new();
        }

        let query_norm = norm(query);
        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(pos, row)| {
                let dot = dot(query, row);
                let score = match self.metric {
                    SimilarityMetric::InnerProduct => dot,
                    SimilarityMetric::Cosine => {
                        let denom = query_norm * self.norms[pos];
                        if denom == 0.0 {
                            0.0
                        } else {
                            dot / denom
                        }
                    }
                };
                (pos, score)
            })
            .collect();

        let order = |a: &(usize, f32), b: &(usize, f32)| -> Ordering {
            b.1.total_cmp(&a.1)
                .then_with(|| self.ranks[a.0].cmp(&self.ranks[b.0]))
                .then_with(|| self.ids[a.0].cmp(&self.ids[b.0]))
        };

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, order);
            scored.truncate(k);
        }
        scored.sort_unstable_by(order);

        scored
            .into_iter()
            .map(|(pos, score)| (self.ids[pos], score))
            .collect()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}
