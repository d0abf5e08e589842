use super::chunk::DocumentChunk;

struct IndexEntry {
    vector: Vec<f32>,
    norm: f32,
    chunk: DocumentChunk,
}

/// A query-scoped, in-memory vector index over document chunks.
///
/// One index is built per RAG query and dropped with it; nothing is shared
/// or reused between queries.
#[derive(Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

impl VectorIndex {
    pub fn new() -> Self {
        VectorIndex::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, chunk: DocumentChunk, vector: Vec<f32>) {
        let norm = norm(&vector);
        self.entries.push(IndexEntry {
            vector,
            norm,
            chunk,
        });
    }

    /// The `k` chunks nearest to `query` by cosine similarity, best first.
    /// Zero-norm vectors and dimension mismatches score zero.
    pub fn query(&self, query: &[f32], k: usize) -> Vec<&DocumentChunk> {
        let query_norm = norm(query);
        let mut scored: Vec<(f32, &DocumentChunk)> = self
            .entries
            .iter()
            .map(|entry| {
                let denominator = entry.norm * query_norm;
                let score = if denominator > 0.0 && entry.vector.len() == query.len() {
                    dot(&entry.vector, query) / denominator
                } else {
                    0.0
                };
                (score, &entry.chunk)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(k).map(|(_, chunk)| chunk).collect()
    }
}
