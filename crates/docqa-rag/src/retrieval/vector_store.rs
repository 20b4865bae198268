//! Vector store: chunk map, document registry and flat index behind one lock

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::index::FlatIndex;
use crate::config::SimilarityMetric;
use crate::error::{Error, Result};
use crate::types::{Chunk, Document, NewChunk};

/// File holding the index rows
pub const INDEX_FILE: &str = "index.bin";
/// File holding chunk texts and the document registry
pub const CHUNKS_FILE: &str = "chunks.json";

/// Search result with chunk and similarity
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// The retrieved chunk
    pub chunk: Chunk,
    /// Similarity score, higher is better
    pub score: f32,
}

#[derive(Debug)]
struct StoreInner {
    chunks: HashMap<Uuid, Chunk>,
    documents: HashMap<Uuid, Document>,
    /// Document ID -> chunk IDs, for deletion
    document_chunks: HashMap<Uuid, Vec<Uuid>>,
    index: FlatIndex,
}

impl StoreInner {
    fn insert_chunks(&mut self, document_id: Uuid, chunks: Vec<NewChunk>) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(chunks.len());
        for new in chunks {
            let id = Uuid::new_v4();
            self.index.insert(id, new.ordinal, &new.vector);
            self.chunks.insert(
                id,
                Chunk {
                    id,
                    document_id,
                    ordinal: new.ordinal,
                    text: new.text,
                    source: new.source,
                },
            );
            ids.push(id);
        }
        self.document_chunks
            .entry(document_id)
            .or_default()
            .extend_from_slice(&ids);
        ids
    }

    fn remove_document(&mut self, document_id: &Uuid) -> usize {
        self.documents.remove(document_id);
        let chunk_ids = self.document_chunks.remove(document_id).unwrap_or_default();
        for id in &chunk_ids {
            self.chunks.remove(id);
            self.index.remove(id);
        }
        chunk_ids.len()
    }
}

/// On-disk form of the index
#[derive(Serialize, Deserialize)]
struct IndexFile {
    dimension: usize,
    metric: SimilarityMetric,
    rows: Vec<IndexRow>,
}

#[derive(Serialize, Deserialize)]
struct IndexRow {
    id: u128,
    vector: Vec<f32>,
}

/// On-disk form of chunk texts and the registry
#[derive(Serialize, Deserialize)]
struct ChunksFile {
    chunks: HashMap<Uuid, Chunk>,
    documents: HashMap<Uuid, Document>,
}

/// In-memory vector store with exact search and file persistence.
///
/// All state lives under one `RwLock`: mutations take the write lock,
/// search and persist take the read lock. The set of chunk ids always
/// equals the set of indexed ids.
#[derive(Debug)]
pub struct VectorStore {
    dimension: usize,
    metric: SimilarityMetric,
    inner: RwLock<StoreInner>,
    /// Serializes whole persist calls so the two files come from one snapshot
    persist_lock: Mutex<()>,
}

impl VectorStore {
    /// Create an empty store
    pub fn new(dimension: usize, metric: SimilarityMetric) -> Self {
        Self {
            dimension,
            metric,
            inner: RwLock::new(StoreInner {
                chunks: HashMap::new(),
                documents: HashMap::new(),
                document_chunks: HashMap::new(),
                index: FlatIndex::new(dimension, metric),
            }),
            persist_lock: Mutex::new(()),
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

    fn check_dimension(&self, actual: usize, operation: impl FnOnce() -> String) -> Result<()> {
        if actual != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual,
                operation: operation(),
            });
        }
        Ok(())
    }

    fn validate(&self, chunks: &[NewChunk]) -> Result<()> {
        for chunk in chunks {
            self.check_dimension(chunk.vector.len(), || {
                format!("add_chunks (ordinal {})", chunk.ordinal)
            })?;
            check_finite(&chunk.vector, || format!("chunk {}", chunk.ordinal))?;
        }
        Ok(())
    }

    /// Add chunks for a document. All vectors are validated before anything
    /// is inserted, so a failed call leaves the store unchanged.
    pub fn add_chunks(&self, document_id: Uuid, chunks: Vec<NewChunk>) -> Result<Vec<Uuid>> {
        self.validate(&chunks)?;

        let mut inner = self.inner.write();
        let added = chunks.len() as u32;
        let ids = inner.insert_chunks(document_id, chunks);
        if let Some(doc) = inner.documents.get_mut(&document_id) {
            doc.chunk_count += added;
        }
        Ok(ids)
    }

    /// Register a document together with its chunks in one atomic step
    pub fn insert_document(&self, mut document: Document, chunks: Vec<NewChunk>) -> Result<Vec<Uuid>> {
        self.validate(&chunks)?;
        document.chunk_count = chunks.len() as u32;
        let document_id = document.id;

        let mut inner = self.inner.write();
        inner.remove_document(&document_id);
        inner.documents.insert(document_id, document);
        Ok(inner.insert_chunks(document_id, chunks))
    }

    /// Top-k chunks by descending similarity
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.check_dimension(query.len(), || "search".to_string())?;
        check_finite(query, || "search query".to_string())?;

        let inner = self.inner.read();
        if inner.chunks.is_empty() {
            return Err(Error::empty_store("search"));
        }

        Ok(inner
            .index
            .search(query, k)
            .into_iter()
            .filter_map(|(id, score)| {
                inner.chunks.get(&id).map(|chunk| ScoredChunk {
                    chunk: chunk.clone(),
                    score,
                })
            })
            .collect())
    }

    /// Remove a document and its chunks. Returns the number of chunks
    /// removed; unknown ids remove nothing.
    pub fn delete_document(&self, document_id: &Uuid) -> usize {
        let removed = self.inner.write().remove_document(document_id);
        tracing::debug!("Deleted document {} ({} chunks)", document_id, removed);
        removed
    }

    /// Remove everything. Returns the number of chunks removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.write();
        let removed = inner.chunks.len();
        inner.chunks.clear();
        inner.documents.clear();
        inner.document_chunks.clear();
        inner.index.clear();
        removed
    }

    /// Number of stored chunks
    pub fn len(&self) -> usize {
        self.inner.read().chunks.len()
    }

    /// Whether no chunks are stored
    pub fn is_empty(&self) -> bool {
        self.inner.read().chunks.is_empty()
    }

    /// Number of registered documents
    pub fn document_count(&self) -> usize {
        self.inner.read().documents.len()
    }

    /// Registered documents, newest first
    pub fn list_documents(&self) -> Vec<Document> {
        let mut docs: Vec<Document> = self.inner.read().documents.values().cloned().collect();
        docs.sort_by(|a, b| {
            b.uploaded_at
                .cmp(&a.uploaded_at)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        docs
    }

    /// Look up a document
    pub fn get_document(&self, document_id: &Uuid) -> Option<Document> {
        self.inner.read().documents.get(document_id).cloned()
    }

    /// Look up a chunk
    pub fn get_chunk(&self, chunk_id: &Uuid) -> Option<Chunk> {
        self.inner.read().chunks.get(chunk_id).cloned()
    }

    /// Chunk ids belonging to a document, in insertion order
    pub fn chunk_ids_for(&self, document_id: &Uuid) -> Vec<Uuid> {
        self.inner
            .read()
            .document_chunks
            .get(document_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether `dir` holds a persisted store
    pub fn has_persisted(dir: &Path) -> bool {
        dir.join(INDEX_FILE).exists() || dir.join(CHUNKS_FILE).exists()
    }

    /// Write `index.bin` and `chunks.json` into `dir`, each replaced atomically
    pub fn persist(&self, dir: &Path) -> Result<()> {
        let _guard = self.persist_lock.lock();

        let (index_bytes, chunks_bytes) = {
            let inner = self.inner.read();
            let index = IndexFile {
                dimension: self.dimension,
                metric: self.metric,
                rows: inner
                    .index
                    .rows()
                    .map(|(id, vector)| IndexRow {
                        id: id.as_u128(),
                        vector: vector.to_vec(),
                    })
                    .collect(),
            };
            let index_bytes = bincode::serde::encode_to_vec(&index, bincode::config::standard())
                .map_err(|e| Error::internal(format!("Failed to encode index: {}", e)))?;

            let chunks = ChunksFile {
                chunks: inner.chunks.clone(),
                documents: inner.documents.clone(),
            };
            (index_bytes, serde_json::to_vec(&chunks)?)
        };

        std::fs::create_dir_all(dir)?;
        write_atomic(dir, INDEX_FILE, &index_bytes)?;
        write_atomic(dir, CHUNKS_FILE, &chunks_bytes)?;

        tracing::debug!("Persisted vector store to {}", dir.display());
        Ok(())
    }

    /// Load a store written by [`persist`](Self::persist).
    ///
    /// Fails with `StoreCorrupted` on missing or undecodable files, a
    /// dimension or metric that differs from the configuration, or chunk
    /// and index id sets that disagree.
    pub fn restore(dir: &Path, dimension: usize, metric: SimilarityMetric) -> Result<Self> {
        let index_path = dir.join(INDEX_FILE);
        let chunks_path = dir.join(CHUNKS_FILE);

        let index_bytes = std::fs::read(&index_path)
            .map_err(|e| Error::corrupted(&index_path, e.to_string()))?;
        let (index_file, _): (IndexFile, usize) =
            bincode::serde::decode_from_slice(&index_bytes, bincode::config::standard())
                .map_err(|e| Error::corrupted(&index_path, e.to_string()))?;

        let chunks_bytes = std::fs::read(&chunks_path)
            .map_err(|e| Error::corrupted(&chunks_path, e.to_string()))?;
        let chunks_file: ChunksFile = serde_json::from_slice(&chunks_bytes)
            .map_err(|e| Error::corrupted(&chunks_path, e.to_string()))?;

        if index_file.dimension != dimension {
            return Err(Error::corrupted(
                &index_path,
                format!(
                    "dimension {} does not match configured {}",
                    index_file.dimension, dimension
                ),
            ));
        }
        if index_file.metric != metric {
            return Err(Error::corrupted(
                &index_path,
                format!(
                    "metric {:?} does not match configured {:?}",
                    index_file.metric, metric
                ),
            ));
        }

        let mut index = FlatIndex::new(dimension, metric);
        for row in &index_file.rows {
            let id = Uuid::from_u128(row.id);
            if row.vector.len() != dimension {
                return Err(Error::corrupted(
                    &index_path,
                    format!("row {} has length {}", id, row.vector.len()),
                ));
            }
            let chunk = chunks_file.chunks.get(&id).ok_or_else(|| {
                Error::corrupted(&chunks_path, format!("no chunk for indexed id {}", id))
            })?;
            index.insert(id, chunk.ordinal, &row.vector);
        }

        // Every row already maps to a chunk, so equal sizes mean equal id sets
        if index.len() != chunks_file.chunks.len() {
            return Err(Error::corrupted(
                &chunks_path,
                format!(
                    "{} chunks but {} index rows",
                    chunks_file.chunks.len(),
                    index.len()
                ),
            ));
        }

        let mut document_chunks: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        let mut ordered: Vec<&Chunk> = chunks_file.chunks.values().collect();
        ordered.sort_by_key(|c| (c.document_id, c.ordinal));
        for chunk in ordered {
            document_chunks.entry(chunk.document_id).or_default().push(chunk.id);
        }

        tracing::info!(
            "Restored vector store from {} ({} documents, {} chunks)",
            dir.display(),
            chunks_file.documents.len(),
            chunks_file.chunks.len()
        );

        Ok(Self {
            dimension,
            metric,
            inner: RwLock::new(StoreInner {
                chunks: chunks_file.chunks,
                documents: chunks_file.documents,
                document_chunks,
                index,
            }),
            persist_lock: Mutex::new(()),
        })
    }
}

/// NaN or infinite components would poison the ranking
fn check_finite(vector: &[f32], what: impl FnOnce() -> String) -> Result<()> {
    match vector.iter().position(|x| !x.is_finite()) {
        Some(i) => Err(Error::InvalidRequest(format!(
            "{} has a non-finite vector component at {}",
            what(),
            i
        ))),
        None => Ok(()),
    }
}

/// Write via a temp file in the same directory, then rename over `name`
fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(name)).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkSource, SourceType};

    fn new_chunk(ordinal: u32, vector: Vec<f32>) -> NewChunk {
        NewChunk {
            text: format!("chunk {}", ordinal),
            vector,
            ordinal,
            source: ChunkSource {
                filename: "doc.txt".to_string(),
                source_type: SourceType::Text,
                byte_start: 0,
                byte_end: 0,
            },
        }
    }

    fn document(name: &str) -> Document {
        Document::new(name, SourceType::Text, "text".into(), "hash".into(), 4)
    }

    #[test]
    fn test_empty_search() {
        let store = VectorStore::new(3, SimilarityMetric::Cosine);
        assert!(matches!(
            store.search(&[1.0, 0.0, 0.0], 5),
            Err(Error::EmptyStore { .. })
        ));
    }

    #[test]
    fn test_single_add_then_search() {
        let store = VectorStore::new(3, SimilarityMetric::Cosine);
        store
            .add_chunks(Uuid::new_v4(), vec![new_chunk(0, vec![1.0, 0.0, 0.0])])
            .unwrap();
        let hits = store.search(&[0.0, 1.0, 0.0], 1).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_partial_dimension_mismatch_is_atomic() {
        let store = VectorStore::new(3, SimilarityMetric::Cosine);
        let err = store
            .add_chunks(
                Uuid::new_v4(),
                vec![
                    new_chunk(0, vec![1.0, 0.0, 0.0]),
                    new_chunk(1, vec![1.0, 0.0]),
                    new_chunk(2, vec![0.0, 0.0, 1.0]),
                ],
            )
            .unwrap_err();
        match err {
            Error::DimensionMismatch { expected, actual, .. } => {
                assert_eq!((expected, actual), (3, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_non_finite_vectors_are_rejected() {
        let store = VectorStore::new(2, SimilarityMetric::Cosine);
        store
            .insert_document(document("ok.txt"), vec![new_chunk(0, vec![0.1, 0.2])])
            .unwrap();

        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let err = store
                .insert_document(
                    document("bad.txt"),
                    vec![new_chunk(0, vec![1.0, 0.0]), new_chunk(1, vec![bad, 1.0])],
                )
                .unwrap_err();
            assert!(matches!(err, Error::InvalidRequest(_)));
            assert!(matches!(
                store.search(&[bad, 0.0], 1),
                Err(Error::InvalidRequest(_))
            ));
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.document_count(), 1);

        let hits = store.search(&[1.0, 0.0], 5).unwrap();
        assert_eq!(hits[0].chunk.source.filename, "doc.txt");
    }

    #[test]
    fn test_restore_error_can_be_unwrapped() {
        let dir = tempfile::tempdir().unwrap();
        let err = VectorStore::restore(dir.path(), 2, SimilarityMetric::Cosine).unwrap_err();
        assert!(matches!(err, Error::StoreCorrupted { .. }));

        let store = VectorStore::new(2, SimilarityMetric::Cosine);
        assert!(format!("{:?}", store).contains("VectorStore"));
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let store = VectorStore::new(3, SimilarityMetric::Cosine);
        assert!(matches!(
            store.search(&[1.0], 1),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = VectorStore::new(2, SimilarityMetric::Cosine);
        let keep = document("keep.txt");
        let drop = document("drop.txt");
        let drop_id = drop.id;
        store
            .insert_document(keep, vec![new_chunk(0, vec![1.0, 0.0])])
            .unwrap();
        store
            .insert_document(drop, vec![new_chunk(0, vec![0.0, 1.0]), new_chunk(1, vec![0.1, 1.0])])
            .unwrap();

        assert_eq!(store.delete_document(&drop_id), 2);
        assert_eq!(store.delete_document(&drop_id), 0);
        assert_eq!(store.len(), 1);
        assert_eq!(store.document_count(), 1);

        let hits = store.search(&[0.0, 1.0], 10).unwrap();
        assert!(hits.iter().all(|h| h.chunk.document_id != drop_id));
    }

    #[test]
    fn test_clear() {
        let store = VectorStore::new(2, SimilarityMetric::Cosine);
        store
            .insert_document(document("a.txt"), vec![new_chunk(0, vec![1.0, 0.0])])
            .unwrap();
        assert_eq!(store.clear(), 1);
        assert_eq!(store.clear(), 0);
        assert!(matches!(store.search(&[1.0, 0.0], 1), Err(Error::EmptyStore { .. })));
        assert_eq!(store.document_count(), 0);
    }

    #[test]
    fn test_insert_document_sets_chunk_count() {
        let store = VectorStore::new(2, SimilarityMetric::Cosine);
        let doc = document("a.txt");
        let id = doc.id;
        let chunk_ids = store
            .insert_document(doc, vec![new_chunk(0, vec![1.0, 0.0]), new_chunk(1, vec![0.0, 1.0])])
            .unwrap();
        assert_eq!(store.get_document(&id).unwrap().chunk_count, 2);
        assert_eq!(store.chunk_ids_for(&id), chunk_ids);
        assert_eq!(store.get_chunk(&chunk_ids[1]).unwrap().ordinal, 1);
    }

    #[test]
    fn test_k_zero_returns_nothing() {
        let store = VectorStore::new(2, SimilarityMetric::Cosine);
        store
            .add_chunks(Uuid::new_v4(), vec![new_chunk(0, vec![1.0, 0.0])])
            .unwrap();
        assert!(store.search(&[1.0, 0.0], 0).unwrap().is_empty());
    }
}
