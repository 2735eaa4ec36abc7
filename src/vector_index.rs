//! Per-pipeline in-memory vector index with cosine-similarity search.

use crate::chunker::Chunk;
use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Metadata stored alongside each chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct ChunkMetadata {
    pub pipeline_id: String,
    pub source_doc_index: usize,
    pub chunk_index: usize,
}

/// A chunk as stored in one pipeline's index.
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
pub struct IndexedChunk {
    /// Unique within the owning index.
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Search hit, best first.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub id: String,
    pub text: String,
    /// Cosine similarity in [-1, 1].
    pub score: f32,
}

/// Serializable form of an index.
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
pub struct IndexSnapshot {
    pub pipeline_id: String,
    pub entries: Vec<IndexedChunk>,
}

/// Vector store scoped to a single pipeline.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    pipeline_id: String,
    entries: Vec<IndexedChunk>,
}

impl VectorIndex {
    /// Create an empty index owned by `pipeline_id`.
    pub fn new(pipeline_id: impl Into<String>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            entries: Vec::new(),
        }
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// Remove every entry. Safe on an empty index.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replace the index contents with `chunks` and their `embeddings`.
    ///
    /// Inputs are validated before anything is touched, so a rejected call
    /// leaves the previous contents in place. Blank chunks are skipped; the
    /// return value is the number actually stored and may be zero.
    pub fn index_all(&mut self, chunks: &[Chunk], embeddings: Vec<Vec<f32>>) -> Result<usize> {
        if chunks.len() != embeddings.len() {
            return Err(RagError::IndexMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        check_dimensions(embeddings.iter().map(Vec::len))?;

        let mut entries = Vec::with_capacity(chunks.len());
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            if chunk.text.trim().is_empty() {
                continue;
            }
            entries.push(IndexedChunk {
                id: format!(
                    "{}_{}_{}_{}",
                    self.pipeline_id,
                    chunk.source_doc_index,
                    chunk.chunk_index,
                    entries.len() + 1
                ),
                text: chunk.text.clone(),
                embedding,
                metadata: ChunkMetadata {
                    pipeline_id: self.pipeline_id.clone(),
                    source_doc_index: chunk.source_doc_index,
                    chunk_index: chunk.chunk_index,
                },
            });
        }

        self.entries = entries;
        Ok(self.entries.len())
    }

    /// Nearest neighbours of `embedding`, at most `top_k`, best first.
    pub fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        if let Some(expected) = self.dimension() {
            if expected != embedding.len() {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }

        let mut results: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                id: entry.id.clone(),
                text: entry.text.clone(),
                score: cosine_similarity(embedding, &entry.embedding),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);

        Ok(results)
    }

    /// Number of chunks in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexedChunk] {
        &self.entries
    }

    /// Embedding length shared by every entry, if any.
    pub fn dimension(&self) -> Option<usize> {
        self.entries.first().map(|e| e.embedding.len())
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            pipeline_id: self.pipeline_id.clone(),
            entries: self.entries.clone(),
        }
    }

    /// Rebuild an index from a snapshot, checking the stored invariants.
    pub fn restore(snapshot: IndexSnapshot) -> Result<Self> {
        let mut ids = HashSet::new();
        for entry in &snapshot.entries {
            if !ids.insert(entry.id.as_str()) {
                return Err(RagError::Serialization(format!(
                    "duplicate chunk id '{}' in snapshot",
                    entry.id
                )));
            }
            if entry.metadata.pipeline_id != snapshot.pipeline_id {
                return Err(RagError::Serialization(format!(
                    "chunk '{}' belongs to pipeline '{}', not '{}'",
                    entry.id, entry.metadata.pipeline_id, snapshot.pipeline_id
                )));
            }
        }
        check_dimensions(snapshot.entries.iter().map(|e| e.embedding.len()))?;

        Ok(Self {
            pipeline_id: snapshot.pipeline_id,
            entries: snapshot.entries,
        })
    }
}

fn check_dimensions(mut lengths: impl Iterator<Item = usize>) -> Result<()> {
    let Some(expected) = lengths.next() else {
        return Ok(());
    };
    match lengths.find(|&len| len != expected) {
        Some(actual) => Err(RagError::DimensionMismatch { expected, actual }),
        None => Ok(()),
    }
}
