//! Fan-out of indexing and answering across every configured pipeline.
//!
//! Pipelines share no mutable state, so they run concurrently with
//! `join_all`. Results always come back in configuration order.

use crate::config::{PipelineConfig, validate_pipelines};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::llm::ChatModel;
use crate::persistence::{SaveFormat, index_path, load_index, remove_index, save_index};
use crate::pipeline::{Pipeline, PipelineAnswer};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of indexing one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexStatus {
    /// Indexing finished; `chunks` may be zero.
    Indexed { chunks: usize },
    /// Indexing failed; the pipeline's index is empty.
    Failed { reason: String },
}

/// Per-pipeline indexing report entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOutcome {
    pub pipeline_id: String,
    #[serde(flatten)]
    pub status: IndexStatus,
}

impl IndexOutcome {
    /// Chunks stored, zero on failure.
    pub fn chunks(&self) -> usize {
        match self.status {
            IndexStatus::Indexed { chunks } => chunks,
            IndexStatus::Failed { .. } => 0,
        }
    }
}

/// Owns the fixed, ordered set of pipelines for a session.
pub struct Orchestrator {
    pipelines: Vec<Pipeline>,
}

impl Orchestrator {
    /// Build one pipeline per config, each with its own embedder instance.
    pub fn new<F>(
        configs: Vec<PipelineConfig>,
        mut make_embedder: F,
        generator: Arc<dyn ChatModel>,
    ) -> Result<Self>
    where
        F: FnMut(&PipelineConfig) -> Box<dyn EmbeddingProvider>,
    {
        validate_pipelines(&configs)?;

        let pipelines = configs
            .into_iter()
            .map(|config| {
                let embedder = make_embedder(&config);
                Pipeline::new(config, embedder, generator.clone())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { pipelines })
    }

    /// Wrap pipelines built elsewhere, checking the table they form.
    pub fn from_pipelines(pipelines: Vec<Pipeline>) -> Result<Self> {
        let configs: Vec<PipelineConfig> = pipelines.iter().map(|p| p.config().clone()).collect();
        validate_pipelines(&configs)?;
        Ok(Self { pipelines })
    }

    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    pub fn pipeline_ids(&self) -> Vec<&str> {
        self.pipelines.iter().map(|p| p.id()).collect()
    }

    /// Clear and re-index every pipeline. One pipeline failing leaves the others intact.
    pub async fn index_all(&mut self, raw_texts: &[String]) -> Vec<IndexOutcome> {
        let tasks = self.pipelines.iter_mut().map(|pipeline| async move {
            let pipeline_id = pipeline.id().to_string();
            let status = match pipeline.index(raw_texts).await {
                Ok(chunks) => IndexStatus::Indexed { chunks },
                Err(e) => {
                    warn!(pipeline = %pipeline_id, error = %e, "indexing failed");
                    IndexStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            IndexOutcome {
                pipeline_id,
                status,
            }
        });

        let outcomes = join_all(tasks).await;
        let total: usize = outcomes.iter().map(IndexOutcome::chunks).sum();
        info!(pipelines = outcomes.len(), total_chunks = total, "indexing finished");
        outcomes
    }

    /// Ask every pipeline, returning answers in configuration order.
    pub async fn answer_all(&self, question: &str, top_k: usize) -> Vec<PipelineAnswer> {
        join_all(self.pipelines.iter().map(|p| p.answer(question, top_k))).await
    }

    /// Write every pipeline's index into `dir`.
    ///
    /// Snapshots of the same pipeline in other formats are removed so a later
    /// load cannot pick up an older corpus.
    pub fn save_indexes(&self, dir: &Path, format: SaveFormat) -> Result<()> {
        for pipeline in &self.pipelines {
            save_index(
                pipeline.vector_index(),
                &index_path(dir, pipeline.id(), format),
            )?;
            for stale in SaveFormat::ALL.into_iter().filter(|f| *f != format) {
                remove_index(&index_path(dir, pipeline.id(), stale))?;
            }
        }
        Ok(())
    }

    /// Restore indexes saved by [`save_indexes`](Self::save_indexes).
    ///
    /// Pipelines without a snapshot keep an empty index. Returns the chunk
    /// count per pipeline in configuration order.
    pub fn load_indexes(&mut self, dir: &Path) -> Result<Vec<(String, usize)>> {
        let mut loaded = Vec::with_capacity(self.pipelines.len());
        for pipeline in &mut self.pipelines {
            let found = SaveFormat::ALL
                .into_iter()
                .map(|format| index_path(dir, pipeline.id(), format))
                .find(|path| path.is_file());

            match found {
                Some(path) => pipeline.restore_index(load_index(&path)?)?,
                None => {
                    warn!(pipeline = %pipeline.id(), dir = %dir.display(), "no saved index");
                    pipeline.clear();
                }
            }
            loaded.push((pipeline.id().to_string(), pipeline.vector_index().len()));
        }
        Ok(loaded)
    }
}
