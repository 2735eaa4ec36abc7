//! One RAG configuration: chunker + embedder + index + generator.

use crate::chunker::{ChunkConfig, chunk_document};
use crate::config::PipelineConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::{ChatModel, Prompts};
use crate::vector_index::VectorIndex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Answer text when the index holds nothing.
pub const NO_DOCUMENTS_ANSWER: &str = "No documents indexed. Please upload documents first.";

/// Answer text when retrieval returns no usable context.
pub const NO_CONTEXT_ANSWER: &str = "No relevant context found in the documents. Please try a different question or ensure documents are properly indexed.";

/// How a pipeline's answer attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// The generator answered from retrieved context.
    Resolved { text: String, context: String },
    /// Embedding, retrieval or generation failed.
    Failed { reason: String },
    /// Nothing has been indexed.
    NoDocuments,
    /// Retrieval produced no usable context.
    NoContext,
}

/// One pipeline's answer to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineAnswer {
    pub pipeline_id: String,
    pub description: String,
    pub outcome: AnswerOutcome,
}

impl PipelineAnswer {
    /// Text shown to the judge and the user.
    pub fn answer_text(&self) -> String {
        match &self.outcome {
            AnswerOutcome::Resolved { text, .. } => text.clone(),
            AnswerOutcome::Failed { reason } => {
                format!("Error: Error in pipeline {}: {}", self.pipeline_id, reason)
            }
            AnswerOutcome::NoDocuments => NO_DOCUMENTS_ANSWER.to_string(),
            AnswerOutcome::NoContext => NO_CONTEXT_ANSWER.to_string(),
        }
    }

    /// Retrieved context; empty unless resolved.
    pub fn context(&self) -> &str {
        match &self.outcome {
            AnswerOutcome::Resolved { context, .. } => context,
            _ => "",
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.outcome, AnswerOutcome::Resolved { .. })
    }
}

/// A named RAG configuration owning its own index and embedder.
pub struct Pipeline {
    config: PipelineConfig,
    chunking: ChunkConfig,
    embedder: Box<dyn EmbeddingProvider>,
    generator: Arc<dyn ChatModel>,
    index: VectorIndex,
}

impl Pipeline {
    /// Bind a configuration to its collaborators. Fails on bad chunk parameters.
    pub fn new(
        config: PipelineConfig,
        embedder: Box<dyn EmbeddingProvider>,
        generator: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        let chunking = ChunkConfig::for_chunk_size(config.chunk_size)?;
        let index = VectorIndex::new(config.id.clone());
        Ok(Self {
            config,
            chunking,
            embedder,
            generator,
            index,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn vector_index(&self) -> &VectorIndex {
        &self.index
    }

    /// Swap in a previously persisted index.
    pub fn restore_index(&mut self, index: VectorIndex) -> Result<()> {
        if index.pipeline_id() != self.config.id {
            return Err(RagError::InvalidInput(format!(
                "index belongs to pipeline '{}', not '{}'",
                index.pipeline_id(),
                self.config.id
            )));
        }
        self.index = index;
        Ok(())
    }

    /// Drop all indexed chunks.
    pub fn clear(&mut self) {
        self.index.clear();
    }

    /// Re-index the pipeline from raw document texts.
    ///
    /// The index is cleared first and stays empty if anything fails. Returns
    /// the number of chunks stored, which is zero when every document or chunk
    /// was blank.
    pub async fn index(&mut self, raw_texts: &[String]) -> Result<usize> {
        self.clear();

        let mut chunks = Vec::new();
        let mut embeddings = Vec::new();

        for (doc_index, raw_text) in raw_texts.iter().enumerate() {
            if raw_text.trim().is_empty() {
                warn!(pipeline = %self.config.id, doc_index, "skipping blank document");
                continue;
            }

            let doc_chunks: Vec<_> = chunk_document(raw_text, doc_index, &self.chunking)
                .into_iter()
                .filter(|c| !c.text.trim().is_empty())
                .collect();
            if doc_chunks.is_empty() {
                continue;
            }

            let texts: Vec<String> = doc_chunks.iter().map(|c| c.text.clone()).collect();
            embeddings.extend(self.embed_checked(&texts).await?);
            chunks.extend(doc_chunks);
        }

        if chunks.is_empty() {
            warn!(pipeline = %self.config.id, "no chunks to index");
            return Ok(0);
        }

        let count = self.index.index_all(&chunks, embeddings)?;
        info!(pipeline = %self.config.id, chunks = count, "indexed documents");
        Ok(count)
    }

    /// Answer `question` from the top `top_k` chunks. Never fails.
    pub async fn answer(&self, question: &str, top_k: usize) -> PipelineAnswer {
        let outcome = match self.try_answer(question, top_k).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(pipeline = %self.config.id, error = %e, "answer failed");
                AnswerOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        PipelineAnswer {
            pipeline_id: self.config.id.clone(),
            description: self.config.description.clone(),
            outcome,
        }
    }

    async fn try_answer(&self, question: &str, top_k: usize) -> Result<AnswerOutcome> {
        if self.index.is_empty() {
            return Ok(AnswerOutcome::NoDocuments);
        }

        let query = self.embed_checked(&[question.to_string()]).await?;
        let hits = self.index.query(&query[0], top_k)?;
        debug!(pipeline = %self.config.id, hits = hits.len(), "retrieved chunks");

        let context = hits
            .iter()
            .map(|h| h.text.as_str())
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        if context.trim().is_empty() {
            return Ok(AnswerOutcome::NoContext);
        }

        let prompt = Prompts::rag_answer(&context, question);
        let text = self
            .generator
            .complete(None, &prompt)
            .await
            .map_err(|e| match e {
                RagError::Generation(_) => e,
                other => RagError::Generation(other.to_string()),
            })?;

        Ok(AnswerOutcome::Resolved { text, context })
    }

    /// Embed and insist on exactly one vector per input.
    async fn embed_checked(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.embedder.model_name();
        let vectors = self.embedder.embed(texts).await.map_err(|e| match e {
            RagError::Embedding { .. } => e,
            other => RagError::embedding(model, other),
        })?;

        if vectors.len() != texts.len() {
            return Err(RagError::embedding(
                model,
                format!("expected {} vectors, got {}", texts.len(), vectors.len()),
            ));
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Letter-frequency vectors: deterministic and good enough for ranking.
    struct LetterEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LetterEmbedder {
        fn model_name(&self) -> &str {
            "letters"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0; 26];
                    for c in t.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
                        v[(c as u8 - b'a') as usize] += 1.0;
                    }
                    v
                })
                .collect())
        }
    }

    /// Drops the last vector of every batch.
    struct ShortEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0]; texts.len().saturating_sub(1)])
        }
    }

    /// Indexes like [`LetterEmbedder`] but mishandles questions.
    enum QuestionBreaker {
        Errors,
        WrongDimension,
    }

    #[async_trait]
    impl EmbeddingProvider for QuestionBreaker {
        fn model_name(&self) -> &str {
            "breaker"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if !texts.iter().any(|t| t.ends_with('?')) {
                return LetterEmbedder.embed(texts).await;
            }
            match self {
                QuestionBreaker::Errors => Err(RagError::LlmApi("embedding quota".to_string())),
                QuestionBreaker::WrongDimension => Ok(vec![vec![1.0, 0.0, 0.0]; texts.len()]),
            }
        }
    }

    struct CountingModel {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingModel {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl ChatModel for CountingModel {
        async fn complete(&self, _system: Option<&str>, user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RagError::LlmApi("rate limited".to_string()));
            }
            Ok(format!("answered {} chars", user.len()))
        }
    }

    fn pipeline(embedder: Box<dyn EmbeddingProvider>, model: Arc<CountingModel>) -> Pipeline {
        Pipeline::new(
            PipelineConfig::new("A", "Chunk=16", 16, "letters"),
            embedder,
            model,
        )
        .unwrap()
    }

    fn docs(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_index_sentinel_skips_generator() {
        let model = CountingModel::new(false);
        let mut p = pipeline(Box::new(LetterEmbedder), model.clone());
        p.clear();

        let answer = p.answer("anything?", 4).await;
        assert_eq!(answer.outcome, AnswerOutcome::NoDocuments);
        assert_eq!(answer.answer_text(), NO_DOCUMENTS_ANSWER);
        assert_eq!(answer.context(), "");
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_index_and_answer() {
        let model = CountingModel::new(false);
        let mut p = pipeline(Box::new(LetterEmbedder), model.clone());

        let count = p
            .index(&docs(&["The sky is blue. Water is wet.", "   "]))
            .await
            .unwrap();
        assert!(count > 0);
        assert_eq!(p.vector_index().len(), count);

        let answer = p.answer("What color is the sky?", 2).await;
        assert!(answer.is_resolved());
        assert!(!answer.context().is_empty());
        assert!(answer.answer_text().starts_with("answered"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reindex_does_not_accumulate() {
        let mut p = pipeline(Box::new(LetterEmbedder), CountingModel::new(false));
        let first = p.index(&docs(&["alpha beta gamma delta"])).await.unwrap();
        let second = p.index(&docs(&["alpha beta gamma delta"])).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(p.vector_index().len(), first);
    }

    #[tokio::test]
    async fn test_blank_documents_report_zero() {
        let mut p = pipeline(Box::new(LetterEmbedder), CountingModel::new(false));
        p.index(&docs(&["some earlier text"])).await.unwrap();

        let count = p.index(&docs(&["", " \n "])).await.unwrap();
        assert_eq!(count, 0);
        assert!(p.vector_index().is_empty());
    }

    #[tokio::test]
    async fn test_short_embedding_batch_fails_and_clears() {
        let mut p = pipeline(Box::new(ShortEmbedder), CountingModel::new(false));
        let err = p.index(&docs(&["The sky is blue."])).await.unwrap_err();
        assert!(matches!(err, RagError::Embedding { .. }));
        assert!(p.vector_index().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_becomes_failed_answer() {
        let model = CountingModel::new(true);
        let mut p = pipeline(Box::new(LetterEmbedder), model.clone());
        p.index(&docs(&["The sky is blue."])).await.unwrap();

        let answer = p.answer("sky?", 4).await;
        match &answer.outcome {
            AnswerOutcome::Failed { reason } => assert!(reason.contains("rate limited")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(answer.answer_text().starts_with("Error: Error in pipeline A:"));
        assert_eq!(answer.context(), "");
    }

    #[tokio::test]
    async fn test_question_embedding_failure_becomes_failed_answer() {
        let model = CountingModel::new(false);
        let mut p = pipeline(Box::new(QuestionBreaker::Errors), model.clone());
        p.index(&docs(&["The sky is blue."])).await.unwrap();

        let answer = p.answer("sky?", 4).await;
        match &answer.outcome {
            AnswerOutcome::Failed { reason } => assert!(reason.contains("embedding quota")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(answer.answer_text().starts_with("Error: Error in pipeline A:"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retrieval_dimension_mismatch_becomes_failed_answer() {
        let model = CountingModel::new(false);
        let mut p = pipeline(Box::new(QuestionBreaker::WrongDimension), model.clone());
        p.index(&docs(&["The sky is blue."])).await.unwrap();

        let answer = p.answer("sky?", 4).await;
        assert!(matches!(answer.outcome, AnswerOutcome::Failed { .. }));
        assert_eq!(answer.context(), "");
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_top_k_is_no_context() {
        let model = CountingModel::new(false);
        let mut p = pipeline(Box::new(LetterEmbedder), model.clone());
        p.index(&docs(&["The sky is blue."])).await.unwrap();

        let answer = p.answer("sky?", 0).await;
        assert_eq!(answer.outcome, AnswerOutcome::NoContext);
        assert_eq!(answer.answer_text(), NO_CONTEXT_ANSWER);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_restore_index_checks_owner() {
        let mut p = pipeline(Box::new(LetterEmbedder), CountingModel::new(false));
        assert!(p.restore_index(VectorIndex::new("B")).is_err());
        assert!(p.restore_index(VectorIndex::new("A")).is_ok());
    }
}
