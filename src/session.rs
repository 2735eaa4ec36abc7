//! The two operations exposed to callers: submit documents, submit a question.

use crate::config::Config;
use crate::embedding::{EmbeddingProvider, OpenAiEmbedder};
use crate::error::{RagError, Result};
use crate::evaluator::{Evaluator, Verdict};
use crate::llm::{ChatModel, LlmClient};
use crate::orchestrator::{IndexOutcome, Orchestrator};
use crate::pipeline::{AnswerOutcome, PipelineAnswer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Chunk counts per pipeline after a document submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReport {
    pub pipelines: Vec<IndexOutcome>,
}

impl IndexReport {
    pub fn total_chunks(&self) -> usize {
        self.pipelines.iter().map(IndexOutcome::chunks).sum()
    }

    /// True when no pipeline stored anything.
    pub fn is_empty(&self) -> bool {
        self.total_chunks() == 0
    }
}

/// A pipeline answer flattened for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerView {
    pub pipeline_id: String,
    pub description: String,
    pub answer: String,
    pub context: String,
    pub status: String,
}

impl From<&PipelineAnswer> for AnswerView {
    fn from(answer: &PipelineAnswer) -> Self {
        let status = match answer.outcome {
            AnswerOutcome::Resolved { .. } => "resolved",
            AnswerOutcome::Failed { .. } => "failed",
            AnswerOutcome::NoDocuments => "no_documents",
            AnswerOutcome::NoContext => "no_context",
        };
        Self {
            pipeline_id: answer.pipeline_id.clone(),
            description: answer.description.clone(),
            answer: answer.answer_text(),
            context: answer.context().to_string(),
            status: status.to_string(),
        }
    }
}

/// Every pipeline's answer plus the judge's verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionReport {
    pub question: String,
    pub answers: Vec<AnswerView>,
    pub verdict: Verdict,
}

/// A benchmarking session over one corpus.
pub struct Session {
    orchestrator: Orchestrator,
    evaluator: Evaluator,
    top_k: usize,
}

impl Session {
    pub fn new(orchestrator: Orchestrator, evaluator: Evaluator, top_k: usize) -> Self {
        Self {
            orchestrator,
            evaluator,
            top_k,
        }
    }

    /// Wire up HTTP-backed models and embedders from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let generator: Arc<dyn ChatModel> = Arc::new(LlmClient::new(config.llm.clone()));
        let judge: Arc<dyn ChatModel> = Arc::new(LlmClient::new(config.judge_config()));
        let (embed_base, embed_key) = config.embedding_endpoint();

        let orchestrator = Orchestrator::new(
            config.pipelines.clone(),
            |pipeline| -> Box<dyn EmbeddingProvider> {
                Box::new(OpenAiEmbedder::new(
                    embed_base.clone(),
                    embed_key.clone(),
                    pipeline.embedding_model.clone(),
                ))
            },
            generator,
        )?;

        Ok(Self::new(orchestrator, Evaluator::new(judge), config.top_k))
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    /// Re-index every pipeline from `texts`.
    pub async fn submit_documents(&mut self, texts: &[String]) -> IndexReport {
        info!(documents = texts.len(), "indexing submission");
        let pipelines = self.orchestrator.index_all(texts).await;
        IndexReport { pipelines }
    }

    /// Answer `question` with every pipeline and judge the results.
    pub async fn submit_question(&self, question: &str) -> Result<QuestionReport> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::InvalidInput("question is required".to_string()));
        }

        let answers = self.orchestrator.answer_all(question, self.top_k).await;
        let verdict = self.evaluator.evaluate(question, &answers).await;

        Ok(QuestionReport {
            question: question.to_string(),
            answers: answers.iter().map(AnswerView::from).collect(),
            verdict,
        })
    }
}
