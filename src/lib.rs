//! RAG Pipeline Optimizer - benchmark several retrieval-augmented generation
//! configurations against the same corpus and let an LLM judge rank them.
//!
//! # Overview
//!
//! Each configuration ([`PipelineConfig`]) fixes a chunk size and an
//! embedding model. For one corpus and one question the optimizer:
//! 1. Chunks every document into overlapping character windows
//! 2. Embeds and stores the chunks in an index owned by that configuration
//! 3. Retrieves the best chunks for the question and asks the generation model
//! 4. Hands every configuration's answer to a judge model for scoring
//!
//! # Quick Start
//!
//! ```no_run
//! use rag_pipeline_optimizer::{Config, Session};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let mut session = Session::from_config(&config)?;
//!
//!     let report = session
//!         .submit_documents(&["The sky is blue. Water is wet.".to_string()])
//!         .await;
//!     println!("{} chunks indexed", report.total_chunks());
//!
//!     let result = session.submit_question("What color is the sky?").await?;
//!     for answer in &result.answers {
//!         println!("{}: {}", answer.pipeline_id, answer.answer);
//!     }
//!     println!("winner: {:?}", result.verdict.winner());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **chunker**: deterministic sliding-window chunking
//! - **embedding**: `EmbeddingProvider` trait and OpenAI-compatible client
//! - **vector_index**: per-pipeline cosine-similarity store
//! - **pipeline**: index/answer for one configuration
//! - **orchestrator**: concurrent, order-stable fan-out over all pipelines
//! - **evaluator**: judge prompt, strict parse, raw fallback
//! - **session**: `submit_documents` / `submit_question`

pub mod chunker;
pub mod config;
pub mod embedding;
pub mod error;
pub mod evaluator;
pub mod ingest;
pub mod llm;
pub mod orchestrator;
pub mod persistence;
pub mod pipeline;
pub mod session;
pub mod vector_index;

// Re-export commonly used types
pub use chunker::{Chunk, ChunkConfig, chunk};
pub use config::{Config, PipelineConfig};
pub use embedding::{EmbeddingProvider, OpenAiEmbedder};
pub use error::{RagError, Result};
pub use evaluator::{Evaluator, ScoreCard, Verdict};
pub use llm::{ChatModel, LlmClient};
pub use orchestrator::{IndexOutcome, IndexStatus, Orchestrator};
pub use pipeline::{AnswerOutcome, Pipeline, PipelineAnswer};
pub use session::{AnswerView, IndexReport, QuestionReport, Session};
pub use vector_index::VectorIndex;
