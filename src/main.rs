//! RAG Pipeline Optimizer CLI
//!
//! Index a corpus into every configured pipeline and compare their answers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rag_pipeline_optimizer::{
    config::Config,
    evaluator::Verdict,
    ingest::{PlainTextExtractor, collect_document_paths, load_corpus},
    llm::LlmClient,
    orchestrator::IndexStatus,
    persistence::SaveFormat,
    session::{IndexReport, QuestionReport, Session},
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// RAG Pipeline Optimizer - compare RAG configurations on your documents
#[derive(Parser)]
#[command(name = "rag-optimizer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum StoreFormat {
    Json,
    Bin,
}

impl From<StoreFormat> for SaveFormat {
    fn from(format: StoreFormat) -> Self {
        match format {
            StoreFormat::Json => SaveFormat::Json,
            StoreFormat::Bin => SaveFormat::Bincode,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Index documents into every pipeline and save the indexes
    Index {
        /// Files or directories of plain-text documents
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Directory holding one index per pipeline
        #[arg(short, long, default_value = "data/store")]
        store: PathBuf,

        /// On-disk format of the saved indexes
        #[arg(long, value_enum, default_value_t = StoreFormat::Bin)]
        format: StoreFormat,
    },

    /// Ask every pipeline a question and judge the answers
    Ask {
        /// The question
        question: String,

        /// Directory of saved indexes (ignored when --docs is given)
        #[arg(short, long, default_value = "data/store")]
        store: PathBuf,

        /// Index these documents first instead of loading the store
        #[arg(short, long, num_args = 1..)]
        docs: Vec<PathBuf>,

        /// Override the number of retrieved chunks
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,

        /// Save the report to a JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the configured pipelines
    Pipelines,

    /// Test LLM connection
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("rag_pipeline_optimizer=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index {
            paths,
            store,
            format,
        } => cmd_index(paths, store, format.into()).await,
        Commands::Ask {
            question,
            store,
            docs,
            top_k,
            json,
            output,
        } => cmd_ask(question, store, docs, top_k, json, output).await,
        Commands::Pipelines => cmd_pipelines(),
        Commands::Test => cmd_test().await,
    }
}

fn load_config(top_k: Option<usize>) -> Result<Config> {
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(k) = top_k {
        config.top_k = k;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn index_documents(session: &mut Session, paths: &[PathBuf]) -> Result<IndexReport> {
    let files = collect_document_paths(paths).context("Failed to collect documents")?;
    let corpus = load_corpus(&files, &PlainTextExtractor).context("Failed to read documents")?;

    println!(
        "Indexing {} characters from {} file(s) into all pipelines...",
        corpus.chars().count(),
        files.len()
    );
    let report = session.submit_documents(&[corpus]).await;
    print_index_report(&report);
    Ok(report)
}

async fn cmd_index(paths: Vec<PathBuf>, store: PathBuf, format: SaveFormat) -> Result<()> {
    let config = load_config(None)?;
    let mut session = Session::from_config(&config)?;

    let start = Instant::now();
    let report = index_documents(&mut session, &paths).await?;

    session
        .orchestrator()
        .save_indexes(&store, format)
        .context("Failed to save indexes")?;

    println!("\nIndexes saved to: {}", store.display());
    println!("  Total chunks: {}", report.total_chunks());
    println!("  Index time:   {:.2?}", start.elapsed());

    if report.is_empty() {
        anyhow::bail!("No text content was indexed. Check that the documents contain readable text.");
    }
    Ok(())
}

async fn cmd_ask(
    question: String,
    store: PathBuf,
    docs: Vec<PathBuf>,
    top_k: Option<usize>,
    json: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(top_k)?;
    let mut session = Session::from_config(&config)?;

    if docs.is_empty() {
        let counts = session
            .orchestrator_mut()
            .load_indexes(&store)
            .context("Failed to load indexes")?;
        for (id, chunks) in counts {
            info!(pipeline = %id, chunks, "loaded index");
        }
    } else {
        index_documents(&mut session, &docs).await?;
    }

    let start = Instant::now();
    let report = session
        .submit_question(&question)
        .await
        .context("Question failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_question_report(&report);
        println!("Answered in {:.2?}", start.elapsed());
    }

    if let Some(path) = output {
        write_report(&report, &path)?;
        println!("Report saved to {}", path.display());
    }

    Ok(())
}

fn write_report(report: &QuestionReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_index_report(report: &IndexReport) {
    for outcome in &report.pipelines {
        match &outcome.status {
            IndexStatus::Indexed { chunks: 0 } => {
                println!("  Pipeline {}: nothing indexed", outcome.pipeline_id)
            }
            IndexStatus::Indexed { chunks } => {
                println!("  Pipeline {}: {} chunks indexed", outcome.pipeline_id, chunks)
            }
            IndexStatus::Failed { reason } => {
                println!("  Pipeline {}: FAILED - {}", outcome.pipeline_id, reason)
            }
        }
    }
}

fn print_question_report(report: &QuestionReport) {
    let winner = report.verdict.winner();

    println!("Question: {}", report.question);
    println!("{}", "─".repeat(60));

    for answer in &report.answers {
        let marker = if winner == Some(answer.pipeline_id.as_str()) {
            " [winner]"
        } else {
            ""
        };
        println!(
            "Pipeline {} ({}){}",
            answer.pipeline_id, answer.description, marker
        );
        if let Some(card) = report.verdict.scores_for(&answer.pipeline_id) {
            println!(
                "  accuracy {} | relevance {} | cost-efficiency {} | total {}",
                card.accuracy,
                card.relevance,
                card.cost_efficiency,
                card.total()
            );
        }
        for line in answer.answer.lines() {
            println!("    {}", line);
        }
        println!();
    }

    println!("{}", "─".repeat(60));
    match &report.verdict {
        Verdict::Scored { winner, .. } => {
            let ranking = report
                .verdict
                .ranking()
                .iter()
                .map(|(id, total)| format!("{} ({})", id, total))
                .collect::<Vec<_>>()
                .join(" > ");
            println!("Winner: Pipeline {}", winner);
            println!("Ranking: {}", ranking);
        }
        Verdict::Raw { raw } => {
            println!("Judge output was not in the expected format. Raw output:");
            println!("{}", raw);
        }
    }
}

fn cmd_pipelines() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    println!("Configured pipelines");
    println!("{}", "─".repeat(40));
    for pipeline in &config.pipelines {
        println!(
            "  {}: chunk={} model={}  ({})",
            pipeline.id, pipeline.chunk_size, pipeline.embedding_model, pipeline.description
        );
    }
    println!("  top_k: {}", config.top_k);

    Ok(())
}

async fn cmd_test() -> Result<()> {
    println!("Testing LLM connection...\n");

    let config = Config::load().context("Failed to load configuration")?;

    println!("Configuration:");
    println!("  API Base:    {}", config.llm.api_base);
    println!("  Model:       {}", config.llm.model);
    println!("  Judge model: {}", config.judge.model);
    println!(
        "  API Key:     {}...",
        config.llm.api_key.chars().take(8).collect::<String>()
    );
    println!();

    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    for client in [
        LlmClient::new(config.llm.clone()),
        LlmClient::new(config.judge_config()),
    ] {
        println!("Sending test request to {}...", client.model());
        match client.test_connection().await {
            Ok(()) => println!("  Connection successful!"),
            Err(e) => println!("  Connection failed: {}", e),
        }
    }

    Ok(())
}
