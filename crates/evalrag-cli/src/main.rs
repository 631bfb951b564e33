//! EvalRAG CLI - Command-line interface
//!
//! Usage:
//!   evalrag extract <document>
//!   evalrag chunk <document> [--size 1200] [--overlap 200]
//!   evalrag ingest <assignment-id> <document>
//!   evalrag grade --assignment-id <id> --title <title> --max-marks <n> --submission-id <id> <document>
//!   evalrag purge <assignment-id>
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use evalrag_core::{AppConfig, Assignment, LoggingConfig};
use evalrag_parser::{chunk_text, ChunkConfig, TextExtraction, TextExtractor};
use evalrag_rag::EvaluationPipeline;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "evalrag")]
#[command(about = "Reference-grounded assignment grading")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables take precedence)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract plain text from a document URL or path
    Extract {
        document: String,
    },
    /// Show how a document would be chunked
    Chunk {
        document: String,
        /// Chunk size in characters
        #[arg(long)]
        size: Option<usize>,
        /// Overlap between chunks in characters
        #[arg(long)]
        overlap: Option<usize>,
    },
    /// Index reference material for an assignment
    Ingest {
        assignment_id: String,
        document: String,
    },
    /// Grade a submission against the assignment's reference material
    Grade {
        #[arg(long)]
        assignment_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        max_marks: f64,
        #[arg(long)]
        submission_id: String,
        document: String,
    },
    /// Delete every vector of an assignment
    Purge {
        assignment_id: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?
            .with_env_override()?,
        None => AppConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},hyper=warn,h2=warn", logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    init_tracing(&config.logging);
    tracing::debug!(config = ?cli.config, "Configuration loaded");

    match cli.command {
        Commands::Extract { document } => {
            let extractor = TextExtractor::from_config(&config.storage);
            let text = extractor.extract_text(&document).await?;
            print_json(&json!({
                "document": document,
                "chars": text.chars().count(),
                "text": text,
            }))?;
        }
        Commands::Chunk {
            document,
            size,
            overlap,
        } => {
            let chunking = ChunkConfig::new(
                size.unwrap_or(config.grading.chunk_size),
                overlap.unwrap_or(config.grading.chunk_overlap),
            )?;
            let extractor = TextExtractor::from_config(&config.storage);
            let text = extractor.extract_text(&document).await?;
            let chunks = chunk_text(&text, &chunking)?;

            let chunks: Vec<_> = chunks
                .iter()
                .map(|c| {
                    json!({
                        "index": c.index,
                        "start": c.start_offset,
                        "end": c.end_offset,
                        "content": c.content,
                    })
                })
                .collect();
            let chunk_count = chunks.len();
            print_json(&json!({ "chunk_count": chunk_count, "chunks": chunks }))?;
        }
        Commands::Ingest {
            assignment_id,
            document,
        } => {
            let pipeline = EvaluationPipeline::from_config(&config)?;
            let report = pipeline.ingest_reference(&assignment_id, &document).await?;
            print_json(&json!({
                "assignment_id": assignment_id,
                "chunk_count": report.chunk_count,
                "indexed_at": report.indexed_at,
            }))?;
        }
        Commands::Grade {
            assignment_id,
            title,
            max_marks,
            submission_id,
            document,
        } => {
            let pipeline = EvaluationPipeline::from_config(&config)?;
            let assignment = Assignment::new(assignment_id, title, max_marks);
            let result = pipeline
                .evaluate_submission(&assignment, &submission_id, &document)
                .await?;
            print_json(&json!({
                "submission_id": submission_id,
                "status": result.status,
                "grade": result.grade,
                "feedback": result.feedback,
                "similarity": result.similarity,
                "reference_chunks": result.reference_chunks,
            }))?;
        }
        Commands::Purge { assignment_id } => {
            let pipeline = EvaluationPipeline::from_config(&config)?;
            pipeline.purge(&assignment_id).await;
            print_json(&json!({ "assignment_id": assignment_id, "purged": true }))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_grade_arguments() {
        let cli = Cli::try_parse_from([
            "evalrag",
            "grade",
            "--assignment-id",
            "a1",
            "--title",
            "Cells",
            "--max-marks",
            "100",
            "--submission-id",
            "s1",
            "uploads/s1.pdf",
        ])
        .unwrap();

        match cli.command {
            Commands::Grade {
                max_marks, document, ..
            } => {
                assert_eq!(max_marks, 100.0);
                assert_eq!(document, "uploads/s1.pdf");
            }
            _ => panic!("expected grade command"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["evalrag", "purge", "a1", "--config", "evalrag.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("evalrag.toml")));
    }
}
