//! Council Evaluation CLI
//!
//! Benchmarks a multi-stage council answering service: accuracy and latency
//! of the full pipeline against a single-model baseline, plus an ablation
//! study across feature configurations.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run everything against a local service
//! council-eval run --endpoint http://localhost:8787
//!
//! # Accuracy/latency benchmark only, 30 samples, custom output
//! council-eval run --benchmark truthfulqa --samples 30 --output results/eval.md
//!
//! # Ablation study only
//! council-eval run --benchmark ablation --samples 15
//!
//! # Use a custom question file
//! council-eval run --questions ./my-questions.json
//! ```
//!
//! Endpoint, pacing, and council size can also be set in `eval.toml`;
//! command-line flags override it.

mod benchmark;
mod client;
mod config;
mod dataset;
mod protocol;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

use benchmark::{AblationStudy, AblationSummary, AblationVariant, BenchmarkRunner, EvalReport, RunResult};
use client::{SingleStageClient, StagedClient};
use config::{EvalConfig, VerificationMode};
use dataset::QuestionFile;

/// Which benchmark(s) to run
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum BenchmarkArg {
    /// Full pipeline vs. baseline over the question set
    Truthfulqa,
    /// Ablation study across the four feature configurations
    Ablation,
    /// Both
    #[default]
    All,
}

#[derive(Parser)]
#[command(name = "council-eval")]
#[command(about = "Benchmark harness for multi-stage council answering services")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run benchmarks and write a markdown report
    Run {
        /// Benchmark to run
        #[arg(short, long, value_enum, default_value = "all")]
        benchmark: BenchmarkArg,

        /// Number of questions per benchmark
        #[arg(short, long, default_value = "20")]
        samples: usize,

        /// Output file for the markdown report
        #[arg(short, long, default_value = "results/eval_report.md")]
        output: PathBuf,

        /// Service base URL (overrides eval.toml)
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Question file (JSON); defaults to the built-in TruthfulQA subset
        #[arg(short, long)]
        questions: Option<PathBuf>,

        /// Delay between requests in milliseconds (overrides eval.toml)
        #[arg(long)]
        pacing_ms: Option<u64>,

        /// Also dump the structured report and raw results as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Validate a question file
    ValidateQuestions {
        /// Path to the question JSON file
        #[arg(short, long)]
        questions: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            benchmark,
            samples,
            output,
            endpoint,
            questions,
            pacing_ms,
            json,
        } => {
            run_eval(benchmark, samples, &output, endpoint, questions, pacing_ms, json).await?;
        }

        Commands::ValidateQuestions { questions } => {
            validate_questions(&questions)?;
        }
    }

    Ok(())
}

/// Run the selected benchmarks and write the report
async fn run_eval(
    benchmark: BenchmarkArg,
    samples: usize,
    output: &Path,
    endpoint: Option<String>,
    questions_path: Option<PathBuf>,
    pacing_ms: Option<u64>,
    json_output: Option<PathBuf>,
) -> Result<()> {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              COUNCIL EVALUATION                              ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    // Load harness config, then apply command-line overrides
    let mut config = EvalConfig::load_default()?;
    if let Some(endpoint) = endpoint {
        config.endpoint = endpoint;
    }
    if let Some(pacing_ms) = pacing_ms {
        config.pacing_ms = pacing_ms;
    }
    println!("Endpoint: {}", config.endpoint);

    // Load questions
    let question_file = match &questions_path {
        Some(path) => {
            println!("Loading questions from {:?}...", path);
            QuestionFile::load(path)?
        }
        None => QuestionFile::builtin()?,
    };
    println!(
        "  {} questions in '{}', using up to {}",
        question_file.questions.len(),
        question_file.metadata.name,
        samples
    );

    let timeout = Duration::from_secs(config.request_timeout_secs);
    let runner = BenchmarkRunner::with_pacing(config.pacing());

    let mut pipeline_results: Vec<RunResult> = Vec::new();
    let mut baseline_results: Vec<RunResult> = Vec::new();

    if matches!(benchmark, BenchmarkArg::Truthfulqa | BenchmarkArg::All) {
        let questions = question_file.take(samples);

        eprintln!("\nRunning full pipeline ({} questions)...", questions.len());
        let staged = StagedClient::new(&config.endpoint, timeout)?.with_flags(
            config.council_size,
            true,
            VerificationMode::Consistency,
        );
        pipeline_results = runner.run(&staged, questions).await;

        eprintln!("\nRunning single-model baseline ({} questions)...", questions.len());
        let single = SingleStageClient::new(&config.endpoint, timeout)?;
        baseline_results = runner.run(&single, questions).await;
    }

    let mut ablation: Vec<(AblationVariant, AblationSummary)> = Vec::new();
    if matches!(benchmark, BenchmarkArg::Ablation | BenchmarkArg::All) {
        // Four configurations multiply the request count, so the ablation
        // question set is capped.
        let ablation_questions = question_file.take(samples.min(15));
        eprintln!(
            "\nRunning ablation study ({} questions per configuration)...",
            ablation_questions.len()
        );
        let study = AblationStudy::with_pacing(config.pacing());
        ablation = study.run(&config, ablation_questions).await?;
    }

    // Aggregate and render
    let report = EvalReport::compute(&pipeline_results, &baseline_results, &ablation);
    let markdown = report.to_markdown();

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, &markdown)
        .with_context(|| format!("Failed to write report: {}", output.display()))?;
    eprintln!("\nReport saved to {}", output.display());

    if let Some(json_path) = json_output {
        let dump = serde_json::json!({
            "report": report,
            "pipeline_results": pipeline_results,
            "baseline_results": baseline_results,
        });
        if let Some(parent) = json_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&json_path, serde_json::to_string_pretty(&dump)?)
            .with_context(|| format!("Failed to write JSON results: {}", json_path.display()))?;
        eprintln!("Raw results saved to {}", json_path.display());
    }

    println!("\n{}", markdown);
    Ok(())
}

/// Validate a question file and print a summary
fn validate_questions(path: &Path) -> Result<()> {
    let file = QuestionFile::load(path)?;

    println!("Question file '{}' is valid", file.metadata.name);
    println!("  {} questions", file.questions.len());

    let mut categories: Vec<&str> = file.questions.iter().map(|q| q.category.as_str()).collect();
    categories.sort_unstable();
    categories.dedup();
    println!("  Categories: {}", categories.join(", "));

    Ok(())
}
