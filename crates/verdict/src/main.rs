//! Verdict evaluation runner
//!
//! Runs proposition eval cases against recorded conversations and reports
//! PASS / FAIL / INDETERMINATE scores.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use verdict::{
    builtin_cases, load_cases_from_dir, EvalCase, Harness, IterationOutcome,
    LlmTimestampExtractor,
};

#[derive(Parser)]
#[command(name = "verdict")]
#[command(about = "Behavioral test oracle for conversational agents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory containing TOML case files (or set VERDICT_CASES env var)
    #[arg(long)]
    cases_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run eval cases
    Run {
        /// Only run cases matching this name pattern
        #[arg(short, long)]
        filter: Option<String>,

        /// Independent extraction iterations per conversation
        #[arg(short, long, default_value_t = 3)]
        iterations: u32,

        /// Timeout per extractor call, in seconds
        #[arg(long, default_value_t = 60)]
        extractor_timeout: u64,

        /// Show each iteration's verdict and extractor explanations
        #[arg(short, long)]
        verbose: bool,

        /// Write the full report tree as JSON to this path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only run built-in cases (ignore --cases-dir)
        #[arg(long)]
        builtin_only: bool,
    },

    /// List available cases
    List {
        /// Only list built-in cases
        #[arg(long)]
        builtin_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    // Get cases dir from CLI or env var
    let cases_dir = cli
        .cases_dir
        .or_else(|| std::env::var("VERDICT_CASES").ok().map(PathBuf::from));

    match cli.command {
        Commands::Run {
            filter,
            iterations,
            extractor_timeout,
            verbose,
            output,
            builtin_only,
        } => {
            let cases_dir = if builtin_only { None } else { cases_dir.as_ref() };
            run_cases(
                cases_dir,
                filter.as_deref(),
                iterations,
                extractor_timeout,
                verbose,
                output.as_deref(),
            )
            .await
        }
        Commands::List { builtin_only } => {
            let cases_dir = if builtin_only { None } else { cases_dir.as_ref() };
            list_cases(cases_dir)?;
            Ok(())
        }
    }
}

async fn run_cases(
    cases_dir: Option<&PathBuf>,
    filter: Option<&str>,
    iterations: u32,
    extractor_timeout: u64,
    verbose: bool,
    output: Option<&std::path::Path>,
) -> Result<()> {
    // Create the LLM-backed extractor
    let llm = llm::LlmClient::from_env().context("Failed to create LLM client")?;
    let extractor = LlmTimestampExtractor::new(llm);

    let harness = Harness::new(Box::new(extractor))
        .with_iterations(iterations)
        .with_extractor_timeout(Duration::from_secs(extractor_timeout));

    // Get cases
    let cases = get_cases(cases_dir)?;
    let cases: Vec<_> = if let Some(f) = filter {
        cases.into_iter().filter(|c| c.name.contains(f)).collect()
    } else {
        cases
    };

    if cases.is_empty() {
        println!("No cases match the filter");
        return Ok(());
    }

    println!("Running {} case(s), {} iteration(s) each...\n", cases.len(), iterations);

    let report = harness.run_suite(&cases).await?;

    if verbose {
        for prop in &report.propositions {
            println!("\n--- {} ---", prop.name);
            for conv in &prop.conversations {
                println!("\nConversation: {}", conv.conversation_id);
                for iteration in &conv.iterations {
                    match &iteration.outcome {
                        IterationOutcome::Evaluated(result) => {
                            println!("  {:?}: {}", result.verdict, result.message);
                            if let Some(raw) = &iteration.raw {
                                if !raw.antecedent_explanation.is_empty() {
                                    println!("    antecedent: {}", raw.antecedent_explanation);
                                }
                                if !raw.consequent_explanation.is_empty() {
                                    println!("    consequent: {}", raw.consequent_explanation);
                                }
                            }
                        }
                        IterationOutcome::ExtractorFailed { error } => {
                            println!("  extractor error: {}", error);
                        }
                    }
                }
            }
        }
    }

    report.print_summary();

    if let Some(path) = output {
        std::fs::write(path, report.to_json()?)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    // Exit with error if any iteration reached a FAIL verdict
    if report.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

fn list_cases(cases_dir: Option<&PathBuf>) -> Result<()> {
    let cases = get_cases(cases_dir)?;
    println!("Available cases:\n");
    for case in cases {
        println!("  {} - {}", case.name, case.description);
        println!("    Conversations: {}", case.conversations.len());
        println!();
    }
    Ok(())
}

/// Load cases from directory (if provided) or use built-in cases
fn get_cases(cases_dir: Option<&PathBuf>) -> Result<Vec<EvalCase>> {
    match cases_dir {
        Some(dir) => {
            println!("Loading cases from: {}", dir.display());
            let mut cases = load_cases_from_dir(dir)?;

            if cases.is_empty() {
                println!("No cases found in directory, using built-in cases");
                cases = builtin_cases();
            }

            Ok(cases)
        }
        None => Ok(builtin_cases()),
    }
}
