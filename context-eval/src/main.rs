//! Context injection evaluation CLI

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{CommandFactory, Parser};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use context_eval::{
    cases::{discover_test_cases, resolve_selection, LoadError, Selection, TestCase},
    config::Config,
    providers::create_provider,
    reporting::{persist, render_banner, render_summary, summarize},
    runner::{ConsoleProgress, Executor},
};

#[derive(Parser)]
#[command(name = "context-eval")]
#[command(about = "Context Injection Test Runner")]
#[command(long_about = "Compares LLM answers to the same task with and without injected context")]
#[command(version)]
#[command(after_help = "Examples:
  context-eval --all
  context-eval --all --evaluate --output results/
  context-eval --test test_code_fix")]
struct Cli {
    /// Run all test cases
    #[arg(long)]
    all: bool,

    /// Run a specific test (file name without .json)
    #[arg(long, value_name = "ID")]
    test: Option<String>,

    /// Directory to save results
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Grade both responses against the test's criteria
    #[arg(long)]
    evaluate: bool,

    /// Model answering the test prompts
    #[arg(long, value_name = "ID")]
    model: Option<String>,

    /// Model grading the responses
    #[arg(long, value_name = "ID")]
    eval_model: Option<String>,

    /// Directory of test case definitions
    #[arg(long, value_name = "DIR")]
    test_cases: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// List available test cases and exit
    #[arg(long)]
    list: bool,

    /// Write a default configuration file and exit
    #[arg(long, value_name = "FILE")]
    init_config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("context_eval=debug,info")
    } else {
        EnvFilter::new("context_eval=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Some(path) = cli.init_config {
        return init_config(path);
    }

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_or_default(),
    }
    .with_model(cli.model)
    .with_eval_model(cli.eval_model)
    .with_test_cases_dir(cli.test_cases);

    let test_cases_dir = config.runner.test_cases_dir.clone();

    if cli.list {
        return list_test_cases(&test_cases_dir);
    }

    let selection = match (cli.all, cli.test) {
        (true, _) => Selection::All,
        (false, Some(id)) => Selection::Named(id),
        (false, None) => {
            Cli::command().print_help()?;
            std::process::exit(1);
        }
    };

    let cases = load_cases(&test_cases_dir, &selection);

    let api_key = match config.read_credential() {
        Ok(key) => key,
        Err(e) => {
            eprintln!("{}", format!("Error: {}.", e).red());
            std::process::exit(1);
        }
    };

    let output_dir = cli.output.or_else(|| config.runner.output_dir.clone());
    let settings = config.into_settings(api_key, cli.evaluate);
    tracing::debug!("Run settings: {:?}", settings);

    println!(
        "\n{}",
        render_banner(&settings.model, cases.len(), settings.evaluate, Utc::now())
    );

    let model = settings.model.clone();
    let executor = Executor::new(create_provider(&settings), settings);
    let outcome = executor.run(&cases, &ConsoleProgress).await;

    if outcome.results.len() > 1 {
        println!("{}", render_summary(&summarize(&outcome.results, &model)));
    }

    if let Some(dir) = output_dir {
        println!("{}", format!("\nSaving results to {}/", dir.display()).bold());
        match persist(&outcome.results, &dir, &model, Utc::now()) {
            Ok(paths) => {
                // the combined report is always written last
                if let Some((report, files)) = paths.split_last() {
                    for path in files {
                        println!("{}", format!("  Saved: {}", path.display()).dimmed());
                    }
                    println!("{}", format!("  Saved report: {}", report.display()).green());
                }
            }
            Err(e) => {
                eprintln!("{}", format!("Error: {}", e).red());
                std::process::exit(1);
            }
        }
    }

    if !outcome.is_success() {
        eprintln!(
            "{}",
            format!("\n{} of {} tests failed:", outcome.failures.len(), cases.len()).red()
        );
        for failure in &outcome.failures {
            eprintln!("  {} ({}): {}", failure.id, failure.name, failure.error);
        }
        std::process::exit(1);
    }

    println!("{}", "\nDone!\n".green().bold());
    Ok(())
}

/// Resolve the selection or exit with a diagnostic
fn load_cases(dir: &Path, selection: &Selection) -> Vec<(String, TestCase)> {
    match resolve_selection(dir, selection) {
        Ok(cases) => cases,
        Err(LoadError::NotFound { name, available }) => {
            eprintln!(
                "{}",
                format!(
                    "Error: Test case not found: {}",
                    dir.join(format!("{}.json", name)).display()
                )
                .red()
            );
            println!("Available tests: {}", available.join(", "));
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            std::process::exit(1);
        }
    }
}

fn list_test_cases(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let ids = match discover_test_cases(dir) {
        Ok(ids) => ids,
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            std::process::exit(1);
        }
    };

    println!("Available tests ({}):", ids.len());
    for id in ids {
        println!("  {}", id);
    }
    Ok(())
}

fn init_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    config.save_toml(&output)?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}
