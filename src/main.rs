//! hwpscan CLI - analyze HWP, OLE and ZIP office documents
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `warn`).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use hwpscan::engine::failed_paths;
use hwpscan::{AnalysisResult, Engine, EngineConfig};

#[derive(Parser, Debug)]
#[command(
    name = "hwpscan",
    version,
    about = "Resource-bounded text, structure and metadata extraction for office documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze one or more documents
    Analyze(AnalyzeArgs),

    /// Report the detected format of a document without reading its body
    Preview {
        path: PathBuf,
    },

    /// Report strategy availability and memory pressure
    Health,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Print the full results as JSON
    #[arg(long)]
    json: bool,

    /// Largest accepted file, in bytes
    #[arg(long)]
    max_file_size: Option<u64>,

    /// Read and per-strategy timeout, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Files analyzed at once
    #[arg(long)]
    max_concurrency: Option<usize>,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    // A subscriber may already be installed when embedded; keep it.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Print `value` as pretty JSON; false when it cannot be serialized.
fn print_json<T: Serialize>(value: &T) -> bool {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            true
        },
        Err(e) => {
            eprintln!("error: cannot serialize output: {}", e);
            false
        },
    }
}

fn print_summary(result: &AnalysisResult) {
    let path = result.file.path.display();
    if !result.success {
        let code = result.error_code.map(|c| c.as_str()).unwrap_or("UNCLASSIFIED");
        println!("{}: {} {}", path, code, result.error.as_deref().unwrap_or(""));
        return;
    }
    println!(
        "{}: method={} confidence={:.2} chars={} paragraphs={} duration={}ms",
        path,
        result.analysis.method,
        result.analysis.confidence,
        result.structure.characters,
        result.structure.paragraphs,
        result.analysis.duration_ms
    );
    if let Some(title) = &result.metadata.title {
        println!("  title: {}", title);
    }
    if let Some(author) = &result.metadata.author {
        println!("  author: {}", author);
    }
    for warning in &result.analysis.warnings {
        println!("  warning: {}", warning);
    }
    println!();
    println!("{}", result.content);
}

async fn analyze(engine: &Engine, args: AnalyzeArgs) -> ExitCode {
    let mut options = engine.default_options().clone();
    if let Some(size) = args.max_file_size {
        options.max_file_size = size;
    }
    if let Some(timeout) = args.timeout_ms {
        options.timeout_ms = timeout;
    }
    if args.max_concurrency.is_some() {
        options.max_concurrency = args.max_concurrency;
    }

    let results = if args.paths.len() == 1 {
        vec![engine.analyze(&args.paths[0], &options).await]
    } else {
        engine
            .analyze_batch(&args.paths, &options, |progress| {
                tracing::info!(
                    completed = progress.completed,
                    total = progress.total,
                    path = %progress.path.display(),
                    "batch progress"
                );
            })
            .await
    };

    if args.json {
        let printed = if results.len() == 1 {
            print_json(&results[0])
        } else {
            print_json(&results)
        };
        if !printed {
            return ExitCode::from(2);
        }
    } else {
        for result in &results {
            print_summary(result);
        }
    }

    if failed_paths(&results).is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn load_config(path: Option<&PathBuf>) -> hwpscan::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path),
        None => Ok(EngineConfig::default()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        },
    };
    let engine = Engine::new(config);

    match cli.command {
        Commands::Analyze(args) => analyze(&engine, args).await,
        Commands::Preview { path } => match engine.quick_preview(&path).await {
            Ok(preview) if print_json(&preview) => ExitCode::SUCCESS,
            Ok(_) => ExitCode::from(2),
            Err(e) => {
                eprintln!("{}: {} {}", path.display(), e.code(), e);
                ExitCode::FAILURE
            },
        },
        Commands::Health => {
            let report = engine.health_check().await;
            if !print_json(&report) {
                ExitCode::from(2)
            } else if report.healthy {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        },
    }
}
