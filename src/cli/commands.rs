//! CLI command definitions for lead-forge.
//!
//! Serves the HTTP API, runs a single generation in the foreground, or
//! replays the extraction engine over a saved collaborator turn.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{AppConfig, RunMode};
use crate::export::write_outputs;
use crate::registry::TaskStatus;
use crate::service::GenerationService;
use crate::utils::json_extraction::{try_extract_records, ExtractionResult};
use crate::validation::{SchemaKind, SchemaValidationResult, SchemaValidator};

/// Default output directory for generated artefacts.
const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Multi-agent lead generation with structured output extraction.
#[derive(Parser, Debug)]
#[command(name = "lead-forge")]
#[command(about = "Generate validated sales leads and outreach emails with collaborating agents")]
#[command(version)]
#[command(
    long_about = "lead-forge runs a bounded exchange between collaborating agents and turns their free-text output into validated lead and email records.\n\nExample usage:\n  lead-forge serve --port 8000\n  lead-forge generate --prompt \"Manufacturers in Texas needing vision inspection\" --mode live"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP task API.
    Serve(ServeArgs),

    /// Run one generation in the foreground and write its artefacts.
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Extract and validate records from a saved collaborator turn.
    Extract(ExtractArgs),
}

/// Arguments for `lead-forge serve`.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Listen host (defaults to LEAD_FORGE_HOST or 0.0.0.0).
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port (defaults to LEAD_FORGE_PORT or 8000).
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Result source; overrides USE_MOCK_DATA.
    #[arg(long, value_enum)]
    pub mode: Option<RunMode>,
}

/// Arguments for `lead-forge generate`.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Description of the leads to find.
    #[arg(short = 'p', long)]
    pub prompt: String,

    /// Output directory for lead_tracker.xlsx and emails.json.
    #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: String,

    /// Result source; overrides USE_MOCK_DATA.
    #[arg(long, value_enum)]
    pub mode: Option<RunMode>,

    /// Model identifier for live runs.
    #[arg(short = 'm', long, env = "LLM_MODEL")]
    pub model: Option<String>,

    /// Maximum collaborator rounds.
    #[arg(long)]
    pub max_rounds: Option<u32>,

    /// Provider API key (can also be set via GROQ_API_KEY or LITELLM_API_KEY).
    #[arg(long)]
    pub api_key: Option<String>,

    /// Print the final task as JSON instead of a summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `lead-forge extract`.
#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// File holding the raw turn text.
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Validate the extracted records against this kind (lead or email).
    #[arg(short = 'k', long)]
    pub kind: Option<SchemaKind>,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
///
/// For more control over logging initialization, use `parse_cli()` and
/// `run_with_cli()`.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve(args) => run_serve_command(args).await,
        Commands::Generate(args) => run_generate_command(args).await,
        Commands::Extract(args) => run_extract_command(args),
    }
}

// ============================================================================
// Serve Command Implementation
// ============================================================================

async fn run_serve_command(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env()?;
    if let Some(host) = args.host {
        config = config.with_host(host);
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    if let Some(mode) = args.mode {
        config = config.with_mode(mode);
    }

    crate::api::serve(config).await
}

// ============================================================================
// Generate Command Implementation
// ============================================================================

/// JSON summary printed after a foreground generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationSummary {
    pub task_id: String,
    pub status: TaskStatus,
    pub mode: String,
    pub leads: usize,
    pub emails: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub files: Vec<String>,
    pub total_duration_ms: u64,
}

async fn run_generate_command(args: GenerateArgs) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env()?;
    if let Some(mode) = args.mode {
        config = config.with_mode(mode);
    }
    if let Some(model) = args.model {
        config = config.with_model(model);
    }
    if let Some(rounds) = args.max_rounds {
        config = config.with_max_rounds(rounds);
    }
    if let Some(key) = args.api_key {
        config = config.with_api_key(key);
    }
    config.validate()?;

    let mode = config.mode;
    info!(mode = %mode, "Starting generation");

    let service = GenerationService::new(config)?;
    let start = std::time::Instant::now();
    let view = service.run_foreground(&args.prompt).await?;
    let elapsed = start.elapsed();

    let mut files = Vec::new();
    if let Some(result) = &view.result {
        for path in write_outputs(result, Path::new(&args.output))? {
            info!(path = %path.display(), "Wrote artefact");
            files.push(path.display().to_string());
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let result = view.result.as_ref();
    let summary = GenerationSummary {
        task_id: view.task_id.clone(),
        status: view.status,
        mode: mode.to_string(),
        leads: result.and_then(|r| r.leads.as_ref()).map_or(0, Vec::len),
        emails: result.and_then(|r| r.emails.as_ref()).map_or(0, Vec::len),
        note: result.and_then(|r| r.note.clone()),
        error: view.error.clone(),
        files,
        total_duration_ms: elapsed.as_millis() as u64,
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if view.status == TaskStatus::Failed {
        warn!(error = ?view.error, "Generation failed");
        anyhow::bail!(
            "generation failed: {}",
            view.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    Ok(())
}

// ============================================================================
// Extract Command Implementation
// ============================================================================

/// JSON report printed by `lead-forge extract`.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unclosed_braces: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unclosed_brackets: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<SchemaValidationResult>,
}

/// Extract records from `text`, validating them when `kind` is given.
pub fn extraction_report(text: &str, kind: Option<SchemaKind>) -> ExtractionReport {
    let extraction = try_extract_records(text);
    let outcome = extraction.outcome();

    match extraction {
        ExtractionResult::Success(records) => ExtractionReport {
            outcome,
            validation: kind.map(|kind| SchemaValidator::check(&records, kind)),
            records: Some(records),
            unclosed_braces: None,
            unclosed_brackets: None,
        },
        ExtractionResult::Truncated {
            unclosed_braces,
            unclosed_brackets,
            ..
        } => ExtractionReport {
            outcome,
            records: None,
            unclosed_braces: Some(unclosed_braces),
            unclosed_brackets: Some(unclosed_brackets),
            validation: None,
        },
        ExtractionResult::NotFound => ExtractionReport {
            outcome,
            records: None,
            unclosed_braces: None,
            unclosed_brackets: None,
            validation: None,
        },
    }
}

fn run_extract_command(args: ExtractArgs) -> anyhow::Result<()> {
    let text = fs::read_to_string(&args.input)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", args.input.display(), e))?;

    let report = extraction_report(&text, args.kind);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
