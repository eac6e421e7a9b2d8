//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use eventintel_core::{FinalState, Pipeline, PipelineSettings, ProgressReporter, Stage};
use eventintel_knowledge::{FeedbackEntry, IngestReport, KnowledgeStore};
use eventintel_llm::OllamaClient;
use eventintel_shared::{
    AppConfig, Category, init_config, load_config, load_config_from, validate_config,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// EventIntel: risk-aware planning for campus events.
#[derive(Parser)]
#[command(
    name = "eventintel",
    version,
    about = "Profile an event, score its risk against rules and past incidents, and draft its landing page.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.eventintel/eventintel.toml.
    #[arg(long, global = true, env = "EVENTINTEL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full pipeline for one event.
    Run {
        /// Short event description, e.g. "Midnight Rooftop Jazz Charity Fundraiser".
        event: String,

        /// Where to write the landing page (defaults to pipeline.output_dir/<event>.html).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Print the final state as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Ingest the knowledge folder into the store.
    Ingest {
        /// Folder of .txt files (defaults to knowledge.data_dir).
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Clear the store before ingesting.
        #[arg(long)]
        reset: bool,
    },

    /// Query the knowledge store directly.
    Search {
        /// Free-text query.
        query: String,

        /// Category to search: rule or memory.
        #[arg(short, long, default_value = "rule")]
        category: Category,

        /// Number of results.
        #[arg(short, default_value = "4")]
        k: usize,
    },

    /// Save a lesson learned as a memory for future runs.
    Feedback {
        /// Event name the feedback is about.
        #[arg(long)]
        event: String,

        /// How the event went.
        #[arg(long)]
        outcome: String,

        /// What happened.
        #[arg(long)]
        description: String,

        /// What to do differently next time.
        #[arg(long)]
        lesson: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "eventintel=info",
        1 => "eventintel=debug",
        _ => "eventintel=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run { event, out, json } => {
            cmd_run(&resolve_config(config_path)?, &event, out.as_deref(), json).await
        }
        Command::Ingest { dir, reset } => {
            cmd_ingest(resolve_config(config_path)?, dir.as_deref(), reset).await
        }
        Command::Search { query, category, k } => {
            cmd_search(&resolve_config(config_path)?, &query, category, k).await
        }
        Command::Feedback {
            event,
            outcome,
            description,
            lesson,
        } => {
            let entry = FeedbackEntry {
                event_name: event,
                outcome,
                description,
                lesson_learned: lesson,
            };
            cmd_feedback(&resolve_config(config_path)?, &entry).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

/// Load the config (explicit path or the default location) and validate it.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    validate_config(&config)?;
    Ok(config)
}

fn open_store(
    config: &AppConfig,
    client: Arc<OllamaClient>,
) -> Result<Arc<KnowledgeStore<OllamaClient>>> {
    Ok(Arc::new(KnowledgeStore::new(config.knowledge.clone(), client)?))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config: &AppConfig, event: &str, out: Option<&Path>, json: bool) -> Result<()> {
    let client = Arc::new(OllamaClient::from_config(config)?);
    let store = open_store(config, client.clone())?;

    info!(event, model = %config.generation.model, "planning event");

    let reporter = CliProgress::new();
    reporter.message("Preparing knowledge store");
    if let Err(e) = store.ensure_ready().await {
        reporter.clear();
        return Err(e.into());
    }

    let pipeline = Pipeline::new(client, store, PipelineSettings::from_config(config));
    let result = pipeline.run(event, &reporter).await;
    reporter.clear();
    let result = result?;

    let page_path = match out {
        Some(p) => p.to_path_buf(),
        None => config.pipeline.output_dir.join(page_file_name(&result.event_name)),
    };
    if let Some(parent) = page_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| eyre!("cannot create {}: {e}", parent.display()))?;
        }
    }
    std::fs::write(&page_path, &result.marketing_code)
        .map_err(|e| eyre!("cannot write {}: {e}", page_path.display()))?;

    if !result.degraded_stages().is_empty() {
        warn!(stages = ?result.degraded_stages(), "some stages produced degraded output");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result, &page_path)?;
    }
    Ok(())
}

fn print_summary(result: &FinalState, page_path: &Path) -> Result<()> {
    let risk = &result.risk_assessment;

    println!();
    println!("  Event:   {}", result.event_name);
    println!("  Run:     {}", result.run_id);
    println!();
    println!("  Event profile");
    println!("{}", indent(&serde_json::to_string_pretty(&result.event_details)?, 4));
    println!();
    println!("  Search tags: {}", result.search_queries.join(", "));
    println!();
    println!("  Risk assessment");
    match (risk.score, risk.level) {
        (Some(score), Some(level)) => println!("    Score: {score}/100 ({level})"),
        _ => println!("    Score: unavailable"),
    }
    if let Some(claim) = &risk.claimed_level {
        if risk.level.map(|l| l.as_str()) != Some(claim.as_str()) {
            println!("    Model claimed: {claim}");
        }
    }
    if !risk.reasoning.is_empty() {
        println!("    Reasoning: {}", risk.reasoning);
    }
    if !risk.mitigation_plan.is_empty() {
        println!("    Mitigation: {}", risk.mitigation_plan);
    }
    println!();
    println!("  Evidence ({} rules, {} memories)", result.knowledge_docs.len(), result.past_memories.len());
    for memory in &result.past_memories {
        println!("{}", indent(memory, 4));
    }
    println!();
    for stage in result.degraded_stages() {
        println!("  warning: {} output could not be read as structured data", stage_name(*stage));
    }
    println!("  Landing page: {}", page_path.display());
    println!();
    Ok(())
}

async fn cmd_ingest(mut config: AppConfig, dir: Option<&Path>, reset: bool) -> Result<()> {
    // Only the folder asked for should be ingested.
    config.knowledge.auto_ingest = false;
    let client = Arc::new(OllamaClient::from_config(&config)?);
    let store = open_store(&config, client)?;
    let source = dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| store.data_dir().to_path_buf());

    info!(dir = %source.display(), reset, "ingesting knowledge folder");

    let reporter = CliProgress::new();
    reporter.message(if reset { "Rebuilding knowledge store" } else { "Ingesting knowledge folder" });
    let report = if reset {
        store.rebuild(&source).await
    } else {
        store.ingest(&source).await
    };
    reporter.clear();
    let report = report?;

    print_report(&report, &source);
    println!(
        "  Stored:   {} rules, {} memories",
        store.count_in(Category::Rule).await?,
        store.count_in(Category::Memory).await?
    );
    println!();
    Ok(())
}

fn print_report(report: &IngestReport, source: &Path) {
    println!();
    println!("  Source:   {}", source.display());
    println!("  Files:    {}", report.files_seen);
    println!("  Chunks:   {} ({} new)", report.chunks_total, report.chunks_inserted);
    for failed in &report.failed_files {
        println!("  Skipped:  {} ({})", failed.file, failed.error);
    }
}

async fn cmd_search(config: &AppConfig, query: &str, category: Category, k: usize) -> Result<()> {
    let client = Arc::new(OllamaClient::from_config(config)?);
    let store = open_store(config, client)?;

    let hits = store.similarity_search(query, category, k).await?;
    if hits.is_empty() {
        println!("No {category} documents matched.");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, hit.score, hit.source_file);
        println!("{}", indent(&hit.content, 3));
        println!();
    }
    Ok(())
}

async fn cmd_feedback(config: &AppConfig, entry: &FeedbackEntry) -> Result<()> {
    let client = Arc::new(OllamaClient::from_config(config)?);
    let store = open_store(config, client)?;

    if !store.record_feedback(entry).await {
        return Err(eyre!("failed to save feedback for '{}'", entry.event_name));
    }
    println!("Memory saved. Future runs will consider this lesson.");
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn message(&self, msg: &str) {
        self.spinner.set_message(msg.to_string());
    }

    fn clear(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, stage: Stage) {
        self.spinner.set_message(format!(
            "[{}/{}] {}",
            stage.number(),
            Stage::ALL.len(),
            stage.label()
        ));
    }

    fn stage_finished(&self, stage: Stage, elapsed: Duration) {
        self.spinner
            .println(format!("  ✓ {} ({:.1}s)", stage.label(), elapsed.as_secs_f64()));
    }

    fn done(&self, _result: &FinalState) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn stage_name(stage: Stage) -> &'static str {
    match stage {
        Stage::Inference => "Event profile",
        Stage::Classification => "Search tag",
        Stage::Retrieval => "Retrieval",
        Stage::Risk => "Risk assessment",
        Stage::Marketing => "Landing page",
    }
}

/// File name for an event's landing page: lowercase words joined by `-`.
fn page_file_name(event_name: &str) -> String {
    let slug = event_name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "event.html".to_string()
    } else {
        format!("{slug}.html")
    }
}

fn indent(text: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text.lines()
        .map(|line| format!("{pad}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_and_search() {
        let cli = Cli::parse_from(["eventintel", "-vv", "run", "Spring Fling", "--json"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Run { event, json, out } => {
                assert_eq!(event, "Spring Fling");
                assert!(json);
                assert!(out.is_none());
            }
            _ => panic!("expected run"),
        }

        let cli = Cli::parse_from(["eventintel", "search", "alcohol", "--category", "memory", "-k", "2"]);
        match cli.command {
            Command::Search { category, k, .. } => {
                assert_eq!(category, Category::Memory);
                assert_eq!(k, 2);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn page_names_are_slugs() {
        assert_eq!(
            page_file_name("Midnight Rooftop Jazz Charity Fundraiser"),
            "midnight-rooftop-jazz-charity-fundraiser.html"
        );
        assert_eq!(page_file_name("Rock & Roll!! Night"), "rock-roll-night.html");
        assert_eq!(page_file_name("???"), "event.html");
    }

    #[test]
    fn indent_prefixes_every_line() {
        assert_eq!(indent("a\nb", 2), "  a\n  b");
    }
}
