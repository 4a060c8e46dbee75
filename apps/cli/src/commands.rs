//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use rollcall_embed::{BatchConfig, BatchProgress, BatchReport, BridgeProvider};
use rollcall_shared::{AppConfig, UnitId, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// rollcall: turn HTML electoral rolls into embedded ward records.
#[derive(Parser)]
#[command(
    name = "rollcall",
    version,
    about = "Extract voter rolls from HTML and attach name embeddings per ward.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Extract one HTML roll document into a unit JSON file.
    Extract {
        /// Path to the HTML roll document.
        input: PathBuf,

        /// Unit identifier, e.g. "3_english".
        #[arg(short, long)]
        unit: String,

        /// Output directory (defaults to [paths].data_dir).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Attach embeddings to extracted units and write embedded files.
    Embed {
        /// Units to process, comma-separated (defaults to the configured
        /// ward/language enumeration).
        #[arg(long)]
        units: Option<String>,

        /// Input directory holding `{unit}.json` (defaults to [paths].data_dir).
        #[arg(long)]
        data: Option<PathBuf>,

        /// Output directory for `{unit}_embedded.json` (defaults to [paths].output_dir).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Rank voters of embedded units by similarity to a query.
    Search {
        /// Free-text query, matched against name + guardian.
        query: String,

        /// Roll language (defaults to the first configured language).
        #[arg(short, long)]
        language: Option<String>,

        /// Restrict to one ward (defaults to all configured wards).
        #[arg(short, long)]
        ward: Option<u32>,

        /// Number of results to show.
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,
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
        0 => "rollcall=info",
        1 => "rollcall=debug",
        _ => "rollcall=trace",
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
    match cli.command {
        Command::Extract { input, unit, out } => cmd_extract(&input, &unit, out).await,
        Command::Embed { units, data, out } => cmd_embed(units.as_deref(), data, out).await,
        Command::Search {
            query,
            language,
            ward,
            top,
        } => cmd_search(&query, language.as_deref(), ward, top).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_extract(input: &PathBuf, unit: &str, out: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let unit: UnitId = unit.parse()?;

    let html = std::fs::read_to_string(input)
        .map_err(|e| eyre!("cannot read {}: {e}", input.display()))?;

    info!(input = %input.display(), unit = %unit, "extracting roll document");

    let report = rollcall_extract::extract_ward(&html)?;

    let data_dir = out.unwrap_or_else(|| PathBuf::from(&config.paths.data_dir));
    let path = rollcall_shared::raw_unit_path(&data_dir, &unit);
    rollcall_shared::write_ward(&path, &report.ward)?;

    println!();
    println!("  Unit extracted!");
    println!("  Unit:    {unit}");
    println!("  Ward:    {}", report.ward.ward);
    println!("  Voters:  {}", report.ward.voters.len());
    println!("  Skipped: {}", report.skipped_rows);
    println!("  Path:    {}", path.display());
    println!();

    Ok(())
}

async fn cmd_embed(
    units: Option<&str>,
    data: Option<PathBuf>,
    out: Option<PathBuf>,
) -> Result<()> {
    let config = load_config()?;

    let unit_list = match units {
        Some(list) => list
            .split(',')
            .map(|s| s.trim().parse::<UnitId>())
            .collect::<rollcall_shared::Result<Vec<_>>>()?,
        None => config.units.units(),
    };

    if unit_list.is_empty() {
        return Err(eyre!("no units to process: check [units] in the config"));
    }

    let batch_config = BatchConfig {
        data_dir: data.unwrap_or_else(|| PathBuf::from(&config.paths.data_dir)),
        output_dir: out.unwrap_or_else(|| PathBuf::from(&config.paths.output_dir)),
        units: unit_list,
        unit_timeout: Duration::from_secs(config.embedding.unit_timeout_secs),
    };

    info!(units = batch_config.units.len(), "starting embedding batch");

    let mut provider = BridgeProvider::spawn(&config.embedding)?;
    let reporter = CliProgress::new();

    let report = rollcall_embed::run_batch(&batch_config, &mut provider, &reporter);

    reporter.finish();
    provider.shutdown()?;

    print_batch_summary(&report);

    Ok(())
}

fn print_batch_summary(report: &BatchReport) {
    let elapsed = (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0;

    println!();
    println!("  Embedding batch complete!");
    println!("  Run:     {}", report.run_id);
    println!("  Units:   {} ok, {} failed", report.succeeded.len(), report.failed.len());
    println!("  Voters:  {}", report.total_voters());
    println!("  Time:    {elapsed:.1}s");

    if !report.failed.is_empty() {
        println!();
        println!("  Failed units:");
        for failure in &report.failed {
            println!("    {}: {}", failure.unit, failure.error);
        }
    }
    println!();
}

async fn cmd_search(
    query: &str,
    language: Option<&str>,
    ward: Option<u32>,
    top: usize,
) -> Result<()> {
    let config = load_config()?;

    let language = language
        .map(String::from)
        .or_else(|| config.units.languages.first().cloned())
        .ok_or_else(|| eyre!("no languages configured"))?;

    let wards: Vec<u32> = match ward {
        Some(w) => vec![w],
        None => config.units.wards.clone(),
    };

    let units: Vec<UnitId> = wards
        .iter()
        .map(|&w| UnitId::new(w, language.clone()))
        .collect();

    info!(query, language = %language, units = units.len(), "searching embedded units");

    let mut provider = BridgeProvider::spawn(&config.embedding)?;
    let output_dir = PathBuf::from(&config.paths.output_dir);

    let hits = rollcall_embed::search_units(&output_dir, &units, &mut provider, query, top)?;
    provider.shutdown()?;

    if hits.is_empty() {
        println!("No matches. Run 'embed' first or widen the ward/language filters.");
        return Ok(());
    }

    // Compact, readable table
    println!(
        "{:>3} | {:<24} | {:<24} | {:<20} | {:>6}",
        "#", "Name", "Guardian", "Ward", "Score"
    );
    println!("{}", "-".repeat(90));

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{:>3} | {:<24} | {:<24} | {:<20} | {:>6.3}",
            i + 1,
            truncate(&hit.voter.name, 24),
            truncate(&hit.voter.guardian, 24),
            truncate(&hit.ward, 20),
            hit.score
        );
    }

    println!("\n{} result(s) | unit: {{ward}}_{{language}}", hits.len());

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Created config at {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let rendered = toml::to_string_pretty(&config)?;
    println!("{rendered}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Batch progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl BatchProgress for CliProgress {
    fn unit_started(&self, unit: &UnitId, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Embedding [{current}/{total}] {unit}"));
    }

    fn unit_finished(&self, unit: &UnitId, voters: usize) {
        self.spinner
            .set_message(format!("Embedded {unit} ({voters} voters)"));
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_strings_unchanged() {
        assert_eq!(truncate("Jane Doe", 24), "Jane Doe");
    }

    #[test]
    fn truncate_long_strings_with_ellipsis() {
        let long = "A Very Long Voter Name That Overflows";
        let out = truncate(long, 24);
        assert!(out.ends_with("..."));
        assert!(out.chars().count() <= 24);
    }
}
