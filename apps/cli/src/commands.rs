//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use ekimae_core::{
    JsonFileLog, PipelineDeps, ProgressReporter, RunConfig, RunPlan, RunSummary,
    load_station_set,
};
use ekimae_poi::PoiFetcher;
use ekimae_shared::{
    AppConfig, ClusterResult, RetrySettings, WikiSettings, init_config, load_config,
    load_config_from, validate_config,
};
use ekimae_thematic::{MediaWikiClient, OpenRouterGenerator, ThematicAnalyzer};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Ekimae: enrich Tokyo stations with themes and nearby places.
#[derive(Parser)]
#[command(
    name = "ekimae",
    version,
    about = "Cluster Tokyo stations and enrich each hub with thematic text and nearby points of interest.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.ekimae/ekimae.toml).
    #[arg(long, global = true, env = "EKIMAE_CONFIG")]
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
    /// Enrich every pending station cluster, resuming from the output log.
    Run {
        /// Only process clusters whose member id or name contains this text
        /// (repeatable).
        #[arg(long, value_name = "SUBSTR")]
        only: Vec<String>,

        /// Also load the ward-scanned station list.
        #[arg(long)]
        include_ward_scan: bool,

        /// Print the pending work and exit without network calls or writes.
        #[arg(long)]
        plan: bool,

        /// Output log path (defaults to `defaults.output_log`).
        #[arg(long)]
        log: Option<PathBuf>,
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
        0 => "ekimae=info",
        1 => "ekimae=debug",
        _ => "ekimae=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
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
        Command::Run {
            only,
            include_ward_scan,
            plan,
            log,
        } => {
            let config = resolve_config(config_path)?;
            let log_path = log.unwrap_or_else(|| PathBuf::from(&config.defaults.output_log));
            if plan {
                cmd_plan(&config, only, include_ward_scan, &log_path)
            } else {
                cmd_run(&config, only, include_ward_scan, &log_path).await
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_plan(
    config: &AppConfig,
    only: Vec<String>,
    include_ward_scan: bool,
    log_path: &Path,
) -> Result<()> {
    let run_config = RunConfig::from_app(config, only)?;
    let stations = load_station_set(&config.sources, include_ward_scan)?;
    let log = JsonFileLog::open(log_path)?;

    let plan = ekimae_core::plan(&run_config, &stations, &log)?;
    print_plan(&plan, log.path());
    Ok(())
}

async fn cmd_run(
    config: &AppConfig,
    only: Vec<String>,
    include_ward_scan: bool,
    log_path: &Path,
) -> Result<()> {
    // Fail on bad config before any network I/O.
    validate_config(config)?;

    let run_config = RunConfig::from_app(config, only)?;
    let stations = load_station_set(&config.sources, include_ward_scan)?;

    let retry = RetrySettings::try_from(config)?;
    let fetcher = PoiFetcher::from_settings(&retry)?;
    let wiki = MediaWikiClient::new(&WikiSettings::from(config))?;
    let generator = OpenRouterGenerator::from_config(config)?;
    let deps = PipelineDeps {
        analyzer: ThematicAnalyzer::new(wiki, generator),
        fetcher,
    };

    let mut log = JsonFileLog::open(log_path)?;

    info!(
        log = %log_path.display(),
        stations = stations.stations.len(),
        ward_scan = include_ward_scan,
        generation = config.generation.enabled,
        "starting enrichment run"
    );

    let reporter = CliProgress::new();
    let summary =
        ekimae_core::run_pipeline(&run_config, &stations, &deps, &mut log, &reporter).await?;

    println!();
    println!("  Enrichment run complete!");
    println!("  Clusters:  {} ({} selected)", summary.total_clusters, summary.selected);
    println!("  Processed: {}", summary.processed);
    println!("  Skipped:   {} (already in log)", summary.already_processed);
    if summary.failed_categories > 0 {
        println!("  Failed:    {} categories (see warnings)", summary.failed_categories);
    }
    if !summary.state.is_empty() {
        let hubs = summary
            .state
            .results()
            .iter()
            .filter(|r| r.is_major_hub)
            .count();
        println!(
            "  Log:       {} ({} records, {hubs} major hubs)",
            log.path().display(),
            summary.state.len()
        );
    }
    println!("  Time:      {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn print_plan(plan: &RunPlan, log_path: &Path) {
    println!();
    println!("  Clusters:  {} ({} selected)", plan.total_clusters, plan.selected);
    println!("  Done:      {} (in {})", plan.already_processed, log_path.display());
    println!("  Pending:   {}", plan.pending.len());
    println!();

    for cluster in &plan.pending {
        let categories: Vec<&str> = cluster.categories.iter().map(|c| c.as_str()).collect();
        let marker = if cluster.is_major_hub { "*" } else { " " };
        let poi = if cluster.skips_enrichment {
            "no POIs".to_string()
        } else {
            categories.join(",")
        };
        println!(
            "  {marker} {:<24} {:<40} {}",
            cluster.name_ja,
            cluster.member_ids.join(","),
            poi
        );
    }
    println!();
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid progress template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn cluster_started(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Enriching [{current}/{total}] {name}"));
    }

    fn cluster_finished(&self, result: &ClusterResult) {
        let pois: usize = result.categories.iter().map(|c| c.saved_count).sum();
        self.spinner.println(format!(
            "  ✓ {} ({} members, {} POIs, {})",
            result.name.ja,
            result.member_ids.len(),
            pois,
            result.display_tags.join(" ")
        ));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}
