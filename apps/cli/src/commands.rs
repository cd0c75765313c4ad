//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use pagebot_core::{ProgressReporter, RunMode, RunOptions, RunSummary, run_producer_pages};
use pagebot_shared::{AppConfig, RunConfig, init_config, load_config, load_config_from};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// pagebot: keeps producer pages in sync with their song and album categories.
#[derive(Parser)]
#[command(
    name = "pagebot",
    version,
    about = "Add missing song and album pages to producer works tables.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.pagebot/pagebot.toml).
    #[arg(long, env = "PAGEBOT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
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
    /// Check producer pages and add missing songs and albums.
    Run {
        /// Start the category listing at this sort key.
        #[arg(long, conflicts_with = "page")]
        from: Option<String>,

        /// Only process this page; no report is written.
        #[arg(long)]
        page: Option<String>,

        /// Log edits instead of saving them.
        #[arg(long)]
        dry_run: bool,

        /// Number of pages processed at once.
        #[arg(long)]
        concurrency: Option<usize>,

        /// Maximum number of queued pages.
        #[arg(long)]
        queue_capacity: Option<usize>,

        /// Time budget per page in seconds (0 disables it).
        #[arg(long)]
        item_timeout: Option<u64>,
    },

    /// Print the table sort key of each row argument.
    SortKey {
        /// Row arguments, e.g. "Title|rom=Romaji".
        #[arg(required = true)]
        entries: Vec<String>,
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
        0 => "pagebot=info",
        1 => "pagebot=debug",
        _ => "pagebot=trace",
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
    let config_path = cli.config;
    match cli.command {
        Command::Run {
            from,
            page,
            dry_run,
            concurrency,
            queue_capacity,
            item_timeout,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            let mut run = RunConfig::from(&config);
            run.dry_run |= dry_run;
            if let Some(concurrency) = concurrency {
                run.concurrency = concurrency;
            }
            if let Some(capacity) = queue_capacity {
                run.queue_capacity = capacity;
            }
            if let Some(secs) = item_timeout {
                run.item_timeout = (secs > 0).then(|| Duration::from_secs(secs));
            }
            let mode = match page {
                Some(title) => RunMode::Single(title),
                None => RunMode::All { from },
            };
            cmd_run(&config, RunOptions { mode, run }).await
        }
        Command::SortKey { entries } => cmd_sort_key(&entries),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)
            .wrap_err_with(|| format!("loading config from {}", path.display()))?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config: &AppConfig, options: RunOptions) -> Result<()> {
    info!(
        api_url = %config.wiki.api_url,
        mode = ?options.mode,
        dry_run = options.run.dry_run,
        "starting producer page bot"
    );

    let reporter = Arc::new(CliProgress::new());
    let summary = run_producer_pages(config, options, reporter).await?;

    println!();
    println!("  Producer pages checked.");
    println!("  Run:      {}", summary.run_id);
    println!("  Checked:  {}", summary.pages_checked);
    println!(
        "  Edited:   {} (+{} songs, +{} albums)",
        summary.edited.len(),
        summary.songs_added,
        summary.albums_added
    );
    println!("  Errors:   {}", summary.errors.len());
    println!("  Unplaced: {}", summary.unplaced);
    println!("  Time:     {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_sort_key(entries: &[String]) -> Result<()> {
    for entry in entries {
        println!("{}\t{entry}", pagebot_wikitext::sort_value(entry));
    }
    Ok(())
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
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_checked(&self, title: &str, checked: usize) {
        self.spinner.set_message(format!("Checked [{checked}] {title}"));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}
