// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use party_accounts::{
    aggregate_categories, clear_mps, dedupe_accounting_units, match_mps, write_chart_data,
    write_results_table, AggregateOutcome, CollectingSink, FilePaths, PipelineConfig,
    CHART_TAX_RATE_THRESHOLD,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Party accounts pipeline: dedupe filings, match MPs, classify and count units
#[derive(Parser, Debug)]
#[command(name = "party-accounts", version)]
#[command(about = "Match local party accounts to MPs and tally rental-income tax categories")]
struct Cli {
    /// Directory holding the input and output tables
    #[arg(long, short = 'd', global = true, default_value = ".", env = "PARTY_ACCOUNTS_DIR")]
    dir: PathBuf,

    /// JSON pipeline configuration
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Rate at or above which a unit counts as "Tax paid" (e.g. 0.10 or 0.15)
    #[arg(long, global = true)]
    tax_rate_threshold: Option<f64>,

    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log per-row detail
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Keep one filing per accounting unit
    Dedupe,
    /// Add mp_name/mp_email to the analysis results
    MatchMps,
    /// Blank mp_name/mp_email in the enriched analysis results
    ClearMps,
    /// Count units per category, overall and per party, reconciled to the registry
    Aggregate,
    /// Prepare the sortable results table
    Table,
    /// Prepare the stacked-bar chart data (re-runs aggregate, rewriting the counts table)
    ChartData,
    /// dedupe → match-mps → aggregate → table → chart-data
    Run,
    /// Browse the enriched analysis results in the terminal
    #[cfg(feature = "tui")]
    View,
}

impl Command {
    /// Commands that classify units need an explicit tax-rate threshold
    fn classifies(&self) -> bool {
        !matches!(self, Command::Dedupe | Command::MatchMps | Command::ClearMps)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = load_config(&cli)?;
    let files = config.files.in_dir(&cli.dir);
    tracing::debug!("{}", config.summary());

    let sink = CollectingSink::forwarding();

    match cli.command {
        Command::Dedupe => run_dedupe(&files, &config, &sink)?,
        Command::MatchMps => run_match(&files, &sink)?,
        Command::ClearMps => {
            let rows = clear_mps(&files.enriched_results, &files.enriched_results)
                .context("clear-mps failed")?;
            tracing::info!(rows, "MP columns cleared");
        }
        Command::Aggregate => {
            run_aggregate(&files, &config, &sink)?;
        }
        Command::Table => run_table(&files, &config, &sink)?,
        Command::ChartData => {
            let outcome = run_aggregate(&files, &config, &sink)?;
            run_chart_data(&files, &outcome)?;
        }
        Command::Run => {
            run_dedupe(&files, &config, &sink)?;
            run_match(&files, &sink)?;
            let outcome = run_aggregate(&files, &config, &sink)?;
            run_table(&files, &config, &sink)?;
            run_chart_data(&files, &outcome)?;
        }
        #[cfg(feature = "tui")]
        Command::View => run_view(&files, &config, &sink)?,
    }

    if !sink.is_empty() {
        tracing::info!("{}", sink.summary().summary());
    }

    Ok(())
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// --tax-rate-threshold, then the config file, then (for commands that never
/// classify) the chart preset
fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let fallback = if cli.command.classifies() {
        None
    } else {
        Some(CHART_TAX_RATE_THRESHOLD)
    };

    PipelineConfig::resolve(cli.config.as_deref(), cli.tax_rate_threshold, fallback)
        .context("invalid pipeline configuration")
}

fn run_dedupe(files: &FilePaths, config: &PipelineConfig, sink: &CollectingSink) -> Result<()> {
    let report = dedupe_accounting_units(
        &files.accounting_units,
        &files.accounting_units_deduped,
        config,
        sink,
    )
    .context("dedupe failed")?;
    tracing::info!(
        units = report.deduplicated,
        "wrote {}",
        files.accounting_units_deduped.display()
    );
    Ok(())
}

fn run_match(files: &FilePaths, sink: &CollectingSink) -> Result<()> {
    let report = match_mps(&files.mp_roster, &files.analysis_results, &files.enriched_results, sink)
        .context("match-mps failed")?;
    tracing::info!(matched = report.matched, "wrote {}", files.enriched_results.display());
    Ok(())
}

fn run_aggregate(
    files: &FilePaths,
    config: &PipelineConfig,
    sink: &CollectingSink,
) -> Result<AggregateOutcome> {
    let outcome = aggregate_categories(
        &files.accounting_units,
        &files.analysis_results,
        &files.category_counts,
        config,
        sink,
    )
    .context("aggregate failed")?;
    tracing::info!(
        analyzed = outcome.report.analyzed,
        "wrote {}",
        files.category_counts.display()
    );
    Ok(outcome)
}

fn run_chart_data(files: &FilePaths, outcome: &AggregateOutcome) -> Result<()> {
    write_chart_data(outcome, &files.chart_data).context("chart-data failed")?;
    Ok(())
}

fn run_table(files: &FilePaths, config: &PipelineConfig, sink: &CollectingSink) -> Result<()> {
    let table = write_results_table(&files.enriched_results, &files.results_table, config, sink)
        .context("table failed")?;
    tracing::info!(rows = table.rows.len(), "wrote {}", files.results_table.display());
    Ok(())
}

#[cfg(feature = "tui")]
fn run_view(files: &FilePaths, config: &PipelineConfig, sink: &CollectingSink) -> Result<()> {
    use party_accounts::{AnalysisRecord, CategoryClassifier, Table};

    // Prefer the enriched table so MP names show up
    let path = if files.enriched_results.exists() {
        &files.enriched_results
    } else {
        &files.analysis_results
    };

    let table = Table::read(path, &AnalysisRecord::REQUIRED_COLUMNS)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let records: Vec<AnalysisRecord> =
        table.iter().map(|row| AnalysisRecord::from_row(row, sink)).collect();

    let classifier = CategoryClassifier::from_config(config);
    let mut app = ui::App::new(records, &classifier, &config.party_aliases, sink);
    ui::run_ui(&mut app)
}
