//! spendlens - Analyze cloud billing spend

use clap::Parser;
use colored::Colorize;
use spendlens::{
    SpendlensError,
    cache::{CacheParams, CacheStore, FileCache, NoopCache},
    cli::{CacheCommand, Cli, Command, error_hint},
    engine::CostAnalyzer,
    error::Result,
    fetcher::JsonFileFetcher,
    output::get_formatter,
    resilience::ResilientFetcher,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging(cli: &Cli) {
    // --quiet and --verbose override RUST_LOG
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("warn")
    } else if cli.verbose {
        tracing_subscriber::EnvFilter::new("spendlens=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("spendlens=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_cache(cli: &Cli) -> Result<Box<dyn CacheStore>> {
    if cli.cache.no_cache {
        return Ok(Box::new(NoopCache::default()));
    }
    Ok(Box::new(FileCache::open(cli.cache_dir()?, cli.cache_config())?))
}

fn open_fetcher(cli: &Cli) -> Result<ResilientFetcher<JsonFileFetcher>> {
    let path = cli.data_file.as_ref().ok_or_else(|| {
        SpendlensError::Config(
            "no billing data source; pass --data-file or set SPENDLENS_DATA_FILE".to_string(),
        )
    })?;
    Ok(ResilientFetcher::new(
        JsonFileFetcher::open(path)?,
        cli.retry_policy(),
    ))
}

type Analyzer = CostAnalyzer<JsonFileFetcher, Box<dyn CacheStore>>;

fn open_analyzer(cli: &Cli) -> Result<Analyzer> {
    Ok(CostAnalyzer::new(open_fetcher(cli)?, open_cache(cli)?))
}

fn run_cache_command(cli: &Cli, action: CacheCommand) -> Result<String> {
    let mut cache = FileCache::open(cli.cache_dir()?, cli.cache_config())?;
    match action {
        CacheCommand::Stats => Ok(get_formatter(cli.json).format_cache_stats(&cache.stats())),
        CacheCommand::Clear => {
            let removed = cache.stats().entries;
            cache.invalidate(None, &CacheParams::new())?;
            Ok(format!(
                "Cleared {removed} cache entries from {}",
                cache.path().display()
            ))
        }
    }
}

async fn run(cli: &Cli) -> Result<String> {
    let formatter = get_formatter(cli.json);

    let (mut analyzer, output) = match cli.command {
        Command::Overview { days } => {
            info!(days, "Running cost overview");
            let mut analyzer = open_analyzer(cli)?;
            let report = analyzer.overview_rolling(days).await?;
            (analyzer, formatter.format_report(&report))
        }
        Command::Month {
            month: (year, month),
        } => {
            info!(year, month, "Running monthly cost overview");
            let mut analyzer = open_analyzer(cli)?;
            let report = analyzer.overview_month(year, month).await?;
            (analyzer, formatter.format_report(&report))
        }
        Command::Compare { current, baseline } => {
            info!(?current, ?baseline, "Comparing months");
            let mut analyzer = open_analyzer(cli)?;
            let report = analyzer.compare_months(current, baseline).await?;
            (analyzer, formatter.format_report(&report))
        }
        Command::Export { days } => {
            info!(days, "Exporting FOCUS-lite records");
            let mut analyzer = open_analyzer(cli)?;
            let records = analyzer.export_focus(days).await?;
            (analyzer, formatter.format_focus(&records))
        }
        Command::Signals { days, month, .. } => {
            let thresholds = cli.signal_thresholds();
            let mut analyzer = open_analyzer(cli)?;
            let signals = match month {
                Some((year, month)) => {
                    info!(year, month, "Deriving signals for month");
                    analyzer.signals_month(year, month, &thresholds).await?
                }
                None => {
                    info!(days, "Deriving signals");
                    analyzer.signals_rolling(days, &thresholds).await?
                }
            };
            (analyzer, formatter.format_signals(&signals))
        }
        Command::Cache { action } => return run_cache_command(cli, action),
    };

    analyzer.cache_mut().flush()?;
    analyzer.performance().log_summary();
    Ok(output)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if !is_terminal::is_terminal(std::io::stdout()) {
        colored::control::set_override(false);
    }

    match run(&cli).await {
        Ok(output) => println!("{output}"),
        Err(error) => {
            eprintln!("{} {error}", "Error:".red().bold());
            if let Some(kind) = error.kind() {
                eprintln!("{} {}", "Hint:".yellow(), error_hint(kind));
            }
            std::process::exit(1);
        }
    }
}
