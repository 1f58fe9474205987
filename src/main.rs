use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod fetch;
mod models;
mod naming;
mod orchestrator;
mod report;
mod risk;
mod snapshot;
mod store;
mod trend;

use config::{Config, ConfigOverrides};
use store::RecordStore;

#[derive(Parser)]
#[command(name = "covid-risk-scores")]
#[command(about = "Explainable per-country covid risk scores from daily OWID data", long_about = None)]
struct Cli {
    /// TOML config file (defaults apply when it does not exist)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Dataset CSV, overriding the configured path
    #[arg(long, global = true)]
    data: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the dataset CSV
    Fetch,
    /// Rank countries for one date
    Score {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show how one country's score was derived
    Explain {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        country: String,
    },
    /// Score every scheduled date and write reports
    Run {
        #[arg(long)]
        no_download: bool,
        #[arg(long)]
        only_weekly: bool,
        #[arg(long)]
        boundaries: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    let mut overrides = ConfigOverrides {
        dataset_path: cli.data,
        ..ConfigOverrides::default()
    };

    match cli.command {
        Commands::Fetch => {
            config.apply_overrides(overrides);
            fetch::download(&config.dataset.url, &config.dataset.path).await?;
            println!("Dataset written to {}.", config.dataset.path.display());
        }
        Commands::Score { date, limit } => {
            config.apply_overrides(overrides);
            let store = RecordStore::load(&config.dataset.path)?;
            let trend = trend::trend(&store, date);
            let summary = orchestrator::summarize(&trend);

            if trend.scores.is_empty() && trend.unranked.is_empty() {
                println!("No data reported for {date}.");
                return Ok(());
            }

            println!("Scores for {date}: {}", report::summary_line(&summary));
            let mut ranking: Vec<_> = trend.scores.iter().collect();
            ranking.sort_by(|a, b| {
                b.1.score
                    .partial_cmp(&a.1.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            for (rank, (country, scored)) in ranking.iter().take(limit).enumerate() {
                let delta = trend
                    .deltas
                    .get(*country)
                    .map(|d| format!("{d:+7.1}"))
                    .unwrap_or_else(|| "n/a".to_string());
                println!("{:3}. {:35} {:6.1}  ({:>7})", rank + 1, country, scored.score, delta);
            }
            println!("{} countries unranked.", trend.unranked.len());
        }
        Commands::Explain { date, country } => {
            config.apply_overrides(overrides);
            let store = RecordStore::load(&config.dataset.path)?;
            let trend = trend::trend(&store, date);
            let country = naming::normalize_location(&country).to_string();

            let (headline, explanation) = if let Some(scored) = trend.scores.get(&country) {
                (format!("score = {:.1} points", scored.score), &scored.explanation)
            } else if let Some(explanation) = trend.unranked.get(&country) {
                ("score not available".to_string(), explanation)
            } else {
                println!("{country}: no data available for {date}");
                return Ok(());
            };

            let delta = trend
                .deltas
                .get(&country)
                .map(|d| format!("{d:+.1} points"))
                .unwrap_or_else(|| "n/a".to_string());
            println!("{country} on {date}: {headline}, delta from a week ago = {delta}");
            for line in explanation {
                println!("  {line}");
            }
        }
        Commands::Run {
            no_download,
            only_weekly,
            boundaries,
            out,
        } => {
            overrides.only_weekly = only_weekly;
            overrides.boundaries_path = boundaries;
            overrides.output_dir = out;
            config.apply_overrides(overrides);

            if no_download {
                info!("skipping download");
            } else {
                fetch::download(&config.dataset.url, &config.dataset.path).await?;
            }

            let store = RecordStore::load(&config.dataset.path)?;
            if store.is_empty() {
                warn!(path = %config.dataset.path.display(), "dataset has no usable rows");
            }
            info!(observations = store.len(), "dataset loaded");

            let boundaries = match &config.boundaries.path {
                Some(path) => Some(naming::load_boundary_names(path)?),
                None => None,
            };

            let today = Utc::now().date_naive();
            let dates = orchestrator::select_dates(today, &config.schedule);
            let run = orchestrator::run(&store, &dates, today);

            if let Some(names) = &boundaries {
                for (date, date_run) in &run.dates {
                    for country in naming::unmatched_countries(&date_run.trend.scores, names) {
                        warn!(%date, country = %country, "scored country not found in boundary file");
                    }
                }
            }

            report::write_outputs(&config.output.dir, &run, boundaries.as_deref())
                .context("failed writing reports")?;
            println!(
                "Run {} scored {} dates; reports written to {}.",
                run.run_id,
                run.dates.len(),
                config.output.dir.display()
            );
        }
    }

    Ok(())
}
