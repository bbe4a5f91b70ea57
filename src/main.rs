use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod db;
mod descriptors;
mod error;
mod models;
mod report;
mod store;
mod trends;
mod window;

use config::Config;
use descriptors::Catalog;
use store::{read_events_csv, EventStore, MemoryEventStore};
use window::TimeRange;

#[derive(Parser)]
#[command(name = "recommendation-trends")]
#[command(about = "Recommendation history and trend analytics", long_about = None)]
struct Cli {
    /// JSON catalog of item descriptors (overrides DESCRIPTORS_PATH)
    #[arg(long, global = true)]
    descriptors: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Csv,
    Html,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Append demo recommendation history
    Seed,
    /// Append recommendation events from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print per-item trends for a window
    Trends {
        /// One of 24h, 7d, 30d, all (defaults to DEFAULT_RANGE)
        #[arg(long)]
        range: Option<String>,
        /// Rows to print (defaults to REPORT_TOP_ITEMS)
        #[arg(long)]
        limit: Option<usize>,
        /// Print rows as JSON instead of text
        #[arg(long)]
        json: bool,
        /// Read events from a CSV file instead of Postgres
        #[arg(long)]
        events: Option<PathBuf>,
    },
    /// Render a CSV or HTML trend report
    Report {
        #[arg(long)]
        range: Option<String>,
        #[arg(long, value_enum, default_value_t = ReportFormat::Html)]
        format: ReportFormat,
        /// Output path; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        events: Option<PathBuf>,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn connect_store(config: &Config) -> anyhow::Result<db::PgEventStore> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(config.require_database_url()?)
        .await
        .context("failed to connect to Postgres")?;
    Ok(db::PgEventStore::new(pool))
}

/// In-memory store loaded from a CSV file, or Postgres otherwise.
async fn open_store(config: &Config, events: Option<&Path>) -> anyhow::Result<Box<dyn EventStore>> {
    match events {
        Some(path) => {
            let memory = MemoryEventStore::new();
            memory.append(&read_events_csv(path)?).await?;
            tracing::info!(path = %path.display(), "loaded events into memory");
            Ok(Box::new(memory))
        }
        None => Ok(Box::new(connect_store(config).await?)),
    }
}

fn load_catalog(config: &Config, flag: Option<PathBuf>) -> anyhow::Result<Catalog> {
    match flag.or_else(|| config.descriptors_path.clone()) {
        Some(path) => Catalog::from_json_file(&path),
        None => Ok(Catalog::new()),
    }
}

fn resolve_range(config: &Config, flag: Option<&str>) -> anyhow::Result<TimeRange> {
    match flag {
        Some(token) => Ok(token.parse::<TimeRange>()?),
        None => config.range(),
    }
}

fn top_items(config: &Config, flag: Option<usize>) -> usize {
    flag.unwrap_or(config.report_top_items)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing();

    let now = chrono::Utc::now().timestamp_millis();

    match cli.command {
        Commands::InitDb => {
            let store = connect_store(&config).await?;
            db::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let store = connect_store(&config).await?;
            let events = db::seed_events(now);
            store.append(&events).await?;
            println!(
                "Seeded {} recommendation events ({} stored).",
                events.len(),
                store.len().await?
            );
        }
        Commands::Import { csv } => {
            let store = connect_store(&config).await?;
            let events = read_events_csv(&csv)?;
            store.append(&events).await?;
            println!(
                "Imported {} events from {} ({} stored).",
                events.len(),
                csv.display(),
                store.len().await?
            );
        }
        Commands::Trends {
            range,
            limit,
            json,
            events,
        } => {
            let range = resolve_range(&config, range.as_deref())?;
            let catalog = load_catalog(&config, cli.descriptors)?;
            let store = open_store(&config, events.as_deref()).await?;
            let rows = trends::get_trends(store.as_ref(), &catalog, range, now).await?;

            if json {
                let payload = serde_json::json!({
                    "range": range,
                    "generated_at": now,
                    "summary": trends::summarize(&rows),
                    "rows": rows,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
                return Ok(());
            }

            if rows.is_empty() {
                println!("No recommendations recorded for {}.", range.label());
                return Ok(());
            }

            let summary = trends::summarize(&rows);
            println!(
                "{}: {} recommendations across {} items (mean confidence {:.1}%)",
                range.label(),
                summary.total_recommendations,
                summary.unique_items,
                summary.mean_confidence
            );
            let limit = top_items(&config, limit);
            for (index, row) in rows.iter().take(limit).enumerate() {
                println!(
                    "{:>2}. {} ({}, {}) count {} avg confidence {:.1}% avg position {:.1} trend {}",
                    index + 1,
                    row.descriptor.name,
                    row.descriptor.kind,
                    row.descriptor.category,
                    row.trend.count,
                    row.trend.avg_confidence,
                    row.trend.avg_position,
                    row.trend.trend_direction.as_str()
                );
            }
        }
        Commands::Report {
            range,
            format,
            out,
            events,
        } => {
            let range = resolve_range(&config, range.as_deref())?;
            let catalog = load_catalog(&config, cli.descriptors)?;
            let store = open_store(&config, events.as_deref()).await?;
            let rows = trends::get_trends(store.as_ref(), &catalog, range, now).await?;

            let rendered = match format {
                ReportFormat::Csv => report::render_csv(&rows)?,
                ReportFormat::Html => report::render_html(
                    &rows,
                    &report::ReportOptions {
                        range,
                        generated_at: now,
                        top_items: top_items(&config, None),
                    },
                ),
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{rendered}"),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_top_items(report_top_items: usize) -> Config {
        Config {
            database_url: None,
            default_range: "7d".to_string(),
            report_top_items,
            descriptors_path: None,
        }
    }

    #[test]
    fn top_items_falls_back_to_config() {
        let config = config_with_top_items(4);
        assert_eq!(top_items(&config, None), 4);
        assert_eq!(top_items(&config, Some(2)), 2);
    }

    #[test]
    fn trends_limit_is_optional() {
        let cli =
            Cli::try_parse_from(["recommendation-trends", "trends", "--range", "7d"]).unwrap();
        assert!(matches!(cli.command, Commands::Trends { limit: None, .. }));

        let cli =
            Cli::try_parse_from(["recommendation-trends", "trends", "--limit", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Trends { limit: Some(3), .. }));
    }
}
