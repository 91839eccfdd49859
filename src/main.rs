use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use feedlens::analysis::DatasetAnalytics;
use feedlens::models::SourceKind;
use feedlens::{Aggregator, AnalyzerConfig, BatchAdvancer, Config, ProviderChain, Storage};

#[derive(Parser, Debug)]
#[command(name = "feedlens")]
#[command(version = "0.1.0")]
#[command(about = "Analyze feedback datasets with tiered AI sentiment classification")]
struct Args {
    /// Database path (overrides DATABASE_PATH)
    #[arg(long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a CSV file as a new dataset
    Ingest {
        /// Path to the CSV file
        file: PathBuf,

        /// Dataset title (defaults to the file name)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Run one bounded batch of analysis and report progress
    Advance {
        dataset_id: i64,

        /// Rows to process in this call
        #[arg(long)]
        batch_size: Option<u32>,
    },

    /// Drive advance calls until the dataset is fully analyzed
    Run {
        dataset_id: i64,

        /// Rows to process per advance call
        #[arg(long)]
        batch_size: Option<u32>,
    },

    /// Show analytics for a dataset
    Stats {
        dataset_id: i64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Clear all analysis results and start over
    Reanalyze { dataset_id: i64 },

    /// List all datasets
    List,

    /// Delete a dataset and its rows
    Delete { dataset_id: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("feedlens=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = Config::from_env()?;

    let database = args.database.clone().unwrap_or(config.database_path.clone());
    let storage = Arc::new(Storage::new(&database)?);

    match args.command {
        Command::Ingest { file, title } => {
            let title = title.unwrap_or_else(|| {
                file.file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "untitled".to_string())
            });

            let table = feedlens::ingest::read_csv(&file)?;
            let dataset_id =
                storage.create_dataset(&title, SourceKind::Csv, &table.columns, &table.rows)?;

            println!(
                "Created dataset {} ('{}') with {} rows",
                dataset_id,
                title,
                table.rows.len()
            );
        }

        Command::Advance {
            dataset_id,
            batch_size,
        } => {
            let advancer = build_advancer(&config, storage, batch_size);
            let report = advancer.advance(dataset_id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Run {
            dataset_id,
            batch_size,
        } => {
            let advancer = build_advancer(&config, storage, batch_size);

            let mut report = advancer.advance(dataset_id).await?;
            let pb = ProgressBar::new(report.total_rows as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows",
                    )
                    .unwrap()
                    .progress_chars("#>-"),
            );
            pb.set_position(report.analyzed_total as u64);

            while !report.done {
                report = advancer.advance(dataset_id).await?;
                pb.set_position(report.analyzed_total as u64);
            }
            pb.finish_with_message("Analysis complete");

            println!(
                "Dataset {} done: {}/{} rows analyzed",
                dataset_id, report.analyzed_total, report.total_rows
            );
        }

        Command::Stats { dataset_id, format } => {
            let analytics = Aggregator::new(storage).aggregate(dataset_id)?;
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&analytics)?),
                _ => print!("{}", format_stats(&analytics)),
            }
        }

        Command::Reanalyze { dataset_id } => {
            let advancer = build_advancer(&config, storage, None);
            advancer.reanalyze(dataset_id)?;
            println!("Dataset {} reset; run 'advance' or 'run' to re-analyze", dataset_id);
        }

        Command::List => {
            for dataset in storage.list_datasets()? {
                println!(
                    "{:>4}  {:<30}  {:>6}/{:<6}  {:<10}  {}",
                    dataset.id,
                    dataset.title,
                    dataset.analyzed_rows,
                    dataset.total_rows,
                    dataset.status.to_string(),
                    dataset.summary.as_deref().unwrap_or("-"),
                );
            }
        }

        Command::Delete { dataset_id } => {
            if storage.delete_dataset(dataset_id)? {
                println!("Deleted dataset {}", dataset_id);
            } else {
                println!("Dataset {} not found", dataset_id);
            }
        }
    }

    Ok(())
}

fn build_advancer(
    config: &Config,
    storage: Arc<Storage>,
    batch_size: Option<u32>,
) -> BatchAdvancer {
    let providers = feedlens::classify::build_providers(config);
    if providers.is_empty() {
        tracing::warn!("No remote providers configured, using rule-based classification only");
    }

    let chain = Arc::new(ProviderChain::new(
        providers,
        config.cooldown_ms,
        config.text_truncate_len,
    ));

    let mut analyzer_config = AnalyzerConfig::from(config);
    if let Some(batch_size) = batch_size {
        analyzer_config.batch_size = batch_size;
    }

    BatchAdvancer::new(storage, chain, analyzer_config)
}

fn format_stats(analytics: &DatasetAnalytics) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "\n=== {} (dataset {}) ===\n\n",
        analytics.title, analytics.dataset_id
    ));
    output.push_str(&format!("Status: {}\n", analytics.status));
    output.push_str(&format!(
        "Analyzed: {}/{} responses\n",
        analytics.analyzed_responses, analytics.total_responses
    ));

    if !analytics.overall.is_empty() {
        output.push_str("\nOverall sentiment:\n");
        for (label, count) in &analytics.overall {
            output.push_str(&format!("  {:<10} {}\n", label, count));
        }
    }

    for distribution in &analytics.distributions {
        if distribution.counts.is_empty() {
            continue;
        }
        output.push_str(&format!("\n{}:\n", distribution.question));
        for (value, count) in &distribution.counts {
            output.push_str(&format!("  {:<30} {}\n", truncate_value(value), count));
        }
    }

    output
}

fn truncate_value(value: &str) -> String {
    if value.chars().count() > 28 {
        let head: String = value.chars().take(27).collect();
        format!("{}…", head)
    } else {
        value.to_string()
    }
}
