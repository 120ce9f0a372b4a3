use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use logstats::config::Config;
use logstats::import::ImportPipeline;
use logstats::report::{AggregationEngine, Granularity};
use logstats::storage::{SqliteStorage, Storage};

#[derive(Parser)]
#[command(name = "logstats")]
#[command(about = "Import access logs and report time-bucketed hit counts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a log file, or every *.log file in a directory
    Import {
        /// Path to a log file or a directory of log files
        path: PathBuf,
    },
    /// Aggregate hits and write the chart artifact for one granularity
    Report {
        /// Bucket granularity: hourly, daily or monthly
        granularity: Granularity,
        /// Window start as a signed offset from now, in bucket units
        #[arg(long, allow_hyphen_values = true)]
        from: Option<i64>,
        /// Window end as a signed offset from now, exclusive
        #[arg(long, allow_hyphen_values = true)]
        until: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    info!("Loaded configuration");

    let storage: Arc<dyn Storage> = Arc::new(
        SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
    );
    storage.init().await?;

    match cli.command {
        Commands::Import { path } => {
            let pipeline =
                ImportPipeline::new(Arc::clone(&storage), PathBuf::from(&config.geoip.dataset));

            let is_dir = tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);

            if is_dir {
                let imported = pipeline.import_dir(&path).await?;
                for (file, count) in &imported {
                    println!("Imported {} records from {}", count, file.display());
                }
                println!("Imported {} files", imported.len());
            } else {
                let count = pipeline.import(&path).await?;
                println!("Imported {} records", count);
            }
        }
        Commands::Report {
            granularity,
            from,
            until,
        } => {
            let engine = AggregationEngine::new(
                Arc::clone(&storage),
                PathBuf::from(&config.charts.output_dir),
            );
            let artifact = engine.run(granularity, from, until).await?;
            println!("Wrote {}", artifact.display());
        }
    }

    Ok(())
}
