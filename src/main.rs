//! # Stock News Clusters
//!
//! Groups stock-ticker news articles into daily topic clusters. Upstream
//! collaborators crawl the articles and compute OpenAI embeddings; this
//! binary owns the windowed clustering core:
//!
//! 1. **Divide**: split embedding checkpoint files into semiannual period
//!    buckets (`{ticker}_{year}_Q1.json` / `_Q2.json`)
//! 2. **Reference**: build a day-granular sliding-window reference index
//!    mapping each date to the article IDs inside its trailing window,
//!    backfilling source coverage below a minimum sample count
//! 3. **Cluster**: for every reference date, resolve IDs against the
//!    embedding store, run HDBSCAN, pick a centroid-nearest representative
//!    link per cluster, and persist the record array with periodic
//!    checkpoints so a multi-hour batch survives interruption
//!
//! ## Usage
//!
//! ```sh
//! stock_news_clusters reference -w 30 -m 200
//! stock_news_clusters cluster -r ./Analysis/reference_30.json -d ./Data/News/Embeddings
//! ```

use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod cluster;
mod divide;
mod engine;
mod models;
mod outputs;
mod reference;
mod store;
mod utils;

use cli::{Cli, Command};
use engine::{EngineConfig, WindowedClusterEngine};
use outputs::json::write_reference;
use reference::{ReferenceBuilder, ReferenceConfig};
use store::EmbeddingStore;
use utils::{ensure_writable_dir, parse_yyyymmdd};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("stock_news_clusters starting up");

    let args = Cli::parse();
    debug!(?args.command, "Parsed CLI arguments");

    match args.command {
        Command::Reference {
            window_size,
            minimum_sample,
            embeddings_dir,
            output_dir,
            start_date,
            end_date,
        } => {
            let config = ReferenceConfig {
                window_size,
                minimum_sample,
                start_date: parse_yyyymmdd(&start_date)?,
                end_date: parse_yyyymmdd(&end_date)?,
                floor_date: parse_yyyymmdd(reference::HISTORICAL_FLOOR)?,
                backfill_cap_days: reference::BACKFILL_CAP_DAYS,
            };
            if config.window_size < 1 {
                error!(window_size, "Window size must be at least one day");
                return Err("window_size must be >= 1".into());
            }

            ensure_writable_dir(&output_dir).await?;
            let builder = ReferenceBuilder::from_dir(&embeddings_dir, config).await?;
            let entries = builder.build();

            let output_path = format!(
                "{}/reference_{}.json",
                output_dir.trim_end_matches('/'),
                window_size
            );
            write_reference(&entries, &output_path).await?;
        }

        Command::Cluster {
            reference_path,
            embeddings_dir,
            metric,
            selection,
            min_cluster_size,
            checkpoint_interval,
            output,
        } => {
            // Early check: losing write capability mid-batch invalidates the
            // whole run, so fail before any clustering starts.
            if let Some(parent) = Path::new(&output).parent() {
                let parent = parent.to_string_lossy();
                if !parent.is_empty() {
                    if let Err(e) = ensure_writable_dir(&parent).await {
                        error!(
                            path = %output,
                            error = %e,
                            "Output directory is not writable (fix perms or choose a different path)"
                        );
                        return Err(e);
                    }
                }
            }

            // Malformed inputs are fatal at startup; the run does not begin.
            let entries = reference::load_reference(&reference_path).await?;
            let store = EmbeddingStore::load_dir(&embeddings_dir).await?;

            let engine = WindowedClusterEngine::new(
                entries,
                store,
                EngineConfig {
                    metric,
                    selection,
                    min_cluster_size,
                    checkpoint_interval,
                    output_path: output,
                },
            );
            engine.run().await?;
        }

        Command::Divide {
            embeddings_dir,
            ticker,
        } => {
            divide::divide_checkpoints(&embeddings_dir, &ticker).await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
