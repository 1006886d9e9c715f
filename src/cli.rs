//! Command-line interface definitions for Stock News Clusters.
//!
//! Three subcommands cover the pipeline stages this binary owns:
//! `divide` (checkpoint files → period buckets), `reference` (period
//! buckets → sliding-window reference index), and `cluster` (reference
//! index + embedding store → daily cluster records).

use crate::cluster::{ClusterSelection, DistanceMetric};
use clap::{Parser, Subcommand};

/// Command-line arguments for the Stock News Clusters application.
///
/// # Examples
///
/// ```sh
/// # Build a 30-day reference index, backfilling below 200 samples
/// stock_news_clusters reference -w 30 -m 200 -e ./Data/News/Embeddings
///
/// # Cluster every reference date with cosine HDBSCAN
/// stock_news_clusters cluster -r ./Analysis/reference_30.json \
///     -d ./Data/News/Embeddings --metric cosine --selection eom
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the sliding-window reference index from period-bucket files
    Reference {
        /// Window length in days
        #[arg(short, long)]
        window_size: i64,

        /// Backfill source coverage while a window holds fewer IDs than this
        #[arg(short, long)]
        minimum_sample: usize,

        /// Directory holding the period-bucket embedding files
        #[arg(short, long, default_value = "./Data/News/Embeddings")]
        embeddings_dir: String,

        /// Directory the reference_{window_size}.json file is written to
        #[arg(short, long, default_value = "./Analysis")]
        output_dir: String,

        /// First day of the scan range (YYYYMMDD)
        #[arg(long, default_value = crate::reference::DEFAULT_START_DATE)]
        start_date: String,

        /// Last day of the scan range (YYYYMMDD)
        #[arg(long, default_value = crate::reference::DEFAULT_END_DATE)]
        end_date: String,
    },

    /// Cluster each reference date's articles and write the record array
    Cluster {
        /// Path to the reference index JSON file
        #[arg(short, long)]
        reference_path: String,

        /// Directory holding the embedding JSON files
        #[arg(short = 'd', long)]
        embeddings_dir: String,

        /// Distance metric for the pairwise distance matrix
        #[arg(short, long, value_enum, default_value_t = DistanceMetric::Cosine)]
        metric: DistanceMetric,

        /// Cluster extraction strategy
        #[arg(short, long, value_enum, default_value_t = ClusterSelection::Eom)]
        selection: ClusterSelection,

        /// Minimum cluster size; derived per date as max(1, n/10) when unset
        #[arg(long)]
        min_cluster_size: Option<usize>,

        /// Dates between checkpoint flushes of the output file
        #[arg(long, default_value_t = 100)]
        checkpoint_interval: usize,

        /// Path of the output cluster record array
        #[arg(short, long, default_value = "./Analysis/Results/clusters.json")]
        output: String,
    },

    /// Split checkpoint embedding files into per-half-year period files
    Divide {
        /// Directory holding the checkpoint files (outputs land alongside)
        #[arg(short, long, default_value = "./Data/News/Embeddings")]
        embeddings_dir: String,

        /// Ticker prefix for the generated period file names
        #[arg(short, long, default_value = "005930")]
        ticker: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_parsing() {
        let cli = Cli::parse_from(&[
            "stock_news_clusters",
            "reference",
            "-w",
            "30",
            "-m",
            "200",
        ]);

        match cli.command {
            Command::Reference {
                window_size,
                minimum_sample,
                start_date,
                ..
            } => {
                assert_eq!(window_size, 30);
                assert_eq!(minimum_sample, 200);
                assert_eq!(start_date, "20190101");
            }
            other => panic!("parsed wrong subcommand: {other:?}"),
        }
    }

    #[test]
    fn test_cluster_parsing_with_defaults() {
        let cli = Cli::parse_from(&[
            "stock_news_clusters",
            "cluster",
            "-r",
            "./Analysis/reference_30.json",
            "-d",
            "./Data/News/Embeddings",
        ]);

        match cli.command {
            Command::Cluster {
                metric,
                selection,
                min_cluster_size,
                checkpoint_interval,
                ..
            } => {
                assert_eq!(metric, DistanceMetric::Cosine);
                assert_eq!(selection, ClusterSelection::Eom);
                assert_eq!(min_cluster_size, None);
                assert_eq!(checkpoint_interval, 100);
            }
            other => panic!("parsed wrong subcommand: {other:?}"),
        }
    }

    #[test]
    fn test_cluster_metric_and_selection_values() {
        let cli = Cli::parse_from(&[
            "stock_news_clusters",
            "cluster",
            "-r",
            "ref.json",
            "-d",
            "embeddings",
            "--metric",
            "euclidean",
            "--selection",
            "leaf",
            "--min-cluster-size",
            "5",
        ]);

        match cli.command {
            Command::Cluster {
                metric,
                selection,
                min_cluster_size,
                ..
            } => {
                assert_eq!(metric, DistanceMetric::Euclidean);
                assert_eq!(selection, ClusterSelection::Leaf);
                assert_eq!(min_cluster_size, Some(5));
            }
            other => panic!("parsed wrong subcommand: {other:?}"),
        }
    }

    #[test]
    fn test_divide_defaults() {
        let cli = Cli::parse_from(&["stock_news_clusters", "divide"]);
        match cli.command {
            Command::Divide {
                embeddings_dir,
                ticker,
            } => {
                assert_eq!(embeddings_dir, "./Data/News/Embeddings");
                assert_eq!(ticker, "005930");
            }
            other => panic!("parsed wrong subcommand: {other:?}"),
        }
    }
}
