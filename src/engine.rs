//! The windowed cluster engine: walks the reference index date by date,
//! resolves each date's ID set against the embedding store, clusters the
//! resolved vectors, and emits one [`ClusterRecord`] per successfully
//! clustered date.
//!
//! # Skip policy
//!
//! A date is skipped (no record emitted, run continues) when its resolved
//! embedding set is empty or when clustering returns an error. A malformed
//! single day must never abort a multi-year batch, so both branches log and
//! move on; only checkpoint-write failures are fatal.

use crate::cluster::{ClusterSelection, DistanceMetric, Hdbscan, HdbscanParams, NOISE};
use crate::models::{ClusterRecord, WindowEntry};
use crate::outputs::json::write_records;
use crate::store::EmbeddingStore;
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use tracing::{debug, info, instrument, warn};

/// Configuration surface for one cluster run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub metric: DistanceMetric,
    pub selection: ClusterSelection,
    /// Minimum cluster size; when `None` it is derived per date as
    /// `max(1, n / 10)` so granularity scales with the available sample.
    pub min_cluster_size: Option<usize>,
    /// Dates between checkpoint flushes of the full record list.
    pub checkpoint_interval: usize,
    /// Path of the output JSON artifact.
    pub output_path: String,
}

/// Sequential per-date clustering driver.
///
/// Owns the growing record list for the duration of a run; the persistence
/// layer only ever sees it for serialization.
pub struct WindowedClusterEngine {
    reference: Vec<WindowEntry>,
    store: EmbeddingStore,
    config: EngineConfig,
}

impl WindowedClusterEngine {
    pub fn new(reference: Vec<WindowEntry>, store: EmbeddingStore, config: EngineConfig) -> Self {
        Self {
            reference,
            store,
            config,
        }
    }

    /// Process every reference date in order, checkpointing the accumulated
    /// records every `checkpoint_interval` dates and once at the end.
    #[instrument(level = "info", skip_all)]
    pub async fn run(&self) -> Result<Vec<ClusterRecord>, Box<dyn Error>> {
        let interval = self.config.checkpoint_interval.max(1);
        let total = self.reference.len();
        info!(
            dates = total,
            store_size = self.store.len(),
            metric = self.config.metric.as_str(),
            selection = self.config.selection.as_str(),
            "Starting cluster run"
        );

        let mut records: Vec<ClusterRecord> = Vec::new();
        let mut clustered = 0usize;
        let mut skipped = 0usize;

        for (processed, entry) in self.reference.iter().enumerate() {
            let (vectors, ids, links) = self.resolve(entry);

            if vectors.is_empty() {
                info!(date = %entry.date, window_ids = entry.ids.len(), "No usable embeddings for date; skipping");
                skipped += 1;
            } else {
                let min_cluster_size = self
                    .config
                    .min_cluster_size
                    .unwrap_or_else(|| (vectors.len() / 10).max(1));
                let params = HdbscanParams {
                    min_cluster_size,
                    metric: self.config.metric,
                    selection: self.config.selection,
                };

                match Hdbscan::new(&vectors, params).cluster() {
                    Ok(labels) => {
                        let record = summarize(&entry.date, &labels, &vectors, &ids, &links);
                        info!(
                            date = %entry.date,
                            samples = vectors.len(),
                            clusters = record.clusters.len(),
                            noise = record.noise.len(),
                            progress = %format_args!("{}/{}", processed + 1, total),
                            "Clustered date"
                        );
                        records.push(record);
                        clustered += 1;
                    }
                    Err(e) => {
                        warn!(
                            date = %entry.date,
                            samples = vectors.len(),
                            min_cluster_size,
                            error = %e,
                            "Clustering failed for date; skipping"
                        );
                        skipped += 1;
                    }
                }
            }

            if (processed + 1) % interval == 0 {
                write_records(&records, &self.config.output_path).await?;
            }
        }

        write_records(&records, &self.config.output_path).await?;
        info!(dates = total, clustered, skipped, "Cluster run complete");
        Ok(records)
    }

    /// Build the three parallel input sequences for one date: vectors, IDs,
    /// and links, in store iteration order restricted to the entry's ID set.
    /// IDs missing from the store or carrying a null embedding are excluded.
    fn resolve(&self, entry: &WindowEntry) -> (Vec<Vec<f64>>, Vec<String>, Vec<String>) {
        let wanted: HashSet<&str> = entry.ids.iter().map(String::as_str).collect();
        let mut vectors = Vec::new();
        let mut ids = Vec::new();
        let mut links = Vec::new();

        for record in self.store.records() {
            if wanted.contains(record.ID.as_str()) {
                match &record.Embedding {
                    Some(embedding) => {
                        vectors.push(embedding.clone());
                        ids.push(record.ID.clone());
                        links.push(record.Link.clone());
                    }
                    None => {
                        debug!(id = %record.ID, date = %entry.date, "Excluding ID with null embedding")
                    }
                }
            }
        }

        (vectors, ids, links)
    }
}

/// Shape one date's label assignment into a [`ClusterRecord`].
///
/// For every non-noise label in ascending order: compute the centroid of the
/// cluster's vectors and pick the link of the member nearest to it
/// (Euclidean, ties to the lowest original index) as the representative.
pub fn summarize(
    date: &str,
    labels: &[i64],
    vectors: &[Vec<f64>],
    ids: &[String],
    links: &[String],
) -> ClusterRecord {
    let mut record = ClusterRecord {
        date: date.to_string(),
        ..Default::default()
    };

    let mut members: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (index, &label) in labels.iter().enumerate() {
        if label == NOISE {
            record.noise.push(ids[index].clone());
        } else {
            members.entry(label).or_default().push(index);
        }
    }

    for (label, indices) in &members {
        let center = centroid(vectors, indices);
        let mut best = indices[0];
        let mut best_dist = f64::INFINITY;
        for &index in indices {
            let d = DistanceMetric::Euclidean.distance(&vectors[index], &center);
            if d < best_dist {
                best_dist = d;
                best = index;
            }
        }
        record.center_links.push(links[best].clone());
        record
            .clusters
            .insert(*label, indices.iter().map(|&i| ids[i].clone()).collect());
    }

    record
}

/// Component-wise arithmetic mean of the selected vectors.
fn centroid(vectors: &[Vec<f64>], indices: &[usize]) -> Vec<f64> {
    let dim = vectors[indices[0]].len();
    let mut mean = vec![0.0; dim];
    for &index in indices {
        for (m, v) in mean.iter_mut().zip(&vectors[index]) {
            *m += v;
        }
    }
    let count = indices.len() as f64;
    for m in &mut mean {
        *m /= count;
    }
    mean
}
