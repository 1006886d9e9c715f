//! Splits accumulated embedding checkpoint files into per-half-year period
//! files.
//!
//! The embedding fetch stage writes `checkpoint_{ticker}_{year}.json` files;
//! the Reference Window Builder wants `{ticker}_{year}_Q1.json` /
//! `{ticker}_{year}_Q2.json` period buckets. Each record is routed by the
//! month embedded in its ID (`YYYYMMDD_<n>`); records are passed through
//! untouched, so whatever extra fields a checkpoint carries survive the
//! split. Both halves are written even when empty.

use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

/// Split every `checkpoint_*.json` file in `dir` into `{ticker}_{year}_Q1`
/// and `{ticker}_{year}_Q2` files alongside it.
#[instrument(level = "info", skip_all, fields(dir = %dir, ticker = %ticker))]
pub async fn divide_checkpoints(dir: &str, ticker: &str) -> Result<(), Box<dyn Error>> {
    let mut file_names = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.contains("checkpoint") && name.ends_with(".json") {
            file_names.push(name);
        }
    }
    file_names.sort();
    info!(files = file_names.len(), "Found checkpoint files");

    for name in &file_names {
        let Some(year) = year_from_name(name) else {
            warn!(file = %name, "Unexpected checkpoint file name; skipping");
            continue;
        };

        let contents = fs::read_to_string(Path::new(dir).join(name)).await?;
        let rows: Vec<serde_json::Value> = serde_json::from_str(&contents)?;
        let total = rows.len();

        let mut q1 = Vec::new();
        let mut q2 = Vec::new();
        let mut skipped = 0usize;
        for row in rows {
            match id_month(&row) {
                Some(month) if month <= 6 => q1.push(row),
                Some(_) => q2.push(row),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(file = %name, skipped, "Rows without a usable ID were dropped");
        }

        let q1_path = Path::new(dir).join(format!("{ticker}_{year}_Q1.json"));
        let q2_path = Path::new(dir).join(format!("{ticker}_{year}_Q2.json"));
        fs::write(&q1_path, serde_json::to_string_pretty(&q1)?).await?;
        fs::write(&q2_path, serde_json::to_string_pretty(&q2)?).await?;

        info!(
            file = %name,
            total,
            q1 = q1.len(),
            q2 = q2.len(),
            "Divided checkpoint file into period buckets"
        );
    }

    Ok(())
}

/// Extract the year from `checkpoint_{ticker}_{year}.json`.
fn year_from_name(name: &str) -> Option<&str> {
    let stem = name.strip_suffix(".json")?;
    let year = stem.rsplit('_').next()?;
    (year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit())).then_some(year)
}

/// Month from the row's `ID` (or legacy `id`) field, requiring the full
/// 8-character date prefix.
fn id_month(row: &serde_json::Value) -> Option<u32> {
    let id = row.get("ID").or_else(|| row.get("id"))?.as_str()?;
    if id.len() < 8 {
        return None;
    }
    id.get(4..6)?
        .parse::<u32>()
        .ok()
        .filter(|month| (1..=12).contains(month))
}
