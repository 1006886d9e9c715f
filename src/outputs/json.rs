//! Whole-file JSON writes with atomic replacement.
//!
//! The cluster engine calls [`write_records`] every checkpoint interval and
//! once at run end, each time with the full accumulated list. Writing to a
//! sibling temp file and renaming over the target keeps the on-disk artifact
//! a complete, parseable JSON array at every instant; a crash between
//! checkpoints loses at most the dates since the last flush.

use crate::models::{ClusterRecord, WindowEntry};
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Serialize the full cluster record list to `path`, atomically.
#[instrument(level = "debug", skip_all, fields(path = %path, count = records.len()))]
pub async fn write_records(records: &[ClusterRecord], path: &str) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(records)?;
    write_atomic(path, json).await?;
    info!(path, count = records.len(), "Wrote cluster records");
    Ok(())
}

/// Serialize the reference index to `path`, atomically.
#[instrument(level = "debug", skip_all, fields(path = %path, count = entries.len()))]
pub async fn write_reference(entries: &[WindowEntry], path: &str) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(entries)?;
    write_atomic(path, json).await?;
    info!(path, count = entries.len(), "Wrote reference index");
    Ok(())
}

/// Write `contents` to a sibling temp file, then rename over `path`.
async fn write_atomic(path: &str, contents: String) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let tmp_path = format!("{path}.tmp");
    if let Err(e) = fs::write(&tmp_path, contents).await {
        error!(path = %tmp_path, error = %e, "Failed writing temp file");
        return Err(e.into());
    }
    fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!(
                "stock_news_clusters_outputs_{}_{}",
                std::process::id(),
                name
            ))
            .join("out.json")
            .to_string_lossy()
            .into_owned()
    }

    fn sample_record(date: &str) -> ClusterRecord {
        let mut record = ClusterRecord {
            date: date.to_string(),
            center_links: vec!["https://news.example.com/a".to_string()],
            ..Default::default()
        };
        record.clusters.insert(0, vec!["20240101_000".to_string()]);
        record
    }

    #[tokio::test]
    async fn test_write_records_creates_parseable_array() {
        let path = temp_path("records");
        write_records(&[sample_record("20240110")], &path).await.unwrap();

        let contents = fs::read_to_string(&path).await.unwrap();
        let parsed: Vec<ClusterRecord> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].date, "20240110");
    }

    #[tokio::test]
    async fn test_rewrite_replaces_whole_file() {
        // Each checkpoint rewrites the complete list; a shorter second write
        // must not leave trailing bytes of the first.
        let path = temp_path("rewrite");
        let many: Vec<ClusterRecord> =
            (0..50).map(|i| sample_record(&format!("202401{:02}", i % 28 + 1))).collect();
        write_records(&many, &path).await.unwrap();
        write_records(&[sample_record("20240201")], &path).await.unwrap();

        let contents = fs::read_to_string(&path).await.unwrap();
        let parsed: Vec<ClusterRecord> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let path = temp_path("tmpfile");
        write_records(&[sample_record("20240110")], &path).await.unwrap();
        assert!(fs::metadata(format!("{path}.tmp")).await.is_err());
    }

    #[tokio::test]
    async fn test_write_reference_roundtrip() {
        let path = temp_path("reference");
        let entries = vec![WindowEntry {
            date: "20240110".to_string(),
            files: vec!["005930_2024_Q1.json".to_string()],
            ids: vec!["20240101_000".to_string()],
        }];
        write_reference(&entries, &path).await.unwrap();

        let contents = fs::read_to_string(&path).await.unwrap();
        let parsed: Vec<WindowEntry> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed, entries);
    }
}
