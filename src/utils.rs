//! Date and file-system helpers shared across the pipeline.
//!
//! Dates travel as fixed-width `YYYYMMDD` strings on the wire (article IDs
//! embed them as their first 8 characters), which makes range checks plain
//! lexicographic string comparisons. These helpers convert between that
//! format and [`NaiveDate`] and map a date to its semiannual period bucket.

use chrono::{Datelike, NaiveDate};
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Parse a fixed-width `YYYYMMDD` date string.
pub fn parse_yyyymmdd(s: &str) -> Result<NaiveDate, Box<dyn Error>> {
    Ok(NaiveDate::parse_from_str(s, "%Y%m%d")?)
}

/// Format a date back to the wire format.
pub fn format_yyyymmdd(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Semiannual period bucket for a date: `{year}_Q1` for January–June,
/// `{year}_Q2` for July–December. Source files carry the bucket in their
/// name, so this is how a date is routed to its files.
pub fn period_bucket(date: NaiveDate) -> String {
    if date.month() > 6 {
        format!("{}_Q2", date.year())
    } else {
        format!("{}_Q1", date.year())
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if missing, then probes writability by creating and
/// deleting a throwaway file. Checkpoint writes are fatal when they fail, so
/// this runs before any long batch starts.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    // Small sync write via std fs (simpler error surface).
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format_roundtrip() {
        let date = parse_yyyymmdd("20240229").unwrap();
        assert_eq!(format_yyyymmdd(date), "20240229");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_yyyymmdd("2024-02-29").is_err());
        assert!(parse_yyyymmdd("20241340").is_err());
    }

    #[test]
    fn test_period_bucket_halves() {
        let june = NaiveDate::from_ymd_opt(2023, 6, 30).unwrap();
        let july = NaiveDate::from_ymd_opt(2023, 7, 1).unwrap();
        assert_eq!(period_bucket(june), "2023_Q1");
        assert_eq!(period_bucket(july), "2023_Q2");
    }

    #[test]
    fn test_yyyymmdd_ordering_is_lexicographic() {
        // The fixed-width format is why string comparison is a valid range
        // check on ID date prefixes.
        assert!("20231231" < "20240101");
        assert!("20240101" < "20240102");
    }
}
