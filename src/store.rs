//! The embedding store: every per-ID embedding record from a directory of
//! JSON files, flattened into one insertion-ordered, ID-keyed collection.
//!
//! Duplicate IDs across files resolve first-seen-wins. Files are loaded in
//! lexicographic name order so "first seen" means the same thing on every
//! platform.

use crate::models::EmbeddingRecord;
use std::collections::HashMap;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// In-memory ID → embedding record mapping, iterable in insertion order.
#[derive(Debug, Default)]
pub struct EmbeddingStore {
    records: Vec<EmbeddingRecord>,
    index: HashMap<String, usize>,
}

impl EmbeddingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record unless its ID was already seen. Returns whether the
    /// record was kept.
    pub fn insert(&mut self, record: EmbeddingRecord) -> bool {
        if self.index.contains_key(&record.ID) {
            return false;
        }
        self.index.insert(record.ID.clone(), self.records.len());
        self.records.push(record);
        true
    }

    /// All records, in insertion order.
    pub fn records(&self) -> &[EmbeddingRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&EmbeddingRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Load every `.json` file in `dir` into one store.
    ///
    /// An empty directory is not an error; it just produces an empty store.
    /// A missing directory or an unparsable file is fatal.
    #[instrument(level = "info", skip_all, fields(dir = %dir))]
    pub async fn load_dir(dir: &str) -> Result<Self, Box<dyn Error>> {
        let mut file_names = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") {
                file_names.push(name);
            }
        }
        file_names.sort();

        let mut store = Self::new();
        let mut duplicates = 0usize;
        for name in &file_names {
            let path = Path::new(dir).join(name);
            let contents = fs::read_to_string(&path).await?;
            let records: Vec<EmbeddingRecord> = serde_json::from_str(&contents)?;
            let mut kept = 0usize;
            let total = records.len();
            for record in records {
                if store.insert(record) {
                    kept += 1;
                } else {
                    duplicates += 1;
                }
            }
            debug!(file = %name, kept, total, "Loaded embedding file");
        }

        if duplicates > 0 {
            warn!(duplicates, "Duplicate IDs across embedding files; first-seen records kept");
        }
        info!(
            files = file_names.len(),
            records = store.len(),
            "Embedding store loaded"
        );
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, link: &str) -> EmbeddingRecord {
        EmbeddingRecord {
            ID: id.to_string(),
            Link: link.to_string(),
            Embedding: Some(vec![0.0, 1.0]),
        }
    }

    #[test]
    fn test_first_seen_wins() {
        let mut store = EmbeddingStore::new();
        assert!(store.insert(record("20240101_001", "first")));
        assert!(!store.insert(record("20240101_001", "second")));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("20240101_001").unwrap().Link, "first");
    }

    #[test]
    fn test_records_keep_insertion_order() {
        let mut store = EmbeddingStore::new();
        store.insert(record("b", "lb"));
        store.insert(record("a", "la"));
        store.insert(record("c", "lc"));

        let order: Vec<&str> = store.records().iter().map(|r| r.ID.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_load_dir_merges_first_seen_across_files() {
        let dir = std::env::temp_dir().join(format!(
            "stock_news_clusters_store_{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).await.unwrap();

        // Lexicographic load order: 01_*.json before 02_*.json, so the
        // link from the first file must survive the collision.
        let first = vec![record("20240101_001", "from_first")];
        let second = vec![
            record("20240101_001", "from_second"),
            record("20240102_001", "unique"),
        ];
        fs::write(
            dir.join("01_a.json"),
            serde_json::to_string(&first).unwrap(),
        )
        .await
        .unwrap();
        fs::write(
            dir.join("02_b.json"),
            serde_json::to_string(&second).unwrap(),
        )
        .await
        .unwrap();
        fs::write(dir.join("ignored.txt"), "not json").await.unwrap();

        let store = EmbeddingStore::load_dir(dir.to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("20240101_001").unwrap().Link, "from_first");
        assert_eq!(store.get("20240102_001").unwrap().Link, "unique");

        let _ = fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_load_dir_empty_is_ok() {
        let dir = std::env::temp_dir().join(format!(
            "stock_news_clusters_store_empty_{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).await.unwrap();

        let store = EmbeddingStore::load_dir(dir.to_str().unwrap())
            .await
            .unwrap();
        assert!(store.is_empty());

        let _ = fs::remove_dir_all(&dir).await;
    }
}
