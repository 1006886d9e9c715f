//! Data models for the reference index, the embedding store, and the
//! cluster output artifact.
//!
//! Two of the wire formats use dynamic JSON keys (a date string as an object
//! key, and one `Cluster_<label>` key per cluster), so [`WindowEntry`] and
//! [`ClusterRecord`] carry hand-written `Serialize`/`Deserialize`
//! implementations. Internally both are plain structs; the key-per-cluster
//! shape only exists at the serialization boundary.
//!
//! The embedding record uses the upstream field names (`ID`, `Link`,
//! `Embedding`) verbatim, hence the `#[allow(non_snake_case)]`.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// One per-ID record from an embedding file.
///
/// `Embedding` is `None` when the upstream embedding computation failed for
/// this article; such records load fine but are excluded when a window is
/// resolved against the store.
#[allow(non_snake_case)]
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingRecord {
    /// Article ID, `YYYYMMDD_<n>`; the first 8 characters are the
    /// publication date.
    pub ID: String,
    /// Source URL of the article.
    pub Link: String,
    /// Embedding vector, or `None` if the upstream computation failed.
    pub Embedding: Option<Vec<f64>>,
}

/// One entry of the reference index: the IDs whose publication date falls
/// inside the trailing window ending on `date`.
///
/// Wire shape (the date is the key, not a value):
///
/// ```json
/// { "20240315": ["005930_2024_Q1.json"], "IDs": ["20240301_004", "..."] }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WindowEntry {
    /// Window end date, `YYYYMMDD`.
    pub date: String,
    /// Basenames of the period-bucket files that contributed IDs, in the
    /// order they were matched.
    pub files: Vec<String>,
    /// Article IDs in the window, deduplicated, first-seen order.
    pub ids: Vec<String>,
}

impl Serialize for WindowEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(&self.date, &self.files)?;
        map.serialize_entry("IDs", &self.ids)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for WindowEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntryVisitor;

        impl<'de> Visitor<'de> for EntryVisitor {
            type Value = WindowEntry;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map with one date key and an \"IDs\" key")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut date: Option<String> = None;
                let mut files = Vec::new();
                let mut ids: Option<Vec<String>> = None;

                while let Some(key) = access.next_key::<String>()? {
                    if key == "IDs" {
                        ids = Some(access.next_value()?);
                    } else if date.is_none() {
                        // The first non-"IDs" key is the window end date. Its
                        // value is the matched file list when well formed, but
                        // anything else is tolerated and passed over unread.
                        let value: serde_json::Value = access.next_value()?;
                        if let serde_json::Value::Array(items) = value {
                            files = items
                                .into_iter()
                                .filter_map(|v| v.as_str().map(str::to_string))
                                .collect();
                        }
                        date = Some(key);
                    } else {
                        let _: de::IgnoredAny = access.next_value()?;
                    }
                }

                Ok(WindowEntry {
                    date: date.ok_or_else(|| de::Error::missing_field("<date>"))?,
                    files,
                    ids: ids.ok_or_else(|| de::Error::missing_field("IDs"))?,
                })
            }
        }

        deserializer.deserialize_map(EntryVisitor)
    }
}

/// The clustering result for one date.
///
/// Internal representation is an explicit label map plus a separate noise
/// list; the `Cluster_<label>` key-per-cluster shape is produced only during
/// serialization. Wire key order is `Date`, `Center_Link`, `Cluster_*` in
/// ascending numeric label order, then `Noise` iff any item was labeled
/// noise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterRecord {
    /// Window end date, `YYYYMMDD`.
    pub date: String,
    /// Representative link per cluster, position-wise parallel to the
    /// ascending label order of `clusters`.
    pub center_links: Vec<String>,
    /// Member IDs per non-noise label. `BTreeMap` keeps labels in ascending
    /// numeric order for both iteration and serialization.
    pub clusters: BTreeMap<i64, Vec<String>>,
    /// IDs assigned the noise label, empty when every item clustered.
    pub noise: Vec<String>,
}

impl Serialize for ClusterRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = 2 + self.clusters.len() + usize::from(!self.noise.is_empty());
        let mut map = serializer.serialize_map(Some(entries))?;
        map.serialize_entry("Date", &self.date)?;
        map.serialize_entry("Center_Link", &self.center_links)?;
        for (label, members) in &self.clusters {
            map.serialize_entry(&format!("Cluster_{label}"), members)?;
        }
        if !self.noise.is_empty() {
            map.serialize_entry("Noise", &self.noise)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ClusterRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = ClusterRecord;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a cluster record map")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut record = ClusterRecord::default();

                while let Some(key) = access.next_key::<String>()? {
                    match key.as_str() {
                        "Date" => record.date = access.next_value()?,
                        "Center_Link" => record.center_links = access.next_value()?,
                        "Noise" => record.noise = access.next_value()?,
                        other => {
                            let label = other
                                .strip_prefix("Cluster_")
                                .and_then(|s| s.parse::<i64>().ok())
                                .ok_or_else(|| {
                                    de::Error::custom(format!("unexpected key `{other}`"))
                                })?;
                            record.clusters.insert(label, access.next_value()?);
                        }
                    }
                }

                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}
