//! The catalogue: an insertion-ordered record map plus run metadata,
//! persisted as a single JSON document.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

pub mod builder;
pub mod record;
pub mod scan;
pub mod store;

pub use builder::{BuildConfig, BuildError, BuildReport, CatalogueBuilder};
pub use record::{ImageRecord, RefreshPlan};
pub use store::StoreError;

/// Record map preserving insertion order.
///
/// Iteration yields entries in the order they were first inserted; the
/// matcher relies on that order for deterministic tie-breaking, so it is part
/// of the persisted format: the JSON object's key order is the insertion
/// order, and loading preserves the document's key order.
#[derive(Debug, Clone, Default)]
pub struct RecordMap {
    entries: Vec<(String, ImageRecord)>,
    index: HashMap<String, usize>,
}

impl RecordMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<&ImageRecord> {
        self.index.get(path).map(|&i| &self.entries[i].1)
    }

    /// Insert or replace. Replacing keeps the entry's original position.
    pub fn insert(&mut self, path: String, record: ImageRecord) -> Option<ImageRecord> {
        match self.index.get(&path) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, record)),
            None => {
                self.index.insert(path.clone(), self.entries.len());
                self.entries.push((path, record));
                None
            }
        }
    }

    /// Keep only entries for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &ImageRecord) -> bool,
    {
        self.entries.retain(|(path, record)| keep(path, record));
        self.reindex();
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ImageRecord)> {
        self.entries.iter().map(|(path, record)| (path.as_str(), record))
    }

    /// Paths in insertion order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(path, _)| path.as_str())
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, (path, _)) in self.entries.iter().enumerate() {
            self.index.insert(path.clone(), i);
        }
    }
}

impl Serialize for RecordMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (path, record) in &self.entries {
            map.serialize_entry(path, record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RecordMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RecordMapVisitor;

        impl<'de> Visitor<'de> for RecordMapVisitor {
            type Value = RecordMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of image records")
            }

            fn visit_map<A>(self, mut access: A) -> Result<RecordMap, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut records = RecordMap::new();
                while let Some((path, record)) = access.next_entry::<String, ImageRecord>()? {
                    records.insert(path, record);
                }
                Ok(records)
            }
        }

        deserializer.deserialize_map(RecordMapVisitor)
    }
}

/// Timing summary of the most recent build pass, in the human-readable form
/// the document stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTiming {
    pub scan_start: String,
    pub scan_end: String,
    pub scan_duration: String,
}

/// The persisted catalogue for one root directory.
///
/// `root_path` is immutable after creation and verified on every resume.
/// `finished` is true only if the last pass ran to completion; `successful`
/// is false for interrupted or aborted passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalogue {
    #[serde(rename = "rootPath")]
    pub root_path: PathBuf,

    #[serde(rename = "images")]
    pub records: RecordMap,

    #[serde(default)]
    pub finished: bool,

    #[serde(default)]
    pub successful: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<RunTiming>,
}

impl Catalogue {
    /// Fresh, empty catalogue rooted at `root`.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root_path: root,
            records: RecordMap::new(),
            finished: false,
            successful: false,
            timing: None,
        }
    }

    /// Drop records whose backing file no longer exists under the root;
    /// returns the number removed.
    ///
    /// Runs once at the start of a resumed build, never mid-run.
    pub fn prune_missing(&mut self) -> usize {
        let root = self.root_path.clone();
        let before = self.records.len();
        self.records.retain(|path, _| root.join(path).is_file());
        before - self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    fn record(width: u32) -> ImageRecord {
        ImageRecord {
            width: Some(width),
            ..Default::default()
        }
    }

    #[test]
    fn test_record_map_preserves_insertion_order() {
        let mut map = RecordMap::new();
        map.insert("c.jpg".into(), record(1));
        map.insert("a.jpg".into(), record(2));
        map.insert("b.jpg".into(), record(3));

        let paths: Vec<_> = map.paths().collect();
        assert_eq!(paths, vec!["c.jpg", "a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_record_map_replace_keeps_position() {
        let mut map = RecordMap::new();
        map.insert("a.jpg".into(), record(1));
        map.insert("b.jpg".into(), record(2));

        let old = map.insert("a.jpg".into(), record(9));
        assert_eq!(old, Some(record(1)));
        assert_eq!(map.len(), 2);

        let paths: Vec<_> = map.paths().collect();
        assert_eq!(paths, vec!["a.jpg", "b.jpg"]);
        assert_eq!(map.get("a.jpg"), Some(&record(9)));
    }

    #[test]
    fn test_record_map_retain_reindexes() {
        let mut map = RecordMap::new();
        map.insert("a.jpg".into(), record(1));
        map.insert("b.jpg".into(), record(2));
        map.insert("c.jpg".into(), record(3));

        map.retain(|path, _| path != "b.jpg");

        assert_eq!(map.len(), 2);
        assert!(!map.contains("b.jpg"));
        assert_eq!(map.get("c.jpg"), Some(&record(3)));
        let paths: Vec<_> = map.paths().collect();
        assert_eq!(paths, vec!["a.jpg", "c.jpg"]);
    }

    #[test]
    fn test_record_map_serde_round_trip_keeps_order() {
        let mut map = RecordMap::new();
        map.insert("z.jpg".into(), record(1));
        map.insert("m.jpg".into(), record(2));
        map.insert("a.jpg".into(), record(3));

        let json = serde_json::to_string(&map).unwrap();
        let z = json.find("z.jpg").unwrap();
        let m = json.find("m.jpg").unwrap();
        let a = json.find("a.jpg").unwrap();
        assert!(z < m && m < a);

        let back: RecordMap = serde_json::from_str(&json).unwrap();
        let paths: Vec<_> = back.paths().collect();
        assert_eq!(paths, vec!["z.jpg", "m.jpg", "a.jpg"]);
    }

    #[test]
    fn test_catalogue_document_shape() {
        let mut catalogue = Catalogue::new(PathBuf::from("/photos"));
        catalogue.records.insert("a.jpg".into(), record(640));
        catalogue.finished = true;
        catalogue.successful = true;
        catalogue.timing = Some(RunTiming {
            scan_start: "start".into(),
            scan_end: "end".into(),
            scan_duration: "0:00:01".into(),
        });

        let json = serde_json::to_value(&catalogue).unwrap();
        assert_eq!(json["rootPath"], "/photos");
        assert_eq!(json["images"]["a.jpg"]["width"], 640);
        assert_eq!(json["finished"], true);
        assert_eq!(json["successful"], true);
        assert_eq!(json["timing"]["scan_duration"], "0:00:01");
    }

    #[test]
    fn test_catalogue_loads_without_run_meta() {
        let catalogue: Catalogue =
            serde_json::from_str(r#"{"rootPath": "/photos", "images": {}}"#).unwrap();
        assert!(!catalogue.finished);
        assert!(!catalogue.successful);
        assert!(catalogue.timing.is_none());
    }

    #[test]
    fn test_prune_missing_removes_only_deleted_files() {
        let temp_dir = tempdir().unwrap();
        File::create(temp_dir.path().join("kept.jpg")).unwrap();
        File::create(temp_dir.path().join("also_kept.jpg")).unwrap();

        let mut catalogue = Catalogue::new(temp_dir.path().to_path_buf());
        catalogue.records.insert("kept.jpg".into(), record(1));
        catalogue.records.insert("gone.jpg".into(), record(2));
        catalogue.records.insert("also_kept.jpg".into(), record(3));

        let pruned = catalogue.prune_missing();

        assert_eq!(pruned, 1);
        let paths: Vec<_> = catalogue.records.paths().collect();
        assert_eq!(paths, vec!["kept.jpg", "also_kept.jpg"]);
    }
}
