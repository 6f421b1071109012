//! Durable storage for catalogues: one JSON document, replaced atomically.

use super::Catalogue;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading or saving a catalogue document.
///
/// Callers that resume a build treat `NotFound` and `Corrupt` as recoverable
/// (start from an empty catalogue); `Io` during save is not.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No catalogue exists at the given location.
    #[error("no catalogue at {0}")]
    NotFound(String),

    /// The file exists but does not parse as a catalogue document.
    #[error("catalogue at {0} is corrupt: {1}")]
    Corrupt(String, #[source] serde_json::Error),

    /// The in-memory catalogue could not be encoded.
    #[error("failed to encode catalogue for {0}: {1}")]
    Encode(String, #[source] serde_json::Error),

    /// Reading or writing the file failed.
    #[error("catalogue I/O at {0} failed: {1}")]
    Io(String, #[source] io::Error),
}

impl Catalogue {
    /// Load the catalogue document at `path`.
    pub fn load(path: &Path) -> Result<Catalogue, StoreError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(StoreError::Io(path.display().to_string(), e)),
        };
        serde_json::from_str(&content)
            .map_err(|e| StoreError::Corrupt(path.display().to_string(), e))
    }

    /// Persist the catalogue to `path`, replacing any previous document.
    ///
    /// The document is written to a sibling temp file and renamed over the
    /// target, so a crash mid-write leaves the previous snapshot intact.
    /// Concurrent saves to the same path are not supported.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::Encode(path.display().to_string(), e))?;

        let temp = temp_sibling(path);
        fs::write(&temp, json).map_err(|e| StoreError::Io(temp.display().to_string(), e))?;

        if let Err(e) = fs::rename(&temp, path) {
            let _ = fs::remove_file(&temp);
            return Err(StoreError::Io(path.display().to_string(), e));
        }
        Ok(())
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("catalogue"));
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{ImageRecord, RunTiming};
    use crate::Fingerprint;
    use tempfile::tempdir;

    fn sample_catalogue() -> Catalogue {
        let mut catalogue = Catalogue::new(PathBuf::from("/photos"));
        catalogue.records.insert(
            "b.jpg".into(),
            ImageRecord {
                width: Some(640),
                height: Some(480),
                created: Some(100.0),
                modified: Some(200.0),
                a_hash: Some(Fingerprint::from_hex("00ff").unwrap()),
                p_hash: Some(Fingerprint::from_hex("ff00").unwrap()),
                d_hash: Some(Fingerprint::from_hex("0ff0").unwrap()),
            },
        );
        catalogue
            .records
            .insert("a.jpg".into(), ImageRecord::default());
        catalogue.finished = true;
        catalogue.successful = true;
        catalogue.timing = Some(RunTiming {
            scan_start: "2024-01-01 10:00:00".into(),
            scan_end: "2024-01-01 10:05:00".into(),
            scan_duration: "0:05:00".into(),
        });
        catalogue
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalogue.json");

        let catalogue = sample_catalogue();
        catalogue.save(&path).unwrap();

        let loaded = Catalogue::load(&path).unwrap();
        assert_eq!(loaded.root_path, catalogue.root_path);
        assert_eq!(loaded.finished, catalogue.finished);
        assert_eq!(loaded.successful, catalogue.successful);
        assert_eq!(loaded.timing, catalogue.timing);

        // Stored iteration order survives the round trip.
        let paths: Vec<_> = loaded.records.paths().collect();
        assert_eq!(paths, vec!["b.jpg", "a.jpg"]);
        assert_eq!(
            loaded.records.get("b.jpg").unwrap().a_hash,
            Some(Fingerprint::from_hex("00ff").unwrap())
        );
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope.json");

        let result = Catalogue::load(&path);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_load_garbage_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalogue.json");
        fs::write(&path, "{ not json").unwrap();

        let result = Catalogue::load(&path);
        assert!(matches!(result, Err(StoreError::Corrupt(_, _))));
    }

    #[test]
    fn test_load_wrong_shape_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalogue.json");
        fs::write(&path, r#"{"images": {}}"#).unwrap();

        let result = Catalogue::load(&path);
        assert!(matches!(result, Err(StoreError::Corrupt(_, _))));
    }

    #[test]
    fn test_load_fixed_document_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalogue.json");
        fs::write(
            &path,
            r#"{
                "rootPath": "/data/photos",
                "images": {
                    "holiday/beach.jpg": {
                        "width": 4000, "height": 3000,
                        "created": 1700000000.25, "modified": 1700000001.5,
                        "aHash": "8f00c3a55a3cff01",
                        "pHash": "a1b2c3d4e5f60718",
                        "dHash": "0011223344556677"
                    }
                },
                "finished": true, "successful": true,
                "timing": {
                    "scan_start": "2024-01-01 10:00:00",
                    "scan_end": "2024-01-01 10:05:00",
                    "scan_duration": "0:05:00"
                }
            }"#,
        )
        .unwrap();

        let catalogue = Catalogue::load(&path).unwrap();
        assert_eq!(catalogue.root_path, PathBuf::from("/data/photos"));
        let record = catalogue.records.get("holiday/beach.jpg").unwrap();
        assert_eq!(record.width, Some(4000));
        assert_eq!(record.modified, Some(1700000001.5));
        assert_eq!(
            record.p_hash.as_ref().unwrap().to_hex(),
            "a1b2c3d4e5f60718"
        );
    }

    #[test]
    fn test_save_overwrites_and_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalogue.json");

        let mut catalogue = sample_catalogue();
        catalogue.save(&path).unwrap();
        catalogue.successful = false;
        catalogue.save(&path).unwrap();

        let loaded = Catalogue::load(&path).unwrap();
        assert!(!loaded.successful);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|name| name.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
