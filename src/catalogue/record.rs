//! Per-image record schema and the incremental refresh decision.
//!
//! Records are persisted with every field optional so that catalogues
//! written by older or interrupted runs still load; the builder repairs
//! incomplete records on the next pass instead of rejecting them.

use crate::fingerprint::{FingerprintSet, ImageMeasurement};
use crate::Fingerprint;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// One catalogued image, keyed in the catalogue by its root-relative path.
///
/// `created` and `modified` are fractional epoch seconds snapshotted from the
/// source file at the moment of the last successful compute. They are a cache
/// used to detect staleness, not a mirror of the file's current metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<f64>,

    #[serde(rename = "aHash", skip_serializing_if = "Option::is_none")]
    pub a_hash: Option<Fingerprint>,

    #[serde(rename = "pHash", skip_serializing_if = "Option::is_none")]
    pub p_hash: Option<Fingerprint>,

    #[serde(rename = "dHash", skip_serializing_if = "Option::is_none")]
    pub d_hash: Option<Fingerprint>,
}

impl ImageRecord {
    /// Record with every field populated from one fresh measurement.
    pub fn from_measurement(measurement: ImageMeasurement, times: FileTimes) -> Self {
        Self {
            width: Some(measurement.width),
            height: Some(measurement.height),
            created: Some(times.created),
            modified: Some(times.modified),
            a_hash: Some(measurement.fingerprints.average),
            p_hash: Some(measurement.fingerprints.perceptual),
            d_hash: Some(measurement.fingerprints.difference),
        }
    }

    /// Fill only missing fields from a fresh measurement, keeping every field
    /// already populated.
    pub fn fill_missing(&mut self, measurement: &ImageMeasurement, times: FileTimes) {
        self.width.get_or_insert(measurement.width);
        self.height.get_or_insert(measurement.height);
        self.created.get_or_insert(times.created);
        self.modified.get_or_insert(times.modified);
        if self.a_hash.is_none() {
            self.a_hash = Some(measurement.fingerprints.average.clone());
        }
        if self.p_hash.is_none() {
            self.p_hash = Some(measurement.fingerprints.perceptual.clone());
        }
        if self.d_hash.is_none() {
            self.d_hash = Some(measurement.fingerprints.difference.clone());
        }
    }

    /// True once every field is populated.
    pub fn is_complete(&self) -> bool {
        self.width.is_some()
            && self.height.is_some()
            && self.created.is_some()
            && self.modified.is_some()
            && self.a_hash.is_some()
            && self.p_hash.is_some()
            && self.d_hash.is_some()
    }

    /// The three fingerprints, if all are present.
    pub fn fingerprints(&self) -> Option<FingerprintSet> {
        Some(FingerprintSet {
            average: self.a_hash.clone()?,
            perceptual: self.p_hash.clone()?,
            difference: self.d_hash.clone()?,
        })
    }
}

/// What the builder must do for one discovered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPlan {
    /// No usable prior record: compute every field fresh.
    Recompute,
    /// Prior record is fresh but incomplete: decode the image and fill only
    /// the missing fields.
    Repair,
    /// Prior record is fresh and complete: copy it forward untouched.
    Reuse,
}

impl RefreshPlan {
    /// Decide the plan from an optional prior record and the file's current
    /// on-disk modification time.
    ///
    /// A prior without a recorded `modified` is unusable; a file modified
    /// after the recorded snapshot invalidates every cached field.
    pub fn decide(prior: Option<&ImageRecord>, disk_modified: f64) -> RefreshPlan {
        let Some(prior) = prior else {
            return RefreshPlan::Recompute;
        };
        let Some(recorded) = prior.modified else {
            return RefreshPlan::Recompute;
        };
        if recorded < disk_modified {
            return RefreshPlan::Recompute;
        }
        if prior.is_complete() {
            RefreshPlan::Reuse
        } else {
            RefreshPlan::Repair
        }
    }

    /// Whether this plan decodes the image.
    pub fn requires_decode(self) -> bool {
        !matches!(self, RefreshPlan::Reuse)
    }
}

/// Creation and modification times as fractional epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileTimes {
    pub created: f64,
    pub modified: f64,
}

/// Read the timestamps for `path`.
///
/// Platforms without a creation time fall back to the modification time.
pub fn file_times(path: &Path) -> io::Result<FileTimes> {
    let metadata = fs::metadata(path)?;
    let modified = epoch_seconds(metadata.modified()?);
    let created = metadata.created().map(epoch_seconds).unwrap_or(modified);
    Ok(FileTimes { created, modified })
}

fn epoch_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_secs_f64(),
        Err(before) => -before.duration().as_secs_f64(),
    }
}
