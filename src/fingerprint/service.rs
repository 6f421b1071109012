//! Production hash service backed by the `image` and `image_hasher` crates.

use super::{
    Fingerprint, FingerprintService, FingerprintSet, HashKind, ImageMeasurement, MeasureError,
};
use image::GenericImageView;
use image_hasher::{HashAlg, Hasher, HasherConfig};
use std::path::Path;

/// Computes the three fingerprint kinds for on-disk images.
///
/// One hasher per kind is configured at construction and reused for every
/// image. The default 8x8 hash size yields 64-bit fingerprints for all
/// kinds, so every record in a catalogue is Hamming-comparable.
pub struct PerceptualService {
    average: Hasher,
    perceptual: Hasher,
    difference: Hasher,
}

impl PerceptualService {
    pub fn new() -> Self {
        Self {
            average: kind_hasher(HashKind::Average),
            perceptual: kind_hasher(HashKind::Perceptual),
            difference: kind_hasher(HashKind::Difference),
        }
    }
}

impl Default for PerceptualService {
    fn default() -> Self {
        Self::new()
    }
}

fn kind_hasher(kind: HashKind) -> Hasher {
    let config = HasherConfig::new();
    let config = match kind {
        HashKind::Average => config.hash_alg(HashAlg::Mean),
        HashKind::Perceptual => config.hash_alg(HashAlg::Median).preproc_dct(),
        HashKind::Difference => config.hash_alg(HashAlg::Gradient),
    };
    config.to_hasher()
}

impl FingerprintService for PerceptualService {
    fn measure(&self, path: &Path) -> Result<ImageMeasurement, MeasureError> {
        let img = image::open(path)
            .map_err(|e| MeasureError::Load(path.display().to_string(), e))?;
        let (width, height) = img.dimensions();

        let fingerprints = FingerprintSet {
            average: Fingerprint::from_bytes(self.average.hash_image(&img).as_bytes().to_vec()),
            perceptual: Fingerprint::from_bytes(
                self.perceptual.hash_image(&img).as_bytes().to_vec(),
            ),
            difference: Fingerprint::from_bytes(
                self.difference.hash_image(&img).as_bytes().to_vec(),
            ),
        };

        Ok(ImageMeasurement {
            width,
            height,
            fingerprints,
        })
    }
}
