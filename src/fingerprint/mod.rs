//! Fingerprint primitives shared by the catalogue builder and the matcher.
//!
//! A fingerprint is a fixed-length bit vector summarizing the visual content
//! of one image. Three independent kinds are computed per image; fingerprints
//! are only ever compared to another fingerprint of the same kind, via
//! Hamming distance.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use thiserror::Error;

mod service;

pub use service::PerceptualService;

/// The three fingerprint kinds.
///
/// `ALL` lists them in the order votes are tallied; earlier kinds win ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashKind {
    /// Mean-based hash. Fast, coarse.
    Average,
    /// DCT-based hash. Most resilient to resizing and compression.
    Perceptual,
    /// Gradient-based hash.
    Difference,
}

impl HashKind {
    /// All kinds, in tallying order.
    pub const ALL: [HashKind; 3] = [
        HashKind::Average,
        HashKind::Perceptual,
        HashKind::Difference,
    ];
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Average => write!(f, "aHash"),
            Self::Perceptual => write!(f, "pHash"),
            Self::Difference => write!(f, "dHash"),
        }
    }
}

impl Serialize for HashKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Two fingerprints of unequal bit length were compared.
///
/// Distances between unequal-length vectors are meaningless, so comparison
/// refuses rather than guessing; hitting this means a record is corrupt or
/// was produced by a differently-configured hasher.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("fingerprint length mismatch: {left_bits} vs {right_bits} bits")]
pub struct LengthMismatch {
    pub left_bits: usize,
    pub right_bits: usize,
}

/// Errors parsing a fingerprint from its hex form.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseFingerprintError {
    #[error("empty fingerprint")]
    Empty,

    #[error("fingerprint hex has odd length {0}")]
    OddLength(usize),

    #[error("invalid hex digit {0:?} in fingerprint")]
    InvalidDigit(char),
}

/// A fixed-length bit vector, stored as whole bytes, most significant bit
/// first.
///
/// Serializes as a lowercase hex string, the textual form the catalogue
/// document uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    bits: Vec<u8>,
}

impl Fingerprint {
    /// Wrap raw hash bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bits: bytes }
    }

    /// Parse from hex, upper or lower case.
    pub fn from_hex(text: &str) -> Result<Self, ParseFingerprintError> {
        if text.is_empty() {
            return Err(ParseFingerprintError::Empty);
        }
        if text.len() % 2 != 0 {
            return Err(ParseFingerprintError::OddLength(text.len()));
        }
        let mut bits = Vec::with_capacity(text.len() / 2);
        for chunk in text.as_bytes().chunks(2) {
            let hi = hex_value(chunk[0])?;
            let lo = hex_value(chunk[1])?;
            bits.push(hi << 4 | lo);
        }
        Ok(Self { bits })
    }

    /// Lowercase hex, two digits per byte.
    pub fn to_hex(&self) -> String {
        self.bits.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Length of the vector in bits.
    pub fn bit_len(&self) -> usize {
        self.bits.len() * 8
    }

    /// Hamming distance to another fingerprint of the same kind.
    ///
    /// Fails if the two vectors differ in length.
    pub fn distance(&self, other: &Fingerprint) -> Result<u32, LengthMismatch> {
        if self.bits.len() != other.bits.len() {
            return Err(LengthMismatch {
                left_bits: self.bit_len(),
                right_bits: other.bit_len(),
            });
        }
        Ok(self
            .bits
            .iter()
            .zip(&other.bits)
            .map(|(a, b)| (a ^ b).count_ones())
            .sum())
    }
}

fn hex_value(digit: u8) -> Result<u8, ParseFingerprintError> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        other => Err(ParseFingerprintError::InvalidDigit(other as char)),
    }
}

impl Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct HexVisitor;

        impl Visitor<'_> for HexVisitor {
            type Value = Fingerprint;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a hex fingerprint string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Fingerprint, E>
            where
                E: de::Error,
            {
                Fingerprint::from_hex(v).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(HexVisitor)
    }
}

/// One image's three fingerprints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintSet {
    pub average: Fingerprint,
    pub perceptual: Fingerprint,
    pub difference: Fingerprint,
}

impl FingerprintSet {
    pub fn get(&self, kind: HashKind) -> &Fingerprint {
        match kind {
            HashKind::Average => &self.average,
            HashKind::Perceptual => &self.perceptual,
            HashKind::Difference => &self.difference,
        }
    }

    /// Per-kind Hamming distances to `other`, in tallying order.
    pub fn distances(&self, other: &FingerprintSet) -> Result<[u32; 3], LengthMismatch> {
        Ok([
            self.average.distance(&other.average)?,
            self.perceptual.distance(&other.perceptual)?,
            self.difference.distance(&other.difference)?,
        ])
    }
}

/// Everything the hash service reports for one decoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMeasurement {
    pub width: u32,
    pub height: u32,
    pub fingerprints: FingerprintSet,
}

/// Errors measuring an image.
#[derive(Debug, Error)]
pub enum MeasureError {
    /// Failed to open or decode the image.
    #[error("Failed to load image {0}: {1}")]
    Load(String, #[source] image::ImageError),

    /// Failed to read the file or its metadata.
    #[error("Failed to read {0}: {1}")]
    Io(String, #[source] std::io::Error),
}

/// Computes fingerprints for images on disk.
///
/// Implementations must be deterministic for identical file content and must
/// produce fingerprints of a fixed per-kind length across all images, or
/// Hamming comparison between stored records stops being meaningful.
pub trait FingerprintService: Send + Sync {
    /// Decode the image at `path` and measure its dimensions plus all three
    /// fingerprints.
    fn measure(&self, path: &Path) -> Result<ImageMeasurement, MeasureError>;
}
