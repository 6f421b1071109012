//! Vote-based similarity matching against a built catalogue.
//!
//! Each fingerprint kind independently nominates its nearest record by
//! Hamming distance; the record nominated most often wins. Requiring
//! agreement across unrelated hash constructions filters out the false
//! positives any single kind produces.
//!
//! Ties are deterministic: within one kind, the earliest stored record wins;
//! across kinds, equal vote counts go to the earliest kind in tally order
//! (average, then perceptual, then difference).

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::catalogue::Catalogue;
use crate::fingerprint::{
    FingerprintService, FingerprintSet, HashKind, LengthMismatch, MeasureError,
};

/// Errors finding a match for one query image.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The catalogue holds no complete records to match against.
    #[error("catalogue has no complete records to match against")]
    EmptyCatalogue,

    /// Measuring the query image failed.
    #[error(transparent)]
    Measure(#[from] MeasureError),

    /// A record's fingerprints have a different length than the query's.
    #[error("fingerprint length mismatch against record {path}: {source}")]
    Length {
        path: String,
        #[source]
        source: LengthMismatch,
    },
}

/// The nearest record under one fingerprint kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindWinner {
    /// Which fingerprint kind nominated this record.
    pub kind: HashKind,
    /// Catalogue path of the nominated record, relative to the root.
    pub path: String,
    /// Hamming distance between query and record for this kind.
    pub distance: u32,
}

/// The match found for one query image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    /// The query image path as given.
    pub query: PathBuf,
    /// Catalogue path of the winning record, relative to the root.
    pub matched: String,
    /// How many kinds nominated the winner (1 to 3).
    pub votes: usize,
    /// Per-kind nominations, in tally order.
    pub candidates: Vec<KindWinner>,
}

struct Candidate<'a> {
    path: &'a str,
    fingerprints: FingerprintSet,
}

/// Matches query images against one catalogue.
///
/// Construction snapshots the complete records once, so a batch of queries
/// pays the incomplete-record filtering a single time.
///
/// # Example
///
/// ```no_run
/// use imagedex::catalogue::Catalogue;
/// use imagedex::fingerprint::PerceptualService;
/// use imagedex::matcher::Matcher;
/// use std::path::Path;
///
/// let catalogue = Catalogue::load(Path::new("photos.json")).unwrap();
/// let matcher = Matcher::new(&catalogue).unwrap();
/// let service = PerceptualService::new();
/// let result = matcher.match_image(&service, Path::new("query.jpg")).unwrap();
/// println!("{} ({} votes)", result.matched, result.votes);
/// ```
pub struct Matcher<'a> {
    candidates: Vec<Candidate<'a>>,
}

impl<'a> Matcher<'a> {
    /// Snapshot the matchable records of `catalogue`.
    ///
    /// Records missing any fingerprint are skipped with a warning; they can
    /// appear after an interrupted build pass and would otherwise bias every
    /// comparison they take part in.
    ///
    /// # Errors
    ///
    /// `EmptyCatalogue` if no complete record remains.
    pub fn new(catalogue: &'a Catalogue) -> Result<Self, MatchError> {
        let mut candidates = Vec::with_capacity(catalogue.records.len());
        for (path, record) in catalogue.records.iter() {
            match record.fingerprints() {
                Some(fingerprints) => candidates.push(Candidate { path, fingerprints }),
                None => log::warn!("Skipping incomplete record {}", path),
            }
        }

        if candidates.is_empty() {
            return Err(MatchError::EmptyCatalogue);
        }

        Ok(Self { candidates })
    }

    /// How many records take part in matching.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Measure `query` and find its best match.
    pub fn match_image<S: FingerprintService>(
        &self,
        service: &S,
        query: &Path,
    ) -> Result<MatchResult, MatchError> {
        let measurement = service.measure(query)?;
        self.match_fingerprints(query, &measurement.fingerprints)
    }

    /// Find the best match for an already-measured set of fingerprints.
    ///
    /// `query` is only carried into the result for labelling.
    pub fn match_fingerprints(
        &self,
        query: &Path,
        probe: &FingerprintSet,
    ) -> Result<MatchResult, MatchError> {
        // One pass over the candidates feeds every kind's nearest search and
        // the combined-distance diagnostic. Strict `<` keeps the earliest
        // stored record on distance ties.
        let mut per_kind: [Option<(usize, u32)>; 3] = [None; 3];
        let mut combined: Option<(usize, u64)> = None;

        for (ci, candidate) in self.candidates.iter().enumerate() {
            let distances =
                probe
                    .distances(&candidate.fingerprints)
                    .map_err(|source| MatchError::Length {
                        path: candidate.path.to_string(),
                        source,
                    })?;

            for (ki, &distance) in distances.iter().enumerate() {
                if per_kind[ki].is_none_or(|(_, best)| distance < best) {
                    per_kind[ki] = Some((ci, distance));
                }
            }

            let total: u64 = distances.iter().map(|&d| u64::from(d)).sum();
            if combined.is_none_or(|(_, best)| total < best) {
                combined = Some((ci, total));
            }
        }

        let mut winners = Vec::with_capacity(HashKind::ALL.len());
        for (ki, kind) in HashKind::ALL.into_iter().enumerate() {
            let (ci, distance) = per_kind[ki].ok_or(MatchError::EmptyCatalogue)?;
            winners.push(KindWinner {
                kind,
                path: self.candidates[ci].path.to_string(),
                distance,
            });
        }

        if let Some((ci, total)) = combined {
            log::debug!(
                "Combined distance favours {} (sum {})",
                self.candidates[ci].path,
                total
            );
        }

        let (matched, votes) = tally(&winners);

        Ok(MatchResult {
            query: query.to_path_buf(),
            matched,
            votes,
            candidates: winners,
        })
    }
}

/// Pick the most-nominated path. Strict `>` keeps the earliest nomination in
/// tally order when counts tie.
fn tally(winners: &[KindWinner]) -> (String, usize) {
    let mut best_index = 0;
    let mut best_count = 0;
    for (i, winner) in winners.iter().enumerate() {
        let count = winners.iter().filter(|w| w.path == winner.path).count();
        if count > best_count {
            best_count = count;
            best_index = i;
        }
    }
    (winners[best_index].path.clone(), best_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::ImageRecord;
    use crate::fingerprint::Fingerprint;
    use std::path::PathBuf;

    fn fp(hex: &str) -> Fingerprint {
        Fingerprint::from_hex(hex).unwrap()
    }

    fn record(average: &str, perceptual: &str, difference: &str) -> ImageRecord {
        ImageRecord {
            width: Some(100),
            height: Some(80),
            created: Some(1_700_000_000.0),
            modified: Some(1_700_000_000.0),
            a_hash: Some(fp(average)),
            p_hash: Some(fp(perceptual)),
            d_hash: Some(fp(difference)),
        }
    }

    fn probe(average: &str, perceptual: &str, difference: &str) -> FingerprintSet {
        FingerprintSet {
            average: fp(average),
            perceptual: fp(perceptual),
            difference: fp(difference),
        }
    }

    fn catalogue_of(entries: Vec<(&str, ImageRecord)>) -> Catalogue {
        let mut catalogue = Catalogue::new(PathBuf::from("/photos"));
        for (path, record) in entries {
            catalogue.records.insert(path.to_string(), record);
        }
        catalogue
    }

    #[test]
    fn test_empty_catalogue_is_an_error() {
        let catalogue = catalogue_of(vec![]);
        assert!(matches!(
            Matcher::new(&catalogue),
            Err(MatchError::EmptyCatalogue)
        ));
    }

    #[test]
    fn test_only_incomplete_records_is_an_error() {
        let mut partial = record("00", "00", "00");
        partial.p_hash = None;
        let catalogue = catalogue_of(vec![("broken.jpg", partial)]);
        assert!(matches!(
            Matcher::new(&catalogue),
            Err(MatchError::EmptyCatalogue)
        ));
    }

    #[test]
    fn test_incomplete_records_are_skipped_not_matched() {
        let mut partial = record("01", "01", "01");
        partial.d_hash = None;
        let catalogue = catalogue_of(vec![
            ("broken.jpg", partial),
            ("whole.jpg", record("ff", "ff", "ff")),
        ]);
        let matcher = Matcher::new(&catalogue).unwrap();
        assert_eq!(matcher.candidate_count(), 1);

        // The query sits right on the skipped record; the complete one still
        // wins because the skipped one never competes.
        let result = matcher
            .match_fingerprints(Path::new("q.jpg"), &probe("01", "01", "01"))
            .unwrap();
        assert_eq!(result.matched, "whole.jpg");
        assert_eq!(result.votes, 3);
    }

    #[test]
    fn test_unanimous_vote() {
        let catalogue = catalogue_of(vec![
            ("a.jpg", record("00", "00", "00")),
            ("b.jpg", record("ff", "ff", "ff")),
        ]);
        let matcher = Matcher::new(&catalogue).unwrap();

        let result = matcher
            .match_fingerprints(Path::new("q.jpg"), &probe("01", "01", "01"))
            .unwrap();

        assert_eq!(result.matched, "a.jpg");
        assert_eq!(result.votes, 3);
        assert_eq!(result.query, PathBuf::from("q.jpg"));
        let paths: Vec<&str> = result.candidates.iter().map(|w| w.path.as_str()).collect();
        assert_eq!(paths, vec!["a.jpg", "a.jpg", "a.jpg"]);
        // "01" against "00" differs in one bit, against "ff" in seven.
        assert_eq!(result.candidates[0].distance, 1);
    }

    #[test]
    fn test_majority_vote_beats_single_dissent() {
        // b wins the perceptual kind, a wins the other two.
        let catalogue = catalogue_of(vec![
            ("a.jpg", record("00", "ff", "00")),
            ("b.jpg", record("ff", "00", "ff")),
        ]);
        let matcher = Matcher::new(&catalogue).unwrap();

        let result = matcher
            .match_fingerprints(Path::new("q.jpg"), &probe("00", "00", "00"))
            .unwrap();

        assert_eq!(result.matched, "a.jpg");
        assert_eq!(result.votes, 2);
        let paths: Vec<&str> = result.candidates.iter().map(|w| w.path.as_str()).collect();
        assert_eq!(paths, vec!["a.jpg", "b.jpg", "a.jpg"]);
    }

    #[test]
    fn test_distance_tie_goes_to_earliest_stored_record() {
        let catalogue = catalogue_of(vec![
            ("first.jpg", record("0f", "0f", "0f")),
            ("twin.jpg", record("0f", "0f", "0f")),
        ]);
        let matcher = Matcher::new(&catalogue).unwrap();

        let result = matcher
            .match_fingerprints(Path::new("q.jpg"), &probe("0f", "0f", "0f"))
            .unwrap();

        assert_eq!(result.matched, "first.jpg");
        assert_eq!(result.votes, 3);
    }

    #[test]
    fn test_three_way_split_goes_to_earliest_kind() {
        // Each kind nominates a different record; with every count at one,
        // the average kind's nominee wins because it tallies first.
        let catalogue = catalogue_of(vec![
            ("a.jpg", record("00", "ff", "ff")),
            ("b.jpg", record("ff", "00", "ff")),
            ("c.jpg", record("ff", "ff", "00")),
        ]);
        let matcher = Matcher::new(&catalogue).unwrap();

        let result = matcher
            .match_fingerprints(Path::new("q.jpg"), &probe("00", "00", "00"))
            .unwrap();

        assert_eq!(result.matched, "a.jpg");
        assert_eq!(result.votes, 1);
    }

    #[test]
    fn test_length_mismatch_names_the_record() {
        let catalogue = catalogue_of(vec![("short.jpg", record("00", "00", "00"))]);
        let matcher = Matcher::new(&catalogue).unwrap();

        let err = matcher
            .match_fingerprints(Path::new("q.jpg"), &probe("0000", "0000", "0000"))
            .unwrap_err();

        match err {
            MatchError::Length { path, source } => {
                assert_eq!(path, "short.jpg");
                assert_eq!(source.left_bits, 16);
                assert_eq!(source.right_bits, 8);
            }
            other => panic!("expected length mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_tally_prefers_higher_count_then_earlier_entry() {
        let winners = vec![
            KindWinner {
                kind: HashKind::Average,
                path: "x.jpg".into(),
                distance: 3,
            },
            KindWinner {
                kind: HashKind::Perceptual,
                path: "y.jpg".into(),
                distance: 1,
            },
            KindWinner {
                kind: HashKind::Difference,
                path: "y.jpg".into(),
                distance: 2,
            },
        ];
        assert_eq!(tally(&winners), ("y.jpg".to_string(), 2));
    }
}
