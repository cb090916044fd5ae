//! Match local audio files against catalog records.
//!
//! Each file gets at most one record: the first acceptable candidate in
//! catalog order. There is no global assignment, so a file may take a weak
//! match before a better one for the same record is seen for another file.

use indicatif::ProgressBar;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::{MatchMode, MatchResult, TrackRecord};
use crate::normalize::canonical_file_stem;
use crate::scoring::{fold_rank, DEFAULT_FUZZY_RANK_THRESHOLD};

#[derive(Debug, Clone)]
pub struct MatchOptions {
    pub mode: MatchMode,
    /// Fuzzy candidates with a fold rank below this are accepted
    pub rank_threshold: usize,
    /// Log every accepted candidate
    pub verbose: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            mode: MatchMode::Strict,
            rank_threshold: DEFAULT_FUZZY_RANK_THRESHOLD,
            verbose: false,
        }
    }
}

impl MatchOptions {
    pub fn new(mode: MatchMode) -> Self {
        Self { mode, ..Self::default() }
    }
}

/// Match every file against the catalog. Files without an accepted
/// candidate are left out; output follows input file order.
pub fn match_files(files: &[PathBuf], records: &[TrackRecord], options: &MatchOptions) -> Vec<MatchResult> {
    match_files_with_progress(files, records, options, &ProgressBar::hidden())
}

/// [`match_files`], advancing `pb` once per file.
pub fn match_files_with_progress(
    files: &[PathBuf],
    records: &[TrackRecord],
    options: &MatchOptions,
    pb: &ProgressBar,
) -> Vec<MatchResult> {
    // Canonical names are computed once, not once per file.
    let candidates: Vec<(String, &TrackRecord)> = records
        .iter()
        .filter(|r| r.is_valid())
        .map(|r| (r.canonical_name(), r))
        .collect();

    files
        .par_iter()
        .filter_map(|file| {
            let found = match_file(file, &candidates, options).map(|record| MatchResult {
                file_path: file.clone(),
                record: record.clone(),
                mode: options.mode,
            });
            pb.inc(1);
            found
        })
        .collect()
}

fn match_file<'a>(
    file: &Path,
    candidates: &[(String, &'a TrackRecord)],
    options: &MatchOptions,
) -> Option<&'a TrackRecord> {
    let stem = canonical_file_stem(file);
    if stem.is_empty() {
        return None;
    }

    candidates.iter().find_map(|(key, record)| {
        let accepted = match options.mode {
            MatchMode::Strict => stem == *key,
            MatchMode::Fuzzy => fuzzy_accepts(key, &stem, options.rank_threshold),
        };
        if accepted && options.verbose {
            debug!(file = %file.display(), key = %key, mode = ?options.mode, "matched {}", record);
        }
        accepted.then_some(*record)
    })
}

/// Fuzzy acceptance: the name must fold-match the stem and either rank
/// below the threshold or be contained in the stem.
pub fn fuzzy_accepts(name_key: &str, stem: &str, rank_threshold: usize) -> bool {
    match fold_rank(name_key, stem) {
        Some(rank) => rank < rank_threshold || stem.contains(name_key),
        None => false,
    }
}

// ============================================================================
// TESTS
// ============================================================================
