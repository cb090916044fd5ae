//! Multi-recording detection over a catalog.
//!
//! Records are grouped by canonical name; a group is evidence of multiple
//! recordings when two of its members differ in canonical performer or in
//! year. Repeated catalog entries of the same recording are not reported.

use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::models::TrackRecord;
use crate::normalize::canonicalize;

/// Year placeholder used in statistics for undated records
pub const UNKNOWN_YEAR: &str = "19xx";

/// Dedup identity of a reported record.
type RecordingKey = (String, String, String, String);

fn recording_key(record: &TrackRecord) -> RecordingKey {
    (
        record.canonical_name(),
        record.year.clone(),
        record.canonical_performer(),
        canonicalize(record.genre.as_deref().unwrap_or("")),
    )
}

/// Return every record that is one side of a "same title, different
/// recording" pair, deduplicated.
///
/// Output order is unspecified; use [`sorted_by_name`] or the query engine
/// for presentation.
pub fn find_multi_recordings(records: &[TrackRecord]) -> Vec<TrackRecord> {
    let mut groups: FxHashMap<String, Vec<&TrackRecord>> = FxHashMap::default();
    let mut skipped = 0usize;
    for record in records {
        if !record.is_valid() {
            skipped += 1;
            continue;
        }
        groups.entry(record.canonical_name()).or_default().push(record);
    }
    if skipped > 0 {
        debug!(skipped, "skipped records without a name");
    }

    let mut flagged: Vec<&TrackRecord> = Vec::new();
    for group in groups.values().filter(|g| g.len() > 1) {
        for i in 0..group.len() - 1 {
            for j in i + 1..group.len() {
                if group[i].is_other_recording_of(group[j]) {
                    flagged.push(group[i]);
                    flagged.push(group[j]);
                }
            }
        }
    }

    // Last write wins; flagged duplicates are field-identical under the key.
    let mut unique: FxHashMap<RecordingKey, &TrackRecord> = FxHashMap::default();
    for record in flagged {
        unique.insert(recording_key(record), record);
    }

    debug!(groups = groups.len(), reported = unique.len(), "multi-recording detection done");
    unique.into_values().cloned().collect()
}

/// Sort by raw name, the presentation order of detector reports.
pub fn sorted_by_name(mut records: Vec<TrackRecord>) -> Vec<TrackRecord> {
    records.sort_by(|a, b| a.name.cmp(&b.name));
    records
}

// ============================================================================
// Recording Statistics
// ============================================================================

/// Recordings of one performer for a given track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerformerRecordings {
    pub performer: String,
    pub years: Vec<String>,
}

/// How often, by whom and when a track was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackStats {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    pub performers: Vec<PerformerRecordings>,
    pub total: usize,
}

/// Per canonical track name: each canonical performer with its distinct
/// years, and the total number of distinct (performer, year) recordings.
/// Sorted by track name, then performer.
pub fn recording_stats(records: &[TrackRecord]) -> Vec<TrackStats> {
    let mut by_track: BTreeMap<String, BTreeMap<String, BTreeSet<String>>> = BTreeMap::new();
    let mut genres: FxHashMap<String, String> = FxHashMap::default();

    for record in records.iter().filter(|r| r.is_valid()) {
        let name = record.canonical_name();
        let year = if record.year.is_empty() {
            UNKNOWN_YEAR.to_string()
        } else {
            record.year.clone()
        };
        by_track
            .entry(name.clone())
            .or_default()
            .entry(record.canonical_performer())
            .or_default()
            .insert(year);
        if let Some(genre) = record.genre.as_deref().filter(|g| !g.is_empty()) {
            genres.insert(name, genre.to_lowercase());
        }
    }

    by_track
        .into_iter()
        .map(|(name, performers)| {
            let performers: Vec<PerformerRecordings> = performers
                .into_iter()
                .map(|(performer, years)| PerformerRecordings {
                    performer,
                    years: years.into_iter().collect(),
                })
                .collect();
            let total = performers.iter().map(|p| p.years.len()).sum();
            TrackStats {
                genre: genres.get(&name).cloned(),
                name,
                performers,
                total,
            }
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
