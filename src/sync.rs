//! Push a discography into a playlist, at most once per record.
//!
//! The playlist service is never asked what it already holds; the local
//! `SyncCache` is the source of truth for "already submitted".

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CollectionKey, SyncCache};
use crate::errors::{CacheError, SubmitError};
use crate::models::{Discography, TrackRecord};
use crate::normalize::resolve_performer;

/// External playlist service (Spotify, YouTube, ...). Implementations own
/// authentication, search and rate limiting.
pub trait PlaylistService {
    /// Service name, also the cache directory name.
    fn name(&self) -> &str;

    /// Search for `query` and add the first hit to `collection`.
    fn submit(&mut self, collection: &CollectionKey, query: &str) -> Result<(), SubmitError>;
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Playlist title; last-resort source of the performer name
    pub title: String,
    pub include_year_in_query: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub submitted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub invalid: usize,
}

/// The record as it is searched for and cached: performer resolved, year
/// reduced to `YYYY`, genre dropped.
pub fn resolve_record(record: &TrackRecord, discography: &Discography, title: &str) -> TrackRecord {
    let performer = if record.performer.trim().is_empty() {
        resolve_performer(title, discography.performer.as_deref())
    } else {
        record.performer.clone()
    };
    TrackRecord {
        performer,
        year: record.release_year().to_string(),
        name: record.name.clone(),
        genre: None,
        vocal_credit: record.vocal_credit.clone(),
    }
}

/// Records of one collection still waiting for submission, resolved and in
/// catalog order, plus the counts of what was left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    pub pending: Vec<TrackRecord>,
    pub skipped: usize,
    pub invalid: usize,
}

/// Work out which records of `discography` are not yet in `collection`.
/// Read-only: the cache is consulted, never written. A record repeated in the
/// catalog is planned once.
pub fn plan_collection(
    cache: &SyncCache,
    collection: &CollectionKey,
    discography: &Discography,
    title: &str,
) -> Result<SyncPlan, CacheError> {
    let mut membership = cache.membership(collection)?;
    let mut plan = SyncPlan::default();
    debug!(%collection, cached = membership.len(), tracks = discography.tracks.len(), "planning sync");

    for (idx, record) in discography.tracks.iter().enumerate() {
        if !record.is_valid() {
            plan.invalid += 1;
            continue;
        }
        let resolved = resolve_record(record, discography, title);
        if !membership.insert(&resolved) {
            debug!(idx, record = %resolved, "already in playlist, skipping");
            plan.skipped += 1;
            continue;
        }
        plan.pending.push(resolved);
    }
    Ok(plan)
}

/// `query<TAB>signature`, the hand-off format for external uploaders. Tabs
/// inside the signature are escaped, so the last tab splits the line.
pub fn pending_line(record: &TrackRecord, include_year: bool) -> String {
    format!("{}\t{}", record.search_query(include_year), record.signature())
}

/// Record confirmed by an uploader: a [`pending_line`] or a bare signature.
pub fn parse_pending_line(line: &str) -> Option<TrackRecord> {
    let signature = line.rsplit('\t').next().unwrap_or(line);
    TrackRecord::parse_signature(signature.trim_end_matches('\r'))
}

/// Submit every not-yet-cached record of `discography` to `collection`.
///
/// Successful submissions are appended to the cache immediately. A service
/// failure is counted and the record is left uncached so a later run retries
/// it; a cache failure aborts the run.
pub fn sync_collection(
    cache: &SyncCache,
    service: &mut dyn PlaylistService,
    collection: &CollectionKey,
    discography: &Discography,
    options: &SyncOptions,
) -> Result<SyncReport, CacheError> {
    let plan = plan_collection(cache, collection, discography, &options.title)?;
    let mut report = SyncReport {
        skipped: plan.skipped,
        invalid: plan.invalid,
        ..SyncReport::default()
    };
    info!(
        service = service.name(),
        %collection,
        pending = plan.pending.len(),
        skipped = plan.skipped,
        "sync started"
    );

    for resolved in &plan.pending {
        let query = resolved.search_query(options.include_year_in_query);
        match service.submit(collection, &query) {
            Ok(()) => {
                cache.add(collection, resolved)?;
                report.submitted += 1;
                debug!(%query, "submitted");
            }
            Err(e) => {
                warn!(%query, error = %e, "submission failed");
                report.failed += 1;
            }
        }
    }

    info!(
        %collection,
        submitted = report.submitted,
        skipped = report.skipped,
        failed = report.failed,
        "sync finished"
    );
    Ok(report)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Records queries; fails any query containing `fail_on`.
    #[derive(Default)]
    struct FakeService {
        queries: Vec<String>,
        fail_on: Option<String>,
        offline: bool,
    }

    impl PlaylistService for FakeService {
        fn name(&self) -> &str {
            "fake"
        }

        fn submit(&mut self, _collection: &CollectionKey, query: &str) -> Result<(), SubmitError> {
            if self.fail_on.as_deref().is_some_and(|f| query.contains(f)) {
                return Err(SubmitError::NotFound(query.to_string()));
            }
            if self.offline {
                return Err(SubmitError::Unavailable("offline".to_string()));
            }
            self.queries.push(query.to_string());
            Ok(())
        }
    }

    fn discography() -> Discography {
        Discography {
            performer: Some("Orquesta Típica Victor".to_string()),
            tracks: vec![
                TrackRecord::new("", "1938-04-12", "Sin Rumbo"),
                TrackRecord::new("Francisco Canaro", "1935", "Poema"),
                TrackRecord::new("Francisco Canaro", "1935", ""),
            ],
        }
    }

    fn options() -> SyncOptions {
        SyncOptions {
            title: "Tango 1935-1940".to_string(),
            include_year_in_query: false,
        }
    }

    #[test]
    fn test_resolve_record() {
        let disc = discography();
        let resolved = resolve_record(&disc.tracks[0], &disc, "ignored");
        assert_eq!(resolved.performer, "Orquesta Típica Victor");
        assert_eq!(resolved.year, "1938");

        let no_default = Discography::default();
        let resolved = resolve_record(&disc.tracks[0], &no_default, "Juan D'Arienzo (1938)");
        assert_eq!(resolved.performer, "Juan");
    }

    #[test]
    fn test_second_run_submits_nothing() {
        let tmp = TempDir::new().unwrap();
        let cache = SyncCache::open(tmp.path(), "fake").unwrap();
        let playlist = CollectionKey::new("Tango").unwrap();
        let disc = discography();

        let mut service = FakeService::default();
        let report = sync_collection(&cache, &mut service, &playlist, &disc, &options()).unwrap();
        assert_eq!(
            report,
            SyncReport {
                submitted: 2,
                skipped: 0,
                failed: 0,
                invalid: 1
            }
        );
        assert_eq!(
            service.queries,
            vec![
                "track:Sin Rumbo artist:Orquesta Típica Victor",
                "track:Poema artist:Francisco Canaro"
            ]
        );

        // Fresh cache instance, same storage: nothing is pushed again.
        let reopened = SyncCache::open(tmp.path(), "fake").unwrap();
        let mut service = FakeService::default();
        let report = sync_collection(&reopened, &mut service, &playlist, &disc, &options()).unwrap();
        assert_eq!(report.submitted, 0);
        assert_eq!(report.skipped, 2);
        assert!(service.queries.is_empty());
    }

    #[test]
    fn test_failed_submission_not_cached() {
        let tmp = TempDir::new().unwrap();
        let cache = SyncCache::open(tmp.path(), "fake").unwrap();
        let playlist = CollectionKey::new("Tango").unwrap();
        let disc = discography();

        let mut service = FakeService {
            fail_on: Some("Poema".to_string()),
            ..FakeService::default()
        };
        let report = sync_collection(&cache, &mut service, &playlist, &disc, &options()).unwrap();
        assert_eq!(report.submitted, 1);
        assert_eq!(report.failed, 1);

        let poema = resolve_record(&disc.tracks[1], &disc, "");
        assert!(!cache.exists(&playlist, &poema).unwrap());

        // The retry picks up only the failed record.
        let mut service = FakeService::default();
        let report = sync_collection(&cache, &mut service, &playlist, &disc, &options()).unwrap();
        assert_eq!(report.submitted, 1);
        assert_eq!(service.queries, vec!["track:Poema artist:Francisco Canaro"]);
    }

    #[test]
    fn test_repeated_entries_submitted_once() {
        let tmp = TempDir::new().unwrap();
        let cache = SyncCache::open(tmp.path(), "fake").unwrap();
        let playlist = CollectionKey::new("Tango").unwrap();
        let disc = Discography {
            performer: None,
            tracks: vec![
                TrackRecord::new("Francisco Canaro", "1935", "Poema"),
                TrackRecord::new("Francisco Canaro", "1935-06-01", "Poema"),
            ],
        };
        let mut service = FakeService::default();
        let opts = SyncOptions {
            include_year_in_query: true,
            ..options()
        };
        let report = sync_collection(&cache, &mut service, &playlist, &disc, &opts).unwrap();
        assert_eq!(report.submitted, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(service.queries, vec!["track:Poema artist:Francisco Canaro year:1935"]);
    }

    #[test]
    fn test_plan_is_read_only() {
        let tmp = TempDir::new().unwrap();
        let cache = SyncCache::open(tmp.path(), "fake").unwrap();
        let playlist = CollectionKey::new("Tango").unwrap();
        let disc = discography();

        let plan = plan_collection(&cache, &playlist, &disc, "Tango").unwrap();
        assert_eq!(plan.pending.len(), 2);
        assert_eq!(plan.invalid, 1);
        assert_eq!(plan.pending[0].year, "1938");
        assert!(!cache.dir().exists());

        cache.add(&playlist, &plan.pending[1]).unwrap();
        let plan = plan_collection(&cache, &playlist, &disc, "Tango").unwrap();
        assert_eq!(plan.pending.len(), 1);
        assert_eq!(plan.skipped, 1);
        assert_eq!(plan.pending[0].name, "Sin Rumbo");
    }

    #[test]
    fn test_unavailable_service_caches_nothing() {
        let tmp = TempDir::new().unwrap();
        let cache = SyncCache::open(tmp.path(), "fake").unwrap();
        let playlist = CollectionKey::new("Tango").unwrap();

        let mut service = FakeService {
            offline: true,
            ..FakeService::default()
        };
        let report = sync_collection(&cache, &mut service, &playlist, &discography(), &options()).unwrap();
        assert_eq!(report.failed, 2);
        assert_eq!(report.submitted, 0);
        assert!(cache.load_all(&playlist).unwrap().is_empty());
    }

    #[test]
    fn test_pending_line_round_trip() {
        let record = TrackRecord::new("Canaro, Francisco", "1935", "Poema\tII").with_vocal_credit("Roberto Maida");
        let line = pending_line(&record, true);
        assert!(line.starts_with("track:Poema\tII artist:Canaro, Francisco year:1935\t"));
        assert_eq!(parse_pending_line(&line), Some(record.clone()));
        assert_eq!(parse_pending_line(&record.signature()), Some(record));
        assert_eq!(parse_pending_line("track:Poema artist:X\tgarbage"), None);
    }

    #[test]
    fn test_confirmed_lines_close_the_plan() {
        let tmp = TempDir::new().unwrap();
        let cache = SyncCache::open(tmp.path(), "fake").unwrap();
        let playlist = CollectionKey::new("Tango").unwrap();
        let disc = discography();

        let plan = plan_collection(&cache, &playlist, &disc, "Tango").unwrap();
        for record in &plan.pending {
            let confirmed = parse_pending_line(&format!("{}\r", pending_line(record, false))).unwrap();
            assert!(cache.add(&playlist, &confirmed).unwrap());
        }
        let plan = plan_collection(&cache, &playlist, &disc, "Tango").unwrap();
        assert!(plan.pending.is_empty());
        assert_eq!(plan.skipped, 2);
    }
}
