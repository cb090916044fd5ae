//! Durable record of what has already been submitted to a playlist service.
//!
//! Layout: `<root>/<service>/<collection>/cache.txt`, one record signature
//! per line, append-only, no header. Entries are never rewritten or
//! removed, so a record added once stays "already submitted" for every
//! later run until the directory is reset by hand.
//!
//! All operations on one `SyncCache` are serialized by a single mutex;
//! share it between threads with `Arc<SyncCache>`.

use rustc_hash::FxHashSet;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::errors::CacheError;
use crate::models::TrackRecord;

pub const CACHE_FILE_NAME: &str = "cache.txt";

// ============================================================================
// Collection Keys
// ============================================================================

/// Identifier of a target playlist. Used verbatim as a directory name, so
/// it must be a single, non-empty path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionKey(String);

impl CollectionKey {
    pub fn new(key: &str) -> Result<Self, CacheError> {
        let invalid = key.trim().is_empty()
            || key == "."
            || key == ".."
            || key.contains(['/', '\\', '\0']);
        if invalid {
            return Err(CacheError::InvalidCollectionKey(key.to_string()));
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Membership Snapshot
// ============================================================================

/// In-memory set of signatures loaded from one collection log, for batch
/// checks without a file scan per record.
#[derive(Debug, Clone, Default)]
pub struct Membership {
    signatures: FxHashSet<String>,
}

impl Membership {
    pub fn contains(&self, record: &TrackRecord) -> bool {
        self.signatures.contains(&record.signature())
    }

    pub fn insert(&mut self, record: &TrackRecord) -> bool {
        self.signatures.insert(record.signature())
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

// ============================================================================
// Cache Store
// ============================================================================

pub struct SyncCache {
    service_dir: PathBuf,
    lock: Mutex<()>,
}

impl SyncCache {
    /// Open the cache of one service under `root`. Nothing is created on
    /// disk until the first `add`.
    pub fn open(root: &Path, service: &str) -> Result<Self, CacheError> {
        let service = CollectionKey::new(service)?;
        let service_dir = root.join(service.as_str());
        check_dir(&service_dir)?;
        debug!(dir = %service_dir.display(), "sync cache opened");
        Ok(Self {
            service_dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.service_dir
    }

    /// Path of the log backing `collection`.
    pub fn log_path(&self, collection: &CollectionKey) -> PathBuf {
        self.service_dir.join(collection.as_str()).join(CACHE_FILE_NAME)
    }

    /// Whether `record` was already submitted to `collection`.
    pub fn exists(&self, collection: &CollectionKey, record: &TrackRecord) -> Result<bool, CacheError> {
        let _guard = self.guard();
        self.contains_locked(collection, &record.signature())
    }

    /// Record a successful submission. No-op when already present; returns
    /// whether a new entry was appended.
    pub fn add(&self, collection: &CollectionKey, record: &TrackRecord) -> Result<bool, CacheError> {
        let _guard = self.guard();
        let signature = record.signature();
        if self.contains_locked(collection, &signature)? {
            debug!(%collection, %signature, "already cached");
            return Ok(false);
        }

        let path = self.ensure_log(collection)?;
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| CacheError::io(&path, e))?;
        // A torn last line gets terminated first so the new entry stays on a
        // line of its own.
        let entry = if ends_with_newline(&mut file).map_err(|e| CacheError::io(&path, e))? {
            format!("{}\n", signature)
        } else {
            warn!(path = %path.display(), "terminating torn last cache line");
            format!("\n{}\n", signature)
        };
        // One write per entry: a crash can only tear the line being added.
        file.write_all(entry.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| CacheError::io(&path, e))?;
        debug!(%collection, %signature, "cached");
        Ok(true)
    }

    /// Every record previously added to `collection`, in insertion order.
    /// Malformed lines (e.g. a torn final write) are skipped with a warning.
    pub fn load_all(&self, collection: &CollectionKey) -> Result<Vec<TrackRecord>, CacheError> {
        let _guard = self.guard();
        let path = self.log_path(collection);
        let mut records = Vec::new();
        for (index, line) in read_lines(&path)?.into_iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            match TrackRecord::parse_signature(&line) {
                Some(record) => records.push(record),
                None => warn!(path = %path.display(), line = index + 1, "skipping malformed cache entry"),
            }
        }
        Ok(records)
    }

    /// Snapshot of the signatures in `collection` for batch membership checks.
    pub fn membership(&self, collection: &CollectionKey) -> Result<Membership, CacheError> {
        let records = self.load_all(collection)?;
        let mut membership = Membership::default();
        for record in &records {
            membership.insert(record);
        }
        Ok(membership)
    }

    /// Collections that have a log under this service, sorted.
    pub fn collections(&self) -> Result<Vec<CollectionKey>, CacheError> {
        let _guard = self.guard();
        if !self.service_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.service_dir).map_err(|e| CacheError::io(&self.service_dir, e))?;
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&self.service_dir, e))?;
            if !entry.path().join(CACHE_FILE_NAME).is_file() {
                continue;
            }
            if let Some(key) = entry.file_name().to_str().and_then(|n| CollectionKey::new(n).ok()) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded state lives on disk; a panic elsewhere leaves nothing
        // half-updated in memory.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn contains_locked(&self, collection: &CollectionKey, signature: &str) -> Result<bool, CacheError> {
        let path = self.log_path(collection);
        Ok(read_lines(&path)?.iter().any(|line| line == signature))
    }

    /// Create the collection directory and an empty log if absent.
    fn ensure_log(&self, collection: &CollectionKey) -> Result<PathBuf, CacheError> {
        let dir = self.service_dir.join(collection.as_str());
        ensure_dir(&dir)?;
        let path = dir.join(CACHE_FILE_NAME);
        if !path.exists() {
            File::create(&path).map_err(|e| CacheError::io(&path, e))?;
            info!(path = %path.display(), "cache file created");
        }
        Ok(path)
    }
}

/// Fails only when `dir` exists as something other than a directory.
fn check_dir(dir: &Path) -> Result<(), CacheError> {
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => Err(CacheError::NotADirectory(dir.to_path_buf())),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CacheError::io(dir, e)),
    }
}

fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn ensure_dir(dir: &Path) -> Result<(), CacheError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(CacheError::NotADirectory(dir.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| CacheError::io(dir, e))?;
            info!(dir = %dir.display(), "cache directory created");
            Ok(())
        }
        Err(e) => Err(CacheError::io(dir, e)),
    }
}

/// Lines of a collection log; a log that was never written reads as empty.
fn read_lines(path: &Path) -> Result<Vec<String>, CacheError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CacheError::io(path, e)),
    };
    BufReader::new(file)
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CacheError::io(path, e))
}

// ============================================================================
// TESTS
// ============================================================================
