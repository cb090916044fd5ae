//! Catalog and music-library input.
//!
//! Discographies are read from JSON files shaped like
//! `{"performer": "...", "tracks": [{"name": "...", "year": "..."}]}`;
//! audio files are collected by extension from a directory tree.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::models::Discography;

/// Extensions picked up when scanning a music library
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "ogg", "wav", "aac"];

/// `YYYY` or `YYYY-MM-DD`
pub static YEAR_FORMAT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}(?:-\d{2}-\d{2})?$").unwrap());

/// Read one discography and patch its default performer onto records that
/// lack one.
pub fn read_discography(path: &Path) -> Result<Discography> {
    let data = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut discography: Discography =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;

    let patched = discography.patch_default_performer();
    for track in discography.tracks.iter().filter(|t| !t.year.is_empty()) {
        if !YEAR_FORMAT.is_match(&track.year) {
            warn!(file = %path.display(), name = %track.name, year = %track.year, "unexpected year format");
        }
    }
    debug!(file = %path.display(), tracks = discography.tracks.len(), patched, "discography loaded");
    Ok(discography)
}

/// Read several discographies into one. Default performers are applied per
/// file before merging; the merged catalog keeps no default of its own.
pub fn read_discographies(paths: &[PathBuf]) -> Result<Discography> {
    let mut merged = Discography::default();
    for path in paths {
        let disc = read_discography(path)?;
        if paths.len() == 1 {
            merged.performer = disc.performer.clone();
        }
        merged.tracks.extend(disc.tracks);
    }
    Ok(merged)
}

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| AUDIO_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}

/// All audio files below `dir`, sorted for reproducible matching order.
/// Unreadable entries are logged and skipped.
pub fn collect_audio_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("music directory {} does not exist", dir.display());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        match entry {
            Ok(entry) if entry.file_type().is_file() && is_audio_file(entry.path()) => {
                files.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "skipping unreadable entry"),
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_discography_patches_performer() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tanturi.json");
        fs::write(
            &path,
            r#"{"performer": "Ricardo Tanturi", "tracks": [
                {"name": "Una noche más", "year": "1941"},
                {"name": "Pocas palabras", "year": "1941", "performer": "Alberto Castillo"}
            ]}"#,
        )
        .unwrap();

        let disc = read_discography(&path).unwrap();
        assert_eq!(disc.tracks[0].performer, "Ricardo Tanturi");
        assert_eq!(disc.tracks[1].performer, "Alberto Castillo");
    }

    #[test]
    fn test_read_discography_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.json");
        fs::write(&path, "{\"tracks\": [").unwrap();
        assert!(read_discography(&path).is_err());
        assert!(read_discography(&tmp.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_read_discographies_merges() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.json");
        let b = tmp.path().join("b.json");
        fs::write(&a, r#"{"performer": "Orch A", "tracks": [{"name": "Poema"}]}"#).unwrap();
        fs::write(&b, r#"{"performer": "Orch B", "tracks": [{"name": "Poema", "year": "1940"}]}"#).unwrap();

        let merged = read_discographies(&[a, b]).unwrap();
        assert_eq!(merged.performer, None);
        let performers: Vec<&str> = merged.tracks.iter().map(|t| t.performer.as_str()).collect();
        assert_eq!(performers, vec!["Orch A", "Orch B"]);
    }

    #[test]
    fn test_collect_audio_files() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("Canaro")).unwrap();
        fs::write(tmp.path().join("Canaro/Poema.MP3"), b"").unwrap();
        fs::write(tmp.path().join("Adios.flac"), b"").unwrap();
        fs::write(tmp.path().join("cover.jpg"), b"").unwrap();

        let files = collect_audio_files(tmp.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| is_audio_file(f)));
        assert!(collect_audio_files(&tmp.path().join("nope")).is_err());
    }

    #[test]
    fn test_year_format() {
        assert!(YEAR_FORMAT.is_match("1938"));
        assert!(YEAR_FORMAT.is_match("1938-05-01"));
        assert!(!YEAR_FORMAT.is_match("38"));
    }
}
