//! Canonical keys for track and performer names.
//!
//! Every identity comparison in the crate (duplicate detection, filename
//! matching, cache signatures of resolved records) goes through these
//! functions, so their output must stay stable across releases. Changing a
//! pattern here changes which catalog entries are considered the same.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Innermost enclosed annotation: "(dir. Juan Canaro)", "[remastered]".
/// Applied repeatedly so nested groups unwind from the inside out.
pub static ENCLOSED_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:\([^()\[\]]*\)|\[[^()\[\]]*\])").unwrap());

/// Annotation opened but never closed: "Orquesta Tipica (dir. X"
pub static UNTERMINATED_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[(\[].*$").unwrap());

/// Trailing punctuation and whitespace: "Adios muchachos...", "Sin rumbo !"
pub static TRAILING_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\p{P}]+$").unwrap());

/// Any whitespace run, collapsed to a single space
pub static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F)
}

/// Lowercase, decompose (NFD) and drop combining marks.
/// e.g., "Pérez" → "perez", "Canción" → "cancion"
///
/// Lowercasing happens first: some uppercase letters lowercase into a base
/// letter plus a combining mark, which must not survive into the key.
pub fn fold_diacritics(s: &str) -> String {
    s.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Canonical key used for identity comparison.
///
/// Folds diacritics and case, removes parenthetical/bracketed annotations
/// (closed or left open at the end), strips trailing punctuation and
/// collapses whitespace. Total and idempotent.
pub fn canonicalize(s: &str) -> String {
    let mut result = fold_diacritics(s);

    loop {
        let stripped = ENCLOSED_GROUP.replace_all(&result, "");
        if stripped == result {
            break;
        }
        result = stripped.into_owned();
    }
    result = UNTERMINATED_GROUP.replace(&result, "").into_owned();
    result = TRAILING_PUNCTUATION.replace(&result, "").into_owned();

    WHITESPACE_RUN.replace_all(&result, " ").trim().to_string()
}

/// Canonical key of a file's stem (name without directory and extension).
/// Non-UTF-8 names are converted lossily.
pub fn canonical_file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| canonicalize(&stem.to_string_lossy()))
        .unwrap_or_default()
}

/// Derive a performer for search queries when a record carries none.
///
/// The catalog-level default wins when present; otherwise the performer is
/// guessed from a playlist title like "Juan D'Arienzo (1935-1940)" by
/// keeping only the purely alphabetic words.
pub fn resolve_performer(title: &str, default_performer: Option<&str>) -> String {
    let source = match default_performer {
        Some(p) if !p.trim().is_empty() => p.to_string(),
        _ => title.replace(['(', ')', '.'], ""),
    };

    source
        .split_whitespace()
        .filter(|word| word.chars().all(char::is_alphabetic))
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// TESTS
// ============================================================================
