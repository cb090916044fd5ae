//! Core data models shared by the detector, matcher, query engine and cache.
//!
//! `TrackRecord` is a plain value; every identity-relevant key is derived
//! on demand through `normalize` and never stored.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::normalize::canonicalize;

// ============================================================================
// Track Records
// ============================================================================

/// One catalog entry: a recording of a titled track by a performer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Orchestra or main artist; may be empty until patched from the catalog default
    #[serde(default, alias = "orchestra")]
    pub performer: String,
    /// `YYYY` or `YYYY-MM-DD`, may be empty
    #[serde(default)]
    pub year: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, alias = "vocal", skip_serializing_if = "Option::is_none")]
    pub vocal_credit: Option<String>,
}

impl TrackRecord {
    pub fn new(performer: &str, year: &str, name: &str) -> Self {
        Self {
            performer: performer.to_string(),
            year: year.to_string(),
            name: name.to_string(),
            genre: None,
            vocal_credit: None,
        }
    }

    pub fn with_genre(mut self, genre: &str) -> Self {
        self.genre = Some(genre.to_string());
        self
    }

    pub fn with_vocal_credit(mut self, vocal: &str) -> Self {
        self.vocal_credit = Some(vocal.to_string());
        self
    }

    /// A record without a name cannot take part in identity comparison.
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
    }

    pub fn canonical_name(&self) -> String {
        canonicalize(&self.name)
    }

    pub fn canonical_performer(&self) -> String {
        canonicalize(&self.performer)
    }

    /// Same title and same performer after canonicalization.
    pub fn same_performance(&self, other: &TrackRecord) -> bool {
        self.canonical_name() == other.canonical_name()
            && self.canonical_performer() == other.canonical_performer()
    }

    /// Same title, but a different performer or a different year.
    pub fn is_other_recording_of(&self, other: &TrackRecord) -> bool {
        self.canonical_name() == other.canonical_name()
            && (self.canonical_performer() != other.canonical_performer() || self.year != other.year)
    }

    /// Year portion of a `YYYY-MM-DD` date ("" stays "").
    pub fn release_year(&self) -> &str {
        self.year.split('-').next().unwrap_or("").trim()
    }

    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Performer => &self.performer,
            Field::Year => &self.year,
            Field::Name => &self.name,
            Field::Genre => self.genre.as_deref().unwrap_or(""),
            Field::VocalCredit => self.vocal_credit.as_deref().unwrap_or(""),
        }
    }

    /// Member key used by the synchronization cache: `performer,year,name,vocal`.
    ///
    /// Commas, backslashes, tabs and line breaks inside a field are backslash-escaped,
    /// so titles such as "Adiós, Pampa Mía" survive a round trip through the log.
    pub fn signature(&self) -> String {
        [
            self.performer.as_str(),
            self.year.as_str(),
            self.name.as_str(),
            self.vocal_credit.as_deref().unwrap_or(""),
        ]
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",")
    }

    /// Inverse of [`TrackRecord::signature`]. Returns `None` for lines with
    /// fewer than three fields or an empty name.
    pub fn parse_signature(line: &str) -> Option<TrackRecord> {
        let fields = split_escaped(line);
        if fields.len() < 3 {
            return None;
        }
        let mut record = TrackRecord::new(&fields[0], &fields[1], &fields[2]);
        if let Some(vocal) = fields.get(3).filter(|v| !v.is_empty()) {
            record.vocal_credit = Some(vocal.clone());
        }
        record.is_valid().then_some(record)
    }

    /// Query string handed to a playlist service search, e.g.
    /// `track:Sin rumbo artist:Juan D'Arienzo year:1938`.
    pub fn search_query(&self, include_year: bool) -> String {
        let mut query = format!("track:{} artist:{}", self.name, self.performer);
        let year = self.release_year();
        if include_year && !year.is_empty() {
            query.push_str(" year:");
            query.push_str(year);
        }
        query
    }
}

impl fmt::Display for TrackRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

fn escape_field(field: &str) -> String {
    field
        .replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

fn split_escaped(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => current.push('\n'),
                Some('r') => current.push('\r'),
                Some('t') => current.push('\t'),
                Some(next) => current.push(next),
                None => {}
            },
            ',' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

// ============================================================================
// Discography
// ============================================================================

/// A catalog as handed over by a catalog reader.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Discography {
    /// Top-level default performer for records that do not name one
    #[serde(default, alias = "orchestra", skip_serializing_if = "Option::is_none")]
    pub performer: Option<String>,
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
}

impl Discography {
    /// Fill empty performers from the catalog default. Returns how many
    /// records were patched.
    pub fn patch_default_performer(&mut self) -> usize {
        let Some(default) = self.performer.as_deref().filter(|p| !p.trim().is_empty()) else {
            return 0;
        };
        let mut patched = 0;
        for track in self.tracks.iter_mut().filter(|t| t.performer.trim().is_empty()) {
            track.performer = default.to_string();
            patched += 1;
        }
        patched
    }
}

// ============================================================================
// Field Selectors
// ============================================================================

/// A record field usable as sort key or filter predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Performer,
    Year,
    Name,
    Genre,
    VocalCredit,
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "performer" | "orchestra" | "artist" => Ok(Field::Performer),
            "year" => Ok(Field::Year),
            "name" => Ok(Field::Name),
            "genre" => Ok(Field::Genre),
            "vocalcredit" | "vocal_credit" | "vocal" => Ok(Field::VocalCredit),
            other => Err(format!("unknown field '{}'", other)),
        }
    }
}

// ============================================================================
// Matching Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Strict,
    Fuzzy,
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(MatchMode::Strict),
            "fuzzy" => Ok(MatchMode::Fuzzy),
            other => Err(format!("unknown match mode '{}'", other)),
        }
    }
}

/// A local file paired with the catalog record it was matched to.
/// Handed to the tag writer; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub file_path: PathBuf,
    pub record: TrackRecord,
    pub mode: MatchMode,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_relations() {
        let a = TrackRecord::new("Orquesta Típica Victor", "1938", "Sin Rumbo");
        let b = TrackRecord::new("orquesta tipica victor (dir. Petrucelli)", "1938", "sin rumbo");
        let c = TrackRecord::new("Orquesta Típica Victor", "1941", "Sin rumbo.");

        assert!(a.same_performance(&b));
        assert!(!a.is_other_recording_of(&b));
        assert!(a.same_performance(&c));
        assert!(a.is_other_recording_of(&c));
    }

    #[test]
    fn test_release_year() {
        assert_eq!(TrackRecord::new("", "1941-05-12", "x").release_year(), "1941");
        assert_eq!(TrackRecord::new("", "1941", "x").release_year(), "1941");
        assert_eq!(TrackRecord::new("", "", "x").release_year(), "");
    }

    #[test]
    fn test_signature_layout() {
        let record = TrackRecord::new("Ricardo Tanturi", "1941", "Una noche más")
            .with_vocal_credit("Alberto Castillo")
            .with_genre("tango");
        assert_eq!(record.signature(), "Ricardo Tanturi,1941,Una noche más,Alberto Castillo");

        let bare = TrackRecord::new("Ricardo Tanturi", "1943", "En el salón");
        assert_eq!(bare.signature(), "Ricardo Tanturi,1943,En el salón,");
    }

    #[test]
    fn test_signature_escapes_commas() {
        let record = TrackRecord::new("Canaro, Francisco", "1935", "Adiós, Pampa Mía");
        let line = record.signature();
        assert_eq!(line, "Canaro\\, Francisco,1935,Adiós\\, Pampa Mía,");

        let parsed = TrackRecord::parse_signature(&line).unwrap();
        assert_eq!(parsed.performer, "Canaro, Francisco");
        assert_eq!(parsed.name, "Adiós, Pampa Mía");
        assert_eq!(parsed.vocal_credit, None);
        assert_eq!(parsed.signature(), line);
    }

    #[test]
    fn test_signature_keeps_line_breaks_distinct() {
        let spaced = TrackRecord::new("Orch", "1938", "Sin Rumbo");
        let broken = TrackRecord::new("Orch", "1938", "Sin\nRumbo\r\t");
        let line = broken.signature();
        assert!(!line.contains(['\n', '\r', '\t']));
        assert_ne!(line, spaced.signature());
        assert_eq!(TrackRecord::parse_signature(&line), Some(broken));
    }

    #[test]
    fn test_parse_signature_rejects_malformed() {
        assert!(TrackRecord::parse_signature("").is_none());
        assert!(TrackRecord::parse_signature("only,two").is_none());
        assert!(TrackRecord::parse_signature("perf,1938,,").is_none());
        assert!(TrackRecord::parse_signature("perf,1938,Name").is_some());
    }

    #[test]
    fn test_search_query() {
        let record = TrackRecord::new("Juan D'Arienzo", "1938-03-01", "Sin Rumbo");
        assert_eq!(record.search_query(false), "track:Sin Rumbo artist:Juan D'Arienzo");
        assert_eq!(record.search_query(true), "track:Sin Rumbo artist:Juan D'Arienzo year:1938");
        let undated = TrackRecord::new("Juan D'Arienzo", "", "Sin Rumbo");
        assert_eq!(undated.search_query(true), "track:Sin Rumbo artist:Juan D'Arienzo");
    }

    #[test]
    fn test_patch_default_performer() {
        let mut disc = Discography {
            performer: Some("Orquesta Típica Victor".to_string()),
            tracks: vec![
                TrackRecord::new("", "1938", "Sin Rumbo"),
                TrackRecord::new("Francisco Canaro", "1938", "Poema"),
            ],
        };
        assert_eq!(disc.patch_default_performer(), 1);
        assert_eq!(disc.tracks[0].performer, "Orquesta Típica Victor");
        assert_eq!(disc.tracks[1].performer, "Francisco Canaro");

        let mut no_default = Discography { performer: None, tracks: vec![TrackRecord::new("", "", "x")] };
        assert_eq!(no_default.patch_default_performer(), 0);
    }

    #[test]
    fn test_discography_from_json() {
        let json = r#"{"orchestra": "Ricardo Tanturi", "tracks": [
            {"name": "Una noche más", "year": "1941", "vocal": "Alberto Castillo"},
            {"name": "En el salón", "year": "1943", "genre": "milonga"}
        ]}"#;
        let disc: Discography = serde_json::from_str(json).unwrap();
        assert_eq!(disc.performer.as_deref(), Some("Ricardo Tanturi"));
        assert_eq!(disc.tracks[0].vocal_credit.as_deref(), Some("Alberto Castillo"));
        assert_eq!(disc.tracks[1].genre.as_deref(), Some("milonga"));
        assert_eq!(disc.tracks[1].performer, "");
    }

    #[test]
    fn test_field_from_str() {
        assert_eq!("Year".parse::<Field>(), Ok(Field::Year));
        assert_eq!("orchestra".parse::<Field>(), Ok(Field::Performer));
        assert_eq!("vocal".parse::<Field>(), Ok(Field::VocalCredit));
        assert!("composer".parse::<Field>().is_err());
    }
}
