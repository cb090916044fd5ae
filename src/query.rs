//! Sorting and filtering of catalog records.

use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

use crate::models::{Field, TrackRecord};

// ============================================================================
// Sorting
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

/// Primary key plus an optional tie-break key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKeys {
    pub primary: Field,
    pub secondary: Option<Field>,
}

impl SortKeys {
    pub fn by(primary: Field) -> Self {
        Self { primary, secondary: None }
    }

    pub fn then(self, secondary: Field) -> Self {
        Self {
            secondary: Some(secondary),
            ..self
        }
    }
}

impl FromStr for SortKeys {
    type Err = String;

    /// "year" or "performer,year"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(',').map(str::trim).filter(|f| !f.is_empty()).collect();
        match fields.as_slice() {
            [primary] => Ok(SortKeys::by(primary.parse()?)),
            [primary, secondary] => Ok(SortKeys::by(primary.parse()?).then(secondary.parse()?)),
            _ => Err(format!("expected one or two sort keys, got '{}'", s)),
        }
    }
}

/// Stable sort on raw field values. Records without a name are dropped.
///
/// `Descending` reverses the primary key only; ties on the primary key are
/// always broken in ascending secondary order.
pub fn sort_by(records: Vec<TrackRecord>, keys: SortKeys, order: SortOrder) -> Vec<TrackRecord> {
    let mut records: Vec<TrackRecord> = records.into_iter().filter(TrackRecord::is_valid).collect();
    records.sort_by(|a, b| {
        let primary = a.field(keys.primary).cmp(b.field(keys.primary));
        let primary = match order {
            SortOrder::Ascending => primary,
            SortOrder::Descending => primary.reverse(),
        };
        primary.then_with(|| match keys.secondary {
            Some(field) => a.field(field).cmp(b.field(field)),
            None => Ordering::Equal,
        })
    });
    records
}

// ============================================================================
// Filtering
// ============================================================================

#[derive(Debug, Clone)]
enum Predicate {
    Exact { field: Field, value: String },
    Pattern { field: Field, regex: Regex },
    /// Unknown field name: never satisfied
    Never { name: String },
}

impl Predicate {
    fn compile(name: &str, value: &str) -> Self {
        let field = match name.parse::<Field>() {
            Ok(field) => field,
            Err(_) => {
                return Predicate::Never {
                    name: name.to_string(),
                }
            }
        };
        if field == Field::Year {
            if let Ok(regex) = anchored(value) {
                return Predicate::Pattern { field, regex };
            }
        }
        Predicate::Exact {
            field,
            value: value.to_lowercase(),
        }
    }

    fn matches(&self, record: &TrackRecord) -> bool {
        match self {
            Predicate::Exact { field, value } => record.field(*field).to_lowercase() == *value,
            Predicate::Pattern { field, regex } => regex.is_match(record.field(*field)),
            Predicate::Never { .. } => false,
        }
    }
}

fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!("^(?:{})$", pattern))
        .case_insensitive(true)
        .build()
}

/// A compiled set of field predicates, combined with logical AND.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    /// Compile `field → value` predicates. Values are exact, case-insensitive
    /// matches; a `year` value is an anchored regular expression when it
    /// compiles as one.
    pub fn new(predicates: &BTreeMap<String, String>) -> Self {
        let predicates: Vec<Predicate> = predicates
            .iter()
            .map(|(name, value)| Predicate::compile(name, value))
            .collect();
        for predicate in &predicates {
            if let Predicate::Never { name } = predicate {
                warn!(field = %name, "unknown filter field, no record will match");
            }
        }
        Self { predicates }
    }

    /// Parse a JSON object such as `{"year": "19.*", "genre": "vals"}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let map: BTreeMap<String, String> = serde_json::from_str(json)?;
        Ok(Self::new(&map))
    }

    /// Field names that did not resolve to a record field.
    pub fn unknown_fields(&self) -> Vec<&str> {
        self.predicates
            .iter()
            .filter_map(|p| match p {
                Predicate::Never { name } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn matches(&self, record: &TrackRecord) -> bool {
        record.is_valid() && self.predicates.iter().all(|p| p.matches(record))
    }
}

/// Keep the records that satisfy every predicate. Records without a name
/// are dropped.
pub fn filter_by(records: Vec<TrackRecord>, filter: &Filter) -> Vec<TrackRecord> {
    records.into_iter().filter(|r| filter.matches(r)).collect()
}

// ============================================================================
// TESTS
// ============================================================================
