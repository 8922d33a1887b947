//! Record input and the value accessor
//!
//! One record carries two logical views: the *flat* view, a mapping from
//! string keys to one or more scalars, and an optional *MARC* view, the
//! pre-parsed MARC21 shape (field tag → repeated subfield mappings). The
//! MARC view is built when a distinguished key (default `"fullrecord"`)
//! holds a JSON object of that shape; the engine never parses MARC21 wire
//! format itself.
//!
//! The accessor normalizes everything to ordered scalar sequences: missing
//! key → empty, scalar → length 1, sequence → as-is.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::{SpchtError, SpchtResult};
use crate::value::Scalar;

/// Default flat-view key holding pre-parsed MARC21 data
pub const DEFAULT_MARC_KEY: &str = "fullrecord";

/// Which record view a field path addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// The flat key→value view
    Flat,
    /// The MARC21 nested view
    Marc,
}

impl Source {
    /// Parse a descriptor `source` value
    ///
    /// The flat view is historically also spelled `dict`.
    pub fn parse(text: &str) -> Option<Source> {
        match text {
            "flat" | "dict" => Some(Source::Flat),
            "marc" => Some(Source::Marc),
            _ => None,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Flat => write!(f, "flat"),
            Source::Marc => write!(f, "marc"),
        }
    }
}

static MARC_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{3}):([0-9a-zA-Z]|i1|i2|none)$").expect("valid regex"));

/// A parsed MARC shorthand path of the form `"FFF:SS"`
///
/// `FFF` is the three-digit field tag; the subfield part is a single
/// subfield code or one of the reserved keys `i1`, `i2`, `none`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarcPath {
    pub tag: String,
    pub code: String,
}

impl MarcPath {
    /// Parse a MARC shorthand, `None` if the shape is off
    pub fn parse(path: &str) -> Option<MarcPath> {
        MARC_PATH_RE.captures(path).map(|cap| MarcPath {
            tag: cap[1].to_string(),
            code: cap[2].to_string(),
        })
    }
}

/// One repetition of a MARC field: subfield code → values
type MarcField = HashMap<String, Vec<Scalar>>;

/// One input record with its flat and optional MARC views
#[derive(Debug, Clone, Default)]
pub struct Record {
    flat: HashMap<String, Vec<Scalar>>,
    marc: Option<HashMap<String, Vec<MarcField>>>,
}

impl Record {
    /// Build a record from a JSON object using the default MARC key
    pub fn from_json(root: &Value) -> SpchtResult<Record> {
        Record::from_json_with_marc_key(root, DEFAULT_MARC_KEY)
    }

    /// Build a record from a JSON object
    ///
    /// Every leaf (or array-of-leaves) entry lands in the flat view. When
    /// `marc_key` holds a JSON object it must parse into the MARC shape;
    /// a string under `marc_key` (the unparsed wire form) leaves the MARC
    /// view absent.
    pub fn from_json_with_marc_key(root: &Value, marc_key: &str) -> SpchtResult<Record> {
        let obj = root
            .as_object()
            .ok_or_else(|| SpchtError::parse("record must be a JSON object"))?;

        let mut flat = HashMap::new();
        let mut marc = None;
        for (key, value) in obj {
            if key == marc_key {
                if let Value::Object(_) = value {
                    marc = Some(parse_marc_view(value)?);
                    continue;
                }
                debug!("MARC key '{}' does not hold a parsed record", marc_key);
            }
            if let Some(seq) = leaf_sequence(value) {
                flat.insert(key.clone(), seq);
            }
        }
        Ok(Record { flat, marc })
    }

    /// Build a record from flat entries, without a MARC view
    pub fn from_flat<I, K>(entries: I) -> Record
    where
        I: IntoIterator<Item = (K, Vec<Scalar>)>,
        K: Into<String>,
    {
        Record {
            flat: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            marc: None,
        }
    }

    /// Check whether the MARC view is present
    pub fn has_marc(&self) -> bool {
        self.marc.is_some()
    }

    /// Read a field path against one of the views
    ///
    /// Returns an ordered sequence of scalars; empty when the path misses.
    /// For the MARC view, repeated fields contribute in order and sequence
    /// subfield values are flattened.
    pub fn read(&self, source: Source, path: &str) -> Vec<Scalar> {
        match source {
            Source::Flat => self.flat.get(path).cloned().unwrap_or_default(),
            Source::Marc => self.read_marc(path),
        }
    }

    fn read_marc(&self, path: &str) -> Vec<Scalar> {
        let Some(marc) = &self.marc else {
            return Vec::new();
        };
        let Some(addr) = MarcPath::parse(path) else {
            debug!("malformed MARC shorthand '{}'", path);
            return Vec::new();
        };
        let Some(repetitions) = marc.get(&addr.tag) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for field in repetitions {
            if let Some(values) = field.get(&addr.code) {
                out.extend(values.iter().cloned());
            }
        }
        out
    }
}

/// Normalize a JSON value into a scalar sequence, `None` for non-leaf shapes
fn leaf_sequence(value: &Value) -> Option<Vec<Scalar>> {
    match value {
        Value::Array(items) => {
            let seq: Vec<Scalar> = items.iter().filter_map(Scalar::from_json).collect();
            if seq.is_empty() {
                None
            } else {
                Some(seq)
            }
        }
        other => Scalar::from_json(other).map(|s| vec![s]),
    }
}

fn parse_marc_view(value: &Value) -> SpchtResult<HashMap<String, Vec<MarcField>>> {
    let obj = value
        .as_object()
        .ok_or_else(|| SpchtError::parse("MARC view must be a JSON object"))?;

    let mut view = HashMap::new();
    for (tag, entry) in obj {
        let repetitions = match entry {
            Value::Object(_) => vec![parse_marc_field(tag, entry)?],
            Value::Array(items) => items
                .iter()
                .map(|item| parse_marc_field(tag, item))
                .collect::<SpchtResult<Vec<_>>>()?,
            _ => {
                return Err(SpchtError::parse(format!(
                    "MARC field '{}' must be a subfield mapping or a sequence of them",
                    tag
                )))
            }
        };
        view.insert(tag.clone(), repetitions);
    }
    Ok(view)
}

fn parse_marc_field(tag: &str, value: &Value) -> SpchtResult<MarcField> {
    let obj = value.as_object().ok_or_else(|| {
        SpchtError::parse(format!("MARC field '{}' repetition must be a mapping", tag))
    })?;

    let mut field = HashMap::new();
    for (code, raw) in obj {
        let values = leaf_sequence(raw).ok_or_else(|| {
            SpchtError::parse(format!(
                "MARC subfield '{}:{}' must hold scalars",
                tag, code
            ))
        })?;
        field.insert(code.clone(), values);
    }
    Ok(field)
}
