//! Compiled descriptor node structures
//!
//! These are produced by the [`crate::descriptor::loader`] module and
//! consumed by the evaluator. All regexes are compiled here once; the
//! structures are immutable after load and safe to share across threads.
//!
//! A node composes several optional *capabilities* — rewrite, mapping,
//! template insertion, join, condition, recursion — around the required
//! extraction slots. Capability co-occurrence is checked at load time.

use regex::Regex;

use crate::record::Source;
use crate::value::Scalar;

/// Whether an empty node outcome discards the whole record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Required {
    /// Zero values discard the record
    Mandatory,
    /// Zero values are fine, the node just emits nothing
    #[default]
    Optional,
}

impl Required {
    /// Parse a descriptor `required` value
    pub fn parse(text: &str) -> Option<Required> {
        match text {
            "mandatory" => Some(Required::Mandatory),
            "optional" => Some(Required::Optional),
            _ => None,
        }
    }

    /// Check if this is the mandatory level
    pub fn is_mandatory(&self) -> bool {
        matches!(self, Required::Mandatory)
    }
}

/// Object kind of the emitted triples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectKind {
    /// Literal object, optionally tagged
    #[default]
    Literal,
    /// IRI object; must be non-empty and cannot carry a tag
    Uri,
}

impl ObjectKind {
    /// Parse a descriptor `type` value
    pub fn parse(text: &str) -> Option<ObjectKind> {
        match text {
            "literal" => Some(ObjectKind::Literal),
            "uri" => Some(ObjectKind::Uri),
            _ => None,
        }
    }
}

/// The per-value rewrite slots shared by nodes, field refs and `if_*`
///
/// `matcher` filters (search semantics, the whole value is kept),
/// `cut`+`replace` substitutes every occurrence, `prepend`/`append`
/// concatenate around the result.
#[derive(Debug, Clone, Default)]
pub struct RefTransforms {
    pub matcher: Option<Regex>,
    pub cut: Option<Regex>,
    pub replace: String,
    pub prepend: String,
    pub append: String,
}

impl RefTransforms {
    /// Check whether any slot is set
    pub fn is_noop(&self) -> bool {
        self.matcher.is_none()
            && self.cut.is_none()
            && self.prepend.is_empty()
            && self.append.is_empty()
    }
}

/// A reduced node used inside `insert_add_fields`
#[derive(Debug, Clone)]
pub struct FieldRef {
    pub field: String,
    pub xf: RefTransforms,
}

/// A `mapping` with its settings, `$ref` already inlined
#[derive(Debug, Clone, Default)]
pub struct ValueMapping {
    /// Entries in author order; keys are pre-folded when `$casesens=false`
    pub entries: Vec<(String, String)>,
    /// Compiled patterns, present iff `$regex=true`, same order as `entries`
    pub patterns: Option<Vec<Regex>>,
    pub default: Option<String>,
    pub inherit: bool,
    pub casesens: bool,
}

impl ValueMapping {
    /// Look up one value, honoring `$regex` and `$casesens`
    ///
    /// Returns the mapped output on a hit, `None` on a miss; `$default`
    /// and `$inherit` handling happens at the sequence level in the
    /// transformer.
    pub fn lookup(&self, text: &str) -> Option<&str> {
        if let Some(patterns) = &self.patterns {
            for (pattern, (_, output)) in patterns.iter().zip(&self.entries) {
                if pattern.is_match(text) {
                    return Some(output);
                }
            }
            return None;
        }
        let needle = if self.casesens {
            text.to_string()
        } else {
            text.to_lowercase()
        };
        self.entries
            .iter()
            .find(|(key, _)| *key == needle)
            .map(|(_, output)| output.as_str())
    }
}

/// Per-value predicate selection from a paired field
#[derive(Debug, Clone)]
pub struct JoinedMap {
    /// The paired field carrying the predicate selectors
    pub field: String,
    /// Selector → predicate, `joined_map_ref` already inlined
    pub entries: Vec<(String, String)>,
}

impl JoinedMap {
    /// Look up the predicate for one selector value
    pub fn lookup(&self, text: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.as_str() == text)
            .map(|(_, output)| output.as_str())
    }
}

/// Comparison operator of an `if_condition`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Existence check, no `if_value` involved
    Exists,
}

impl CompareOp {
    /// Parse a condition lexeme, long and short synonyms included
    pub fn parse(text: &str) -> Option<CompareOp> {
        match text {
            "equal" | "eq" | "=" | "==" => Some(CompareOp::Eq),
            "unequal" | "uq" | "!=" => Some(CompareOp::Ne),
            "lesser" | "ls" | "<" => Some(CompareOp::Lt),
            "lesser_equal" | "lq" | "<=" => Some(CompareOp::Le),
            "greater" | "gr" | ">" => Some(CompareOp::Gt),
            "greater_equal" | "gq" | ">=" => Some(CompareOp::Ge),
            "exi" => Some(CompareOp::Exists),
            _ => None,
        }
    }

    /// Check if this operator orders values (excludes equality and `exi`)
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge
        )
    }
}

/// The comparison value of a condition
#[derive(Debug, Clone)]
pub enum IfValue {
    One(Scalar),
    /// Whitelist form, only valid with `==` / `!=`
    Many(Vec<Scalar>),
}

/// An `if_*` guard
#[derive(Debug, Clone)]
pub struct Condition {
    pub field: String,
    pub op: CompareOp,
    /// Absent exactly for [`CompareOp::Exists`]
    pub value: Option<IfValue>,
    /// `if_match` / `if_cut` / `if_replace` / `if_prepend` / `if_append`
    pub xf: RefTransforms,
}

/// An `insert_into` template with its additional field refs
#[derive(Debug, Clone)]
pub struct InsertTemplate {
    pub template: String,
    pub add_fields: Vec<FieldRef>,
    /// Number of `{}` placeholders, counted at load
    pub placeholders: usize,
}

impl InsertTemplate {
    /// Check the static arity law: placeholders = 1 + add fields
    pub fn arity_ok(&self) -> bool {
        self.placeholders == 1 + self.add_fields.len()
    }
}

/// One compiled descriptor node
#[derive(Debug, Clone)]
pub struct Node {
    /// Diagnostic name; surfaces in discard reports and warnings
    pub name: Option<String>,
    pub source: Source,
    /// Absent only when `static_field` replaces extraction
    pub field: Option<String>,
    /// Absent for the head and for fallback nodes inheriting it
    pub predicate: Option<String>,
    pub required: Required,
    pub kind: ObjectKind,
    /// Datatype (`^^…`) or language (`@…`) tag for literal objects
    pub tag: Option<String>,
    /// Alternative extraction paths in the same source
    pub alternatives: Vec<String>,
    pub xf: RefTransforms,
    pub mapping: Option<ValueMapping>,
    pub insert: Option<InsertTemplate>,
    pub static_field: Option<String>,
    pub joined: Option<JoinedMap>,
    pub condition: Option<Condition>,
    pub uuid_predicate_fields: Vec<String>,
    pub uuid_object_fields: Vec<String>,
    pub sub_nodes: Vec<Node>,
    pub fallback: Option<Box<Node>>,
}

impl Node {
    /// Diagnostic identity: the name if set, else the field, else `"?"`
    pub fn identity(&self) -> &str {
        if let Some(name) = &self.name {
            return name;
        }
        self.field.as_deref().unwrap_or("?")
    }

    /// The field for discard reports, `"-"` when extraction is static
    pub fn field_label(&self) -> &str {
        self.field.as_deref().unwrap_or("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_op_synonyms() {
        assert_eq!(CompareOp::parse("equal"), Some(CompareOp::Eq));
        assert_eq!(CompareOp::parse("eq"), Some(CompareOp::Eq));
        assert_eq!(CompareOp::parse("="), Some(CompareOp::Eq));
        assert_eq!(CompareOp::parse("=="), Some(CompareOp::Eq));
        assert_eq!(CompareOp::parse("unequal"), Some(CompareOp::Ne));
        assert_eq!(CompareOp::parse("gq"), Some(CompareOp::Ge));
        assert_eq!(CompareOp::parse("lq"), Some(CompareOp::Le));
        assert_eq!(CompareOp::parse("exi"), Some(CompareOp::Exists));
        assert_eq!(CompareOp::parse("~="), None);
    }

    #[test]
    fn test_mapping_lookup_case_folding() {
        let mapping = ValueMapping {
            // loader pre-folds keys when $casesens=false
            entries: vec![("aut".to_string(), "U:aut".to_string())],
            patterns: None,
            default: None,
            inherit: false,
            casesens: false,
        };
        assert_eq!(mapping.lookup("AUT"), Some("U:aut"));
        assert_eq!(mapping.lookup("aut"), Some("U:aut"));
        assert_eq!(mapping.lookup("xyz"), None);
    }

    #[test]
    fn test_mapping_lookup_regex_first_wins() {
        let mapping = ValueMapping {
            entries: vec![
                (".*aut.*".to_string(), "first".to_string()),
                ("aut".to_string(), "second".to_string()),
            ],
            patterns: Some(vec![
                Regex::new(".*aut.*").unwrap(),
                Regex::new("aut").unwrap(),
            ]),
            default: None,
            inherit: false,
            casesens: true,
        };
        assert_eq!(mapping.lookup("author"), Some("first"));
    }

    #[test]
    fn test_insert_arity() {
        let t = InsertTemplate {
            template: "/org/{}/dep/zw{}".to_string(),
            add_fields: vec![FieldRef {
                field: "lib".to_string(),
                xf: RefTransforms::default(),
            }],
            placeholders: 2,
        };
        assert!(t.arity_ok());
    }
}
