//! RDF term and triple data model
//!
//! Terms produced by node evaluation are either IRIs or literals with an
//! optional datatype or language tag. The engine performs no IRI syntax
//! validation; serialization is a collaborator concern.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A produced RDF term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Term {
    /// An IRI
    Iri(String),
    /// A literal with optional datatype or language tag
    Literal {
        value: String,
        datatype: Option<String>,
        language: Option<String>,
    },
}

impl Term {
    /// Create an IRI term
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    /// Create a plain string literal
    pub fn string(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    /// Create a typed literal
    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    /// Create a language-tagged string
    pub fn lang_string(value: impl Into<String>, lang: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
            language: Some(lang.into()),
        }
    }

    /// Create a literal carrying a node `tag`
    ///
    /// `^^<datatype>` sets the datatype, `@<lang>` the language tag. Any
    /// other tag shape is ignored and yields a plain literal.
    pub fn tagged(value: impl Into<String>, tag: &str) -> Self {
        if let Some(datatype) = tag.strip_prefix("^^") {
            Term::typed(value, datatype)
        } else if let Some(lang) = tag.strip_prefix('@') {
            Term::lang_string(value, lang)
        } else {
            Term::string(value)
        }
    }

    /// Check if this is an IRI
    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }

    /// Check if this is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal { .. })
    }

    /// Get as IRI string if this is an IRI
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// The raw lexical content, IRI or literal alike
    ///
    /// Sub-node evaluation uses this as the child subject.
    pub fn lexical(&self) -> &str {
        match self {
            Term::Iri(iri) => iri,
            Term::Literal { value, .. } => value,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", iri),
            Term::Literal {
                value,
                datatype,
                language,
            } => {
                write!(f, "\"{}\"", value)?;
                if let Some(dt) = datatype {
                    write!(f, "^^{}", dt)?;
                } else if let Some(lang) = language {
                    write!(f, "@{}", lang)?;
                }
                Ok(())
            }
        }
    }
}

/// One emitted triple
///
/// Subject and predicate are always IRIs and kept as plain strings;
/// the object may be an IRI or a literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

impl Triple {
    /// Create a new triple
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: Term) -> Self {
        Triple {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(<{}>, <{}>, {})", self.subject, self.predicate, self.object)
    }
}
