//! Evaluation: transformer, condition evaluator, node evaluator, driver
//!
//! The driver runs the head node to derive the record subject, then every
//! body node in document order. Evaluation is pure: the record is only
//! read, the descriptor is immutable, and two runs over the same inputs
//! produce the identical triple sequence.

mod condition;
mod node;
mod transform;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::descriptor::{CompiledDescriptor, Node};
use crate::error::{SpchtError, SpchtResult};
use crate::record::{Record, DEFAULT_MARC_KEY};
use crate::term::Triple;

use node::evaluate_node;

/// Internal pseudo-predicate for the head evaluation; its triples are
/// unwrapped into the subject scalar and never emitted
const SUBJECT_PSEUDO_PREDICATE: &str = "urn:x-spcht:subject";

/// A non-fatal authoring issue found while evaluating a record
///
/// The offending sub-expression contributed nothing; the rest of the
/// record was still evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationWarning {
    /// Identity of the node that produced the warning
    pub node: String,
    pub message: String,
}

impl std::fmt::Display for EvaluationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.node, self.message)
    }
}

/// The per-record evaluation result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordOutput {
    /// Emitted triples, in stable node/value order
    pub triples: Vec<Triple>,
    /// Authoring issues encountered along the way
    pub warnings: Vec<EvaluationWarning>,
}

/// Options for record construction and subject derivation
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Flat-view key holding pre-parsed MARC21 data
    pub marc_key: String,
    /// Prefix applied to the derived subject scalar
    pub subject_prefix: String,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        ProcessOptions {
            marc_key: DEFAULT_MARC_KEY.to_string(),
            subject_prefix: String::new(),
        }
    }
}

impl ProcessOptions {
    /// Create options with the default MARC key and an empty prefix
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flat-view key holding pre-parsed MARC21 data
    pub fn with_marc_key(mut self, key: impl Into<String>) -> Self {
        self.marc_key = key.into();
        self
    }

    /// Set the prefix applied to the derived subject
    pub fn with_subject_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.subject_prefix = prefix.into();
        self
    }
}

/// Shared evaluation state for one record
pub(crate) struct EvalContext<'a> {
    pub record: &'a Record,
    pub warnings: Vec<EvaluationWarning>,
}

impl EvalContext<'_> {
    pub(crate) fn warn(&mut self, node: &Node, message: String) {
        warn!(node = node.identity(), "{}", message);
        self.warnings.push(EvaluationWarning {
            node: node.identity().to_string(),
            message,
        });
    }
}

/// Evaluate one record against a compiled descriptor
pub(crate) fn process(
    descriptor: &CompiledDescriptor,
    record: &Record,
    subject_prefix: &str,
) -> SpchtResult<RecordOutput> {
    let mut ctx = EvalContext {
        record,
        warnings: Vec::new(),
    };

    // the head is a regular node whose single object becomes the subject
    let head_triples = evaluate_node(
        &descriptor.head,
        "",
        Some(SUBJECT_PSEUDO_PREDICATE),
        &mut ctx,
    )
    .into_triples();
    let subject_scalar = match head_triples.len() {
        1 => head_triples[0].object.lexical().to_string(),
        0 => {
            return Err(SpchtError::RecordDiscarded {
                node: descriptor.head.identity().to_string(),
                field: descriptor.head.field_label().to_string(),
            })
        }
        n => return Err(SpchtError::SubjectAmbiguous { count: n }),
    };
    let subject = format!("{}{}", subject_prefix, subject_scalar);
    debug!(subject = %subject, "record subject derived");

    let mut triples = Vec::new();
    for body_node in &descriptor.nodes {
        match evaluate_node(body_node, &subject, None, &mut ctx) {
            node::NodeYield::Skipped => continue,
            node::NodeYield::Triples(produced) => {
                if produced.is_empty() && body_node.required.is_mandatory() {
                    return Err(SpchtError::RecordDiscarded {
                        node: body_node.identity().to_string(),
                        field: body_node.field_label().to_string(),
                    });
                }
                triples.extend(produced);
            }
        }
    }

    Ok(RecordOutput {
        triples,
        warnings: ctx.warnings,
    })
}
