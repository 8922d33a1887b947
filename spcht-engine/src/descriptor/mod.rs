//! Descriptor structures, loading and compilation
//!
//! This module provides the compiled representation of a Spcht
//! descriptor. [`DescriptorLoader`] parses the document, inlines mapping
//! references and validates structure; the resulting
//! [`CompiledDescriptor`] is immutable, holds only precompiled regexes
//! and inlined mappings, and is safe to share across threads.

mod extractor;
mod loader;
mod node;

pub use loader::DescriptorLoader;
pub use node::{
    CompareOp, Condition, FieldRef, IfValue, InsertTemplate, JoinedMap, Node, ObjectKind,
    RefTransforms, Required, ValueMapping,
};

use serde_json::Value;

use crate::error::SpchtResult;
use crate::eval::{self, ProcessOptions, RecordOutput};
use crate::record::{Record, Source};

/// A compiled, immutable descriptor
///
/// Produced by [`DescriptorLoader::compile`]. Holds the head node that
/// derives the record subject and the ordered body nodes. Evaluation is
/// a pure function of (descriptor, record); a single compiled descriptor
/// may serve concurrent evaluations without synchronization.
#[derive(Debug, Clone)]
pub struct CompiledDescriptor {
    /// The subject-deriving head node
    pub head: Node,
    /// Body nodes in document order
    pub nodes: Vec<Node>,
    /// The document with all references inlined
    pub(crate) resolved: Value,
}

impl CompiledDescriptor {
    /// Evaluate one record into triples
    ///
    /// The head node derives the subject scalar, prefixed with
    /// `subject_prefix`; every body node then contributes triples in
    /// order. Returns [`crate::SpchtError::RecordDiscarded`] when the
    /// head or a mandatory node yields nothing — nothing is partially
    /// emitted in that case.
    pub fn process(&self, record: &Record, subject_prefix: &str) -> SpchtResult<RecordOutput> {
        eval::process(self, record, subject_prefix)
    }

    /// Convenience: build the record from JSON, then evaluate it
    pub fn process_json(&self, json: &Value, options: &ProcessOptions) -> SpchtResult<RecordOutput> {
        let record = Record::from_json_with_marc_key(json, &options.marc_key)?;
        self.process(&record, &options.subject_prefix)
    }

    /// The number of body nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check whether the descriptor has no body nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The `$ref`-inlined descriptor document
    ///
    /// Useful for exporting a self-contained copy of the descriptor.
    pub fn export_inlined(&self) -> &Value {
        &self.resolved
    }

    /// All flat-view fields the descriptor may read
    ///
    /// Covers primary fields, alternatives, joined fields, insert refs,
    /// condition fields and UUID fields, through fallbacks and sub-nodes.
    /// Collaborators use this to restrict what they fetch; the MARC
    /// record key is the caller's to add.
    pub fn referenced_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        collect_fields(&self.head, &mut fields);
        for node in &self.nodes {
            collect_fields(node, &mut fields);
        }
        fields.sort();
        fields.dedup();
        fields
    }

    /// All predicates the descriptor may emit, including joined ones
    pub fn referenced_predicates(&self) -> Vec<String> {
        let mut predicates = Vec::new();
        for node in &self.nodes {
            collect_predicates(node, &mut predicates);
        }
        predicates.sort();
        predicates.dedup();
        predicates
    }
}

fn collect_fields(node: &Node, out: &mut Vec<String>) {
    if node.source == Source::Flat {
        if node.static_field.is_none() {
            if let Some(field) = &node.field {
                out.push(field.clone());
            }
        }
        out.extend(node.alternatives.iter().cloned());
        if let Some(joined) = &node.joined {
            out.push(joined.field.clone());
        }
        if let Some(insert) = &node.insert {
            out.extend(insert.add_fields.iter().map(|f| f.field.clone()));
        }
        if let Some(condition) = &node.condition {
            out.push(condition.field.clone());
        }
        out.extend(node.uuid_predicate_fields.iter().cloned());
        out.extend(node.uuid_object_fields.iter().cloned());
    }
    if let Some(fallback) = &node.fallback {
        collect_fields(fallback, out);
    }
    for child in &node.sub_nodes {
        collect_fields(child, out);
    }
}

fn collect_predicates(node: &Node, out: &mut Vec<String>) {
    if let Some(predicate) = &node.predicate {
        out.push(predicate.clone());
    }
    if let Some(joined) = &node.joined {
        out.extend(joined.entries.iter().map(|(_, p)| p.clone()));
    }
    if let Some(fallback) = &node.fallback {
        collect_predicates(fallback, out);
    }
    for child in &node.sub_nodes {
        collect_predicates(child, out);
    }
}
