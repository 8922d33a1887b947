//! Spcht descriptor evaluation engine
//!
//! This crate implements the Spcht Descriptor Format (SDF): a declarative,
//! schema-driven mapping from flat record-oriented input data — plus an
//! optional MARC21-style nested shape — to RDF triples. An operator
//! authors a descriptor document enumerating nodes; each node describes
//! how to derive triples from one input record.
//!
//! # Key Features
//!
//! - **Compiled descriptors**: Parse once, evaluate many times. `$ref`
//!   mapping files are inlined and every regex is compiled at load; the
//!   compiled form is immutable and shareable across threads.
//! - **Value pipeline**: match filtering, mappings (exact, case-folded or
//!   regex, with default and inheritance), cut+replace rewriting, affixes,
//!   positional `insert_into` templates with cartesian expansion.
//! - **Conditional nodes**: `if_*` guards with numeric coercion,
//!   whitelist comparison and absence-as-negativity semantics.
//! - **Structure**: alternatives, fallback chains, sub-node recursion with
//!   subject hand-over, per-value predicate selection via `joined_map`,
//!   deterministic v5 UUID suffixes.
//!
//! # Usage
//!
//! Load a descriptor with [`DescriptorLoader::from_file`], call
//! [`DescriptorLoader::compile`], then feed [`Record`]s to
//! [`CompiledDescriptor::process`]:
//!
//! ```no_run
//! use spcht_engine::{DescriptorLoader, Record};
//!
//! # fn main() -> spcht_engine::SpchtResult<()> {
//! let descriptor = DescriptorLoader::from_file("mapping.spcht.json")?.compile()?;
//! let record = Record::from_json(&serde_json::json!({
//!     "id": "42",
//!     "title": "Faust"
//! }))?;
//! let output = descriptor.process(&record, "https://data.example.org/res/")?;
//! for triple in &output.triples {
//!     println!("{}", triple);
//! }
//! # Ok(())
//! # }
//! ```

pub mod descriptor;
pub mod error;
pub mod eval;
pub mod record;
pub mod term;
pub mod value;

pub use descriptor::{
    CompareOp, CompiledDescriptor, Condition, DescriptorLoader, FieldRef, IfValue, InsertTemplate,
    JoinedMap, Node, ObjectKind, RefTransforms, Required, ValueMapping,
};
pub use error::{SpchtError, SpchtResult};
pub use eval::{EvaluationWarning, ProcessOptions, RecordOutput};
pub use record::{MarcPath, Record, Source, DEFAULT_MARC_KEY};
pub use term::{Term, Triple};
pub use value::Scalar;
