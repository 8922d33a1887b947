//! Descriptor loading and reference resolution
//!
//! The loader parses a descriptor document, inlines every `$ref` /
//! `joined_map_ref` mapping file (relative to the descriptor's own
//! directory, local entries winning on collision), and hands the
//! resolved tree to the extractor. Loading is the only place the engine
//! touches the filesystem; the compiled descriptor never does.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{SpchtError, SpchtResult};

use super::extractor::{extract_node, NodePosition};
use super::{CompiledDescriptor, Node};

/// Root keys that are not head-node slots
const ROOT_KEYS: &[&str] = &["nodes"];

/// Descriptor loader
///
/// Use [`DescriptorLoader::from_file`] for the common case, or
/// [`DescriptorLoader::from_json_str`] / [`DescriptorLoader::from_value`]
/// with an explicit base directory for reference resolution. Call
/// [`DescriptorLoader::compile`] to produce the immutable
/// [`CompiledDescriptor`].
pub struct DescriptorLoader {
    root: Value,
    base_dir: PathBuf,
}

impl DescriptorLoader {
    /// Load a descriptor document from a file
    ///
    /// References resolve relative to the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> SpchtResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| SpchtError::Io(format!("{}: {}", path.display(), e)))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        debug!(descriptor = %path.display(), base = %base_dir.display(), "loading descriptor");
        Self::from_json_str(&text, base_dir)
    }

    /// Load a descriptor document from JSON text
    pub fn from_json_str(text: &str, base_dir: impl Into<PathBuf>) -> SpchtResult<Self> {
        let root: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(root, base_dir))
    }

    /// Load a descriptor from an already parsed document
    pub fn from_value(root: Value, base_dir: impl Into<PathBuf>) -> Self {
        DescriptorLoader {
            root,
            base_dir: base_dir.into(),
        }
    }

    /// Resolve references, validate, and compile the descriptor
    pub fn compile(mut self) -> SpchtResult<CompiledDescriptor> {
        let obj = self
            .root
            .as_object_mut()
            .ok_or_else(|| SpchtError::parse("descriptor must be a JSON object"))?;

        if let Some(nodes) = obj.get_mut("nodes") {
            let nodes = nodes
                .as_array_mut()
                .ok_or_else(|| SpchtError::parse("'nodes' must be a list"))?;
            for node in nodes.iter_mut() {
                resolve_node_refs(node, &self.base_dir)?;
            }
        }
        if let Some(fallback) = obj.get_mut("id_fallback") {
            resolve_node_refs(fallback, &self.base_dir)?;
        }

        let obj = self.root.as_object().expect("checked above");
        let head = extract_head(obj)?;
        let nodes = extract_body_nodes(obj)?;

        Ok(CompiledDescriptor {
            head,
            nodes,
            resolved: self.root,
        })
    }
}

/// Build the head node from the root-level `id_*` slots
///
/// Every node slot has a per-head variant (`id_source`, `id_field`,
/// `id_fallback`, `id_alternatives`, `id_match`, …); they are collected
/// into a synthetic node. The head carries no predicate and is
/// implicitly mandatory.
fn extract_head(obj: &Map<String, Value>) -> SpchtResult<Node> {
    let mut synthetic = Map::new();
    for (key, value) in obj {
        if let Some(slot) = key.strip_prefix("id_") {
            synthetic.insert(slot.to_string(), value.clone());
        } else if !ROOT_KEYS.contains(&key.as_str()) && !key.starts_with("comment") {
            return Err(SpchtError::UnknownKey {
                node: "<root>".to_string(),
                key: key.clone(),
            });
        }
    }
    if !synthetic.contains_key("source") {
        return Err(SpchtError::validation("<root>", "missing 'id_source'"));
    }
    if !synthetic.contains_key("field") {
        return Err(SpchtError::validation("<root>", "missing 'id_field'"));
    }
    let mut head = extract_node(&synthetic, NodePosition::Head, "$Identifier$")?;
    if head.name.is_none() {
        head.name = Some("$Identifier$".to_string());
    }
    Ok(head)
}

fn extract_body_nodes(obj: &Map<String, Value>) -> SpchtResult<Vec<Node>> {
    let raw = obj
        .get("nodes")
        .ok_or_else(|| SpchtError::parse("descriptor has no 'nodes'"))?
        .as_array()
        .ok_or_else(|| SpchtError::parse("'nodes' must be a list"))?;

    let mut nodes = Vec::with_capacity(raw.len());
    for (i, item) in raw.iter().enumerate() {
        let entry = item
            .as_object()
            .ok_or_else(|| SpchtError::parse(format!("nodes[{}] must be a mapping", i)))?;
        nodes.push(extract_node(
            entry,
            NodePosition::Body,
            &format!("nodes[{}]", i),
        )?);
    }
    Ok(nodes)
}

/// Inline `$ref` and `joined_map_ref` into one node, recursively
///
/// Local `mapping` / `joined_map` entries take precedence over the
/// referenced file's entries on key collisions.
fn resolve_node_refs(node: &mut Value, base_dir: &Path) -> SpchtResult<()> {
    let Some(obj) = node.as_object_mut() else {
        // shape errors are reported by the extractor with node context
        return Ok(());
    };

    let ref_path = obj
        .get("mapping_settings")
        .and_then(|s| s.get("$ref"))
        .cloned();
    if let Some(ref_path) = ref_path {
        let path = ref_path
            .as_str()
            .ok_or_else(|| SpchtError::parse("$ref must be a string path"))?;
        let referenced = load_reference_map(base_dir, path, true)?;
        merge_reference(obj, "mapping", referenced);

        let settings = obj
            .get_mut("mapping_settings")
            .and_then(Value::as_object_mut)
            .expect("checked above");
        settings.remove("$ref");
        if settings.is_empty() {
            obj.remove("mapping_settings");
        }
    }

    if let Some(ref_path) = obj.get("joined_map_ref").cloned() {
        let path = ref_path
            .as_str()
            .ok_or_else(|| SpchtError::parse("joined_map_ref must be a string path"))?;
        let referenced = load_reference_map(base_dir, path, false)?;
        merge_reference(obj, "joined_map", referenced);
        obj.remove("joined_map_ref");
    }

    if let Some(fallback) = obj.get_mut("fallback") {
        resolve_node_refs(fallback, base_dir)?;
    }
    if let Some(children) = obj.get_mut("sub_nodes").and_then(Value::as_array_mut) {
        for child in children {
            resolve_node_refs(child, base_dir)?;
        }
    }
    Ok(())
}

/// Load a referenced mapping file: a single flat mapping
///
/// `$ref` targets must map strings to strings; `joined_map_ref` targets
/// may also hold numeric values.
fn load_reference_map(
    base_dir: &Path,
    ref_path: &str,
    strings_only: bool,
) -> SpchtResult<Map<String, Value>> {
    let path = base_dir.join(ref_path);
    debug!(reference = %path.display(), "resolving mapping reference");
    let text = fs::read_to_string(&path)
        .map_err(|e| SpchtError::reference(ref_path, e.to_string()))?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| SpchtError::reference(ref_path, format!("not valid JSON: {}", e)))?;
    let map = match value {
        Value::Object(map) => map,
        _ => {
            return Err(SpchtError::reference(
                ref_path,
                "referenced file must hold a single flat mapping",
            ))
        }
    };
    for (key, entry) in &map {
        let ok = if strings_only {
            entry.is_string()
        } else {
            entry.is_string() || entry.is_number()
        };
        if !ok {
            return Err(SpchtError::reference(
                ref_path,
                format!("value for '{}' is not flat", key),
            ));
        }
    }
    Ok(map)
}

/// Merge referenced entries under `key`, keeping existing entries
fn merge_reference(obj: &mut Map<String, Value>, key: &str, referenced: Map<String, Value>) {
    let target = obj
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(target) = target.as_object_mut() {
        for (k, v) in referenced {
            target.entry(k).or_insert(v);
        }
    }
}
