//! Descriptor node extraction
//!
//! Walks the parsed (and `$ref`-inlined) descriptor document and builds
//! the compiled [`Node`] tree. All structural validation lives here:
//! key whitelisting, enum domains, regex compilation, capability
//! co-occurrence. Keys prefixed `comment` are tolerated anywhere.

use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{SpchtError, SpchtResult};
use crate::record::{MarcPath, Source};
use crate::value::Scalar;

use super::node::{
    CompareOp, Condition, FieldRef, IfValue, InsertTemplate, JoinedMap, Node, ObjectKind,
    RefTransforms, Required, ValueMapping,
};

/// All keys a node may carry
const NODE_KEYS: &[&str] = &[
    "name",
    "source",
    "field",
    "predicate",
    "required",
    "type",
    "tag",
    "alternatives",
    "fallback",
    "match",
    "cut",
    "replace",
    "prepend",
    "append",
    "insert_into",
    "insert_add_fields",
    "static_field",
    "mapping",
    "mapping_settings",
    "joined_field",
    "joined_map",
    "joined_map_ref",
    "if_field",
    "if_value",
    "if_condition",
    "if_match",
    "if_cut",
    "if_replace",
    "if_prepend",
    "if_append",
    "append_uuid_predicate_fields",
    "append_uuid_object_fields",
    "sub_nodes",
];

/// Keys a field ref inside `insert_add_fields` may carry
const FIELD_REF_KEYS: &[&str] = &["field", "match", "cut", "replace", "prepend", "append"];

/// Where a node sits in the tree; governs which slots are required
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodePosition {
    /// Top-level body node: `source`, `field`, `predicate`, `required`
    Body,
    /// Child of `sub_nodes`: like body, but `required` defaults to optional
    SubNode,
    /// `fallback` target: predicate is inherited, `required` is ignored
    Fallback,
    /// The synthesized head node: no predicate, implicitly mandatory
    Head,
}

/// Extract one node from its JSON mapping
pub(crate) fn extract_node(
    obj: &Map<String, Value>,
    position: NodePosition,
    label: &str,
) -> SpchtResult<Node> {
    for key in obj.keys() {
        if !NODE_KEYS.contains(&key.as_str()) && !key.starts_with("comment") {
            return Err(SpchtError::UnknownKey {
                node: label.to_string(),
                key: key.clone(),
            });
        }
    }

    let name = opt_str(obj, "name", label)?;
    let label = name.as_deref().unwrap_or(label).to_string();
    let label = label.as_str();

    let static_field = opt_scalar_text(obj, "static_field", label)?;

    let source = match opt_str(obj, "source", label)? {
        Some(text) => Source::parse(&text).ok_or_else(|| {
            SpchtError::validation(label, format!("source must be flat or marc, got '{}'", text))
        })?,
        None => return Err(SpchtError::validation(label, "missing 'source'")),
    };

    let field = opt_str(obj, "field", label)?;
    if field.is_none() && static_field.is_none() {
        return Err(SpchtError::validation(label, "missing 'field'"));
    }

    let predicate = opt_str(obj, "predicate", label)?;
    if predicate.is_none() && matches!(position, NodePosition::Body | NodePosition::SubNode) {
        return Err(SpchtError::validation(label, "missing 'predicate'"));
    }

    let required = match opt_str(obj, "required", label)? {
        Some(text) => Required::parse(&text).ok_or_else(|| {
            SpchtError::validation(
                label,
                format!("required must be mandatory or optional, got '{}'", text),
            )
        })?,
        None if position == NodePosition::Body => {
            return Err(SpchtError::validation(label, "missing 'required'"))
        }
        None => Required::Optional,
    };

    let kind = match opt_str(obj, "type", label)? {
        Some(text) => ObjectKind::parse(&text).ok_or_else(|| {
            SpchtError::validation(label, format!("type must be literal or uri, got '{}'", text))
        })?,
        None => ObjectKind::Literal,
    };

    let tag = opt_str(obj, "tag", label)?;
    if let Some(t) = &tag {
        if kind == ObjectKind::Uri {
            return Err(SpchtError::validation(label, "uri objects cannot carry a tag"));
        }
        if !t.starts_with("^^") && !t.starts_with('@') {
            warn!(node = label, tag = %t, "tag is neither '^^<datatype>' nor '@<language>', ignoring");
        }
    }

    let alternatives = opt_str_list(obj, "alternatives", label)?;
    let xf = extract_transforms(obj, "", label)?;
    let mapping = extract_mapping(obj, label)?;
    let insert = extract_insert(obj, label)?;
    let joined = extract_joined(obj, label)?;
    let condition = extract_condition(obj, label)?;

    if obj.contains_key("joined_field") != joined.is_some() {
        return Err(SpchtError::validation(
            label,
            "joined_field and joined_map must be used together",
        ));
    }
    if joined.is_some() && insert.is_some() {
        warn!(node = label, "insert_into is not applied to joined_map nodes");
    }

    let uuid_predicate_fields = opt_str_list(obj, "append_uuid_predicate_fields", label)?;
    let uuid_object_fields = opt_str_list(obj, "append_uuid_object_fields", label)?;

    // every path addressed in the marc source must have the FFF:SS shape
    if source == Source::Marc {
        let mut paths: Vec<&String> = Vec::new();
        paths.extend(field.iter());
        paths.extend(alternatives.iter());
        paths.extend(joined.iter().map(|j| &j.field));
        paths.extend(condition.iter().map(|c| &c.field));
        paths.extend(insert.iter().flat_map(|i| i.add_fields.iter().map(|f| &f.field)));
        paths.extend(uuid_predicate_fields.iter());
        paths.extend(uuid_object_fields.iter());
        for path in paths {
            if MarcPath::parse(path).is_none() {
                return Err(SpchtError::validation(
                    label,
                    format!("'{}' is not a valid marc path (expected FFF:SS)", path),
                ));
            }
        }
    }

    let sub_nodes = match obj.get("sub_nodes") {
        None => Vec::new(),
        Some(Value::Array(items)) => {
            let mut nodes = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let child = item.as_object().ok_or_else(|| {
                    SpchtError::validation(label, "sub_nodes entries must be mappings")
                })?;
                let child_label = format!("{}/sub_nodes[{}]", label, i);
                nodes.push(extract_node(child, NodePosition::SubNode, &child_label)?);
            }
            nodes
        }
        Some(_) => return Err(SpchtError::validation(label, "sub_nodes must be a list")),
    };

    let fallback = match obj.get("fallback") {
        None => None,
        Some(Value::Object(child)) => {
            let child_label = format!("{}/fallback", label);
            Some(Box::new(extract_node(
                child,
                NodePosition::Fallback,
                &child_label,
            )?))
        }
        Some(_) => return Err(SpchtError::validation(label, "fallback must be a mapping")),
    };

    Ok(Node {
        name,
        source,
        field,
        predicate,
        required,
        kind,
        tag,
        alternatives,
        xf,
        mapping,
        insert,
        static_field,
        joined,
        condition,
        uuid_predicate_fields,
        uuid_object_fields,
        sub_nodes,
        fallback,
    })
}

/// Extract the rewrite slots, optionally under a key prefix (`if_`)
fn extract_transforms(
    obj: &Map<String, Value>,
    prefix: &str,
    label: &str,
) -> SpchtResult<RefTransforms> {
    let key = |suffix: &str| format!("{}{}", prefix, suffix);
    Ok(RefTransforms {
        matcher: opt_regex(obj, &key("match"), label)?,
        cut: opt_regex(obj, &key("cut"), label)?,
        replace: opt_str(obj, &key("replace"), label)?.unwrap_or_default(),
        prepend: opt_str(obj, &key("prepend"), label)?.unwrap_or_default(),
        append: opt_str(obj, &key("append"), label)?.unwrap_or_default(),
    })
}

fn extract_mapping(obj: &Map<String, Value>, label: &str) -> SpchtResult<Option<ValueMapping>> {
    let entries = match obj.get("mapping") {
        None => {
            if obj.contains_key("mapping_settings") {
                // settings without a mapping can only mean a dangling $ref
                // that resolution already removed, or an authoring slip
                return Err(SpchtError::validation(
                    label,
                    "mapping_settings without a mapping",
                ));
            }
            return Ok(None);
        }
        Some(Value::Object(map)) => map,
        Some(_) => return Err(SpchtError::validation(label, "mapping must be a mapping")),
    };

    let mut mapping = ValueMapping {
        casesens: true,
        ..ValueMapping::default()
    };

    if let Some(settings) = obj.get("mapping_settings") {
        let settings = settings
            .as_object()
            .ok_or_else(|| SpchtError::validation(label, "mapping_settings must be a mapping"))?;
        for (key, value) in settings {
            match key.as_str() {
                "$default" => {
                    mapping.default = Some(scalar_text(value).ok_or_else(|| {
                        SpchtError::validation(label, "$default must be a scalar")
                    })?)
                }
                "$inherit" => mapping.inherit = setting_bool(value, label, "$inherit")?,
                "$casesens" => mapping.casesens = setting_bool(value, label, "$casesens")?,
                "$regex" => {
                    if setting_bool(value, label, "$regex")? {
                        mapping.patterns = Some(Vec::new());
                    }
                }
                "$ref" => {
                    // resolution inlines and removes this before extraction
                    return Err(SpchtError::internal("unresolved $ref reached extraction"));
                }
                other if other.starts_with('$') => {
                    warn!(node = label, key = other, "unknown mapping setting, ignoring");
                }
                other => {
                    return Err(SpchtError::validation(
                        label,
                        format!("mapping_settings key '{}' is not a setting", other),
                    ))
                }
            }
        }
    }

    for (key, value) in entries {
        let output = scalar_text(value).ok_or_else(|| {
            SpchtError::validation(label, format!("mapping value for '{}' must be a scalar", key))
        })?;
        if let Some(patterns) = &mut mapping.patterns {
            // case folding becomes a regex flag in $regex mode
            patterns.push(compile_regex_flags(key, !mapping.casesens)?);
            mapping.entries.push((key.clone(), output));
        } else if mapping.casesens {
            mapping.entries.push((key.clone(), output));
        } else {
            mapping.entries.push((key.to_lowercase(), output));
        }
    }

    Ok(Some(mapping))
}

fn extract_insert(obj: &Map<String, Value>, label: &str) -> SpchtResult<Option<InsertTemplate>> {
    let template = match opt_str(obj, "insert_into", label)? {
        Some(t) => t,
        None => {
            if obj.contains_key("insert_add_fields") {
                return Err(SpchtError::validation(
                    label,
                    "insert_add_fields without insert_into",
                ));
            }
            return Ok(None);
        }
    };

    let mut add_fields = Vec::new();
    if let Some(raw) = obj.get("insert_add_fields") {
        let items = raw
            .as_array()
            .ok_or_else(|| SpchtError::validation(label, "insert_add_fields must be a list"))?;
        for item in items {
            let entry = item.as_object().ok_or_else(|| {
                SpchtError::validation(label, "insert_add_fields entries must be mappings")
            })?;
            for key in entry.keys() {
                if !FIELD_REF_KEYS.contains(&key.as_str()) && !key.starts_with("comment") {
                    return Err(SpchtError::UnknownKey {
                        node: label.to_string(),
                        key: key.clone(),
                    });
                }
            }
            let field = opt_str(entry, "field", label)?
                .ok_or_else(|| SpchtError::validation(label, "field ref missing 'field'"))?;
            add_fields.push(FieldRef {
                field,
                xf: extract_transforms(entry, "", label)?,
            });
        }
    }

    let insert = InsertTemplate {
        placeholders: template.matches("{}").count(),
        template,
        add_fields,
    };
    if !insert.arity_ok() {
        warn!(
            node = label,
            placeholders = insert.placeholders,
            fields = 1 + insert.add_fields.len(),
            "insert_into placeholder count does not match its fields; template will yield nothing"
        );
    }
    Ok(Some(insert))
}

fn extract_joined(obj: &Map<String, Value>, label: &str) -> SpchtResult<Option<JoinedMap>> {
    let entries = match obj.get("joined_map") {
        None => return Ok(None),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(SpchtError::validation(label, "joined_map must be a mapping")),
    };
    let field = opt_str(obj, "joined_field", label)?
        .ok_or_else(|| SpchtError::validation(label, "joined_map without joined_field"))?;

    let mut pairs = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let output = scalar_text(value).ok_or_else(|| {
            SpchtError::validation(
                label,
                format!("joined_map value for '{}' must be a scalar", key),
            )
        })?;
        pairs.push((key.clone(), output));
    }
    Ok(Some(JoinedMap {
        field,
        entries: pairs,
    }))
}

fn extract_condition(obj: &Map<String, Value>, label: &str) -> SpchtResult<Option<Condition>> {
    let field = match opt_str(obj, "if_field", label)? {
        Some(f) => f,
        None => {
            if obj.contains_key("if_condition") || obj.contains_key("if_value") {
                return Err(SpchtError::validation(
                    label,
                    "if_condition/if_value without if_field",
                ));
            }
            return Ok(None);
        }
    };

    let lexeme = opt_str(obj, "if_condition", label)?
        .ok_or_else(|| SpchtError::validation(label, "if_field without if_condition"))?;
    let op = CompareOp::parse(&lexeme).ok_or_else(|| {
        SpchtError::validation(label, format!("unknown if_condition '{}'", lexeme))
    })?;

    let value = match obj.get("if_value") {
        None => None,
        Some(Value::Array(items)) => {
            if !matches!(op, CompareOp::Eq | CompareOp::Ne) {
                return Err(SpchtError::validation(
                    label,
                    "a list if_value only works with == or !=",
                ));
            }
            let scalars = items
                .iter()
                .map(Scalar::from_json)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| {
                    SpchtError::validation(label, "if_value entries must be scalars")
                })?;
            Some(IfValue::Many(scalars))
        }
        Some(other) => Some(IfValue::One(Scalar::from_json(other).ok_or_else(
            || SpchtError::validation(label, "if_value must be a scalar or a list of scalars"),
        )?)),
    };

    if value.is_none() && op != CompareOp::Exists {
        return Err(SpchtError::validation(label, "if_condition without if_value"));
    }
    if value.is_some() && op == CompareOp::Exists {
        warn!(node = label, "if_value is ignored for the exi condition");
    }

    Ok(Some(Condition {
        field,
        op,
        value,
        xf: extract_transforms(obj, "if_", label)?,
    }))
}

// --- small typed readers -----------------------------------------------

fn opt_str(obj: &Map<String, Value>, key: &str, label: &str) -> SpchtResult<Option<String>> {
    match obj.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(SpchtError::validation(
            label,
            format!("'{}' must be a string", key),
        )),
    }
}

/// Read a key that holds a scalar, returning its string form
fn opt_scalar_text(obj: &Map<String, Value>, key: &str, label: &str) -> SpchtResult<Option<String>> {
    match obj.get(key) {
        None => Ok(None),
        Some(value) => scalar_text(value).map(Some).ok_or_else(|| {
            SpchtError::validation(label, format!("'{}' must be a scalar", key))
        }),
    }
}

fn opt_str_list(obj: &Map<String, Value>, key: &str, label: &str) -> SpchtResult<Vec<String>> {
    match obj.get(key) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    SpchtError::validation(label, format!("'{}' entries must be strings", key))
                })
            })
            .collect(),
        Some(_) => Err(SpchtError::validation(
            label,
            format!("'{}' must be a list of strings", key),
        )),
    }
}

fn opt_regex(obj: &Map<String, Value>, key: &str, label: &str) -> SpchtResult<Option<Regex>> {
    match opt_str(obj, key, label)? {
        None => Ok(None),
        Some(pattern) => compile_regex(&pattern).map(Some),
    }
}

fn compile_regex(pattern: &str) -> SpchtResult<Regex> {
    compile_regex_flags(pattern, false)
}

fn compile_regex_flags(pattern: &str, case_insensitive: bool) -> SpchtResult<Regex> {
    regex::RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| SpchtError::InvalidRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

fn scalar_text(value: &Value) -> Option<String> {
    Scalar::from_json(value).map(|s| s.as_text())
}

fn setting_bool(value: &Value, label: &str, key: &str) -> SpchtResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| SpchtError::validation(label, format!("{} must be a boolean", key)))
}
