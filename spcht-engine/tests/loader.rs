//! Descriptor loading, reference resolution and validation

use std::fs;

use serde_json::{json, Value};
use spcht_engine::{DescriptorLoader, Record, SpchtError};
use tempfile::TempDir;

fn write_json(dir: &TempDir, name: &str, value: &Value) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

#[test]
fn ref_mapping_is_inlined_with_local_precedence() {
    let dir = TempDir::new().unwrap();
    write_json(
        &dir,
        "roles.json",
        &json!({"aut": "U:ref_author", "edt": "U:editor"}),
    );
    let descriptor_path = write_json(
        &dir,
        "mapping.spcht.json",
        &json!({
            "id_source": "flat",
            "id_field": "id",
            "nodes": [{
                "source": "flat",
                "field": "role",
                "predicate": "P:role",
                "required": "optional",
                "mapping": {"aut": "U:local_author"},
                "mapping_settings": {"$ref": "roles.json"}
            }]
        }),
    );

    let descriptor = DescriptorLoader::from_file(&descriptor_path)
        .unwrap()
        .compile()
        .unwrap();

    // local entry wins on collision, referenced entries fill the rest
    let rec = Record::from_json(&json!({"id": "1", "role": ["aut", "edt"]})).unwrap();
    let out = descriptor.process(&rec, "").unwrap();
    let objects: Vec<&str> = out.triples.iter().map(|t| t.object.lexical()).collect();
    assert_eq!(objects, vec!["U:local_author", "U:editor"]);

    // the exported document is self-contained: merged mapping, no $ref left
    let exported = descriptor.export_inlined();
    let node = &exported["nodes"][0];
    assert_eq!(node["mapping"]["edt"], "U:editor");
    assert_eq!(node["mapping"]["aut"], "U:local_author");
    assert!(node.get("mapping_settings").is_none());
}

#[test]
fn joined_map_ref_is_inlined() {
    let dir = TempDir::new().unwrap();
    write_json(&dir, "roles.json", &json!({"fmd": "P:film"}));
    let descriptor_path = write_json(
        &dir,
        "mapping.spcht.json",
        &json!({
            "id_source": "flat",
            "id_field": "id",
            "nodes": [{
                "source": "flat",
                "field": "author2",
                "predicate": "P:contributor",
                "joined_field": "author2_role",
                "joined_map": {"act": "P:acts"},
                "joined_map_ref": "roles.json",
                "required": "optional"
            }]
        }),
    );

    let descriptor = DescriptorLoader::from_file(&descriptor_path)
        .unwrap()
        .compile()
        .unwrap();
    let rec = Record::from_json(
        &json!({"id": "1", "author2": ["W", "O"], "author2_role": ["fmd", "act"]}),
    )
    .unwrap();
    let out = descriptor.process(&rec, "").unwrap();
    let predicates: Vec<&str> = out.triples.iter().map(|t| t.predicate.as_str()).collect();
    assert_eq!(predicates, vec!["P:film", "P:acts"]);
}

#[test]
fn missing_reference_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let descriptor_path = write_json(
        &dir,
        "mapping.spcht.json",
        &json!({
            "id_source": "flat",
            "id_field": "id",
            "nodes": [{
                "source": "flat",
                "field": "role",
                "predicate": "P:role",
                "required": "optional",
                "mapping_settings": {"$ref": "nowhere.json"}
            }]
        }),
    );
    let err = DescriptorLoader::from_file(&descriptor_path)
        .unwrap()
        .compile()
        .unwrap_err();
    assert!(matches!(err, SpchtError::Reference { .. }));
}

#[test]
fn nested_reference_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_json(&dir, "bad.json", &json!({"aut": {"deep": "no"}}));
    let descriptor_path = write_json(
        &dir,
        "mapping.spcht.json",
        &json!({
            "id_source": "flat",
            "id_field": "id",
            "nodes": [{
                "source": "flat",
                "field": "role",
                "predicate": "P:role",
                "required": "optional",
                "mapping_settings": {"$ref": "bad.json"}
            }]
        }),
    );
    let err = DescriptorLoader::from_file(&descriptor_path)
        .unwrap()
        .compile()
        .unwrap_err();
    assert!(matches!(err, SpchtError::Reference { .. }));
}

#[test]
fn refs_resolve_inside_fallback_and_sub_nodes() {
    let dir = TempDir::new().unwrap();
    write_json(&dir, "m.json", &json!({"k": "V"}));
    let descriptor_path = write_json(
        &dir,
        "mapping.spcht.json",
        &json!({
            "id_source": "flat",
            "id_field": "id",
            "nodes": [{
                "source": "flat",
                "field": "a",
                "predicate": "P:a",
                "required": "optional",
                "fallback": {
                    "source": "flat",
                    "field": "b",
                    "mapping_settings": {"$ref": "m.json"}
                },
                "sub_nodes": [{
                    "source": "flat",
                    "field": "c",
                    "predicate": "P:c",
                    "mapping_settings": {"$ref": "m.json"}
                }]
            }]
        }),
    );
    let descriptor = DescriptorLoader::from_file(&descriptor_path)
        .unwrap()
        .compile()
        .unwrap();
    let rec = Record::from_json(&json!({"id": "1", "b": "k"})).unwrap();
    let out = descriptor.process(&rec, "").unwrap();
    assert_eq!(out.triples[0].object.lexical(), "V");
}

#[test]
fn unknown_root_key_is_rejected() {
    let err = DescriptorLoader::from_value(
        json!({
            "id_source": "flat",
            "id_field": "id",
            "frobnicate": true,
            "nodes": []
        }),
        ".",
    )
    .compile()
    .unwrap_err();
    assert!(matches!(err, SpchtError::UnknownKey { key, .. } if key == "frobnicate"));
}

#[test]
fn root_comment_keys_are_tolerated() {
    assert!(DescriptorLoader::from_value(
        json!({
            "id_source": "flat",
            "id_field": "id",
            "comment": "descriptor for the test suite",
            "comment_author": "team",
            "nodes": []
        }),
        ".",
    )
    .compile()
    .is_ok());
}

#[test]
fn head_slots_are_required() {
    let err = DescriptorLoader::from_value(json!({"id_field": "id", "nodes": []}), ".")
        .compile()
        .unwrap_err();
    assert!(matches!(err, SpchtError::Validation { .. }));

    let err = DescriptorLoader::from_value(json!({"id_source": "flat", "nodes": []}), ".")
        .compile()
        .unwrap_err();
    assert!(matches!(err, SpchtError::Validation { .. }));
}

#[test]
fn head_accepts_per_head_transform_slots() {
    let descriptor = DescriptorLoader::from_value(
        json!({
            "id_source": "flat",
            "id_field": "id",
            "id_cut": "^rec-",
            "id_replace": "",
            "nodes": []
        }),
        ".",
    )
    .compile()
    .unwrap();
    let rec = Record::from_json(&json!({"id": "rec-42"})).unwrap();
    // the head pipeline applies before the subject is fixed
    let out = descriptor.process(&rec, "s:").unwrap();
    assert!(out.triples.is_empty());
    // subject shows up once a node emits
    let descriptor = DescriptorLoader::from_value(
        json!({
            "id_source": "flat",
            "id_field": "id",
            "id_cut": "^rec-",
            "id_replace": "",
            "nodes": [
                {"source": "flat", "field": "id", "predicate": "P:raw", "required": "optional"}
            ]
        }),
        ".",
    )
    .compile()
    .unwrap();
    let out = descriptor.process(&rec, "s:").unwrap();
    assert_eq!(out.triples[0].subject, "s:42");
}

#[test]
fn referenced_fields_and_predicates_enumerate_the_tree() {
    let descriptor = DescriptorLoader::from_value(
        json!({
            "id_source": "flat",
            "id_field": "id",
            "nodes": [{
                "source": "flat",
                "field": "a",
                "alternatives": ["a2"],
                "predicate": "P:a",
                "required": "optional",
                "if_field": "flag",
                "if_condition": "exi",
                "insert_into": "{}{}",
                "insert_add_fields": [{"field": "extra"}],
                "fallback": {
                    "source": "flat",
                    "field": "b",
                    "predicate": "P:b"
                }
            }, {
                "source": "flat",
                "field": "j",
                "predicate": "P:j",
                "joined_field": "j_role",
                "joined_map": {"x": "P:x"},
                "required": "optional"
            }]
        }),
        ".",
    )
    .compile()
    .unwrap();

    assert_eq!(
        descriptor.referenced_fields(),
        vec!["a", "a2", "b", "extra", "flag", "id", "j", "j_role"]
    );
    assert_eq!(
        descriptor.referenced_predicates(),
        vec!["P:a", "P:b", "P:j", "P:x"]
    );
}

#[test]
fn marc_fields_are_not_in_flat_enumeration() {
    let descriptor = DescriptorLoader::from_value(
        json!({
            "id_source": "flat",
            "id_field": "id",
            "nodes": [{
                "source": "marc",
                "field": "028:a",
                "predicate": "P:x",
                "required": "optional"
            }]
        }),
        ".",
    )
    .compile()
    .unwrap();
    assert_eq!(descriptor.referenced_fields(), vec!["id"]);
}
