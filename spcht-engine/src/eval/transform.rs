//! Value transformer
//!
//! Pure per-value operations in their fixed pipeline order: match filter,
//! mapping, cut+replace, affixes, template insertion. Every function
//! takes and returns scalar sequences with order preserved; dropping is
//! the only way a value disappears.

use tracing::debug;

use crate::descriptor::{InsertTemplate, RefTransforms, ValueMapping};
use crate::record::{Record, Source};
use crate::value::Scalar;

/// Keep only values whose string form matches
///
/// Search semantics: the author anchors when needed, and a matching
/// value is kept whole.
pub(crate) fn filter_match(values: Vec<Scalar>, matcher: Option<&regex::Regex>) -> Vec<Scalar> {
    let Some(matcher) = matcher else {
        return values;
    };
    values
        .into_iter()
        .filter(|v| matcher.is_match(&v.as_text()))
        .collect()
}

/// Apply a mapping to a value sequence
///
/// Hits are replaced, misses inherit or drop, and `$default` fires as a
/// single output only when nothing at all survived.
pub(crate) fn apply_mapping(values: Vec<Scalar>, mapping: &ValueMapping) -> Vec<Scalar> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        match mapping.lookup(&value.as_text()) {
            Some(hit) => out.push(Scalar::Str(hit.to_string())),
            None if mapping.inherit => out.push(value),
            None => {}
        }
    }
    if out.is_empty() {
        if let Some(default) = &mapping.default {
            out.push(Scalar::Str(default.clone()));
        }
    }
    out
}

/// Cut+replace every occurrence, then wrap with the affixes
///
/// Always yields string scalars; the value count never changes here.
pub(crate) fn rewrite(values: Vec<Scalar>, xf: &RefTransforms) -> Vec<Scalar> {
    values
        .into_iter()
        .map(|value| {
            let text = value.as_text();
            let cut = match &xf.cut {
                Some(cut) => cut.replace_all(&text, xf.replace.as_str()).into_owned(),
                None => text,
            };
            Scalar::Str(format!("{}{}{}", xf.prepend, cut, xf.append))
        })
        .collect()
}

/// The reduced pipeline used by field refs and `if_*` slots
pub(crate) fn apply_ref_pipeline(values: Vec<Scalar>, xf: &RefTransforms) -> Vec<Scalar> {
    rewrite(filter_match(values, xf.matcher.as_ref()), xf)
}

/// Expand an `insert_into` template over the main values and add fields
///
/// Slots are combined as a cartesian product in field-major order (the
/// main value varies slowest). A combination with any empty slot value
/// is dropped. A template whose placeholder count does not match its
/// fields yields nothing; the loader already warned about it.
pub(crate) fn expand_insert(
    main: &[Scalar],
    insert: &InsertTemplate,
    source: Source,
    record: &Record,
) -> Vec<Scalar> {
    if !insert.arity_ok() {
        debug!(template = %insert.template, "placeholder arity mismatch, template disabled");
        return Vec::new();
    }

    let mut columns: Vec<Vec<String>> = Vec::with_capacity(1 + insert.add_fields.len());
    columns.push(main.iter().map(Scalar::as_text).collect());
    for add in &insert.add_fields {
        let extracted = record.read(source, &add.field);
        let values = apply_ref_pipeline(extracted, &add.xf);
        if values.is_empty() {
            // an empty slot can never fill its placeholder
            return Vec::new();
        }
        columns.push(values.iter().map(Scalar::as_text).collect());
    }

    cartesian(&columns)
        .into_iter()
        .filter_map(|combo| {
            if combo.iter().any(|part| part.is_empty()) {
                return None;
            }
            Some(Scalar::Str(fill_template(&insert.template, &combo)))
        })
        .collect()
}

/// All slot combinations, first column varying slowest
fn cartesian(columns: &[Vec<String>]) -> Vec<Vec<String>> {
    let mut combos: Vec<Vec<String>> = vec![Vec::new()];
    for column in columns {
        let mut next = Vec::with_capacity(combos.len() * column.len());
        for combo in &combos {
            for value in column {
                let mut extended = combo.clone();
                extended.push(value.clone());
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}

/// Substitute the `{}` placeholders positionally
///
/// The caller guarantees `parts.len()` equals the placeholder count.
fn fill_template(template: &str, parts: &[String]) -> String {
    let segments: Vec<&str> = template.split("{}").collect();
    let mut out = String::with_capacity(template.len());
    for (i, segment) in segments.iter().enumerate() {
        out.push_str(segment);
        if let Some(part) = parts.get(i) {
            out.push_str(part);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldRef;
    use regex::Regex;

    fn strs(texts: &[&str]) -> Vec<Scalar> {
        texts.iter().map(|t| Scalar::from(*t)).collect()
    }

    #[test]
    fn test_match_keeps_whole_value() {
        let matcher = Regex::new("aut").unwrap();
        let out = filter_match(strs(&["author", "editor"]), Some(&matcher));
        assert_eq!(out, strs(&["author"]));
    }

    #[test]
    fn test_rewrite_cut_all_occurrences() {
        let xf = RefTransforms {
            cut: Some(Regex::new("o").unwrap()),
            replace: "0".to_string(),
            ..RefTransforms::default()
        };
        assert_eq!(rewrite(strs(&["motto"]), &xf), strs(&["m0tt0"]));
    }

    #[test]
    fn test_rewrite_affixes_and_stringify() {
        let xf = RefTransforms {
            prepend: "<".to_string(),
            append: ">".to_string(),
            ..RefTransforms::default()
        };
        assert_eq!(rewrite(vec![Scalar::Int(7)], &xf), strs(&["<7>"]));
    }

    #[test]
    fn test_mapping_default_only_without_hits() {
        let mapping = ValueMapping {
            entries: vec![("aut".to_string(), "U:aut".to_string())],
            default: Some("U:unknown".to_string()),
            casesens: true,
            ..ValueMapping::default()
        };
        // one hit suppresses the default and drops the miss
        assert_eq!(
            apply_mapping(strs(&["aut", "xyz"]), &mapping),
            strs(&["U:aut"])
        );
        // no hit at all: exactly one default
        assert_eq!(apply_mapping(strs(&["xyz", "zzz"]), &mapping), strs(&["U:unknown"]));
    }

    #[test]
    fn test_mapping_inherit_passes_misses() {
        let mapping = ValueMapping {
            entries: vec![("a".to_string(), "A".to_string())],
            inherit: true,
            casesens: true,
            ..ValueMapping::default()
        };
        assert_eq!(apply_mapping(strs(&["a", "b"]), &mapping), strs(&["A", "b"]));
    }

    #[test]
    fn test_cartesian_is_field_major() {
        let combos = cartesian(&[
            vec!["a1".to_string(), "a2".to_string()],
            vec!["b1".to_string(), "b2".to_string()],
        ]);
        assert_eq!(
            combos,
            vec![
                vec!["a1".to_string(), "b1".to_string()],
                vec!["a1".to_string(), "b2".to_string()],
                vec!["a2".to_string(), "b1".to_string()],
                vec!["a2".to_string(), "b2".to_string()],
            ]
        );
    }

    #[test]
    fn test_expand_insert() {
        let record = Record::from_flat([("lib", vec![Scalar::from("01")])]);
        let insert = InsertTemplate {
            template: "/org/{}/dep/zw{}".to_string(),
            add_fields: vec![FieldRef {
                field: "lib".to_string(),
                xf: RefTransforms::default(),
            }],
            placeholders: 2,
        };
        let out = expand_insert(&strs(&["DE-15"]), &insert, Source::Flat, &record);
        assert_eq!(out, strs(&["/org/DE-15/dep/zw01"]));
    }

    #[test]
    fn test_expand_insert_empty_slot_drops_everything() {
        let record = Record::from_flat([("present", vec![Scalar::from("x")])]);
        let insert = InsertTemplate {
            template: "{}-{}".to_string(),
            add_fields: vec![FieldRef {
                field: "absent".to_string(),
                xf: RefTransforms::default(),
            }],
            placeholders: 2,
        };
        assert!(expand_insert(&strs(&["x"]), &insert, Source::Flat, &record).is_empty());
    }

    #[test]
    fn test_expand_insert_arity_mismatch_disables() {
        let record = Record::from_flat([("lib", vec![Scalar::from("01")])]);
        let insert = InsertTemplate {
            template: "{} and {} and {}".to_string(),
            add_fields: vec![FieldRef {
                field: "lib".to_string(),
                xf: RefTransforms::default(),
            }],
            placeholders: 3,
        };
        assert!(expand_insert(&strs(&["x"]), &insert, Source::Flat, &record).is_empty());
    }
}
