//! Condition evaluator
//!
//! Evaluates an `if_*` guard against the record, independently of the
//! main value pipeline. The guard field is read through the accessor,
//! run through the reduced `if_` transforms, then compared.
//!
//! Absence models infinite negativity: a missing guard field satisfies
//! `!=`, `<` and `<=` and fails `==`, `>`, `>=` and `exi`.

use std::cmp::Ordering;

use tracing::debug;

use crate::descriptor::{CompareOp, Condition, IfValue};
use crate::record::{Record, Source};
use crate::value::Scalar;

use super::transform;

/// Evaluate one guard; `true` means the node proceeds
pub(crate) fn evaluate(cond: &Condition, source: Source, record: &Record) -> bool {
    let values = record.read(source, &cond.field);

    if cond.op == CompareOp::Exists {
        let exists = !values.is_empty();
        debug!(field = %cond.field, exists, "exi guard");
        return exists;
    }

    if values.is_empty() {
        // absence as infinite negativity
        return matches!(cond.op, CompareOp::Ne | CompareOp::Lt | CompareOp::Le);
    }

    let values = transform::apply_ref_pipeline(values, &cond.xf);

    match cond.value.as_ref() {
        Some(IfValue::Many(targets)) => match cond.op {
            // any pair equal
            CompareOp::Eq => values
                .iter()
                .any(|v| targets.iter().any(|t| v.loosely_eq(t))),
            // no pair equal
            CompareOp::Ne => !values
                .iter()
                .any(|v| targets.iter().any(|t| v.loosely_eq(t))),
            // rejected at load time
            _ => false,
        },
        Some(IfValue::One(target)) => values.iter().any(|v| satisfies(v, cond.op, target)),
        // unreachable for non-exi conditions, the loader enforces if_value
        None => false,
    }
}

fn satisfies(value: &Scalar, op: CompareOp, target: &Scalar) -> bool {
    let ordering = value.compare(target);
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Exists => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::RefTransforms;

    fn record() -> Record {
        Record::from_flat([
            ("status", vec![Scalar::from("active")]),
            ("year", vec![Scalar::Int(1808)]),
            ("codes", vec![Scalar::from("a"), Scalar::from("b")]),
        ])
    }

    fn cond(field: &str, op: CompareOp, value: Option<IfValue>) -> Condition {
        Condition {
            field: field.to_string(),
            op,
            value,
            xf: RefTransforms::default(),
        }
    }

    #[test]
    fn test_exi() {
        assert!(evaluate(
            &cond("status", CompareOp::Exists, None),
            Source::Flat,
            &record()
        ));
        assert!(!evaluate(
            &cond("missing", CompareOp::Exists, None),
            Source::Flat,
            &record()
        ));
    }

    #[test]
    fn test_absence_as_negativity() {
        let rec = record();
        let one = || Some(IfValue::One(Scalar::Int(5)));
        assert!(!evaluate(&cond("nope", CompareOp::Eq, one()), Source::Flat, &rec));
        assert!(!evaluate(&cond("nope", CompareOp::Gt, one()), Source::Flat, &rec));
        assert!(!evaluate(&cond("nope", CompareOp::Ge, one()), Source::Flat, &rec));
        assert!(evaluate(&cond("nope", CompareOp::Ne, one()), Source::Flat, &rec));
        assert!(evaluate(&cond("nope", CompareOp::Lt, one()), Source::Flat, &rec));
        assert!(evaluate(&cond("nope", CompareOp::Le, one()), Source::Flat, &rec));
    }

    #[test]
    fn test_numeric_coercion() {
        let rec = record();
        // int field against string target
        assert!(evaluate(
            &cond("year", CompareOp::Eq, Some(IfValue::One(Scalar::from("1808")))),
            Source::Flat,
            &rec
        ));
        assert!(evaluate(
            &cond("year", CompareOp::Gt, Some(IfValue::One(Scalar::from("1200")))),
            Source::Flat,
            &rec
        ));
        assert!(!evaluate(
            &cond("year", CompareOp::Lt, Some(IfValue::One(Scalar::Float(1000.5)))),
            Source::Flat,
            &rec
        ));
    }

    #[test]
    fn test_any_value_satisfies_scalar() {
        assert!(evaluate(
            &cond("codes", CompareOp::Eq, Some(IfValue::One(Scalar::from("b")))),
            Source::Flat,
            &record()
        ));
    }

    #[test]
    fn test_list_semantics() {
        let rec = record();
        let whitelist = IfValue::Many(vec![Scalar::from("x"), Scalar::from("b")]);
        assert!(evaluate(
            &cond("codes", CompareOp::Eq, Some(whitelist.clone())),
            Source::Flat,
            &rec
        ));
        // != holds only when no pair is equal
        assert!(!evaluate(
            &cond("codes", CompareOp::Ne, Some(whitelist)),
            Source::Flat,
            &rec
        ));
        let blacklist = IfValue::Many(vec![Scalar::from("x"), Scalar::from("y")]);
        assert!(evaluate(
            &cond("codes", CompareOp::Ne, Some(blacklist)),
            Source::Flat,
            &rec
        ));
    }

    #[test]
    fn test_if_transforms_apply_before_compare() {
        let rec = Record::from_flat([("sigil", vec![Scalar::from("(DE-15)loc")])]);
        let condition = Condition {
            field: "sigil".to_string(),
            op: CompareOp::Eq,
            value: Some(IfValue::One(Scalar::from("loc"))),
            xf: RefTransforms {
                cut: Some(regex::Regex::new(r"^\([^)]*\)").unwrap()),
                ..RefTransforms::default()
            },
        };
        assert!(evaluate(&condition, Source::Flat, &rec));
    }
}
