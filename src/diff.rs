//! Minimal-update computation between two versions of a document.
//!
//! The result is a flat map from dotted field path to the value to write
//! there: a literal value, [`DocValue::Null`] to clear the field (the wire
//! protocol has no delete transform, so removal is a literal null write), or a
//! [`DocValue::Transform`] when the change can be expressed as an atomic
//! server-side array operation. The map is itself a valid partial document for
//! [`Collection::update`](crate::Collection::update).

use std::collections::{BTreeMap, BTreeSet};

use crate::transform::Transform;
use crate::value::{append_path, DocValue};

/// Computes the minimal field-path map turning `previous` into `next`.
pub fn compute_diff(next: &DocValue, previous: &DocValue) -> BTreeMap<String, DocValue> {
    let mut result = BTreeMap::new();
    diff_value(Some(next), Some(previous), "", &mut result);
    result
}

fn diff_value(
    next: Option<&DocValue>,
    previous: Option<&DocValue>,
    path: &str,
    result: &mut BTreeMap<String, DocValue>,
) {
    if next == previous {
        return;
    }
    match next {
        None => {
            // Field present before, absent now.
            result.insert(path.to_string(), DocValue::Null);
        }
        Some(DocValue::Null) => {
            result.insert(path.to_string(), DocValue::Null);
        }
        Some(
            value @ (DocValue::Boolean(_)
            | DocValue::Integer(_)
            | DocValue::Double(_)
            | DocValue::String(_)
            | DocValue::Timestamp(_)),
        ) => {
            // Scalars are never partially diffed.
            result.insert(path.to_string(), value.clone());
        }
        Some(value @ DocValue::Transform(_)) => {
            // An explicitly requested transform passes through at its path.
            result.insert(path.to_string(), value.clone());
        }
        Some(DocValue::List(values)) => diff_list(values, previous, path, result),
        Some(DocValue::Map(fields)) => diff_map(fields, previous, path, result),
    }
}

/// Array diff: set-style comparison for all-primitive arrays, wholesale
/// overwrite otherwise.
///
/// Ordering and duplicate-count changes within an identical element set
/// produce no entry; this approximation keeps single-element edits atomic at
/// the cost of ignoring reorders.
fn diff_list(
    values: &[DocValue],
    previous: Option<&DocValue>,
    path: &str,
    result: &mut BTreeMap<String, DocValue>,
) {
    let previous_values = match previous.and_then(DocValue::as_list) {
        Some(previous_values) => previous_values,
        // No array before: just set the values.
        None => {
            result.insert(path.to_string(), DocValue::List(values.to_vec()));
            return;
        }
    };

    // Transforms only hold value-comparable primitives; anything else is an
    // overwrite.
    if !values.iter().all(DocValue::is_primitive) {
        result.insert(path.to_string(), DocValue::List(values.to_vec()));
        return;
    }

    let mut to_add = Vec::new();
    let mut to_remove = Vec::new();
    for value in values {
        if !previous_values.contains(value) {
            to_add.push(value.clone());
        }
    }
    for value in previous_values {
        if !values.contains(value) {
            to_remove.push(value.clone());
        }
    }

    if !to_add.is_empty() && !to_remove.is_empty() {
        // No single atomic transform expresses "add X and remove Y".
        result.insert(path.to_string(), DocValue::List(values.to_vec()));
    } else if !to_add.is_empty() {
        result.insert(
            path.to_string(),
            DocValue::Transform(Transform::append_to_array(to_add)),
        );
    } else if !to_remove.is_empty() {
        result.insert(
            path.to_string(),
            DocValue::Transform(Transform::remove_from_array(to_remove)),
        );
    }
}

fn diff_map(
    fields: &BTreeMap<String, DocValue>,
    previous: Option<&DocValue>,
    path: &str,
    result: &mut BTreeMap<String, DocValue>,
) {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut key_contains_dots = false;

    for (key, value) in fields {
        if key.contains('.') {
            // Pre-joined path: compare against the nested position it
            // resolves to, and emit it verbatim.
            key_contains_dots = true;
            let previous_at = resolve_path(previous, key);
            diff_value(Some(value), previous_at, &append_path(path, key), result);
            continue;
        }
        seen.insert(key);
        let previous_field = previous
            .and_then(DocValue::as_map)
            .and_then(|fields| fields.get(key));
        diff_value(Some(value), previous_field, &append_path(path, key), result);
    }

    // Keys that disappeared are cleared, unless any dotted key was present:
    // a targeted nested write must not delete siblings it never mentioned.
    // The switch is for the whole object level, not per key.
    if key_contains_dots {
        return;
    }
    if let Some(DocValue::Map(previous_fields)) = previous {
        for key in previous_fields.keys() {
            if !seen.contains(key.as_str()) {
                result.insert(append_path(path, key), DocValue::Null);
            }
        }
    }
}

/// Resolves a dotted path against a value, descending maps by key and lists
/// by index.
fn resolve_path<'a>(value: Option<&'a DocValue>, path: &str) -> Option<&'a DocValue> {
    let mut current = value?;
    for segment in path.split('.') {
        current = match current {
            DocValue::Map(fields) => fields.get(segment)?,
            DocValue::List(values) => values.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
