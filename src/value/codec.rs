use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map as JsonMap, Value as JsonValue};

use crate::error::{encoding, StoreResult};
use crate::transform::{FieldTransform, Transform};
use crate::value::DocValue;

/// Appends a segment to a dotted field path.
pub(crate) fn append_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}

/// Encodes a single value into its wire representation.
///
/// Returns `None` when the value contributes nothing to the literal fields
/// payload: a [`Transform`] is recorded into `transforms` together with `path`
/// (the dotted position it occupied in the document) instead of being encoded
/// structurally. A transform nested inside a list cannot be recorded (the
/// wire addresses transforms by field path, not array slot) and is skipped
/// with a warning; the surrounding list keeps its literal elements.
pub fn encode_value(
    value: &DocValue,
    path: &str,
    transforms: &mut Vec<FieldTransform>,
) -> Option<JsonValue> {
    match value {
        DocValue::Transform(transform) => {
            transforms.push(FieldTransform::new(path, transform.clone()));
            None
        }
        DocValue::Null => Some(json!({ "nullValue": JsonValue::Null })),
        DocValue::Boolean(value) => Some(json!({ "booleanValue": value })),
        DocValue::Integer(value) => Some(json!({ "integerValue": value.to_string() })),
        DocValue::Double(value) => Some(json!({ "doubleValue": encode_double(*value) })),
        DocValue::String(value) => Some(json!({ "stringValue": value })),
        DocValue::Timestamp(value) => Some(json!({ "timestampValue": encode_timestamp(value) })),
        DocValue::List(values) => {
            let encoded: Vec<JsonValue> = values
                .iter()
                .enumerate()
                .filter_map(|(index, element)| {
                    if let DocValue::Transform(_) = element {
                        // Transforms target a field, not an array slot.
                        log::warn!("ignoring transform inside array at {path}.{index}");
                        return None;
                    }
                    encode_value(element, &append_path(path, &index.to_string()), transforms)
                })
                .collect();
            Some(json!({ "arrayValue": { "values": encoded } }))
        }
        DocValue::Map(fields) => Some(json!({
            "mapValue": { "fields": encode_fields_at(fields, path, transforms) }
        })),
    }
}

/// Encodes a document's fields into the wire `fields` object, collecting any
/// embedded transforms into `transforms`.
///
/// A key containing a literal dot is treated as "set this nested field": the
/// encoded value is inserted at the nested `mapValue.fields.*` position the
/// dot-segments imply, not under a literal dotted key.
pub fn encode_fields(
    fields: &BTreeMap<String, DocValue>,
    transforms: &mut Vec<FieldTransform>,
) -> JsonValue {
    encode_fields_at(fields, "", transforms)
}

fn encode_fields_at(
    fields: &BTreeMap<String, DocValue>,
    path: &str,
    transforms: &mut Vec<FieldTransform>,
) -> JsonValue {
    let mut result = JsonMap::new();
    for (key, value) in fields {
        let encoded = match encode_value(value, &append_path(path, key), transforms) {
            Some(encoded) => encoded,
            None => continue,
        };
        if key.contains('.') {
            let segments: Vec<&str> = key.split('.').collect();
            insert_nested(&mut result, &segments, encoded);
        } else {
            result.insert(key.clone(), encoded);
        }
    }
    JsonValue::Object(result)
}

/// Inserts `value` under the nested map structure described by `segments`:
/// the first segment is a top-level field, each following one a field of the
/// enclosing `mapValue`.
fn insert_nested(map: &mut JsonMap<String, JsonValue>, segments: &[&str], value: JsonValue) {
    if segments.len() == 1 {
        map.insert(segments[0].to_string(), value);
        return;
    }
    let entry = map
        .entry(segments[0].to_string())
        .or_insert_with(|| json!({ "mapValue": { "fields": {} } }));
    if entry.pointer("/mapValue/fields").map_or(true, |fields| !fields.is_object()) {
        *entry = json!({ "mapValue": { "fields": {} } });
    }
    let fields = entry
        .pointer_mut("/mapValue/fields")
        .and_then(JsonValue::as_object_mut)
        .expect("mapValue wrapper was just ensured");
    insert_nested(fields, &segments[1..], value);
}

/// Decodes a wire value back into a [`DocValue`].
///
/// A JSON object carrying none of the protocol's value tags is passed through
/// key by key as a best-effort plain map; this is a defensive fallback and not
/// expected in well-formed wire data.
pub fn decode_value(value: &JsonValue) -> StoreResult<DocValue> {
    let object = match value {
        JsonValue::Null => return Ok(DocValue::Null),
        JsonValue::Bool(value) => return Ok(DocValue::Boolean(*value)),
        JsonValue::Number(number) => {
            return Ok(match number.as_i64() {
                Some(value) => DocValue::Integer(value),
                None => DocValue::Double(number.as_f64().unwrap_or(f64::NAN)),
            });
        }
        JsonValue::String(value) => return Ok(DocValue::String(value.clone())),
        JsonValue::Array(values) => {
            let decoded = values.iter().map(decode_value).collect::<StoreResult<Vec<_>>>()?;
            return Ok(DocValue::List(decoded));
        }
        JsonValue::Object(object) => object,
    };

    if object.contains_key("nullValue") {
        return Ok(DocValue::Null);
    }
    if let Some(string_value) = object.get("stringValue") {
        let value = string_value
            .as_str()
            .ok_or_else(|| encoding("stringValue must be a string"))?;
        return Ok(DocValue::String(value.to_string()));
    }
    if let Some(double_value) = object.get("doubleValue") {
        let parsed = match double_value {
            JsonValue::Number(number) => number
                .as_f64()
                .ok_or_else(|| encoding("Invalid doubleValue"))?,
            // The wire protocol spells non-finite doubles as strings.
            JsonValue::String(value) => value
                .parse::<f64>()
                .map_err(|err| encoding(format!("Invalid doubleValue: {err}")))?,
            _ => return Err(encoding("doubleValue must be a number or string")),
        };
        return Ok(DocValue::Double(parsed));
    }
    if let Some(integer_value) = object.get("integerValue") {
        let parsed = match integer_value {
            JsonValue::String(value) => i64::from_str(value)
                .map_err(|err| encoding(format!("Invalid integerValue: {err}")))?,
            JsonValue::Number(number) => number
                .as_i64()
                .ok_or_else(|| encoding("integerValue out of range"))?,
            _ => return Err(encoding("integerValue must be a string or number")),
        };
        return Ok(DocValue::Integer(parsed));
    }
    if let Some(boolean_value) = object.get("booleanValue") {
        let value = boolean_value
            .as_bool()
            .ok_or_else(|| encoding("booleanValue must be a bool"))?;
        return Ok(DocValue::Boolean(value));
    }
    if let Some(timestamp_value) = object.get("timestampValue") {
        let value = timestamp_value
            .as_str()
            .ok_or_else(|| encoding("timestampValue must be a string"))?;
        return Ok(DocValue::Timestamp(parse_timestamp(value)?));
    }
    if let Some(map_value) = object.get("mapValue") {
        let empty = JsonMap::new();
        let fields = map_value
            .get("fields")
            .and_then(JsonValue::as_object)
            .unwrap_or(&empty);
        return Ok(DocValue::Map(decode_fields_map(fields)?));
    }
    if let Some(array_value) = object.get("arrayValue") {
        let decoded = match array_value.get("values").and_then(JsonValue::as_array) {
            Some(values) => values.iter().map(decode_value).collect::<StoreResult<Vec<_>>>()?,
            None => Vec::new(),
        };
        return Ok(DocValue::List(decoded));
    }

    // Untagged object: pass through key by key.
    Ok(DocValue::Map(decode_fields_map(object)?))
}

/// Decodes a wire `fields` object into an ordered field map.
pub fn decode_fields(fields: &JsonValue) -> StoreResult<BTreeMap<String, DocValue>> {
    let object = fields
        .as_object()
        .ok_or_else(|| encoding("Expected 'fields' to be an object"))?;
    decode_fields_map(object)
}

fn decode_fields_map(object: &JsonMap<String, JsonValue>) -> StoreResult<BTreeMap<String, DocValue>> {
    let mut fields = BTreeMap::new();
    for (key, value) in object {
        fields.insert(key.clone(), decode_value(value)?);
    }
    Ok(fields)
}

/// Encodes a collected field transform into the wire `fieldTransforms` entry.
pub fn encode_field_transform(transform: &FieldTransform) -> JsonValue {
    let payload = match transform.transform() {
        Transform::ServerTimestamp => json!("REQUEST_TIME"),
        Transform::Increment(amount) | Transform::Min(amount) | Transform::Max(amount) => {
            encode_scalar(&DocValue::from_double(*amount))
        }
        Transform::AppendToArray(values) | Transform::RemoveFromArray(values) => {
            let encoded: Vec<JsonValue> = values
                .iter()
                .filter_map(|value| encode_value(value, "", &mut Vec::new()))
                .collect();
            json!({ "values": encoded })
        }
    };
    let mut object = JsonMap::new();
    object.insert("fieldPath".to_string(), json!(transform.field_path()));
    object.insert(transform.transform().wire_op().to_string(), payload);
    JsonValue::Object(object)
}

fn encode_scalar(value: &DocValue) -> JsonValue {
    encode_value(value, "", &mut Vec::new()).expect("scalar values always encode")
}

/// Non-finite doubles have no JSON literal; the wire spells them as strings.
fn encode_double(value: f64) -> JsonValue {
    if value.is_finite() {
        json!(value)
    } else if value.is_nan() {
        json!("NaN")
    } else if value.is_sign_positive() {
        json!("Infinity")
    } else {
        json!("-Infinity")
    }
}

fn encode_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|datetime| datetime.with_timezone(&Utc))
        .map_err(|err| encoding(format!("Invalid timestamp: {err}")))
}
