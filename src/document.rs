use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::error::{encoding, StoreResult};
use crate::value::{decode_fields, parse_timestamp, DocValue};

/// Fixed root prefix separating the database resource name from the logical
/// document path inside it.
pub(crate) const DOCUMENTS_PATH_SEPARATOR: &str = "/databases/(default)/documents/";

/// Identity and lifecycle metadata of a fetched document.
///
/// Recomputed from the wire response on every decode; never persisted by the
/// application.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentMetadata {
    pub id: String,
    /// Logical path of the document relative to the database root.
    pub path: String,
    /// Path of the collection the document lives in.
    pub collection: String,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// A decoded document: its field data plus identity metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchedDocument {
    pub meta: DocumentMetadata,
    /// The decoded fields; always a [`DocValue::Map`].
    pub data: DocValue,
}

/// Decodes a wire document body into a [`FetchedDocument`].
///
/// A body without `fields` decodes to `None` — it represents "no data" and no
/// metadata is derived for it.
pub fn decode_document(body: &JsonValue) -> StoreResult<Option<FetchedDocument>> {
    let fields = match body.get("fields") {
        Some(fields) => fields,
        None => return Ok(None),
    };
    let data = DocValue::Map(decode_fields(fields)?);

    let name = body
        .get("name")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| encoding("Document body missing 'name'"))?;
    let path = name
        .split_once(DOCUMENTS_PATH_SEPARATOR)
        .map(|(_, relative)| relative)
        .ok_or_else(|| encoding(format!("Unexpected document resource name: {name}")))?;

    let mut segments: Vec<&str> = path.split('/').collect();
    let id = segments
        .pop()
        .ok_or_else(|| encoding(format!("Document name has no id segment: {name}")))?;
    let collection = segments.join("/");

    Ok(Some(FetchedDocument {
        meta: DocumentMetadata {
            id: id.to_string(),
            path: path.to_string(),
            collection,
            create_time: time_field(body, "createTime")?,
            update_time: time_field(body, "updateTime")?,
        },
        data,
    }))
}

fn time_field(body: &JsonValue, key: &str) -> StoreResult<DateTime<Utc>> {
    let value = body
        .get(key)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| encoding(format!("Document body missing '{key}'")))?;
    parse_timestamp(value)
}
