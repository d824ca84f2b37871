use std::collections::BTreeMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::Method;
use serde_json::{json, Value as JsonValue};
use url::form_urlencoded;

use crate::document::{decode_document, FetchedDocument};
use crate::error::{validation, StoreResult};
use crate::query::{encode_query, Query};
use crate::value::{append_path, encode_field_transform, encode_fields, DocValue};

use super::{Connection, NoopTokenProvider, TokenProviderArc};
use std::sync::Arc;

const API_HOST: &str = "https://firestore.googleapis.com";
const API_VERSION: &str = "v1";

/// Beyond this many mask paths a direct PATCH risks overlong request URLs;
/// the write goes through `:commit` instead.
const MAX_PATCH_MASK_PATHS: usize = 40;

/// Characters that cannot ride verbatim in a URL path.
const PATH_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'#');

#[derive(Clone, Debug)]
pub struct RemoteStoreConfig {
    pub project_id: String,
    pub api_key: String,
}

/// HTTP client for the remote document database.
///
/// Builds request URLs and bodies from the codecs, translates HTTP failures
/// into typed errors and decides how each write travels: plain field-masked
/// PATCH, or a batched `:commit` when transforms are involved. Construction
/// is explicit; there is no process-wide instance.
#[derive(Clone)]
pub struct RemoteStore {
    connection: Connection,
    config: RemoteStoreConfig,
    root: String,
    host: String,
}

impl RemoteStore {
    pub fn new(config: RemoteStoreConfig) -> StoreResult<Self> {
        Self::with_token_provider(config, Arc::new(NoopTokenProvider))
    }

    pub fn with_token_provider(
        config: RemoteStoreConfig,
        token_provider: TokenProviderArc,
    ) -> StoreResult<Self> {
        let connection = Connection::new(token_provider)?;
        let root = format!("projects/{}/databases/(default)/documents", config.project_id);
        Ok(Self {
            connection,
            config,
            root,
            host: API_HOST.to_string(),
        })
    }

    /// Points the store at a different API host, e.g. a local emulator.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Fully-qualified resource name of a document.
    fn document_name(&self, path: &str) -> String {
        format!("{}/{}", self.root, path)
    }

    fn build_url(&self, path: &str, action: &str, params: &[(String, String)]) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("key", &self.config.api_key);
        for (name, value) in params {
            query.append_pair(name, value);
        }
        let normalized = if path.is_empty() {
            String::new()
        } else {
            format!("/{}", utf8_percent_encode(path.trim_start_matches('/'), PATH_ENCODE_SET))
        };
        format!(
            "{host}/{API_VERSION}/{root}{normalized}{action}?{query}",
            host = self.host,
            root = self.root,
            query = query.finish()
        )
    }

    /// Fetches a single document; a missing document is an absent value, not
    /// an error.
    pub async fn get(&self, path: &str) -> StoreResult<Option<FetchedDocument>> {
        match self.get_strict(path).await {
            Ok(document) => Ok(document),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Like [`get`](Self::get), but a missing document raises the underlying
    /// 404 error.
    pub async fn get_strict(&self, path: &str) -> StoreResult<Option<FetchedDocument>> {
        let url = self.build_url(path, "", &[]);
        let response = self.connection.invoke(Method::GET, &url, None).await?;
        decode_document(&response)
    }

    /// Runs a structured query against the leaf collection of `path`.
    pub async fn query(&self, path: &str, query: &Query) -> StoreResult<Vec<FetchedDocument>> {
        let (parent, collection_id) = split_collection_path(path);
        let url = self.build_url(parent, ":runQuery", &[]);
        let body = encode_query(collection_id, query);
        let response = self.connection.invoke(Method::POST, &url, Some(&body)).await?;

        let mut documents = Vec::new();
        if let Some(entries) = response.as_array() {
            for entry in entries {
                // Entries without a document are empty-result placeholders.
                let document = match entry.get("document") {
                    Some(document) => document,
                    None => continue,
                };
                if let Some(decoded) = decode_document(document)? {
                    documents.push(decoded);
                }
            }
        }
        Ok(documents)
    }

    /// Writes the full document at `path` (overwrite semantics).
    pub async fn set(&self, path: &str, doc: &DocValue) -> StoreResult<Option<FetchedDocument>> {
        let fields = require_map(doc)?;
        self.patch(path, fields, None, None).await
    }

    /// Patches the fields named by `doc` on an existing document. An empty
    /// partial document is a no-op returning the current state.
    pub async fn update(&self, path: &str, doc: &DocValue) -> StoreResult<Option<FetchedDocument>> {
        let fields = require_map(doc)?;
        if fields.is_empty() {
            return self.get(path).await;
        }
        let mask = field_mask(fields);
        self.patch(path, fields, Some(true), Some(mask)).await
    }

    pub async fn delete(&self, path: &str) -> StoreResult<()> {
        let url = self.build_url(path, "", &[]);
        self.connection.invoke(Method::DELETE, &url, None).await?;
        Ok(())
    }

    async fn patch(
        &self,
        path: &str,
        fields: &BTreeMap<String, DocValue>,
        doc_exists: Option<bool>,
        mask: Option<Vec<String>>,
    ) -> StoreResult<Option<FetchedDocument>> {
        let mut transforms = Vec::new();
        let encoded = encode_fields(fields, &mut transforms);

        let oversized_mask = mask
            .as_ref()
            .is_some_and(|mask| mask.len() > MAX_PATCH_MASK_PATHS);
        if !transforms.is_empty() || oversized_mask {
            return self.commit(path, encoded, doc_exists, mask, transforms).await;
        }

        let mut params: Vec<(String, String)> = Vec::new();
        if let Some(exists) = doc_exists {
            params.push(("currentDocument.exists".to_string(), exists.to_string()));
        }
        if let Some(mask) = &mask {
            for field_path in mask {
                params.push(("updateMask.fieldPaths".to_string(), field_path.clone()));
            }
        }
        let url = self.build_url(path, "", &params);
        let response = self
            .connection
            .invoke(Method::PATCH, &url, Some(&json!({ "fields": encoded })))
            .await?;
        decode_document(&response)
    }

    /// Batched write: one `update` write plus, when transforms were collected,
    /// a `transform` write against the same document. The commit response does
    /// not carry the document, so the resulting state is re-fetched.
    async fn commit(
        &self,
        path: &str,
        encoded_fields: JsonValue,
        doc_exists: Option<bool>,
        mask: Option<Vec<String>>,
        transforms: Vec<crate::transform::FieldTransform>,
    ) -> StoreResult<Option<FetchedDocument>> {
        log::debug!(
            "write to {path} goes through commit ({} transforms, {} mask paths)",
            transforms.len(),
            mask.as_ref().map_or(0, Vec::len)
        );

        let mut update = json!({
            "update": {
                "name": self.document_name(path),
                "fields": encoded_fields
            }
        });
        if let Some(mask) = &mask {
            update["updateMask"] = json!({ "fieldPaths": mask });
        }
        if doc_exists == Some(true) {
            update["currentDocument"] = json!({ "exists": true });
        }

        let mut writes = vec![update];
        if !transforms.is_empty() {
            let field_transforms: Vec<JsonValue> =
                transforms.iter().map(encode_field_transform).collect();
            writes.push(json!({
                "transform": {
                    "document": self.document_name(path),
                    "fieldTransforms": field_transforms
                }
            }));
        }

        let url = self.build_url("", ":commit", &[]);
        self.connection
            .invoke(Method::POST, &url, Some(&json!({ "writes": writes })))
            .await?;
        self.get(path).await
    }
}

fn require_map(doc: &DocValue) -> StoreResult<&BTreeMap<String, DocValue>> {
    doc.as_map()
        .ok_or_else(|| validation("Document data must be a map of fields"))
}

fn split_collection_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, leaf)) => (parent, leaf),
        None => ("", path),
    }
}

/// Enumerates the field paths a partial document touches, for the update
/// mask. Transform values are masked by the transform write, not here; plain
/// nested maps expand into their leaf paths; a dotted key names its nested
/// target verbatim. An empty nested map still claims its own path.
fn field_mask(fields: &BTreeMap<String, DocValue>) -> Vec<String> {
    let mut result = Vec::new();
    collect_mask(fields, "", &mut result);
    result
}

fn collect_mask(fields: &BTreeMap<String, DocValue>, path: &str, result: &mut Vec<String>) {
    let mut key_count = 0usize;
    for (key, value) in fields {
        key_count += 1;
        let key_path = append_path(path, key);
        match value {
            DocValue::Transform(_) => continue,
            DocValue::Map(nested) if !key.contains('.') => collect_mask(nested, &key_path, result),
            _ => result.push(key_path),
        }
    }
    if !path.is_empty() && key_count == 0 {
        result.push(path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Transform;

    fn fields(doc: DocValue) -> BTreeMap<String, DocValue> {
        match doc {
            DocValue::Map(fields) => fields,
            _ => panic!("expected a map"),
        }
    }

    #[test]
    fn mask_expands_nested_maps_to_leaves() {
        let doc = fields(DocValue::from_pairs([
            ("name", DocValue::from("Ada")),
            (
                "address",
                DocValue::from_pairs([
                    ("city", DocValue::from("London")),
                    ("zip", DocValue::from("E1")),
                ]),
            ),
        ]));
        assert_eq!(field_mask(&doc), ["address.city", "address.zip", "name"]);
    }

    #[test]
    fn mask_skips_transforms_and_keeps_dotted_keys_verbatim() {
        let doc = fields(DocValue::from_pairs([
            ("updated", DocValue::Transform(Transform::server_timestamp())),
            (
                "settings.theme",
                DocValue::from_pairs([("dark", DocValue::from(true))]),
            ),
            ("tags", DocValue::from_list(vec![DocValue::from("a")])),
        ]));
        assert_eq!(field_mask(&doc), ["settings.theme", "tags"]);
    }

    #[test]
    fn empty_nested_maps_claim_their_own_path() {
        let doc = fields(DocValue::from_pairs([(
            "profile",
            DocValue::from_pairs::<&str, DocValue>([]),
        )]));
        assert_eq!(field_mask(&doc), ["profile"]);
    }

    #[test]
    fn urls_carry_key_action_and_params() {
        let store = RemoteStore::new(RemoteStoreConfig {
            project_id: "demo".to_string(),
            api_key: "k123".to_string(),
        })
        .unwrap();

        assert_eq!(
            store.build_url("users/ada", "", &[]),
            "https://firestore.googleapis.com/v1/projects/demo/databases/(default)/documents/users/ada?key=k123"
        );
        assert_eq!(
            store.build_url("", ":commit", &[]),
            "https://firestore.googleapis.com/v1/projects/demo/databases/(default)/documents:commit?key=k123"
        );
        let url = store.build_url(
            "users/ada",
            "",
            &[
                ("currentDocument.exists".to_string(), "true".to_string()),
                ("updateMask.fieldPaths".to_string(), "name".to_string()),
                ("updateMask.fieldPaths".to_string(), "age".to_string()),
            ],
        );
        assert!(url.ends_with(
            "?key=k123&currentDocument.exists=true&updateMask.fieldPaths=name&updateMask.fieldPaths=age"
        ));
    }

    #[test]
    fn collection_paths_split_on_last_segment() {
        assert_eq!(split_collection_path("users"), ("", "users"));
        assert_eq!(
            split_collection_path("teams/blue/members"),
            ("teams/blue", "members")
        );
    }
}
