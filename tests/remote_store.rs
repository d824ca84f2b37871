#![cfg(not(target_arch = "wasm32"))]

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use httpmock::prelude::*;
use httpmock::Method::PATCH;
use serde_json::json;

use docstore::{
    Cache, CacheOptions, Collection, DocValue, Query, QueryCondition, QueryOperand, RemoteStore,
    RemoteStoreConfig, Transform,
};

const DOC_ROOT: &str = "/v1/projects/demo/databases/(default)/documents";

fn try_start_server() -> Option<MockServer> {
    panic::catch_unwind(AssertUnwindSafe(MockServer::start)).ok()
}

fn store(server: &MockServer) -> RemoteStore {
    RemoteStore::new(RemoteStoreConfig {
        project_id: "demo".to_string(),
        api_key: "k".to_string(),
    })
    .unwrap()
    .with_host(server.base_url())
}

fn wire_document(id: &str, fields: serde_json::Value) -> serde_json::Value {
    json!({
        "name": format!("projects/demo/databases/(default)/documents/users/{id}"),
        "fields": fields,
        "createTime": "2024-01-01T00:00:00Z",
        "updateTime": "2024-01-02T12:30:00Z"
    })
}

#[tokio::test(flavor = "current_thread")]
async fn get_decodes_a_document() {
    let Some(server) = try_start_server() else {
        eprintln!("Skipping get_decodes_a_document: unable to start mock server");
        return;
    };
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path(format!("{DOC_ROOT}/users/ada"))
            .query_param("key", "k");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(wire_document(
                "ada",
                json!({
                    "name": { "stringValue": "Ada" },
                    "age": { "integerValue": "36" }
                }),
            ));
    });

    let fetched = store(&server).get("users/ada").await.unwrap().unwrap();

    mock.assert();
    assert_eq!(fetched.meta.id, "ada");
    assert_eq!(fetched.meta.path, "users/ada");
    assert_eq!(fetched.meta.collection, "users");
    assert_eq!(
        fetched.data,
        DocValue::from_pairs([
            ("age", DocValue::from(36i64)),
            ("name", DocValue::from("Ada")),
        ])
    );
}

#[tokio::test(flavor = "current_thread")]
async fn missing_documents_are_absent_not_errors() {
    let Some(server) = try_start_server() else {
        eprintln!("Skipping missing_documents_are_absent_not_errors: unable to start mock server");
        return;
    };
    let _mock = server.mock(|when, then| {
        when.method(GET).path(format!("{DOC_ROOT}/users/nobody"));
        then.status(404)
            .header("content-type", "application/json")
            .json_body(json!({
                "error": { "code": 404, "message": "Document not found", "status": "NOT_FOUND" }
            }));
    });

    let store = store(&server);
    assert!(store.get("users/nobody").await.unwrap().is_none());

    let err = store.get_strict("users/nobody").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.details(), Some("Error 404: Document not found"));
}

#[tokio::test(flavor = "current_thread")]
async fn server_failures_surface_as_transport_errors() {
    let Some(server) = try_start_server() else {
        eprintln!(
            "Skipping server_failures_surface_as_transport_errors: unable to start mock server"
        );
        return;
    };
    let _mock = server.mock(|when, then| {
        when.method(GET).path(format!("{DOC_ROOT}/users/ada"));
        then.status(503)
            .header("content-type", "application/json")
            .json_body(json!({
                "error": { "code": 503, "message": "Backend unavailable" }
            }));
    });

    let err = store(&server).get("users/ada").await.unwrap_err();
    assert_eq!(err.code_str(), "docstore/transport");
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.details(), Some("Error 503: Backend unavailable"));
}

#[tokio::test(flavor = "current_thread")]
async fn update_sends_a_masked_patch() {
    let Some(server) = try_start_server() else {
        eprintln!("Skipping update_sends_a_masked_patch: unable to start mock server");
        return;
    };
    let mock = server.mock(|when, then| {
        when.method(PATCH)
            .path(format!("{DOC_ROOT}/users/ada"))
            .query_param("key", "k")
            .query_param("currentDocument.exists", "true")
            .query_param("updateMask.fieldPaths", "name")
            .json_body(json!({
                "fields": { "name": { "stringValue": "Grace" } }
            }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(wire_document(
                "ada",
                json!({ "name": { "stringValue": "Grace" } }),
            ));
    });

    let doc = DocValue::from_pairs([("name", DocValue::from("Grace"))]);
    let fetched = store(&server)
        .update("users/ada", &doc)
        .await
        .unwrap()
        .unwrap();

    mock.assert();
    assert_eq!(fetched.data, doc);
}

#[tokio::test(flavor = "current_thread")]
async fn set_patches_without_a_mask() {
    let Some(server) = try_start_server() else {
        eprintln!("Skipping set_patches_without_a_mask: unable to start mock server");
        return;
    };
    let mock = server.mock(|when, then| {
        when.method(PATCH)
            .path(format!("{DOC_ROOT}/users/ada"))
            .query_param("key", "k")
            .json_body(json!({
                "fields": { "name": { "stringValue": "Ada" } }
            }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(wire_document(
                "ada",
                json!({ "name": { "stringValue": "Ada" } }),
            ));
    });

    let doc = DocValue::from_pairs([("name", DocValue::from("Ada"))]);
    store(&server).set("users/ada", &doc).await.unwrap();
    mock.assert();
}

#[tokio::test(flavor = "current_thread")]
async fn transforms_route_the_write_through_commit() {
    let Some(server) = try_start_server() else {
        eprintln!("Skipping transforms_route_the_write_through_commit: unable to start mock server");
        return;
    };
    let commit = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{DOC_ROOT}:commit"))
            .json_body(json!({
                "writes": [
                    {
                        "update": {
                            "name": "projects/demo/databases/(default)/documents/users/ada",
                            "fields": { "title": { "stringValue": "Hi" } }
                        },
                        "updateMask": { "fieldPaths": ["title"] },
                        "currentDocument": { "exists": true }
                    },
                    {
                        "transform": {
                            "document": "projects/demo/databases/(default)/documents/users/ada",
                            "fieldTransforms": [
                                { "fieldPath": "views", "increment": { "integerValue": "1" } }
                            ]
                        }
                    }
                ]
            }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "writeResults": [{}, {}] }));
    });
    let refetch = server.mock(|when, then| {
        when.method(GET).path(format!("{DOC_ROOT}/users/ada"));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(wire_document(
                "ada",
                json!({
                    "title": { "stringValue": "Hi" },
                    "views": { "integerValue": "8" }
                }),
            ));
    });

    let doc = DocValue::from_pairs([
        ("title", DocValue::from("Hi")),
        (
            "views",
            DocValue::Transform(Transform::increment(1.0).unwrap()),
        ),
    ]);
    let fetched = store(&server)
        .update("users/ada", &doc)
        .await
        .unwrap()
        .unwrap();

    commit.assert();
    refetch.assert();
    assert_eq!(
        fetched.data,
        DocValue::from_pairs([
            ("title", DocValue::from("Hi")),
            ("views", DocValue::from(8i64)),
        ])
    );
}

#[tokio::test(flavor = "current_thread")]
async fn queries_skip_empty_result_placeholders() {
    let Some(server) = try_start_server() else {
        eprintln!("Skipping queries_skip_empty_result_placeholders: unable to start mock server");
        return;
    };
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{DOC_ROOT}:runQuery"))
            .json_body(json!({
                "structuredQuery": {
                    "from": [{ "collectionId": "users" }],
                    "where": {
                        "compositeFilter": {
                            "op": "AND",
                            "filters": [{
                                "fieldFilter": {
                                    "field": { "fieldPath": "name" },
                                    "op": "EQUAL",
                                    "value": { "stringValue": "Ada" }
                                }
                            }]
                        }
                    },
                    "orderBy": [],
                    "offset": 0,
                    "limit": 20
                }
            }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!([
                { "readTime": "2024-01-03T00:00:00Z" },
                { "document": wire_document("ada", json!({ "name": { "stringValue": "Ada" } })) }
            ]));
    });

    let query = Query::new().with_condition(QueryCondition::new(
        "name",
        QueryOperand::Equal,
        DocValue::from("Ada"),
    ));
    let documents = store(&server).query("users", &query).await.unwrap();

    mock.assert();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].meta.id, "ada");
}

#[tokio::test(flavor = "current_thread")]
async fn delete_issues_a_delete_request() {
    let Some(server) = try_start_server() else {
        eprintln!("Skipping delete_issues_a_delete_request: unable to start mock server");
        return;
    };
    let mock = server.mock(|when, then| {
        when.method(DELETE)
            .path(format!("{DOC_ROOT}/users/ada"))
            .query_param("key", "k");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({}));
    });

    store(&server).delete("users/ada").await.unwrap();
    mock.assert();
}

#[tokio::test(flavor = "current_thread")]
async fn collections_serve_repeat_reads_from_the_cache() {
    let Some(server) = try_start_server() else {
        eprintln!(
            "Skipping collections_serve_repeat_reads_from_the_cache: unable to start mock server"
        );
        return;
    };
    let mock = server.mock(|when, then| {
        when.method(GET).path(format!("{DOC_ROOT}/users/ada"));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(wire_document(
                "ada",
                json!({ "name": { "stringValue": "Ada" } }),
            ));
    });

    let collection = Collection::new(
        Arc::new(store(&server)),
        Arc::new(Cache::new(CacheOptions::default())),
        "users",
    );
    collection.get("ada", false).await.unwrap().unwrap();
    collection.get("ada", false).await.unwrap().unwrap();
    mock.assert_hits(1);

    // `force` bypasses the cached copy.
    collection.get("ada", true).await.unwrap().unwrap();
    mock.assert_hits(2);
}

#[tokio::test(flavor = "current_thread")]
async fn deleting_evicts_the_cached_document() {
    let Some(server) = try_start_server() else {
        eprintln!("Skipping deleting_evicts_the_cached_document: unable to start mock server");
        return;
    };
    let get = server.mock(|when, then| {
        when.method(GET).path(format!("{DOC_ROOT}/users/ada"));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(wire_document(
                "ada",
                json!({ "name": { "stringValue": "Ada" } }),
            ));
    });
    let _delete = server.mock(|when, then| {
        when.method(DELETE).path(format!("{DOC_ROOT}/users/ada"));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({}));
    });

    let collection = Collection::new(
        Arc::new(store(&server)),
        Arc::new(Cache::new(CacheOptions::default())),
        "users",
    );
    collection.get("ada", false).await.unwrap().unwrap();
    collection.delete("ada").await.unwrap();

    // The next read goes back to the network.
    collection.get("ada", false).await.unwrap().unwrap();
    get.assert_hits(2);
}
