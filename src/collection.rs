use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::Cache;
use crate::diff::compute_diff;
use crate::document::FetchedDocument;
use crate::error::StoreResult;
use crate::query::Query;
use crate::remote::RemoteStore;
use crate::value::DocValue;

/// One step of a collection's mutation pipeline.
///
/// `apply` runs after decode (store format to application format), `unapply`
/// before encode (application format back to store format). Steps run in
/// pipeline order in both directions; each step is expected to touch only its
/// own layer.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Mutation: Send + Sync + 'static {
    async fn apply(&self, value: DocValue) -> StoreResult<DocValue>;
    async fn unapply(&self, value: DocValue) -> StoreResult<DocValue>;
}

/// Public entry point for document access under one collection path.
///
/// Composes path construction, the mutation pipeline, the read-through cache
/// (populated on every successful get/query/set/update, invalidated on
/// delete) and the remote store.
pub struct Collection {
    path: String,
    store: Arc<RemoteStore>,
    cache: Arc<Cache<FetchedDocument>>,
    mutations: Vec<Arc<dyn Mutation>>,
}

impl Collection {
    pub fn new(
        store: Arc<RemoteStore>,
        cache: Arc<Cache<FetchedDocument>>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            store,
            cache,
            mutations: Vec::new(),
        }
    }

    pub fn with_mutation(mut self, mutation: Arc<dyn Mutation>) -> Self {
        self.mutations.push(mutation);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Logical path of a document in this collection.
    pub fn document_path(&self, id: &str) -> String {
        format!("{}/{}", self.path, id)
    }

    async fn apply(&self, mut value: DocValue) -> StoreResult<DocValue> {
        for mutation in &self.mutations {
            value = mutation.apply(value).await?;
        }
        Ok(value)
    }

    async fn unapply(&self, mut value: DocValue) -> StoreResult<DocValue> {
        for mutation in &self.mutations {
            value = mutation.unapply(value).await?;
        }
        Ok(value)
    }

    /// Fetches a document, serving it from the cache unless `force` is set.
    pub async fn get(&self, id: &str, force: bool) -> StoreResult<Option<FetchedDocument>> {
        let path = self.document_path(id);
        if !force {
            if let Some(cached) = self.cache.get(&path) {
                return Ok(Some(cached));
            }
        }
        let fetched = self.store.get(&path).await?;
        match fetched {
            Some(mut document) => {
                document.data = self.apply(document.data).await?;
                self.cache.set(path, document.clone());
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }

    /// Writes the full document. An empty document (after `unapply`) is a
    /// no-op answered from the cache.
    pub async fn set(&self, id: &str, data: DocValue) -> StoreResult<Option<FetchedDocument>> {
        let to_set = self.unapply(data).await?;
        if is_empty_map(&to_set) {
            return Ok(self.cache.get(&self.document_path(id)));
        }
        let result = self.store.set(&self.document_path(id), &to_set).await?;
        self.finish_write(id, result).await
    }

    /// Patches the named fields of an existing document.
    pub async fn update(&self, id: &str, data: DocValue) -> StoreResult<Option<FetchedDocument>> {
        let to_set = self.unapply(data).await?;
        self.update_unapplied(id, to_set).await
    }

    /// Computes the minimal update turning `previous` into `next` and sends
    /// it; without a previous version this degrades to a full `set`.
    pub async fn patch(
        &self,
        id: &str,
        next: DocValue,
        previous: Option<DocValue>,
    ) -> StoreResult<Option<FetchedDocument>> {
        let previous = match previous {
            Some(previous) => previous,
            None => return self.set(id, next).await,
        };
        let next = self.unapply(next).await?;
        let previous = self.unapply(previous).await?;
        let diff = compute_diff(&next, &previous);
        // The diff is already in store format; it must not be unapplied again.
        self.update_unapplied(id, DocValue::Map(diff)).await
    }

    /// Runs a query and caches each decoded result under its document path.
    pub async fn query(&self, query: &Query) -> StoreResult<Vec<FetchedDocument>> {
        let documents = self.store.query(&self.path, query).await?;
        let mut results = Vec::with_capacity(documents.len());
        for mut document in documents {
            document.data = self.apply(document.data).await?;
            self.cache
                .set(self.document_path(&document.meta.id), document.clone());
            results.push(document);
        }
        Ok(results)
    }

    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        let path = self.document_path(id);
        self.store.delete(&path).await?;
        self.cache.delete(&path);
        Ok(())
    }

    async fn update_unapplied(
        &self,
        id: &str,
        to_set: DocValue,
    ) -> StoreResult<Option<FetchedDocument>> {
        if is_empty_map(&to_set) {
            return Ok(self.cache.get(&self.document_path(id)));
        }
        let result = self.store.update(&self.document_path(id), &to_set).await?;
        self.finish_write(id, result).await
    }

    async fn finish_write(
        &self,
        id: &str,
        result: Option<FetchedDocument>,
    ) -> StoreResult<Option<FetchedDocument>> {
        match result {
            Some(mut document) => {
                document.data = self.apply(document.data).await?;
                self.cache.set(self.document_path(id), document.clone());
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }
}

fn is_empty_map(value: &DocValue) -> bool {
    matches!(value, DocValue::Map(fields) if fields.is_empty())
}
