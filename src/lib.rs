//! Client-side data-access layer for a remote document database, speaking its
//! JSON-over-HTTPS REST protocol while behaving like a local object store.
//!
//! The crate is organized leaves-first:
//!
//! * [`value`] — the [`DocValue`] tree and its bidirectional wire codec.
//! * [`transform`] — atomic server-side operations (server timestamp,
//!   increment/min/max, array union/difference).
//! * [`diff`] — minimal field-path updates between two document versions.
//! * [`document`] — wire document decoding plus identity metadata.
//! * [`query`] — structured query encoding, including the two-sided range
//!   expansion for prefix matching.
//! * [`remote`] — the HTTP store: URLs, bodies, typed errors, and the
//!   patch-vs-commit write decision.
//! * [`cache`] — a short-TTL read-through cache.
//! * [`collection`] — the public facade composing all of the above.
//!
//! Codec and diff functions are pure and reentrant; suspension happens only
//! at HTTP boundaries. Nothing is retried and nothing is global: the store,
//! cache and collections are constructed explicitly and passed down.

pub mod cache;
pub mod collection;
pub mod diff;
pub mod document;
pub mod error;
pub mod query;
pub mod remote;
pub mod transform;
pub mod value;

pub use cache::{Cache, CacheOptions, DEFAULT_MAX_AGE_MS};
pub use collection::{Collection, Mutation};
pub use diff::compute_diff;
pub use document::{decode_document, DocumentMetadata, FetchedDocument};
pub use error::{StoreError, StoreErrorCode, StoreResult};
pub use query::{
    encode_query, OrderDirection, Query, QueryCondition, QueryOperand, QueryOrderBy, DEFAULT_LIMIT,
};
pub use remote::{NoopTokenProvider, RemoteStore, RemoteStoreConfig, TokenProvider, TokenProviderArc};
pub use transform::{FieldTransform, Transform};
pub use value::{decode_value, encode_fields, encode_value, DocValue};
