//! Document store seam.
//!
//! Services talk to an opaque collection store: get / query-by-field / set /
//! delete plus one atomic batch primitive. `MongoStore` backs it in
//! production, `InMemoryStore` in tests and local runs.

use async_trait::async_trait;
use mongodb::bson::{self, Bson, Document};
use serde::{de::DeserializeOwned, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::error::ClubError;

pub mod collections {
    pub const ROLE_PERMISSIONS: &str = "role_permissions";
    pub const USER_PERMISSIONS: &str = "user_permissions";
    pub const PERMISSION_AUDIT_LOG: &str = "permission_audit_log";
    pub const USER_ROLES: &str = "user_roles";
    pub const MEMBERS: &str = "members";
    pub const TRAINING_GROUPS: &str = "training_groups";
    pub const TRAINING_SESSIONS: &str = "training_sessions";
    pub const ATTENDANCE_RECORDS: &str = "attendance_records";
}

/// Equality filter on a top-level field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: Bson,
}

impl FieldFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    fn matches(&self, document: &Document) -> bool {
        document.get(&self.field) == Some(&self.value)
    }
}

/// Sort key on a top-level field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

pub fn sort_document(sort: &[SortKey]) -> Document {
    let mut document = Document::new();
    for key in sort {
        document.insert(key.field.clone(), if key.descending { -1 } else { 1 });
    }
    document
}

/// Orders the scalar types records are sorted on. Missing fields sort first,
/// as in MongoDB.
fn compare_bson(a: Option<&Bson>, b: Option<&Bson>) -> CmpOrdering {
    match (a, b) {
        (None, None) => CmpOrdering::Equal,
        (None, Some(_)) => CmpOrdering::Less,
        (Some(_), None) => CmpOrdering::Greater,
        (Some(Bson::DateTime(x)), Some(Bson::DateTime(y))) => x.cmp(y),
        (Some(Bson::String(x)), Some(Bson::String(y))) => x.cmp(y),
        (Some(Bson::Double(x)), Some(Bson::Double(y))) => x.total_cmp(y),
        (Some(x), Some(y)) => match (integer(x), integer(y)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => CmpOrdering::Equal,
        },
    }
}

fn integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        _ => None,
    }
}

pub fn filter_document(filters: &[FieldFilter]) -> Document {
    let mut filter = Document::new();
    for f in filters {
        filter.insert(f.field.clone(), f.value.clone());
    }
    filter
}

/// One step of an atomic batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    Set {
        collection: String,
        id: String,
        document: Document,
    },
    Delete {
        collection: String,
        id: String,
    },
    DeleteWhere {
        collection: String,
        filters: Vec<FieldFilter>,
    },
}

impl WriteOp {
    pub fn set(collection: &str, id: impl Into<String>, document: Document) -> Self {
        WriteOp::Set {
            collection: collection.to_string(),
            id: id.into(),
            document,
        }
    }

    pub fn delete(collection: &str, id: impl Into<String>) -> Self {
        WriteOp::Delete {
            collection: collection.to_string(),
            id: id.into(),
        }
    }

    pub fn delete_where(collection: &str, filters: Vec<FieldFilter>) -> Self {
        WriteOp::DeleteWhere {
            collection: collection.to_string(),
            filters,
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, ClubError>;

    /// All documents whose fields equal every filter. No filters returns the
    /// whole collection.
    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> Result<Vec<Document>, ClubError> {
        self.query_sorted(collection, filters, &[], None).await
    }

    /// Like `query`, ordered by `sort` and cut to the first `limit` documents
    /// by the store itself.
    async fn query_sorted(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        sort: &[SortKey],
        limit: Option<usize>,
    ) -> Result<Vec<Document>, ClubError>;

    /// Insert or replace the document stored under `id`.
    async fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), ClubError>;

    /// Returns whether a document was removed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, ClubError>;

    /// Apply every op or none of them.
    async fn apply_batch(&self, ops: Vec<WriteOp>) -> Result<(), ClubError>;

    async fn health_check(&self) -> Result<(), ClubError>;
}

pub fn to_record<T: Serialize>(value: &T) -> Result<Document, ClubError> {
    bson::to_document(value).map_err(|e| {
        tracing::error!("Failed to encode record: {}", e);
        ClubError::store("encode record", e)
    })
}

pub fn from_record<T: DeserializeOwned>(document: Document) -> Result<T, ClubError> {
    bson::from_document(document).map_err(|e| {
        tracing::error!("Failed to decode stored record: {}", e);
        ClubError::store("decode record", e)
    })
}

pub async fn get_record<T, S>(store: &S, collection: &str, id: &str) -> Result<Option<T>, ClubError>
where
    T: DeserializeOwned,
    S: DocumentStore + ?Sized,
{
    store
        .get(collection, id)
        .await?
        .map(from_record)
        .transpose()
}

pub async fn query_records<T, S>(
    store: &S,
    collection: &str,
    filters: &[FieldFilter],
) -> Result<Vec<T>, ClubError>
where
    T: DeserializeOwned,
    S: DocumentStore + ?Sized,
{
    store
        .query(collection, filters)
        .await?
        .into_iter()
        .map(from_record)
        .collect()
}

pub async fn query_records_sorted<T, S>(
    store: &S,
    collection: &str,
    filters: &[FieldFilter],
    sort: &[SortKey],
    limit: Option<usize>,
) -> Result<Vec<T>, ClubError>
where
    T: DeserializeOwned,
    S: DocumentStore + ?Sized,
{
    store
        .query_sorted(collection, filters, sort, limit)
        .await?
        .into_iter()
        .map(from_record)
        .collect()
}

pub async fn set_record<T, S>(store: &S, collection: &str, id: &str, value: &T) -> Result<(), ClubError>
where
    T: Serialize,
    S: DocumentStore + ?Sized,
{
    store.set(collection, id, to_record(value)?).await
}

type Collections = HashMap<String, BTreeMap<String, Document>>;

/// Process-local store. Batches are applied to a staged copy and swapped in
/// under one lock.
pub struct InMemoryStore {
    collections: Mutex<Collections>,
    available: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: every call fails with `StoreUnavailable` while false.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .map(|c| c.get(collection).map(BTreeMap::len).unwrap_or(0))
            .unwrap_or(0)
    }

    fn ensure_available(&self, operation: &str) -> Result<(), ClubError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ClubError::store(operation, "in-memory store marked unavailable"))
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Collections>, ClubError> {
        self.collections
            .lock()
            .map_err(|e| ClubError::store("lock in-memory store", e))
    }

    fn apply(collections: &mut Collections, op: WriteOp) {
        match op {
            WriteOp::Set {
                collection,
                id,
                mut document,
            } => {
                document.insert("_id", id.clone());
                collections
                    .entry(collection)
                    .or_default()
                    .insert(id, document);
            }
            WriteOp::Delete { collection, id } => {
                if let Some(docs) = collections.get_mut(&collection) {
                    docs.remove(&id);
                }
            }
            WriteOp::DeleteWhere {
                collection,
                filters,
            } => {
                if let Some(docs) = collections.get_mut(&collection) {
                    docs.retain(|_, doc| !filters.iter().all(|f| f.matches(doc)));
                }
            }
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, ClubError> {
        self.ensure_available("get")?;
        Ok(self
            .lock()?
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn query_sorted(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        sort: &[SortKey],
        limit: Option<usize>,
    ) -> Result<Vec<Document>, ClubError> {
        self.ensure_available("query")?;
        let mut documents: Vec<Document> = self
            .lock()?
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| filters.iter().all(|f| f.matches(doc)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if !sort.is_empty() {
            documents.sort_by(|a, b| {
                sort.iter()
                    .map(|key| {
                        let order = compare_bson(a.get(&key.field), b.get(&key.field));
                        if key.descending {
                            order.reverse()
                        } else {
                            order
                        }
                    })
                    .find(|order| order.is_ne())
                    .unwrap_or(CmpOrdering::Equal)
            });
        }
        if let Some(limit) = limit {
            documents.truncate(limit);
        }
        Ok(documents)
    }

    async fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), ClubError> {
        self.ensure_available("set")?;
        let mut collections = self.lock()?;
        Self::apply(&mut collections, WriteOp::set(collection, id, document));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, ClubError> {
        self.ensure_available("delete")?;
        Ok(self
            .lock()?
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some())
    }

    async fn apply_batch(&self, ops: Vec<WriteOp>) -> Result<(), ClubError> {
        self.ensure_available("apply batch")?;
        let mut collections = self.lock()?;
        let mut staged = collections.clone();
        for op in ops {
            Self::apply(&mut staged, op);
        }
        *collections = staged;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ClubError> {
        self.ensure_available("health check")
    }
}
