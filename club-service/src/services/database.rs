use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::{FindOptions, IndexOptions, ReplaceOptions},
    Client as MongoClient, ClientSession, Collection, Database, IndexModel,
};

use super::error::ClubError;
use super::store::{
    collections, filter_document, sort_document, DocumentStore, FieldFilter, SortKey, WriteOp,
};

/// MongoDB-backed document store. Batches run in a multi-document
/// transaction, so the deployment must be a replica set.
#[derive(Clone)]
pub struct MongoStore {
    client: MongoClient,
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, ClubError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            ClubError::store("connect", e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), ClubError> {
        tracing::info!("Creating MongoDB indexes for club-service");

        let indexes: [(&str, Document, &str); 8] = [
            (
                collections::ROLE_PERMISSIONS,
                doc! { "page_id": 1 },
                "page_id_idx",
            ),
            (
                collections::USER_PERMISSIONS,
                doc! { "user_id": 1 },
                "user_id_idx",
            ),
            (
                collections::PERMISSION_AUDIT_LOG,
                doc! { "timestamp": -1, "sequence": -1 },
                "timestamp_sequence_idx",
            ),
            (
                collections::PERMISSION_AUDIT_LOG,
                doc! { "sequence": -1 },
                "sequence_idx",
            ),
            (
                collections::TRAINING_SESSIONS,
                doc! { "group_id": 1, "date": 1 },
                "group_date_idx",
            ),
            (
                collections::ATTENDANCE_RECORDS,
                doc! { "session_id": 1 },
                "session_id_idx",
            ),
            (
                collections::ATTENDANCE_RECORDS,
                doc! { "group_id": 1, "member_id": 1 },
                "group_member_idx",
            ),
            (
                collections::TRAINING_GROUPS,
                doc! { "member_ids": 1 },
                "member_ids_idx",
            ),
        ];

        for (collection, keys, name) in indexes {
            let index = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(name.to_string()).build())
                .build();

            self.collection(collection)
                .create_index(index, None)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create {} index on {}: {}", name, collection, e);
                    ClubError::store("create index", e)
                })?;
        }

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    pub fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection(name)
    }

    async fn apply_op(
        &self,
        op: WriteOp,
        session: &mut ClientSession,
    ) -> Result<(), mongodb::error::Error> {
        match op {
            WriteOp::Set {
                collection,
                id,
                mut document,
            } => {
                document.insert("_id", id.clone());
                self.collection(&collection)
                    .replace_one_with_session(
                        doc! { "_id": id },
                        document,
                        ReplaceOptions::builder().upsert(true).build(),
                        session,
                    )
                    .await?;
            }
            WriteOp::Delete { collection, id } => {
                self.collection(&collection)
                    .delete_one_with_session(doc! { "_id": id }, None, session)
                    .await?;
            }
            WriteOp::DeleteWhere {
                collection,
                filters,
            } => {
                self.collection(&collection)
                    .delete_many_with_session(filter_document(&filters), None, session)
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, ClubError> {
        self.collection(collection)
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| {
                tracing::error!(collection = %collection, id = %id, "Failed to get document: {}", e);
                ClubError::store("get", e)
            })
    }

    async fn query_sorted(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        sort: &[SortKey],
        limit: Option<usize>,
    ) -> Result<Vec<Document>, ClubError> {
        let options = FindOptions::builder()
            .sort((!sort.is_empty()).then(|| sort_document(sort)))
            .limit(limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)))
            .build();
        let cursor = self
            .collection(collection)
            .find(filter_document(filters), options)
            .await
            .map_err(|e| {
                tracing::error!(collection = %collection, "Failed to query documents: {}", e);
                ClubError::store("query", e)
            })?;

        cursor.try_collect().await.map_err(|e| {
            tracing::error!(collection = %collection, "Failed to collect documents: {}", e);
            ClubError::store("query", e)
        })
    }

    async fn set(&self, collection: &str, id: &str, mut document: Document) -> Result<(), ClubError> {
        document.insert("_id", id);
        self.collection(collection)
            .replace_one(
                doc! { "_id": id },
                document,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await
            .map_err(|e| {
                tracing::error!(collection = %collection, id = %id, "Failed to set document: {}", e);
                ClubError::store("set", e)
            })?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, ClubError> {
        let result = self
            .collection(collection)
            .delete_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| {
                tracing::error!(collection = %collection, id = %id, "Failed to delete document: {}", e);
                ClubError::store("delete", e)
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn apply_batch(&self, ops: Vec<WriteOp>) -> Result<(), ClubError> {
        let mut session = self.client.start_session(None).await.map_err(|e| {
            tracing::error!("Failed to start MongoDB session: {}", e);
            ClubError::store("start session", e)
        })?;
        session
            .start_transaction(None)
            .await
            .map_err(|e| ClubError::store("start transaction", e))?;

        let op_count = ops.len();
        for op in ops {
            if let Err(e) = self.apply_op(op, &mut session).await {
                tracing::error!("Batch write failed, aborting transaction: {}", e);
                if let Err(abort_err) = session.abort_transaction().await {
                    tracing::error!("Failed to abort transaction: {}", abort_err);
                }
                return Err(ClubError::store("apply batch", e));
            }
        }

        session.commit_transaction().await.map_err(|e| {
            tracing::error!("Failed to commit transaction: {}", e);
            ClubError::store("commit batch", e)
        })?;

        tracing::debug!(ops = op_count, "Committed batch write");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ClubError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                ClubError::store("ping", e)
            })?;
        Ok(())
    }
}
