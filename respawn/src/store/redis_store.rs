use futures_util::StreamExt;
use log::{debug, warn};
use redis::{aio::ConnectionManager, cmd};
use serde_json::Value;
use tokio::sync::mpsc;

use super::{DocumentStore, FieldOperation, MAX_BATCH_IDS, Subscription, UpsertOutcome, check_batch, validate_operations};
use crate::{
    errors::StoreError,
    id::generate_document_id,
    keys::KeyContext,
    runtime::{
        CommandExecutor, RedisExecutor,
        commands::{DeleteDocument, DocumentCommand, SetDocument, UpdateDocument, UpsertDocument, build_operation_payloads},
    },
    types::{Document, DocumentPath, Snapshot},
};

/// Document store backed by a Redis Stack server.
///
/// Documents are RedisJSON values. Writes run through `lua/document_write.lua`, which
/// applies field operations atomically and publishes on the document's change
/// channel; subscribers re-read the document on every announcement.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: ConnectionManager,
    keys: KeyContext,
}

impl RedisStore {
    pub fn new(client: redis::Client, conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            client,
            conn,
            keys: KeyContext::new(prefix),
        }
    }

    /// Opens a client and a managed connection for `url`.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client.clone()).await?;
        Ok(Self::new(client, conn, prefix))
    }

    pub fn keys(&self) -> &KeyContext {
        &self.keys
    }

    async fn read(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        let mut conn = self.conn.clone();
        let key = self.keys.document(&path.collection, &path.id);
        let raw: Option<String> = cmd("JSON.GET").arg(&key).query_async(&mut conn).await?;
        raw.map(|json| parse_document(path, &json)).transpose()
    }

    async fn read_batch(&self, collection: &str, ids: &[String]) -> Result<Vec<(String, Document)>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let keys: Vec<String> = ids.iter().map(|id| self.keys.document(collection, id)).collect();
        let raw: Vec<Option<String>> = cmd("JSON.MGET").arg(&keys).arg("$").query_async(&mut conn).await?;

        let mut documents = Vec::with_capacity(ids.len());
        for (id, entry) in ids.iter().zip(raw) {
            let Some(json) = entry else { continue };
            let path = DocumentPath::new(collection, id.as_str());
            // `$` queries wrap the match in an array.
            let value: Value = serde_json::from_str(&json).map_err(|err| decode_error(&path, err))?;
            if let Some(Value::Object(document)) = value.as_array().and_then(|matches| matches.first()).cloned() {
                documents.push((id.clone(), document));
            }
        }
        Ok(documents)
    }

    async fn run(&self, path: &DocumentPath, command: DocumentCommand) -> Result<Value, StoreError> {
        let mut conn = self.conn.clone();
        let mut executor = RedisExecutor::new(&mut conn);
        executor.execute(path, command).await
    }

    fn set_command(&self, path: &DocumentPath, document: &Document, must_not_exist: bool) -> Result<DocumentCommand, StoreError> {
        Ok(DocumentCommand::Set(SetDocument {
            key: self.keys.document(&path.collection, &path.id),
            index_key: self.keys.collection_index(&path.collection),
            channel: self.keys.changes(&path.collection, &path.id),
            document_id: path.id.clone(),
            payload_json: encode(document)?,
            must_not_exist,
        }))
    }
}

impl DocumentStore for RedisStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        self.read(path).await
    }

    async fn set(&self, path: &DocumentPath, document: Document) -> Result<(), StoreError> {
        let command = self.set_command(path, &document, false)?;
        self.run(path, command).await?;
        debug!("set {path}");
        Ok(())
    }

    async fn create(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        let path = DocumentPath::new(collection, generate_document_id());
        let command = self.set_command(&path, &document, true)?;
        self.run(&path, command).await?;
        debug!("created {path}");
        Ok(path.id)
    }

    async fn update(&self, path: &DocumentPath, operations: &[FieldOperation]) -> Result<(), StoreError> {
        validate_operations(operations)?;
        let command = DocumentCommand::Update(UpdateDocument {
            key: self.keys.document(&path.collection, &path.id),
            channel: self.keys.changes(&path.collection, &path.id),
            operations: build_operation_payloads(operations)?,
        });
        self.run(path, command).await?;
        debug!("updated {path} with {} operation(s)", operations.len());
        Ok(())
    }

    async fn upsert(
        &self,
        path: &DocumentPath,
        create: Document,
        operations: &[FieldOperation],
    ) -> Result<UpsertOutcome, StoreError> {
        if !operations.is_empty() {
            validate_operations(operations)?;
        }
        let command = DocumentCommand::Upsert(UpsertDocument {
            key: self.keys.document(&path.collection, &path.id),
            index_key: self.keys.collection_index(&path.collection),
            channel: self.keys.changes(&path.collection, &path.id),
            document_id: path.id.clone(),
            create_payload_json: encode(&create)?,
            operations: build_operation_payloads(operations)?,
        });
        let reply = self.run(path, command).await?;
        let created = reply.get("created").and_then(Value::as_bool).unwrap_or(false);
        debug!("upsert {} {path}", if created { "created" } else { "updated" });
        Ok(if created {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        })
    }

    async fn delete(&self, path: &DocumentPath) -> Result<bool, StoreError> {
        let command = DocumentCommand::Delete(DeleteDocument {
            key: self.keys.document(&path.collection, &path.id),
            index_key: self.keys.collection_index(&path.collection),
            channel: self.keys.changes(&path.collection, &path.id),
            document_id: path.id.clone(),
        });
        let reply = self.run(path, command).await?;
        Ok(reply.get("existed").and_then(Value::as_bool).unwrap_or(false))
    }

    async fn get_many(&self, collection: &str, ids: &[String]) -> Result<Vec<(String, Document)>, StoreError> {
        check_batch(ids)?;
        self.read_batch(collection, ids).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        let mut conn = self.conn.clone();
        let mut ids: Vec<String> = cmd("SMEMBERS")
            .arg(self.keys.collection_index(collection))
            .query_async(&mut conn)
            .await?;
        ids.sort();

        let mut documents = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_BATCH_IDS) {
            documents.extend(self.read_batch(collection, chunk).await?);
        }
        Ok(documents)
    }

    async fn subscribe(&self, path: &DocumentPath) -> Result<Subscription, StoreError> {
        let channel = self.keys.changes(&path.collection, &path.id);
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&channel).await?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let store = self.clone();
        let target = path.clone();
        let pump = tokio::spawn(async move {
            // Read after subscribing so no write between the two is missed.
            let initial = store.read(&target).await.map(|data| Snapshot {
                path: target.clone(),
                data,
            });
            if sender.send(initial).is_err() {
                return;
            }

            let mut messages = pubsub.into_on_message();
            while messages.next().await.is_some() {
                let event = store.read(&target).await.map(|data| Snapshot {
                    path: target.clone(),
                    data,
                });
                if sender.send(event).is_err() {
                    return;
                }
            }

            warn!("change channel for {target} closed");
            let _ = sender.send(Err(StoreError::other("change channel closed")));
        });

        debug!("attached listener on {path}");
        Ok(Subscription::with_pump(path.clone(), receiver, pump))
    }
}

fn encode(document: &Document) -> Result<String, StoreError> {
    serde_json::to_string(document).map_err(|err| StoreError::other(format!("failed to serialize document: {err}")))
}

fn parse_document(path: &DocumentPath, json: &str) -> Result<Document, StoreError> {
    match serde_json::from_str::<Value>(json).map_err(|err| decode_error(path, err))? {
        Value::Object(document) => Ok(document),
        _ => Err(StoreError::Decode {
            path: path.clone(),
            message: "document root is not an object".to_string(),
        }),
    }
}

fn decode_error(path: &DocumentPath, err: serde_json::Error) -> StoreError {
    StoreError::Decode {
        path: path.clone(),
        message: err.to_string(),
    }
}
