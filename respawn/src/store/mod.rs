//! Document store abstraction consumed by the engine.
//!
//! A store holds JSON documents in named collections and offers:
//! - plain reads and whole-document writes,
//! - atomic multi-field updates ([`FieldOperation`]) on a single document,
//! - batched lookups by id (at most [`MAX_BATCH_IDS`] per call),
//! - push subscriptions delivering a [`Snapshot`] after every write.

mod memory;
mod operations;
mod redis_store;

pub use memory::MemoryStore;
pub use operations::{FieldOperation, apply_operations, validate_operations};
pub use redis_store::RedisStore;

use log::debug;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    errors::StoreError,
    types::{Document, DocumentPath, Record, Snapshot, decode_document},
};

/// Store-imposed ceiling on ids per [`DocumentStore::get_many`] call.
pub const MAX_BATCH_IDS: usize = 10;

/// One delivery on a subscription: the latest snapshot, or a channel failure.
pub type SnapshotEvent = Result<Snapshot, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError>;

    /// Replaces the whole document, creating it if needed.
    async fn set(&self, path: &DocumentPath, document: Document) -> Result<(), StoreError>;

    /// Inserts a document under a store-assigned id and returns the id.
    async fn create(&self, collection: &str, document: Document) -> Result<String, StoreError>;

    /// Applies `operations` atomically. Fails with [`StoreError::NotFound`] if absent.
    async fn update(&self, path: &DocumentPath, operations: &[FieldOperation]) -> Result<(), StoreError>;

    /// Writes `create` if the document is absent, otherwise applies `operations`.
    /// The existence check and the write happen atomically.
    async fn upsert(
        &self,
        path: &DocumentPath,
        create: Document,
        operations: &[FieldOperation],
    ) -> Result<UpsertOutcome, StoreError>;

    /// Removes the document, returning whether it existed.
    async fn delete(&self, path: &DocumentPath) -> Result<bool, StoreError>;

    /// Fetches up to [`MAX_BATCH_IDS`] documents; missing ids are skipped.
    async fn get_many(&self, collection: &str, ids: &[String]) -> Result<Vec<(String, Document)>, StoreError>;

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError>;

    /// Attaches a listener. The current snapshot is delivered first, then one per write.
    async fn subscribe(&self, path: &DocumentPath) -> Result<Subscription, StoreError>;
}

/// Reads and decodes a single record.
pub async fn fetch<T, S>(store: &S, id: &str) -> Result<Option<T>, StoreError>
where
    T: Record,
    S: DocumentStore + ?Sized,
{
    let path = DocumentPath::new(T::COLLECTION, id);
    match store.get(&path).await? {
        Some(document) => decode_document(&path, &document).map(Some),
        None => Ok(None),
    }
}

/// Reads and decodes every record in `T`'s collection.
pub async fn fetch_all<T, S>(store: &S) -> Result<Vec<T>, StoreError>
where
    T: Record,
    S: DocumentStore + ?Sized,
{
    store
        .list(T::COLLECTION)
        .await?
        .iter()
        .map(|(id, document)| decode_document(&DocumentPath::new(T::COLLECTION, id.as_str()), document))
        .collect()
}

pub(crate) fn check_batch(ids: &[String]) -> Result<(), StoreError> {
    if ids.len() > MAX_BATCH_IDS {
        return Err(StoreError::invalid(format!(
            "batch lookups accept at most {MAX_BATCH_IDS} ids, got {}",
            ids.len()
        )));
    }
    Ok(())
}

/// Live listener on one document.
///
/// Dropping the subscription (or calling [`Subscription::cancel`]) detaches it.
pub struct Subscription {
    path: DocumentPath,
    events: mpsc::UnboundedReceiver<SnapshotEvent>,
    pump: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(path: DocumentPath, events: mpsc::UnboundedReceiver<SnapshotEvent>) -> Self {
        Self {
            path,
            events,
            pump: None,
        }
    }

    /// Subscription fed by a background task that is aborted on detach.
    pub fn with_pump(path: DocumentPath, events: mpsc::UnboundedReceiver<SnapshotEvent>, pump: JoinHandle<()>) -> Self {
        Self {
            path,
            events,
            pump: Some(pump),
        }
    }

    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// Waits for the next delivery. `None` once the store has dropped the listener.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        self.events.recv().await
    }

    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.events.close();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        debug!("detached listener on {}", self.path);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("path", &self.path).finish()
    }
}
