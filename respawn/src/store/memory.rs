use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
};

use log::debug;
use tokio::sync::mpsc;

use super::{
    DocumentStore, FieldOperation, SnapshotEvent, Subscription, UpsertOutcome, apply_operations, check_batch,
    validate_operations,
};
use crate::{
    errors::StoreError,
    id::generate_document_id,
    types::{Document, DocumentPath, Snapshot},
};

/// In-process document store.
///
/// Every write takes a single lock, so field operations on one document are atomic
/// with respect to all other writers. Listeners are notified while the lock is
/// held, so each subscriber sees snapshots in write order.
///
/// Every call yields to the scheduler once before touching state, the way a
/// network round trip would, so concurrent callers interleave realistically.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    batch_queries: AtomicUsize,
}

#[derive(Default)]
struct MemoryState {
    collections: HashMap<String, BTreeMap<String, Document>>,
    listeners: HashMap<DocumentPath, Vec<mpsc::UnboundedSender<SnapshotEvent>>>,
    denied_paths: HashSet<DocumentPath>,
    denied_collections: HashSet<String>,
    write_budgets: HashMap<DocumentPath, usize>,
}

impl MemoryState {
    fn document(&self, path: &DocumentPath) -> Option<&Document> {
        self.collections.get(&path.collection)?.get(&path.id)
    }

    fn check_writable(&mut self, path: &DocumentPath) -> Result<(), StoreError> {
        if self.denied_paths.contains(path) || self.denied_collections.contains(&path.collection) {
            return Err(StoreError::PermissionDenied { path: path.clone() });
        }
        if let Some(remaining) = self.write_budgets.get_mut(path) {
            if *remaining == 0 {
                return Err(StoreError::PermissionDenied { path: path.clone() });
            }
            *remaining -= 1;
        }
        Ok(())
    }

    fn write(&mut self, path: &DocumentPath, document: Option<Document>) {
        let collection = self.collections.entry(path.collection.clone()).or_default();
        match document {
            Some(document) => {
                collection.insert(path.id.clone(), document);
            }
            None => {
                collection.remove(&path.id);
            }
        }
        self.notify(path);
    }

    fn notify(&mut self, path: &DocumentPath) {
        let snapshot = Snapshot {
            path: path.clone(),
            data: self.document(path).cloned(),
        };
        if let Some(senders) = self.listeners.get_mut(path) {
            senders.retain(|sender| sender.send(Ok(snapshot.clone())).is_ok());
            if senders.is_empty() {
                self.listeners.remove(path);
            }
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write to `path` fail with [`StoreError::PermissionDenied`].
    pub fn deny_writes(&self, path: &DocumentPath) -> Result<(), StoreError> {
        self.lock()?.denied_paths.insert(path.clone());
        Ok(())
    }

    /// Makes every write to `collection` fail with [`StoreError::PermissionDenied`].
    pub fn deny_collection_writes(&self, collection: &str) -> Result<(), StoreError> {
        self.lock()?.denied_collections.insert(collection.to_string());
        Ok(())
    }

    /// Lets `allowed` more writes to `path` through, then denies the rest.
    pub fn deny_writes_after(&self, path: &DocumentPath, allowed: usize) -> Result<(), StoreError> {
        self.lock()?.write_budgets.insert(path.clone(), allowed);
        Ok(())
    }

    /// Lifts every write denial.
    pub fn allow_all_writes(&self) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.denied_paths.clear();
        state.denied_collections.clear();
        state.write_budgets.clear();
        Ok(())
    }

    /// Reports `message` to every listener on `path` and detaches them.
    pub fn fail_listeners(&self, path: &DocumentPath, message: &'static str) -> Result<(), StoreError> {
        if let Some(senders) = self.lock()?.listeners.remove(path) {
            for sender in senders {
                let _ = sender.send(Err(StoreError::other(message)));
            }
        }
        Ok(())
    }

    /// Number of listeners currently attached to `path`.
    pub fn listener_count(&self, path: &DocumentPath) -> Result<usize, StoreError> {
        let mut state = self.lock()?;
        if let Some(senders) = state.listeners.get_mut(path) {
            senders.retain(|sender| !sender.is_closed());
        }
        Ok(state.listeners.get(path).map_or(0, Vec::len))
    }

    /// Number of [`DocumentStore::get_many`] calls served so far.
    pub fn batch_query_count(&self) -> usize {
        self.batch_queries.load(Ordering::SeqCst)
    }

    /// Copy of every stored document, keyed by collection then id.
    pub fn export(&self) -> Result<BTreeMap<String, BTreeMap<String, Document>>, StoreError> {
        Ok(self
            .lock()?
            .collections
            .iter()
            .filter(|(_, documents)| !documents.is_empty())
            .map(|(collection, documents)| (collection.clone(), documents.clone()))
            .collect())
    }

    /// Store preloaded with documents previously returned by [`MemoryStore::export`].
    pub fn from_documents(collections: BTreeMap<String, BTreeMap<String, Document>>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                collections: collections.into_iter().collect(),
                ..MemoryState::default()
            }),
            batch_queries: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::other("memory store lock poisoned"))
    }
}

impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        tokio::task::yield_now().await;
        Ok(self.lock()?.document(path).cloned())
    }

    async fn set(&self, path: &DocumentPath, document: Document) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock()?;
        state.check_writable(path)?;
        state.write(path, Some(document));
        debug!("set {path}");
        Ok(())
    }

    async fn create(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        tokio::task::yield_now().await;
        let path = DocumentPath::new(collection, generate_document_id());
        let mut state = self.lock()?;
        state.check_writable(&path)?;
        state.write(&path, Some(document));
        debug!("created {path}");
        Ok(path.id)
    }

    async fn update(&self, path: &DocumentPath, operations: &[FieldOperation]) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        validate_operations(operations)?;
        let mut state = self.lock()?;
        state.check_writable(path)?;
        let mut document = state
            .document(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { path: path.clone() })?;
        apply_operations(&mut document, operations)?;
        state.write(path, Some(document));
        debug!("updated {path} with {} operation(s)", operations.len());
        Ok(())
    }

    async fn upsert(
        &self,
        path: &DocumentPath,
        create: Document,
        operations: &[FieldOperation],
    ) -> Result<UpsertOutcome, StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock()?;
        state.check_writable(path)?;
        match state.document(path).cloned() {
            Some(mut document) => {
                if !operations.is_empty() {
                    apply_operations(&mut document, operations)?;
                    state.write(path, Some(document));
                }
                debug!("upsert updated {path}");
                Ok(UpsertOutcome::Updated)
            }
            None => {
                state.write(path, Some(create));
                debug!("upsert created {path}");
                Ok(UpsertOutcome::Created)
            }
        }
    }

    async fn delete(&self, path: &DocumentPath) -> Result<bool, StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock()?;
        state.check_writable(path)?;
        let existed = state.document(path).is_some();
        if existed {
            state.write(path, None);
        }
        Ok(existed)
    }

    async fn get_many(&self, collection: &str, ids: &[String]) -> Result<Vec<(String, Document)>, StoreError> {
        check_batch(ids)?;
        tokio::task::yield_now().await;
        self.batch_queries.fetch_add(1, Ordering::SeqCst);
        let state = self.lock()?;
        let Some(documents) = state.collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| documents.get(id).map(|document| (id.clone(), document.clone())))
            .collect())
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.lock()?;
        Ok(state
            .collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, document)| (id.clone(), document.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn subscribe(&self, path: &DocumentPath) -> Result<Subscription, StoreError> {
        tokio::task::yield_now().await;
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.lock()?;
        let initial = Snapshot {
            path: path.clone(),
            data: state.document(path).cloned(),
        };
        // The receiver is still held here, so the initial send cannot fail.
        let _ = sender.send(Ok(initial));
        state.listeners.entry(path.clone()).or_default().push(sender);
        debug!("attached listener on {path}");
        Ok(Subscription::new(path.clone(), receiver))
    }
}
