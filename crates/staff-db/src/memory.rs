use crate::{
    Backend, Change, ChangeKind, Document, Error, Fields, Query, SetMode, Snapshot, Subscription,
    WriteBatch, WriteOp,
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, Weak},
};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Backend operations that can be made to fail on purpose.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Query,
    Commit,
    Update,
    Delete,
}

#[derive(Debug)]
struct Fault {
    operation: Operation,
    skip: usize,
    message: String,
}

#[derive(Debug)]
struct Listener {
    collection: String,
    sender: mpsc::UnboundedSender<Result<Snapshot, Error>>,
}

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, BTreeMap<String, Fields>>,
    listeners: HashMap<Uuid, Listener>,
    faults: Vec<Fault>,
    commits: Vec<usize>,
}

#[derive(Debug)]
struct Inner {
    max_batch_operations: usize,
    state: Mutex<State>,
}

/// Process-local document store with the semantics of the hosted backend:
/// merge writes, atomic batches under an operation ceiling, and snapshot
/// listeners.
#[derive(Clone, Debug)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(crate::MAX_BATCH_OPERATIONS)
    }
}

impl MemoryBackend {
    pub fn new(max_batch_operations: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_batch_operations,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Stores a document directly, notifying listeners like any other write.
    pub fn insert(&self, collection: &str, id: &str, fields: Fields) {
        let mut state = self.state();
        if let Some(change) = state.apply_set(collection, id, fields, SetMode::Replace) {
            state.publish(collection, vec![change]);
        }
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.state()
            .collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Operation counts of every batch committed so far, in commit order.
    pub fn commit_history(&self) -> Vec<usize> {
        self.state().commits.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }

    /// Makes the next call of `operation`, after `skip` successful ones, fail
    /// with `message`.
    pub fn inject_fault(&self, operation: Operation, skip: usize, message: impl Into<String>) {
        self.state().faults.push(Fault {
            operation,
            skip,
            message: message.into(),
        });
    }

    /// Pushes an error to every listener on `collection`.
    pub fn fail_listeners(&self, collection: &str, message: &str) {
        let state = self.state();
        for listener in state.listeners.values() {
            if listener.collection == collection {
                let _ = listener.sender.send(Err(Error::Listen(message.to_owned())));
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.inner.state)
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn release_listener(inner: Weak<Inner>, id: Uuid) -> impl FnOnce() + Send + 'static {
    move || {
        if let Some(inner) = inner.upgrade() {
            lock(&inner.state).listeners.remove(&id);
        }
    }
}

impl State {
    fn take_fault(&mut self, operation: Operation) -> Option<String> {
        let position = self
            .faults
            .iter()
            .position(|fault| fault.operation == operation)?;
        let fault = &mut self.faults[position];
        if fault.skip > 0 {
            fault.skip -= 1;
            return None;
        }
        Some(self.faults.remove(position).message)
    }

    fn apply_set(
        &mut self,
        collection: &str,
        id: &str,
        fields: Fields,
        mode: SetMode,
    ) -> Option<Change> {
        let documents = self.collections.entry(collection.to_owned()).or_default();
        match documents.get_mut(id) {
            Some(existing) => {
                let mut updated = match mode {
                    SetMode::Replace => Fields::new(),
                    SetMode::Merge => existing.clone(),
                };
                updated.extend(fields);
                if updated == *existing {
                    return None;
                }
                *existing = updated.clone();
                Some(Change {
                    kind: ChangeKind::Modified,
                    document: Document::new(id, updated),
                })
            }
            None => {
                documents.insert(id.to_owned(), fields.clone());
                Some(Change {
                    kind: ChangeKind::Added,
                    document: Document::new(id, fields),
                })
            }
        }
    }

    fn apply_delete(&mut self, collection: &str, id: &str) -> Option<Change> {
        let fields = self.collections.get_mut(collection)?.remove(id)?;
        Some(Change {
            kind: ChangeKind::Removed,
            document: Document::new(id, fields),
        })
    }

    fn publish(&mut self, collection: &str, changes: Vec<Change>) {
        if changes.is_empty() {
            return;
        }
        let snapshot = Snapshot { changes };
        self.listeners.retain(|id, listener| {
            if listener.collection != collection {
                return true;
            }
            let delivered = listener.sender.send(Ok(snapshot.clone())).is_ok();
            if !delivered {
                tracing::debug!(listener = %id, "dropping closed listener");
            }
            delivered
        });
    }
}

#[async_trait::async_trait]
impl Backend for MemoryBackend {
    fn max_batch_operations(&self) -> usize {
        self.inner.max_batch_operations
    }

    #[tracing::instrument(skip(self))]
    async fn run_query(&self, query: &Query) -> Result<Vec<Document>, Error> {
        let mut state = self.state();
        if let Some(message) = state.take_fault(Operation::Query) {
            return Err(Error::Query(message));
        }
        Ok(state
            .collections
            .get(query.collection())
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .filter(|document| query.matches(document))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, Error> {
        Ok(self
            .state()
            .collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    #[tracing::instrument(skip(self, fields))]
    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        mode: SetMode,
    ) -> Result<(), Error> {
        let mut state = self.state();
        if let Some(change) = state.apply_set(collection, id, fields, mode) {
            state.publish(collection, vec![change]);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, fields))]
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), Error> {
        let mut state = self.state();
        if let Some(message) = state.take_fault(Operation::Update) {
            return Err(Error::Write(message));
        }
        let exists = state
            .collections
            .get(collection)
            .is_some_and(|documents| documents.contains_key(id));
        if !exists {
            return Err(Error::NotFound {
                collection: collection.to_owned(),
                id: id.to_owned(),
            });
        }
        if let Some(change) = state.apply_set(collection, id, fields, SetMode::Merge) {
            state.publish(collection, vec![change]);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, collection: &str, id: &str) -> Result<(), Error> {
        let mut state = self.state();
        if let Some(message) = state.take_fault(Operation::Delete) {
            return Err(Error::Write(message));
        }
        if let Some(change) = state.apply_delete(collection, id) {
            state.publish(collection, vec![change]);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, batch), fields(size = batch.len()))]
    async fn commit(&self, batch: WriteBatch) -> Result<(), Error> {
        let limit = self.inner.max_batch_operations;
        if batch.len() > limit {
            return Err(Error::BatchTooLarge {
                size: batch.len(),
                limit,
            });
        }
        let mut state = self.state();
        if let Some(message) = state.take_fault(Operation::Commit) {
            return Err(Error::Commit(message));
        }
        let size = batch.len();
        let mut changes: BTreeMap<String, Vec<Change>> = BTreeMap::new();
        for op in batch.into_ops() {
            let (collection, change) = match op {
                WriteOp::Set {
                    collection,
                    id,
                    fields,
                    mode,
                } => {
                    let change = state.apply_set(&collection, &id, fields, mode);
                    (collection, change)
                }
                WriteOp::Delete { collection, id } => {
                    let change = state.apply_delete(&collection, &id);
                    (collection, change)
                }
            };
            if let Some(change) = change {
                changes.entry(collection).or_default().push(change);
            }
        }
        for (collection, changes) in changes {
            state.publish(&collection, changes);
        }
        state.commits.push(size);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn subscribe(&self, collection: &str) -> Result<Subscription, Error> {
        if !crate::document::valid_segment(collection) {
            return Err(Error::InvalidQuery(format!(
                "collection name {collection:?} is not valid"
            )));
        }
        let id = Uuid::new_v4();
        let (sender, events) = mpsc::unbounded_channel();
        let mut state = self.state();
        let initial = state
            .collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, fields)| Change {
                        kind: ChangeKind::Added,
                        document: Document::new(id.clone(), fields.clone()),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let _ = sender.send(Ok(Snapshot { changes: initial }));
        state.listeners.insert(
            id,
            Listener {
                collection: collection.to_owned(),
                sender,
            },
        );
        tracing::debug!(listener = %id, "listener registered");
        Ok(Subscription::new(
            id,
            events,
            release_listener(Arc::downgrade(&self.inner), id),
        ))
    }
}
