use serde_json::Value;
use std::path::PathBuf;

mod batch;
mod document;
mod memory;
pub mod models;
mod query;
mod subscription;

pub use batch::{WriteBatch, WriteOp};
pub use document::{Document, Fields};
pub use memory::{MemoryBackend, Operation};
pub use query::Query;
pub use subscription::{Change, ChangeKind, Snapshot, Subscription};

/// Hard ceiling the hosted store puts on a single batched write.
pub const MAX_BATCH_OPERATIONS: usize = 500;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("batch commit failed: {0}")]
    Commit(String),
    #[error("batch of {size} operations exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },
    #[error("write failed: {0}")]
    Write(String),
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("listener failed: {0}")]
    Listen(String),
    #[error("reading seed file: {0}")]
    SeedIo(#[from] std::io::Error),
    #[error("parsing seed file: {0}")]
    SeedFormat(#[from] serde_json::Error),
}

/// How a `set` treats fields already present on the target document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetMode {
    Replace,
    Merge,
}

/// Document-oriented backend the staff panel talks to.
///
/// Every call suspends the caller until the backend answers. Subscriptions
/// deliver their events on a channel owned by the returned [`Subscription`].
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Operation ceiling enforced on [`Backend::commit`].
    fn max_batch_operations(&self) -> usize;

    async fn run_query(&self, query: &Query) -> Result<Vec<Document>, Error>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, Error>;

    async fn set(&self, collection: &str, id: &str, fields: Fields, mode: SetMode)
        -> Result<(), Error>;

    /// Merges `fields` into an existing document; fails with
    /// [`Error::NotFound`] when there is nothing to update.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), Error>;

    /// Removes the document. Deleting an absent document succeeds.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), Error>;

    /// Applies every operation of the batch or none of them.
    async fn commit(&self, batch: WriteBatch) -> Result<(), Error>;

    async fn subscribe(&self, collection: &str) -> Result<Subscription, Error>;
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default = "default_max_batch_operations")]
    pub max_batch_operations: usize,
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
    #[serde(default = "default_seed_collection")]
    pub seed_collection: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_batch_operations: default_max_batch_operations(),
            seed_file: None,
            seed_collection: default_seed_collection(),
        }
    }
}

fn default_max_batch_operations() -> usize {
    MAX_BATCH_OPERATIONS
}

fn default_seed_collection() -> String {
    models::USERS.to_owned()
}

/// Builds the in-process store, loading the seed file when one is configured.
///
/// The seed file is a JSON object mapping document ids to field objects.
#[tracing::instrument(skip(config), fields(seed_file = ?config.seed_file))]
pub fn create(config: &Config) -> Result<MemoryBackend, Error> {
    let backend = MemoryBackend::new(config.max_batch_operations);
    if let Some(path) = &config.seed_file {
        let contents = std::fs::read_to_string(path)?;
        let documents = serde_json::from_str::<serde_json::Map<String, Value>>(&contents)?;
        let mut seeded = 0usize;
        for (id, fields) in documents {
            match fields {
                Value::Object(fields) => {
                    backend.insert(&config.seed_collection, &id, fields);
                    seeded += 1;
                }
                other => {
                    tracing::warn!(%id, "skipping seed entry that is not an object: {other}");
                }
            }
        }
        tracing::info!(seeded, collection = %config.seed_collection, "seeded document store");
    }
    Ok(backend)
}
