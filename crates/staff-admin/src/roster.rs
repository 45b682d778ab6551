//! Live, ordered view of the staff collection with per-row edit and delete.

use crate::interaction::Interaction;
use itertools::Itertools;
use staff_db::{
    models::{field, Role, StaffRow},
    Backend, ChangeKind, Fields, Snapshot, Subscription,
};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard};

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default = "default_collection")]
    pub collection: String,
    /// How long `close` waits for the listener task to release its
    /// subscription.
    #[serde(with = "humantime_serde", default = "default_teardown_timeout")]
    pub teardown_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            teardown_timeout: default_teardown_timeout(),
        }
    }
}

fn default_collection() -> String {
    staff_db::models::STAFF.to_owned()
}

fn default_teardown_timeout() -> Duration {
    Duration::from_secs(5)
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("subscribing to staff: {0}")]
    Subscribe(#[source] staff_db::Error),
    #[error("staff record {0} is not in the roster")]
    UnknownRecord(String),
    #[error("updating staff record {id}: {source}")]
    Update {
        id: String,
        #[source]
        source: staff_db::Error,
    },
    #[error("deleting staff record {id}: {source}")]
    Delete {
        id: String,
        #[source]
        source: staff_db::Error,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    Updated,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Cancelled,
}

pub type Rows = Arc<Vec<StaffRow>>;

/// Owns the staff subscription for as long as the view lives. Dropping the
/// view, or calling [`RosterView::close`], releases the backend listener.
pub struct RosterView {
    backend: Arc<dyn Backend>,
    interaction: Arc<dyn Interaction>,
    config: Config,
    rows: watch::Receiver<Rows>,
    listener: Option<JoinHandle<()>>,
    shutdown: CancellationToken,
    _shutdown_on_drop: DropGuard,
}

impl RosterView {
    #[tracing::instrument(skip_all, fields(collection = %config.collection))]
    pub async fn open(
        backend: Arc<dyn Backend>,
        interaction: Arc<dyn Interaction>,
        config: Config,
    ) -> Result<Self, Error> {
        let subscription = backend
            .subscribe(&config.collection)
            .await
            .map_err(Error::Subscribe)?;
        let (sender, rows) = watch::channel(Rows::default());
        let shutdown = CancellationToken::new();
        let listener = tokio::spawn(follow(
            subscription,
            sender,
            interaction.clone(),
            shutdown.clone(),
        ));
        Ok(Self {
            backend,
            interaction,
            config,
            rows,
            listener: Some(listener),
            _shutdown_on_drop: shutdown.clone().drop_guard(),
            shutdown,
        })
    }

    /// Current rows, newest first.
    pub fn rows(&self) -> Rows {
        self.rows.borrow().clone()
    }

    pub fn row(&self, id: &str) -> Option<StaffRow> {
        self.rows.borrow().iter().find(|row| row.id == id).cloned()
    }

    /// Waits until the rows satisfy `predicate`. `false` if the listener
    /// stopped first.
    pub async fn wait_until(&mut self, mut predicate: impl FnMut(&[StaffRow]) -> bool) -> bool {
        self.rows.wait_for(|rows| predicate(rows)).await.is_ok()
    }

    /// Prompts for name, USN, email and department, then merges them into the
    /// record. Cancelling any prompt leaves the record untouched.
    #[tracing::instrument(skip(self))]
    pub async fn edit(&self, id: &str) -> Result<EditOutcome, Error> {
        let current = self
            .row(id)
            .ok_or_else(|| Error::UnknownRecord(id.to_owned()))?;
        let Some(fields) = prompt_changes(self.interaction.as_ref(), &current) else {
            tracing::info!("edit cancelled");
            return Ok(EditOutcome::Cancelled);
        };
        self.backend
            .update(&self.config.collection, id, fields)
            .await
            .map_err(|source| Error::Update {
                id: id.to_owned(),
                source,
            })?;
        tracing::info!("staff record updated");
        Ok(EditOutcome::Updated)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<DeleteOutcome, Error> {
        let label = self
            .row(id)
            .and_then(|row| row.name)
            .unwrap_or_else(|| id.to_owned());
        if !self
            .interaction
            .confirm(&format!("Delete staff member {label}?"))
        {
            return Ok(DeleteOutcome::Cancelled);
        }
        self.backend
            .delete(&self.config.collection, id)
            .await
            .map_err(|source| Error::Delete {
                id: id.to_owned(),
                source,
            })?;
        tracing::info!("staff record deleted");
        Ok(DeleteOutcome::Deleted)
    }

    /// Stops the listener and waits for it to release the subscription.
    pub async fn close(mut self) {
        self.shutdown.cancel();
        if let Some(listener) = self.listener.take() {
            match tokio::time::timeout(self.config.teardown_timeout, listener).await {
                Ok(Ok(())) => (),
                Ok(Err(err)) => tracing::error!("staff listener task failed: {err}"),
                Err(_) => tracing::warn!("staff listener did not stop in time"),
            }
        }
    }
}

fn prompt_changes(interaction: &dyn Interaction, current: &StaffRow) -> Option<Fields> {
    let value = |value: &Option<String>| value.clone().unwrap_or_default();
    let name = interaction.prompt_text("Name", &value(&current.name))?;
    let usn = interaction.prompt_text("USN", &value(&current.usn))?;
    let email = interaction.prompt_text("Email", &value(&current.email))?;
    let department = interaction.prompt_text("Department", &value(&current.department))?;

    let mut fields = Fields::new();
    fields.insert(field::NAME.to_owned(), Value::String(name));
    fields.insert(field::USN.to_owned(), Value::String(usn));
    fields.insert(field::EMAIL.to_owned(), Value::String(email));
    fields.insert(field::DEPARTMENT.to_owned(), Value::String(department));
    fields.insert(
        field::UPDATED_AT.to_owned(),
        Value::String(jiff::Timestamp::now().to_string()),
    );
    fields.insert(field::ROLE.to_owned(), Role::Teacher.into());
    Some(fields)
}

async fn follow(
    mut subscription: Subscription,
    rows: watch::Sender<Rows>,
    interaction: Arc<dyn Interaction>,
    shutdown: CancellationToken,
) {
    let mut records: HashMap<String, StaffRow> = HashMap::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = subscription.next() => match event {
                Some(Ok(snapshot)) => {
                    apply(&mut records, snapshot);
                    rows.send_replace(Arc::new(
                        records.values().cloned().sorted_by(StaffRow::roster_order).collect(),
                    ));
                }
                Some(Err(err)) => {
                    tracing::error!("loading staff failed: {err}");
                    interaction.notify(&format!("Failed to load staff: {err}"));
                }
                None => {
                    tracing::warn!("staff listener closed by the backend");
                    break;
                }
            }
        }
    }
    subscription.unsubscribe();
}

fn apply(records: &mut HashMap<String, StaffRow>, snapshot: Snapshot) {
    for change in snapshot.changes {
        match change.kind {
            ChangeKind::Added | ChangeKind::Modified => {
                records.insert(
                    change.document.id.clone(),
                    StaffRow::from_document(&change.document),
                );
            }
            ChangeKind::Removed => {
                records.remove(&change.document.id);
            }
        }
    }
}
