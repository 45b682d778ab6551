//! Copies teacher user records into the staff collection.

use crate::interaction::Interaction;
use staff_db::{
    models::{field, Role, StaffRecord},
    Backend, Query, SetMode, WriteBatch,
};
use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

pub const CONFIRMATION: &str = "This will copy all teacher profiles from the 'users' collection \
     into the 'staff' collection. Proceed?";

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Writes per committed batch; kept below the backend ceiling.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_source_collection")]
    pub source_collection: String,
    #[serde(default = "default_target_collection")]
    pub target_collection: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            source_collection: default_source_collection(),
            target_collection: default_target_collection(),
        }
    }
}

fn default_batch_size() -> usize {
    400
}

fn default_source_collection() -> String {
    staff_db::models::USERS.to_owned()
}

fn default_target_collection() -> String {
    staff_db::models::STAFF.to_owned()
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("batch size {size} must be between 1 and {}", .limit.saturating_sub(1))]
    BatchSize { size: usize, limit: usize },
    #[error("preparing teacher query: {0}")]
    PrepareQuery(#[source] staff_db::Error),
    #[error("querying teachers: {0}")]
    RunQuery(#[source] staff_db::Error),
    #[error("committing batch {batch}: {source}")]
    Commit {
        batch: usize,
        #[source]
        source: staff_db::Error,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub processed: usize,
    pub batches: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Completed(Report),
    Cancelled,
    AlreadyRunning,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

const IDLE: u8 = 0;
const RUNNING: u8 = 1;

#[derive(Debug, Default)]
pub(crate) struct RunGate(AtomicU8);

impl RunGate {
    pub(crate) fn state(&self) -> RunState {
        match self.0.load(Ordering::Acquire) {
            IDLE => RunState::Idle,
            _ => RunState::Running,
        }
    }

    /// Idle → Running, or `None` when a run already holds the gate.
    pub(crate) fn try_begin(&self) -> Option<RunTicket<'_>> {
        self.0
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunTicket(self))
    }
}

/// Holding the ticket keeps the gate in [`RunState::Running`].
pub(crate) struct RunTicket<'a>(&'a RunGate);

impl Drop for RunTicket<'_> {
    fn drop(&mut self) {
        self.0 .0.store(IDLE, Ordering::Release);
    }
}

pub struct Runner {
    backend: Arc<dyn Backend>,
    interaction: Arc<dyn Interaction>,
    config: Config,
    pub(crate) gate: RunGate,
}

impl Runner {
    pub fn new(
        backend: Arc<dyn Backend>,
        interaction: Arc<dyn Interaction>,
        config: Config,
    ) -> Result<Self, Error> {
        let limit = backend.max_batch_operations();
        if config.batch_size == 0 || config.batch_size >= limit {
            return Err(Error::BatchSize {
                size: config.batch_size,
                limit,
            });
        }
        Ok(Self {
            backend,
            interaction,
            config,
            gate: RunGate::default(),
        })
    }

    pub fn state(&self) -> RunState {
        self.gate.state()
    }

    /// Asks for confirmation, then copies every teacher into the staff
    /// collection. Batches committed before a failure stay applied.
    pub async fn run(&self) -> Result<Outcome, Error> {
        let Some(_ticket) = self.gate.try_begin() else {
            tracing::warn!("backfill already running");
            return Ok(Outcome::AlreadyRunning);
        };
        if !self.interaction.confirm(CONFIRMATION) {
            tracing::info!("backfill cancelled");
            return Ok(Outcome::Cancelled);
        }
        let report = self.copy_teachers().await?;
        tracing::info!(
            processed = report.processed,
            batches = report.batches,
            "backfill completed"
        );
        Ok(Outcome::Completed(report))
    }

    #[tracing::instrument(skip(self), fields(
        source = %self.config.source_collection,
        target = %self.config.target_collection,
    ))]
    async fn copy_teachers(&self) -> Result<Report, Error> {
        let query = Query::new(&self.config.source_collection)
            .and_then(|query| query.where_eq(field::ROLE, Role::Teacher))
            .map_err(Error::PrepareQuery)?;
        let teachers = self
            .backend
            .run_query(&query)
            .await
            .map_err(Error::RunQuery)?;
        tracing::debug!(matched = teachers.len(), "teachers loaded");
        let mut report = Report::default();
        let mut batch = WriteBatch::new();
        for teacher in &teachers {
            batch.set(
                &self.config.target_collection,
                &teacher.id,
                StaffRecord::from_user(teacher).into_fields(),
                SetMode::Merge,
            );
            report.processed += 1;
            if batch.len() >= self.config.batch_size {
                self.commit(std::mem::take(&mut batch), &mut report).await?;
            }
        }
        if !batch.is_empty() {
            self.commit(batch, &mut report).await?;
        }
        Ok(report)
    }

    async fn commit(&self, batch: WriteBatch, report: &mut Report) -> Result<(), Error> {
        let size = batch.len();
        self.backend
            .commit(batch)
            .await
            .map_err(|source| Error::Commit {
                batch: report.batches + 1,
                source,
            })?;
        report.batches += 1;
        tracing::debug!(batch = report.batches, size, "batch committed");
        Ok(())
    }
}
