//! Live snapshot feeds over a collection.

use crate::{Document, Error};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One document change. For [`ChangeKind::Removed`] the document carries the
/// last fields the backend held for it.
#[derive(Clone, Debug, PartialEq)]
pub struct Change {
    pub kind: ChangeKind,
    pub document: Document,
}

/// Changes the backend applied together. The first snapshot of a
/// subscription lists every existing document as [`ChangeKind::Added`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub changes: Vec<Change>,
}

type Release = Box<dyn FnOnce() + Send>;

/// Owned handle on a backend listener.
///
/// The listener is released exactly once: by [`Subscription::unsubscribe`] or,
/// failing that, when the handle is dropped.
pub struct Subscription {
    id: Uuid,
    events: mpsc::UnboundedReceiver<Result<Snapshot, Error>>,
    release: Option<Release>,
}

impl Subscription {
    pub fn new(
        id: Uuid,
        events: mpsc::UnboundedReceiver<Result<Snapshot, Error>>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            id,
            events,
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Waits for the next snapshot. `None` once the backend has dropped the
    /// listener.
    pub async fn next(&mut self) -> Option<Result<Snapshot, Error>> {
        self.events.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.release_listener();
    }

    fn release_listener(&mut self) {
        if let Some(release) = self.release.take() {
            self.events.close();
            release();
            tracing::debug!(subscription = %self.id, "listener released");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_listener();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("released", &self.release.is_none())
            .finish()
    }
}
