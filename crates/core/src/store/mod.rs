//! System-of-record seam.
//!
//! [`ConsultationStore`] is the only place consultation records and addenda are persisted. All
//! status-dependent writes go through [`ConsultationStore::compare_and_set`] or
//! [`ConsultationStore::insert_addendum`], which check the current status and write under one
//! lock. Nothing above this layer reads a record and then writes it back.
//!
//! Every successful write publishes a [`ChangeEvent`] on a broadcast channel. Delivery is
//! at-least-once from the subscriber's point of view: a lagging receiver may miss events and is
//! expected to refetch. Events are process-local; writes made by another process sharing a
//! [`FileStore`] are picked up through [`ConsultationStore::poll_interval`].

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::addendum::Addendum;
use crate::consultation::{ConsultationRequest, ConsultationStatus, Guarded, RecordMutation};
use crate::error::CoreResult;
use crate::queue::QueueFilter;
use crate::types::ConsultationId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;

/// What happened to a consultation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Claimed,
    Updated,
    Completed,
    Cancelled,
    AddendumAdded,
}

impl ChangeKind {
    pub(crate) fn for_mutation(mutation: &RecordMutation) -> Self {
        match mutation {
            RecordMutation::Claim { .. } => ChangeKind::Claimed,
            RecordMutation::WriteFields { .. } => ChangeKind::Updated,
            RecordMutation::Complete { .. } => ChangeKind::Completed,
            RecordMutation::Cancel { .. } => ChangeKind::Cancelled,
        }
    }
}

/// Notification published after a successful write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub consultation_id: ConsultationId,
    /// Status of the record after the write.
    pub status: ConsultationStatus,
    pub kind: ChangeKind,
}

#[async_trait]
pub trait ConsultationStore: Send + Sync {
    /// Persists a new record. Fails with `AlreadyExists` if the id is taken.
    async fn insert(&self, record: ConsultationRequest) -> CoreResult<()>;

    async fn get(&self, id: ConsultationId) -> CoreResult<Option<ConsultationRequest>>;

    /// Records matching `filter`, oldest `created_at` first.
    async fn list(&self, filter: &QueueFilter) -> CoreResult<Vec<ConsultationRequest>>;

    /// Applies `mutation` only if the record's current status is one of `expected`.
    ///
    /// The check and the write are atomic with respect to every other write on the same store.
    /// On [`Guarded::Conflict`] or [`Guarded::Missing`] nothing is written and no event is sent.
    async fn compare_and_set(
        &self,
        id: ConsultationId,
        expected: &[ConsultationStatus],
        mutation: RecordMutation,
    ) -> CoreResult<Guarded<ConsultationRequest>>;

    /// Appends an addendum if, and only if, the parent consultation is Completed.
    async fn insert_addendum(&self, addendum: Addendum) -> CoreResult<Guarded<Addendum>>;

    /// Addenda for a consultation, oldest first.
    async fn addenda(&self, consultation_id: ConsultationId) -> CoreResult<Vec<Addendum>>;

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;

    /// Period at which live views should also re-read the store.
    ///
    /// `None` when [`ConsultationStore::subscribe`] sees every write. Stores shared with other
    /// processes return `Some`, since their writes never reach this process's channel.
    fn poll_interval(&self) -> Option<Duration> {
        None
    }
}

/// Sorts records oldest first, breaking ties by id so the order is stable.
pub(crate) fn sort_oldest_first(records: &mut [ConsultationRequest]) {
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

pub(crate) fn publish(
    events: &broadcast::Sender<ChangeEvent>,
    consultation_id: ConsultationId,
    status: ConsultationStatus,
    kind: ChangeKind,
) {
    // An error only means nobody is subscribed right now.
    let _ = events.send(ChangeEvent {
        consultation_id,
        status,
        kind,
    });
}
