//! Request Queue: the clinician-facing view of open consultations.
//!
//! The queue is advisory. It is rebuilt from the store whenever a relevant [`ChangeEvent`]
//! arrives, and a claim or cancel made from it is still checked against the stored record.
//! Refetching is idempotent, so duplicate or dropped notifications only cost an extra read.

use crate::consultation::{ConsultationRequest, ConsultationStatus};
use crate::error::CoreResult;
use crate::store::{ChangeEvent, ChangeKind, ConsultationStore};
use crate::types::{ClinicianId, ConsultationId, MembershipId, PersonId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueFilter {
    pub statuses: Vec<ConsultationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<ClinicianId>,
}

impl Default for QueueFilter {
    /// Pending and InProgress requests, regardless of assignment.
    fn default() -> Self {
        Self {
            statuses: vec![ConsultationStatus::Pending, ConsultationStatus::InProgress],
            assigned_to: None,
        }
    }
}

impl QueueFilter {
    pub fn with_statuses(statuses: impl IntoIterator<Item = ConsultationStatus>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
            assigned_to: None,
        }
    }

    pub fn assigned_to(mut self, clinician_id: ClinicianId) -> Self {
        self.assigned_to = Some(clinician_id);
        self
    }

    pub fn matches(&self, record: &ConsultationRequest) -> bool {
        self.statuses.contains(&record.status)
            && self
                .assigned_to
                .map_or(true, |clinician| record.assigned_clinician_id == Some(clinician))
    }
}

/// Summary row shown in the queue. Clinical fields are deliberately absent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: ConsultationId,
    pub membership_id: MembershipId,
    pub person_id: PersonId,
    pub status: ConsultationStatus,
    pub chief_complaint: String,
    pub assigned_clinician_id: Option<ClinicianId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

impl From<&ConsultationRequest> for QueueEntry {
    fn from(record: &ConsultationRequest) -> Self {
        Self {
            id: record.id,
            membership_id: record.membership_id,
            person_id: record.person_id,
            status: record.status,
            chief_complaint: record.chief_complaint.clone(),
            assigned_clinician_id: record.assigned_clinician_id,
            created_at: record.created_at,
            started_at: record.started_at,
        }
    }
}

/// Only changes that can move a summary row trigger a refetch.
fn changes_queue(event: &ChangeEvent) -> bool {
    matches!(
        event.kind,
        ChangeKind::Created | ChangeKind::Claimed | ChangeKind::Completed | ChangeKind::Cancelled
    )
}

#[derive(Clone)]
pub struct RequestQueue {
    store: Arc<dyn ConsultationStore>,
}

impl RequestQueue {
    pub fn new(store: Arc<dyn ConsultationStore>) -> Self {
        Self { store }
    }

    /// Current matching entries, oldest first.
    pub async fn snapshot(&self, filter: &QueueFilter) -> CoreResult<Vec<QueueEntry>> {
        let records = self.store.list(filter).await?;
        Ok(records.iter().map(QueueEntry::from).collect())
    }

    /// Starts a live view. The first [`QueueSubscription::next`] yields the current snapshot.
    pub fn subscribe(&self, filter: QueueFilter) -> QueueSubscription {
        // Subscribe before the first fetch so nothing written in between is missed.
        let events = self.store.subscribe();
        QueueSubscription {
            queue: self.clone(),
            filter,
            events: Some(events),
            poll_period: self.store.poll_interval(),
            poll: None,
            last: None,
            primed: false,
        }
    }
}

/// Why a subscription woke up.
enum Wake {
    Changed,
    Poll,
    Ignored,
    Closed,
}

fn wake_for(received: Result<ChangeEvent, RecvError>) -> Wake {
    match received {
        Ok(event) if changes_queue(&event) => Wake::Changed,
        Ok(_) => Wake::Ignored,
        Err(RecvError::Lagged(skipped)) => {
            tracing::debug!("queue subscription lagged by {skipped} events, refetching");
            Wake::Changed
        }
        Err(RecvError::Closed) => Wake::Closed,
    }
}

/// A cancellable stream of queue snapshots.
///
/// For stores shared with other processes the subscription also re-reads the store on the
/// store's poll interval, and yields only when the snapshot differs from the last one.
pub struct QueueSubscription {
    queue: RequestQueue,
    filter: QueueFilter,
    events: Option<broadcast::Receiver<ChangeEvent>>,
    poll_period: Option<Duration>,
    poll: Option<Interval>,
    last: Option<Vec<QueueEntry>>,
    primed: bool,
}

impl QueueSubscription {
    /// Waits for the next snapshot.
    ///
    /// Returns `None` once the subscription is cancelled or the store goes away. A receiver that
    /// fell behind refetches rather than failing.
    pub async fn next(&mut self) -> Option<CoreResult<Vec<QueueEntry>>> {
        self.events.as_ref()?;
        if !self.primed {
            self.primed = true;
            return Some(self.fetch().await);
        }
        if self.poll.is_none() {
            if let Some(period) = self.poll_period {
                let mut poll = time::interval_at(Instant::now() + period, period);
                poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.poll = Some(poll);
            }
        }

        loop {
            let wake = {
                let events = self.events.as_mut()?;
                match self.poll.as_mut() {
                    Some(poll) => tokio::select! {
                        received = events.recv() => wake_for(received),
                        _ = poll.tick() => Wake::Poll,
                    },
                    None => wake_for(events.recv().await),
                }
            };
            match wake {
                Wake::Changed => return Some(self.fetch().await),
                Wake::Poll => match self.queue.snapshot(&self.filter).await {
                    Ok(entries) if self.last.as_ref() == Some(&entries) => continue,
                    Ok(entries) => {
                        self.last = Some(entries.clone());
                        return Some(Ok(entries));
                    }
                    Err(e) => return Some(Err(e)),
                },
                Wake::Ignored => continue,
                Wake::Closed => {
                    self.events = None;
                    return None;
                }
            }
        }
    }

    async fn fetch(&mut self) -> CoreResult<Vec<QueueEntry>> {
        let entries = self.queue.snapshot(&self.filter).await?;
        self.last = Some(entries.clone());
        Ok(entries)
    }

    pub fn filter(&self) -> &QueueFilter {
        &self.filter
    }

    /// Unsubscribes. Later calls to [`QueueSubscription::next`] return `None`.
    pub fn cancel(&mut self) {
        self.events = None;
        self.poll = None;
    }

    pub fn is_cancelled(&self) -> bool {
        self.events.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consultation::RecordMutation;
    use crate::store::contract::pending_record;
    use crate::store::{FileStore, MemoryStore};
    use crate::types::ActorId;
    use std::time::Duration;

    fn queue_with(store: Arc<MemoryStore>) -> RequestQueue {
        RequestQueue::new(store)
    }

    #[test]
    fn filter_matches_status_and_assignment() {
        let mut record = pending_record(0);
        assert!(QueueFilter::default().matches(&record));

        let clinician = ActorId::new();
        record.status = ConsultationStatus::InProgress;
        record.assigned_clinician_id = Some(clinician);
        assert!(QueueFilter::default().assigned_to(clinician).matches(&record));
        assert!(!QueueFilter::default()
            .assigned_to(ActorId::new())
            .matches(&record));

        record.status = ConsultationStatus::Completed;
        assert!(!QueueFilter::default().matches(&record));
        assert!(QueueFilter::with_statuses([ConsultationStatus::Completed]).matches(&record));
    }

    #[tokio::test]
    async fn subscription_yields_initial_snapshot_then_updates() {
        let store = Arc::new(MemoryStore::new(16));
        let first = pending_record(0);
        store.insert(first.clone()).await.unwrap();

        let queue = queue_with(store.clone());
        let mut subscription = queue.subscribe(QueueFilter::default());
        let initial = subscription.next().await.unwrap().unwrap();
        assert_eq!(initial.len(), 1);

        let second = pending_record(5);
        store.insert(second.clone()).await.unwrap();
        let updated = tokio::time::timeout(Duration::from_secs(1), subscription.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let ids: Vec<_> = updated.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn cancelled_record_leaves_the_default_queue() {
        let store = Arc::new(MemoryStore::new(16));
        let record = pending_record(0);
        store.insert(record.clone()).await.unwrap();

        let mut subscription = queue_with(store.clone()).subscribe(QueueFilter::default());
        assert_eq!(subscription.next().await.unwrap().unwrap().len(), 1);

        store
            .compare_and_set(
                record.id,
                &[ConsultationStatus::Pending],
                RecordMutation::Cancel {
                    actor_id: ActorId::new(),
                    at: Utc::now(),
                },
            )
            .await
            .unwrap();
        assert!(subscription.next().await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn lagged_subscription_refetches() {
        let store = Arc::new(MemoryStore::new(1));
        let mut subscription = queue_with(store.clone()).subscribe(QueueFilter::default());
        assert!(subscription.next().await.unwrap().unwrap().is_empty());

        for offset in 0..4 {
            store.insert(pending_record(offset)).await.unwrap();
        }
        let refreshed = subscription.next().await.unwrap().unwrap();
        assert_eq!(refreshed.len(), 4);
    }

    #[tokio::test]
    async fn writes_from_another_file_store_reach_the_subscription() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().join("consultations");
        let watcher = Arc::new(
            FileStore::open(root.clone(), 16)
                .await
                .unwrap()
                .with_poll_interval(Duration::from_millis(50)),
        );
        let writer = FileStore::open(root, 16).await.unwrap();

        let mut subscription = RequestQueue::new(watcher).subscribe(QueueFilter::default());
        assert!(subscription.next().await.unwrap().unwrap().is_empty());

        let record = pending_record(0);
        writer.insert(record.clone()).await.unwrap();
        let updated = tokio::time::timeout(Duration::from_secs(2), subscription.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].id, record.id);

        // An unchanged directory does not produce repeat snapshots.
        assert!(
            tokio::time::timeout(Duration::from_millis(300), subscription.next())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn cancel_ends_the_stream() {
        let store = Arc::new(MemoryStore::new(4));
        let mut subscription = queue_with(store).subscribe(QueueFilter::default());
        subscription.cancel();
        assert!(subscription.is_cancelled());
        assert!(subscription.next().await.is_none());
    }
}
