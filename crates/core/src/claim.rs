//! Claim Coordinator.
//!
//! A claim is a single compare-and-set from Pending to InProgress. Of any number of clinicians
//! racing for the same request, exactly one sees [`Guarded::Applied`]; the rest observe the
//! winner's InProgress status and get [`CoreError::AlreadyClaimed`].

use crate::consultation::{ConsultationRequest, ConsultationStatus, Guarded, RecordMutation};
use crate::error::{CoreError, CoreResult};
use crate::store::ConsultationStore;
use crate::types::{ClinicianId, ConsultationId};
use chrono::Utc;
use std::sync::Arc;

#[derive(Clone)]
pub struct ClaimCoordinator {
    store: Arc<dyn ConsultationStore>,
}

impl ClaimCoordinator {
    pub fn new(store: Arc<dyn ConsultationStore>) -> Self {
        Self { store }
    }

    /// Assigns a Pending consultation to `clinician_id`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::AlreadyClaimed`] if it is already InProgress or Completed
    /// - [`CoreError::InvalidState`] if it was cancelled
    /// - [`CoreError::NotFound`] if there is no such consultation
    pub async fn claim(
        &self,
        consultation_id: ConsultationId,
        clinician_id: ClinicianId,
    ) -> CoreResult<ConsultationRequest> {
        let mutation = RecordMutation::Claim {
            clinician_id,
            at: Utc::now(),
        };
        let expected = mutation.expected_statuses();

        match self
            .store
            .compare_and_set(consultation_id, expected, mutation)
            .await?
        {
            Guarded::Applied(record) => {
                tracing::info!("consultation {consultation_id} claimed by {clinician_id}");
                Ok(record)
            }
            Guarded::Conflict(ConsultationStatus::Cancelled) => Err(CoreError::InvalidState {
                consultation_id,
                status: ConsultationStatus::Cancelled,
                operation: "claim",
            }),
            Guarded::Conflict(status) => {
                tracing::warn!(
                    "claim on consultation {consultation_id} by {clinician_id} lost; it is {status}"
                );
                Err(CoreError::AlreadyClaimed(consultation_id))
            }
            Guarded::Missing => Err(CoreError::NotFound(format!(
                "consultation {consultation_id}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract::pending_record;
    use crate::store::{FileStore, MemoryStore};
    use crate::types::ActorId;
    use tempfile::TempDir;

    async fn race(store: Arc<dyn ConsultationStore>, contenders: usize) {
        let record = pending_record(0);
        store.insert(record.clone()).await.unwrap();
        let coordinator = ClaimCoordinator::new(store.clone());
        let id = record.id;

        let mut handles = Vec::new();
        for _ in 0..contenders {
            let coordinator = coordinator.clone();
            let clinician = ActorId::new();
            handles.push(tokio::spawn(async move {
                (clinician, coordinator.claim(id, clinician).await)
            }));
        }

        let mut winners = Vec::new();
        let mut already_claimed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                (clinician, Ok(_)) => winners.push(clinician),
                (_, Err(CoreError::AlreadyClaimed(_))) => already_claimed += 1,
                (_, Err(other)) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(winners.len(), 1);
        assert_eq!(already_claimed, contenders - 1);

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ConsultationStatus::InProgress);
        assert_eq!(stored.assigned_clinician_id, Some(winners[0]));
        assert!(stored.started_at.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_on_memory_store_have_one_winner() {
        race(Arc::new(MemoryStore::new(64)), 16).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_on_file_store_have_one_winner() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path().join("consultations"), 64)
            .await
            .unwrap();
        race(Arc::new(store), 8).await;
    }

    #[tokio::test]
    async fn cancelled_and_missing_requests_cannot_be_claimed() {
        let store = Arc::new(MemoryStore::new(16));
        let coordinator = ClaimCoordinator::new(store.clone());

        let mut cancelled = pending_record(0);
        cancelled.status = ConsultationStatus::Cancelled;
        store.insert(cancelled.clone()).await.unwrap();
        assert!(matches!(
            coordinator.claim(cancelled.id, ActorId::new()).await,
            Err(CoreError::InvalidState { .. })
        ));
        assert!(matches!(
            coordinator.claim(ConsultationId::new(), ActorId::new()).await,
            Err(CoreError::NotFound(_))
        ));
    }
}
