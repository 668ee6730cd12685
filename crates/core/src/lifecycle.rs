//! Consultation State Machine operations that end an episode.
//!
//! Pending → InProgress belongs to the [`ClaimCoordinator`](crate::claim::ClaimCoordinator).
//! This module owns the two terminal edges: completion from InProgress and cancellation from
//! Pending or InProgress. Both are guarded by the expected prior status, so a completion or
//! cancellation racing with another write either wins outright or fails with no effect.

use crate::consultation::{ClinicalFields, ConsultationRequest, Guarded, RecordMutation};
use crate::error::{CoreError, CoreResult};
use crate::store::ConsultationStore;
use crate::types::{ActorId, ConsultationId, NonEmptyText};
use chrono::Utc;
use std::sync::Arc;

#[derive(Clone)]
pub struct ConsultationLifecycle {
    store: Arc<dyn ConsultationStore>,
}

impl ConsultationLifecycle {
    pub fn new(store: Arc<dyn ConsultationStore>) -> Self {
        Self { store }
    }

    /// Completes an InProgress consultation with its final clinical fields.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Validation`] if the diagnosis or clinical summary is blank
    /// - [`CoreError::InvalidState`] unless the consultation is InProgress
    /// - [`CoreError::NotFound`] if there is no such consultation
    pub async fn complete(
        &self,
        consultation_id: ConsultationId,
        fields: ClinicalFields,
    ) -> CoreResult<ConsultationRequest> {
        validate_for_completion(&fields)?;
        self.transition(
            consultation_id,
            RecordMutation::Complete {
                fields,
                at: Utc::now(),
            },
        )
        .await
    }

    /// Cancels a Pending or InProgress consultation.
    pub async fn cancel(
        &self,
        consultation_id: ConsultationId,
        actor_id: ActorId,
    ) -> CoreResult<ConsultationRequest> {
        self.transition(
            consultation_id,
            RecordMutation::Cancel {
                actor_id,
                at: Utc::now(),
            },
        )
        .await
    }

    async fn transition(
        &self,
        consultation_id: ConsultationId,
        mutation: RecordMutation,
    ) -> CoreResult<ConsultationRequest> {
        let operation = mutation.operation();
        let expected = mutation.expected_statuses();
        match self
            .store
            .compare_and_set(consultation_id, expected, mutation)
            .await?
        {
            Guarded::Applied(record) => {
                tracing::info!("consultation {} is now {}", consultation_id, record.status);
                Ok(record)
            }
            Guarded::Conflict(status) => {
                tracing::warn!("cannot {operation} consultation {consultation_id}: it is {status}");
                Err(CoreError::InvalidState {
                    consultation_id,
                    status,
                    operation,
                })
            }
            Guarded::Missing => Err(CoreError::NotFound(format!(
                "consultation {consultation_id}"
            ))),
        }
    }
}

/// A consultation may only be completed with a diagnosis and a clinical summary.
pub fn validate_for_completion(fields: &ClinicalFields) -> CoreResult<()> {
    NonEmptyText::required("diagnosis", &fields.diagnosis)?;
    NonEmptyText::required("clinical summary", &fields.clinical_summary)?;
    Ok(())
}
