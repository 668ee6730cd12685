//! Clinical Record Store.
//!
//! The single write path for clinical fields. Writes are accepted while the consultation is
//! Pending or InProgress and rejected with [`CoreError::InvalidState`] otherwise. There is no
//! caller-specific bypass; amendments after completion go through the addendum log.

use crate::consultation::{
    ClinicalFields, ConsultationRequest, Guarded, RecordMutation,
};
use crate::error::{CoreError, CoreResult};
use crate::store::ConsultationStore;
use crate::types::ConsultationId;
use chrono::Utc;
use std::sync::Arc;

#[derive(Clone)]
pub struct ClinicalRecordStore {
    store: Arc<dyn ConsultationStore>,
}

impl ClinicalRecordStore {
    pub fn new(store: Arc<dyn ConsultationStore>) -> Self {
        Self { store }
    }

    /// Replaces the clinical fields of an open consultation. Status never changes.
    pub async fn write(
        &self,
        consultation_id: ConsultationId,
        fields: ClinicalFields,
    ) -> CoreResult<ConsultationRequest> {
        let mutation = RecordMutation::WriteFields {
            fields,
            at: Utc::now(),
        };
        let operation = mutation.operation();
        let expected = mutation.expected_statuses();

        match self
            .store
            .compare_and_set(consultation_id, expected, mutation)
            .await?
        {
            Guarded::Applied(record) => {
                tracing::debug!("clinical fields saved for consultation {consultation_id}");
                Ok(record)
            }
            Guarded::Conflict(status) => {
                tracing::warn!(
                    "rejected clinical write to consultation {consultation_id} in status {status}"
                );
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

    pub async fn read(&self, consultation_id: ConsultationId) -> CoreResult<ConsultationRequest> {
        self.store
            .get(consultation_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("consultation {consultation_id}")))
    }
}
