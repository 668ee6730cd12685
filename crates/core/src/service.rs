//! Consultation service.
//!
//! The public entry point of the core. Each operation takes the caller's [`Session`]
//! explicitly, checks what that session may do, delegates to the component that owns the
//! behaviour, and then records an audit event. Audit writes are best-effort and never change
//! an operation's result.

use crate::addendum::{AddendumId, AddendumLog, NewAddendum};
use crate::audit::{
    AuditAction, AuditSink, AuditTrail, AuditView, FileAuditSink, MemoryAuditSink, ResourceType,
};
use crate::chart::{ClinicianChart, PatientChart};
use crate::claim::ClaimCoordinator;
use crate::config::{CoreConfig, StoreKind};
use crate::consultation::{ClinicalFields, ConsultationRequest, ConsultationStatus};
use crate::directory::Directory;
use crate::error::{CoreError, CoreResult};
use crate::lifecycle::{validate_for_completion, ConsultationLifecycle};
use crate::queue::{QueueEntry, QueueFilter, QueueSubscription, RequestQueue};
use crate::record::ClinicalRecordStore;
use crate::store::{ConsultationStore, FileStore, MemoryStore};
use crate::triage::{self, check_selection_shape, BlockedTriage, IntakeSubmission, TriageDecision};
use crate::types::{ConsultationId, PersonId, Session};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

pub struct ConsultationService {
    cfg: Arc<CoreConfig>,
    store: Arc<dyn ConsultationStore>,
    directory: Arc<dyn Directory>,
    audit: AuditTrail,
    records: ClinicalRecordStore,
    lifecycle: ConsultationLifecycle,
    claims: ClaimCoordinator,
    addenda: AddendumLog,
    queue: RequestQueue,
}

impl ConsultationService {
    pub fn new(
        cfg: Arc<CoreConfig>,
        store: Arc<dyn ConsultationStore>,
        audit_sink: Arc<dyn AuditSink>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        Self {
            audit: AuditTrail::new(audit_sink, directory.clone(), cfg.audit_read_limit()),
            records: ClinicalRecordStore::new(store.clone()),
            lifecycle: ConsultationLifecycle::new(store.clone()),
            claims: ClaimCoordinator::new(store.clone()),
            addenda: AddendumLog::new(store.clone()),
            queue: RequestQueue::new(store.clone()),
            cfg,
            store,
            directory,
        }
    }

    /// Builds a service over the configured backend.
    ///
    /// [`StoreKind::File`] keeps records under `<data_dir>/consultations` and audit events under
    /// `<data_dir>/audit`; [`StoreKind::Memory`] keeps both in process.
    pub async fn open(
        cfg: Arc<CoreConfig>,
        kind: StoreKind,
        directory: Arc<dyn Directory>,
    ) -> CoreResult<Self> {
        let (store, sink): (Arc<dyn ConsultationStore>, Arc<dyn AuditSink>) = match kind {
            StoreKind::File => (
                Arc::new(
                    FileStore::open(cfg.consultations_dir(), cfg.queue_channel_capacity()).await?,
                ),
                Arc::new(FileAuditSink::under(cfg.data_dir())),
            ),
            StoreKind::Memory => (
                Arc::new(MemoryStore::new(cfg.queue_channel_capacity())),
                Arc::new(MemoryAuditSink::new()),
            ),
        };
        tracing::info!(
            "consultation service opened ({:?} store at {})",
            kind,
            cfg.data_dir().display()
        );
        Ok(Self::new(cfg, store, sink, directory))
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    // ========================================================================
    // INTAKE
    // ========================================================================

    /// Creates a Pending consultation from an intake that clears the Triage Gate.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Validation`] if any red flag is selected (the response carries the
    ///   emergency guidance), or if a required acknowledgement or the complaint is missing
    /// - [`CoreError::NotFound`] if the subject is not in the directory
    /// - [`CoreError::Authorization`] if a patient submits for another membership
    pub async fn submit_consultation_request(
        &self,
        session: &Session,
        submission: IntakeSubmission,
    ) -> CoreResult<ConsultationId> {
        session.require_membership_access(submission.membership_id)?;
        check_selection_shape(&submission.red_flags)?;

        let person = self
            .directory
            .person(submission.person_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("person {}", submission.person_id)))?;
        if person.membership_id != submission.membership_id {
            return Err(CoreError::Validation(
                "subject is not part of this membership".into(),
            ));
        }

        let now = Utc::now();
        let decision = triage::evaluate(
            &submission,
            person.date_of_birth,
            now.date_naive(),
            self.cfg.adult_age_years(),
        )?;
        let payload = match decision {
            TriageDecision::Proceed(payload) => payload,
            TriageDecision::Blocked(blocked) => {
                let message = blocked_message(&blocked);
                blocked.abandon();
                return Err(CoreError::Validation(message));
            }
        };

        let record = ConsultationRequest::from_triage(payload, now);
        let id = record.id;
        let subject = record.person_id;
        self.store.insert(record).await?;
        tracing::info!("consultation {id} submitted for person {subject}");

        self.audit
            .record(
                session,
                AuditAction::SubmitConsultation,
                ResourceType::Consultation,
                &id.to_string(),
                Some(subject),
                None,
            )
            .await;
        Ok(id)
    }

    // ========================================================================
    // QUEUE
    // ========================================================================

    /// Matching consultations, oldest first.
    pub async fn list_queue(
        &self,
        session: &Session,
        filter: Option<QueueFilter>,
    ) -> CoreResult<Vec<QueueEntry>> {
        session.require_staff("viewing the queue")?;
        self.queue.snapshot(&filter.unwrap_or_default()).await
    }

    /// A live queue view that yields a fresh snapshot after every relevant change.
    pub fn subscribe_queue(
        &self,
        session: &Session,
        filter: Option<QueueFilter>,
    ) -> CoreResult<QueueSubscription> {
        session.require_staff("viewing the queue")?;
        Ok(self.queue.subscribe(filter.unwrap_or_default()))
    }

    // ========================================================================
    // CLINICIAN WORKFLOW
    // ========================================================================

    /// Claims a Pending consultation for the calling clinician.
    pub async fn claim(&self, session: &Session, consultation_id: ConsultationId) -> CoreResult<()> {
        session.require_clinician("claiming a consultation")?;
        let record = self.claims.claim(consultation_id, session.actor_id()).await?;
        self.audit_consultation(session, AuditAction::ClaimConsultation, &record, None)
            .await;
        Ok(())
    }

    /// Saves working clinical fields without changing status.
    ///
    /// Only the clinician who claimed the consultation may save drafts. A Pending consultation
    /// must be claimed first; a Completed one is read-only.
    pub async fn save_draft(
        &self,
        session: &Session,
        consultation_id: ConsultationId,
        fields: ClinicalFields,
    ) -> CoreResult<()> {
        session.require_clinician("saving a draft")?;
        let current = self.records.read(consultation_id).await?;
        if current.status == ConsultationStatus::Pending {
            return Err(CoreError::InvalidState {
                consultation_id,
                status: current.status,
                operation: "save a draft for",
            });
        }
        require_assignee(session, &current)?;

        let saved = self.records.write(consultation_id, fields).await?;
        let flags = saved
            .clinical
            .vitals
            .as_ref()
            .map(|v| v.flags())
            .unwrap_or_default();
        let details = (!flags.is_empty()).then(|| json!({ "vital_flags": flags }));
        self.audit_consultation(session, AuditAction::SaveDraft, &saved, details)
            .await;
        Ok(())
    }

    /// Completes the consultation with its final clinical fields.
    pub async fn complete(
        &self,
        session: &Session,
        consultation_id: ConsultationId,
        fields: ClinicalFields,
    ) -> CoreResult<()> {
        session.require_clinician("completing a consultation")?;
        validate_for_completion(&fields)?;
        let current = self.records.read(consultation_id).await?;
        require_assignee(session, &current)?;

        let completed = self.lifecycle.complete(consultation_id, fields).await?;
        self.audit_consultation(session, AuditAction::CompleteConsultation, &completed, None)
            .await;
        Ok(())
    }

    /// Cancels a Pending or InProgress consultation.
    ///
    /// Patients may cancel consultations in their own membership; staff may cancel any.
    pub async fn cancel(&self, session: &Session, consultation_id: ConsultationId) -> CoreResult<()> {
        let current = self.records.read(consultation_id).await?;
        session.require_membership_access(current.membership_id)?;

        let cancelled = self
            .lifecycle
            .cancel(consultation_id, session.actor_id())
            .await?;
        let details = json!({ "previous_status": cancelled.cancelled_from });
        self.audit_consultation(
            session,
            AuditAction::CancelConsultation,
            &cancelled,
            Some(details),
        )
        .await;
        Ok(())
    }

    /// Appends an addendum to a Completed consultation.
    pub async fn add_addendum(
        &self,
        session: &Session,
        consultation_id: ConsultationId,
        input: NewAddendum,
    ) -> CoreResult<AddendumId> {
        let parent = self.records.read(consultation_id).await?;
        let addendum = self.addenda.add(session, consultation_id, input).await?;

        let details = json!({
            "addendum_id": addendum.id.to_string(),
            "category": addendum.category,
        });
        self.audit_consultation(session, AuditAction::AddAddendum, &parent, Some(details))
            .await;
        Ok(addendum.id)
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Full record for clinicians, including internal notes. Recorded as `ViewChart`.
    pub async fn clinician_chart(
        &self,
        session: &Session,
        consultation_id: ConsultationId,
    ) -> CoreResult<ClinicianChart> {
        session.require_clinician("viewing the clinician chart")?;
        let record = self.records.read(consultation_id).await?;
        let addenda = self.addenda.list(consultation_id).await?;
        self.audit_consultation(
            session,
            AuditAction::ViewChart,
            &record,
            Some(json!({ "projection": "clinician" })),
        )
        .await;
        Ok(ClinicianChart::project(record, addenda))
    }

    /// Patient-facing record without internal notes. Recorded as `ViewChart`.
    pub async fn patient_chart(
        &self,
        session: &Session,
        consultation_id: ConsultationId,
    ) -> CoreResult<PatientChart> {
        let record = self.records.read(consultation_id).await?;
        session.require_membership_access(record.membership_id)?;
        let addenda = self.addenda.list(consultation_id).await?;
        self.audit_consultation(
            session,
            AuditAction::ViewChart,
            &record,
            Some(json!({ "projection": "patient" })),
        )
        .await;
        Ok(PatientChart::project(record, addenda))
    }

    // ========================================================================
    // AUDIT
    // ========================================================================

    /// Records an audit event on behalf of a caller outside the core's own operations.
    pub async fn record_audit_event(
        &self,
        session: &Session,
        action: AuditAction,
        resource_type: ResourceType,
        resource_id: &str,
        subject_person_id: Option<PersonId>,
        details: Option<serde_json::Value>,
    ) {
        self.audit
            .record(
                session,
                action,
                resource_type,
                resource_id,
                subject_person_id,
                details,
            )
            .await;
    }

    pub async fn audit_events(
        &self,
        session: &Session,
        consultation_id: ConsultationId,
        limit: Option<usize>,
    ) -> CoreResult<Vec<AuditView>> {
        self.audit
            .recent(
                session,
                ResourceType::Consultation,
                &consultation_id.to_string(),
                limit,
            )
            .await
    }

    /// Audit events that could not be written since startup.
    pub fn audit_write_failures(&self) -> u64 {
        self.audit.write_failures()
    }

    async fn audit_consultation(
        &self,
        session: &Session,
        action: AuditAction,
        record: &ConsultationRequest,
        details: Option<serde_json::Value>,
    ) {
        self.audit
            .record(
                session,
                action,
                ResourceType::Consultation,
                &record.id.to_string(),
                Some(record.person_id),
                details,
            )
            .await;
    }
}

/// While InProgress, only the claiming clinician may write. Other statuses are left to the
/// status guard so a closed record always reports `InvalidState`.
fn require_assignee(session: &Session, record: &ConsultationRequest) -> CoreResult<()> {
    match record.assigned_clinician_id {
        Some(assigned)
            if record.status == ConsultationStatus::InProgress && assigned != session.actor_id() =>
        {
            Err(CoreError::Authorization(format!(
                "consultation {} is assigned to another clinician",
                record.id
            )))
        }
        _ => Ok(()),
    }
}

fn blocked_message(blocked: &BlockedTriage) -> String {
    let labels: Vec<&str> = blocked.flags().iter().map(|f| f.label()).collect();
    format!(
        "emergency symptoms reported ({}). {}",
        labels.join("; "),
        BlockedTriage::GUIDANCE
    )
}
