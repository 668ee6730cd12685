//! End-to-end consultation flows through `ConsultationService`.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use std::sync::Arc;
use telecare_core::audit::{AuditEvent, MemoryAuditSink};
use telecare_core::{
    ActorId, AddendumCategory, AuditAction, AuditSink, ClinicalFields, ConsultationId,
    ConsultationService, ConsultationStatus, CoreConfig, CoreError, CoreResult, IntakeSubmission,
    MembershipId, NewAddendum, NonEmptyText, PersonId, PersonRecord, QueueFilter, RedFlag,
    RedFlagSelections, ResourceType, Session, StaticDirectory, StoreKind, TriageForm, Vitals,
};
use tempfile::TempDir;

struct Fixture {
    service: Arc<ConsultationService>,
    sink: Arc<MemoryAuditSink>,
    membership: MembershipId,
    adult: PersonRecord,
    patient: Session,
}

fn years_ago(years: i32) -> NaiveDate {
    let today = Utc::now().date_naive();
    NaiveDate::from_ymd_opt(today.year() - years, 1, 1).unwrap()
}

fn directory_with(membership: MembershipId) -> (Arc<StaticDirectory>, PersonRecord) {
    let directory = Arc::new(StaticDirectory::new());
    let adult = PersonRecord {
        id: PersonId::new(),
        membership_id: membership,
        display_name: "Jordan Mills".into(),
        date_of_birth: years_ago(34),
    };
    directory.add_person(adult.clone());
    (directory, adult)
}

fn fixture() -> Fixture {
    let membership = MembershipId::new();
    let (directory, adult) = directory_with(membership);
    let sink = Arc::new(MemoryAuditSink::new());
    let cfg = Arc::new(CoreConfig::with_defaults("unused".into()));
    let store = Arc::new(telecare_core::MemoryStore::new(cfg.queue_channel_capacity()));
    let service = ConsultationService::new(cfg, store, sink.clone(), directory);
    Fixture {
        service: Arc::new(service),
        sink,
        membership,
        patient: Session::patient(ActorId::new(), text("Jordan Mills"), membership),
        adult,
    }
}

fn text(s: &str) -> NonEmptyText {
    NonEmptyText::new(s).unwrap()
}

fn clinician(name: &str) -> Session {
    Session::clinician(ActorId::new(), text(name))
}

fn clean_intake(f: &Fixture) -> IntakeSubmission {
    IntakeSubmission {
        membership_id: f.membership,
        person_id: f.adult.id,
        chief_complaint: "ankle pain".into(),
        red_flags: RedFlagSelections::default(),
        none_apply_confirmed: true,
        location_acknowledged: true,
    }
}

fn final_fields() -> ClinicalFields {
    ClinicalFields {
        diagnosis: "Ankle sprain".into(),
        clinical_summary: "S/O/A/P...".into(),
        treatment_plan: "Rest, ice, compression, elevation".into(),
        internal_notes: "Consider imaging if no improvement".into(),
        vitals: Some(Vitals {
            temperature_f: Some(98.6),
            heart_rate_bpm: Some(72),
            ..Vitals::default()
        }),
    }
}

async fn completed_consultation(f: &Fixture, doctor: &Session) -> ConsultationId {
    let id = f
        .service
        .submit_consultation_request(&f.patient, clean_intake(f))
        .await
        .unwrap();
    f.service.claim(doctor, id).await.unwrap();
    f.service.complete(doctor, id, final_fields()).await.unwrap();
    id
}

#[tokio::test]
async fn scenario_a_clean_intake_creates_pending_request() {
    let f = fixture();
    let id = f
        .service
        .submit_consultation_request(&f.patient, clean_intake(&f))
        .await
        .unwrap();

    let doctor = clinician("Dr. Lee");
    let chart = f.service.clinician_chart(&doctor, id).await.unwrap();
    assert_eq!(chart.consultation.status, ConsultationStatus::Pending);
    assert_eq!(chart.consultation.assigned_clinician_id, None);
    assert_eq!(chart.consultation.chief_complaint, "ankle pain");

    let queue = f.service.list_queue(&doctor, None).await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_b_concurrent_claims_have_exactly_one_winner() {
    let f = fixture();
    let id = f
        .service
        .submit_consultation_request(&f.patient, clean_intake(&f))
        .await
        .unwrap();

    let contenders: Vec<Session> = (0..8).map(|i| clinician(&format!("Dr. {i}"))).collect();
    let mut handles = Vec::new();
    for session in contenders.clone() {
        let service = f.service.clone();
        handles.push(tokio::spawn(async move {
            let outcome = service.claim(&session, id).await;
            (session.actor_id(), outcome)
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            (actor, Ok(())) => winners.push(actor),
            (_, Err(CoreError::AlreadyClaimed(lost))) => assert_eq!(lost, id),
            (_, Err(other)) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners.len(), 1);

    let chart = f.service.clinician_chart(&contenders[0], id).await.unwrap();
    assert_eq!(chart.consultation.status, ConsultationStatus::InProgress);
    assert_eq!(chart.consultation.assigned_clinician_id, Some(winners[0]));
}

#[tokio::test]
async fn scenario_c_completion_requires_diagnosis() {
    let f = fixture();
    let doctor = clinician("Dr. Lee");
    let id = f
        .service
        .submit_consultation_request(&f.patient, clean_intake(&f))
        .await
        .unwrap();
    f.service.claim(&doctor, id).await.unwrap();

    let incomplete = ClinicalFields {
        diagnosis: String::new(),
        ..final_fields()
    };
    assert!(matches!(
        f.service.complete(&doctor, id, incomplete).await,
        Err(CoreError::Validation(_))
    ));

    f.service.complete(&doctor, id, final_fields()).await.unwrap();
    let chart = f.service.clinician_chart(&doctor, id).await.unwrap();
    assert_eq!(chart.consultation.status, ConsultationStatus::Completed);
    assert!(chart.consultation.completed_at.is_some());
    assert!(chart.consultation.reviewed_at.is_some());
}

#[tokio::test]
async fn scenario_d_addendum_on_completed_record_keeps_original_fields() {
    let f = fixture();
    let doctor = clinician("Dr. Lee");
    let id = completed_consultation(&f, &doctor).await;
    let before = f.service.clinician_chart(&doctor, id).await.unwrap();

    f.service
        .add_addendum(
            &doctor,
            id,
            NewAddendum {
                body: "Right ankle, not left.".into(),
                category: AddendumCategory::Correction,
                reason: Some("Laterality error".into()),
            },
        )
        .await
        .unwrap();

    let after = f.service.clinician_chart(&doctor, id).await.unwrap();
    assert_eq!(after.consultation.clinical, before.consultation.clinical);

    let patient_view = f.service.patient_chart(&f.patient, id).await.unwrap();
    assert_eq!(patient_view.addenda.len(), 1);
    let addendum = &patient_view.addenda[0];
    assert_eq!(addendum.category, AddendumCategory::Correction);
    assert_eq!(addendum.author.clinician_id, doctor.actor_id());
    assert_eq!(addendum.author.display_name, "Dr. Lee");
    assert!(addendum.created_at <= Utc::now());
    let summary = patient_view.summary.unwrap();
    assert_eq!(summary.diagnosis, "Ankle sprain");
}

#[tokio::test]
async fn scenario_e_chest_pain_can_never_be_submitted() {
    let f = fixture();
    let mut form = TriageForm::new(f.membership, 18);
    form.select_subject(&f.adult, Utc::now().date_naive()).unwrap();
    form.set_chief_complaint("tight chest");
    form.acknowledge_location(true);
    form.select_flag(RedFlag::ChestPain).unwrap();

    assert!(form.confirm_none_apply().is_err());
    assert!(form.evaluate(Utc::now().date_naive()).unwrap().is_blocked());

    let mut submission = form.submission().unwrap();
    submission.none_apply_confirmed = true;
    assert!(matches!(
        f.service
            .submit_consultation_request(&f.patient, submission)
            .await,
        Err(CoreError::Validation(message)) if message.contains("Chest pain")
    ));

    let doctor = clinician("Dr. Lee");
    assert!(f.service.list_queue(&doctor, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn completed_records_reject_direct_writes() {
    let f = fixture();
    let doctor = clinician("Dr. Lee");
    let id = completed_consultation(&f, &doctor).await;

    let edit = ClinicalFields {
        diagnosis: "Fracture".into(),
        ..final_fields()
    };
    let err = f.service.save_draft(&doctor, id, edit.clone()).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::InvalidState {
            status: ConsultationStatus::Completed,
            ..
        }
    ));
    assert!(err.to_string().contains("addendum"));

    // Any clinician gets the same answer; there is no caller-specific bypass.
    let other = clinician("Dr. Patel");
    assert!(matches!(
        f.service.save_draft(&other, id, edit.clone()).await,
        Err(CoreError::InvalidState { .. })
    ));
    assert!(matches!(
        f.service.complete(&doctor, id, edit).await,
        Err(CoreError::InvalidState { .. })
    ));
    assert!(matches!(
        f.service.cancel(&doctor, id).await,
        Err(CoreError::InvalidState { .. })
    ));

    let chart = f.service.clinician_chart(&doctor, id).await.unwrap();
    assert_eq!(chart.consultation.clinical.diagnosis, "Ankle sprain");
}

#[tokio::test]
async fn addenda_are_rejected_before_completion() {
    let f = fixture();
    let doctor = clinician("Dr. Lee");
    let id = f
        .service
        .submit_consultation_request(&f.patient, clean_intake(&f))
        .await
        .unwrap();
    f.service.claim(&doctor, id).await.unwrap();

    let result = f
        .service
        .add_addendum(
            &doctor,
            id,
            NewAddendum {
                body: "Too early".into(),
                category: AddendumCategory::General,
                reason: None,
            },
        )
        .await;
    assert!(matches!(
        result,
        Err(CoreError::InvalidState {
            status: ConsultationStatus::InProgress,
            ..
        })
    ));
}

#[tokio::test]
async fn drafts_belong_to_the_claiming_clinician() {
    let f = fixture();
    let doctor = clinician("Dr. Lee");
    let other = clinician("Dr. Patel");
    let id = f
        .service
        .submit_consultation_request(&f.patient, clean_intake(&f))
        .await
        .unwrap();

    assert!(matches!(
        f.service.save_draft(&doctor, id, final_fields()).await,
        Err(CoreError::InvalidState {
            status: ConsultationStatus::Pending,
            ..
        })
    ));

    f.service.claim(&doctor, id).await.unwrap();
    let febrile = ClinicalFields {
        vitals: Some(Vitals {
            temperature_f: Some(101.3),
            oxygen_saturation_pct: Some(93.0),
            ..Vitals::default()
        }),
        ..ClinicalFields::default()
    };
    f.service.save_draft(&doctor, id, febrile.clone()).await.unwrap();
    f.service.save_draft(&doctor, id, febrile.clone()).await.unwrap();
    assert!(matches!(
        f.service.save_draft(&other, id, febrile).await,
        Err(CoreError::Authorization(_))
    ));

    let chart = f.service.clinician_chart(&doctor, id).await.unwrap();
    assert_eq!(chart.consultation.status, ConsultationStatus::InProgress);
    assert_eq!(chart.vital_flags.len(), 2);
}

#[tokio::test]
async fn patients_cannot_use_clinician_operations() {
    let f = fixture();
    let id = f
        .service
        .submit_consultation_request(&f.patient, clean_intake(&f))
        .await
        .unwrap();

    assert!(matches!(
        f.service.claim(&f.patient, id).await,
        Err(CoreError::Authorization(_))
    ));
    assert!(matches!(
        f.service.clinician_chart(&f.patient, id).await,
        Err(CoreError::Authorization(_))
    ));
    assert!(matches!(
        f.service.list_queue(&f.patient, None).await,
        Err(CoreError::Authorization(_))
    ));

    let stranger = Session::patient(ActorId::new(), text("Stranger"), MembershipId::new());
    assert!(matches!(
        f.service.patient_chart(&stranger, id).await,
        Err(CoreError::Authorization(_))
    ));
}

#[tokio::test]
async fn patient_can_cancel_and_cancelled_requests_cannot_be_claimed() {
    let f = fixture();
    let id = f
        .service
        .submit_consultation_request(&f.patient, clean_intake(&f))
        .await
        .unwrap();
    f.service.cancel(&f.patient, id).await.unwrap();

    let doctor = clinician("Dr. Lee");
    assert!(matches!(
        f.service.claim(&doctor, id).await,
        Err(CoreError::InvalidState {
            status: ConsultationStatus::Cancelled,
            ..
        })
    ));
    assert!(f.service.list_queue(&doctor, None).await.unwrap().is_empty());
    let cancelled = f
        .service
        .list_queue(
            &doctor,
            Some(QueueFilter::with_statuses([ConsultationStatus::Cancelled])),
        )
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_claim_and_cancel_never_both_succeed() {
    for _ in 0..20 {
        let f = fixture();
        let id = f
            .service
            .submit_consultation_request(&f.patient, clean_intake(&f))
            .await
            .unwrap();
        let doctor = clinician("Dr. Lee");

        let claim = {
            let service = f.service.clone();
            let doctor = doctor.clone();
            tokio::spawn(async move { service.claim(&doctor, id).await })
        };
        let cancel = {
            let service = f.service.clone();
            let patient = f.patient.clone();
            tokio::spawn(async move { service.cancel(&patient, id).await })
        };
        let claimed = claim.await.unwrap();
        let cancelled = cancel.await.unwrap();

        let status = f
            .service
            .clinician_chart(&doctor, id)
            .await
            .unwrap()
            .consultation
            .status;
        match (claimed.is_ok(), cancelled.is_ok()) {
            // Cancel may legally follow a successful claim.
            (true, true) | (false, true) => assert_eq!(status, ConsultationStatus::Cancelled),
            (true, false) => panic!("cancel of an open request failed"),
            (false, false) => panic!("both operations failed"),
        }
        if claimed.is_err() {
            assert!(matches!(claimed, Err(CoreError::InvalidState { .. })));
        }

        // The audited prior status is the one the cancel actually moved from.
        let views = f.service.audit_events(&doctor, id, None).await.unwrap();
        let cancel_event = views
            .iter()
            .find(|v| v.event.action == AuditAction::CancelConsultation)
            .unwrap();
        let expected = if claimed.is_ok() { "in_progress" } else { "pending" };
        assert_eq!(
            cancel_event.event.details.as_ref().unwrap()["previous_status"],
            expected
        );
    }
}

#[tokio::test]
async fn queue_subscription_sees_claims() {
    let f = fixture();
    let doctor = clinician("Dr. Lee");
    let mut subscription = f.service.subscribe_queue(&doctor, None).unwrap();
    assert!(subscription.next().await.unwrap().unwrap().is_empty());

    let id = f
        .service
        .submit_consultation_request(&f.patient, clean_intake(&f))
        .await
        .unwrap();
    let snapshot = subscription.next().await.unwrap().unwrap();
    assert_eq!(snapshot[0].status, ConsultationStatus::Pending);

    f.service.claim(&doctor, id).await.unwrap();
    let snapshot = subscription.next().await.unwrap().unwrap();
    assert_eq!(snapshot[0].status, ConsultationStatus::InProgress);
    assert_eq!(snapshot[0].assigned_clinician_id, Some(doctor.actor_id()));

    subscription.cancel();
    assert!(subscription.next().await.is_none());
}

#[tokio::test]
async fn every_operation_leaves_an_audit_event() {
    let f = fixture();
    let doctor = clinician("Dr. Lee");
    let id = completed_consultation(&f, &doctor).await;
    f.service.patient_chart(&f.patient, id).await.unwrap();

    let views = f.service.audit_events(&doctor, id, None).await.unwrap();
    let actions: Vec<_> = views.iter().map(|v| v.event.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::ViewChart,
            AuditAction::CompleteConsultation,
            AuditAction::ClaimConsultation,
            AuditAction::SubmitConsultation,
        ]
    );
    assert!(views
        .iter()
        .all(|v| v.event.subject_person_id == Some(f.adult.id)));
    assert_eq!(f.sink.len().await, 4);
}

struct UnavailableSink;

#[async_trait]
impl AuditSink for UnavailableSink {
    async fn append(&self, _event: &AuditEvent) -> CoreResult<()> {
        Err(CoreError::FileWrite(std::io::Error::other("audit volume offline")))
    }

    async fn recent(
        &self,
        _resource_type: ResourceType,
        _resource_id: &str,
        _limit: usize,
    ) -> CoreResult<Vec<AuditEvent>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn audit_failures_do_not_fail_the_operation() {
    let membership = MembershipId::new();
    let (directory, adult) = directory_with(membership);
    let cfg = Arc::new(CoreConfig::with_defaults("unused".into()));
    let store = Arc::new(telecare_core::MemoryStore::new(16));
    let service = ConsultationService::new(cfg, store, Arc::new(UnavailableSink), directory);

    let patient = Session::patient(ActorId::new(), text("Jordan Mills"), membership);
    let doctor = clinician("Dr. Lee");
    let submission = IntakeSubmission {
        membership_id: membership,
        person_id: adult.id,
        chief_complaint: "sore throat".into(),
        red_flags: RedFlagSelections::default(),
        none_apply_confirmed: true,
        location_acknowledged: true,
    };
    let id = service
        .submit_consultation_request(&patient, submission)
        .await
        .unwrap();
    service.claim(&doctor, id).await.unwrap();
    service.complete(&doctor, id, final_fields()).await.unwrap();
    service.clinician_chart(&doctor, id).await.unwrap();

    assert_eq!(service.audit_write_failures(), 4);
}

#[tokio::test]
async fn pediatric_flags_follow_the_selected_subject() {
    let membership = MembershipId::new();
    let (directory, adult) = directory_with(membership);
    let child = PersonRecord {
        id: PersonId::new(),
        membership_id: membership,
        display_name: "Robin Mills".into(),
        date_of_birth: years_ago(4),
    };
    directory.add_person(child.clone());
    let cfg = Arc::new(CoreConfig::with_defaults("unused".into()));
    let service = ConsultationService::new(
        cfg,
        Arc::new(telecare_core::MemoryStore::new(16)),
        Arc::new(MemoryAuditSink::new()),
        directory,
    );
    let patient = Session::patient(ActorId::new(), text("Jordan Mills"), membership);
    let today = Utc::now().date_naive();

    let mut form = TriageForm::new(membership, 18);
    form.select_subject(&child, today).unwrap();
    form.select_flag(RedFlag::PediatricDehydration).unwrap();
    form.select_subject(&adult, today).unwrap();
    assert!(!form.is_blocked());

    form.set_chief_complaint("rash");
    form.acknowledge_location(true);
    form.confirm_none_apply().unwrap();
    let id = service
        .submit_consultation_request(&patient, form.submission().unwrap())
        .await
        .unwrap();
    assert!(!id.to_string().is_empty());
}

#[tokio::test]
async fn file_backed_service_persists_across_restarts() {
    let temp = TempDir::new().unwrap();
    let membership = MembershipId::new();
    let (directory, adult) = directory_with(membership);
    let cfg = Arc::new(CoreConfig::with_defaults(temp.path().to_path_buf()));
    let patient = Session::patient(ActorId::new(), text("Jordan Mills"), membership);
    let doctor = clinician("Dr. Lee");

    let id = {
        let service = ConsultationService::open(cfg.clone(), StoreKind::File, directory.clone())
            .await
            .unwrap();
        let submission = IntakeSubmission {
            membership_id: membership,
            person_id: adult.id,
            chief_complaint: "ankle pain".into(),
            red_flags: RedFlagSelections::default(),
            none_apply_confirmed: true,
            location_acknowledged: true,
        };
        let id = service
            .submit_consultation_request(&patient, submission)
            .await
            .unwrap();
        service.claim(&doctor, id).await.unwrap();
        service.complete(&doctor, id, final_fields()).await.unwrap();
        id
    };

    let reopened = ConsultationService::open(cfg, StoreKind::File, directory)
        .await
        .unwrap();
    let chart = reopened.patient_chart(&patient, id).await.unwrap();
    assert_eq!(chart.status, ConsultationStatus::Completed);

    let audit = reopened.audit_events(&doctor, id, None).await.unwrap();
    assert_eq!(audit.len(), 4);
    assert_eq!(audit[0].event.action, AuditAction::ViewChart);
}
