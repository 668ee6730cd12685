//! Consultation record model and state machine.
//!
//! A [`ConsultationRequest`] moves along a fixed set of edges:
//!
//! ```text
//! Pending ──claim──▶ InProgress ──complete──▶ Completed
//!    │                   │
//!    └──────cancel───────┴──────────────────▶ Cancelled
//! ```
//!
//! Completed and Cancelled are terminal. Every change to a stored record is expressed as a
//! [`RecordMutation`], which names the statuses it may be applied from. Stores apply mutations
//! through a compare-and-set, so the status check and the write happen as one step.

use crate::constants::{
    BRADYCARDIA_THRESHOLD_BPM, FEVER_THRESHOLD_F, HYPERTENSION_DIASTOLIC_MMHG,
    HYPERTENSION_SYSTOLIC_MMHG, LOW_SATURATION_THRESHOLD_PCT, TACHYCARDIA_THRESHOLD_BPM,
    TACHYPNOEA_THRESHOLD_RPM,
};
use crate::triage::{RedFlagSelections, TriagePayload};
use crate::types::{ActorId, ClinicianId, ConsultationId, MembershipId, PersonId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// STATUS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl ConsultationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// No edges leave a terminal status.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// True if `self -> next` is one of the legal edges.
    pub const fn can_transition_to(self, next: ConsultationStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Completed)
                | (Self::Pending, Self::Cancelled)
                | (Self::InProgress, Self::Cancelled)
        )
    }

    /// Whether clinical fields may be written directly.
    pub const fn accepts_clinical_writes(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConsultationStatus {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" | "inprogress" | "in-progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(crate::error::CoreError::Validation(format!(
                "unknown consultation status '{other}'"
            ))),
        }
    }
}

// ============================================================================
// VITALS
// ============================================================================

/// Structured vitals snapshot. Every save replaces the whole snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_f: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate_bpm: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respiratory_rate: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systolic_mmhg: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diastolic_mmhg: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oxygen_saturation_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    /// Set by the store when the snapshot is saved; any caller-supplied value is replaced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Out-of-range vitals highlighted for display. Flags never block a save.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VitalFlag {
    Fever,
    LowOxygenSaturation,
    Tachycardia,
    Bradycardia,
    Tachypnoea,
    Hypertension,
}

impl VitalFlag {
    pub const fn label(self) -> &'static str {
        match self {
            VitalFlag::Fever => "Temperature at or above 100.4 °F",
            VitalFlag::LowOxygenSaturation => "Oxygen saturation below 95%",
            VitalFlag::Tachycardia => "Heart rate above 100 bpm",
            VitalFlag::Bradycardia => "Heart rate below 50 bpm",
            VitalFlag::Tachypnoea => "Respiratory rate above 20 per minute",
            VitalFlag::Hypertension => "Blood pressure at or above 140/90",
        }
    }
}

impl Vitals {
    pub fn is_empty(&self) -> bool {
        self.temperature_f.is_none()
            && self.heart_rate_bpm.is_none()
            && self.respiratory_rate.is_none()
            && self.systolic_mmhg.is_none()
            && self.diastolic_mmhg.is_none()
            && self.oxygen_saturation_pct.is_none()
            && self.weight_kg.is_none()
    }

    pub fn flags(&self) -> Vec<VitalFlag> {
        let mut flags = Vec::new();
        if self.temperature_f.is_some_and(|t| t >= FEVER_THRESHOLD_F) {
            flags.push(VitalFlag::Fever);
        }
        if self
            .oxygen_saturation_pct
            .is_some_and(|s| s < LOW_SATURATION_THRESHOLD_PCT)
        {
            flags.push(VitalFlag::LowOxygenSaturation);
        }
        match self.heart_rate_bpm {
            Some(hr) if hr > TACHYCARDIA_THRESHOLD_BPM => flags.push(VitalFlag::Tachycardia),
            Some(hr) if hr < BRADYCARDIA_THRESHOLD_BPM => flags.push(VitalFlag::Bradycardia),
            _ => {}
        }
        if self
            .respiratory_rate
            .is_some_and(|rr| rr > TACHYPNOEA_THRESHOLD_RPM)
        {
            flags.push(VitalFlag::Tachypnoea);
        }
        let systolic_high = self
            .systolic_mmhg
            .is_some_and(|s| s >= HYPERTENSION_SYSTOLIC_MMHG);
        let diastolic_high = self
            .diastolic_mmhg
            .is_some_and(|d| d >= HYPERTENSION_DIASTOLIC_MMHG);
        if systolic_high || diastolic_high {
            flags.push(VitalFlag::Hypertension);
        }
        flags
    }
}

// ============================================================================
// CLINICAL FIELDS AND RECORD
// ============================================================================

/// The clinician-authored part of a consultation.
///
/// `internal_notes` is stored on the same record as everything else; patient-facing reads drop
/// it at projection time (see [`crate::chart`]).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicalFields {
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub clinical_summary: String,
    #[serde(default)]
    pub treatment_plan: String,
    #[serde(default)]
    pub internal_notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vitals: Option<Vitals>,
}

impl ClinicalFields {
    /// Stamps the vitals snapshot (if any) with the save time.
    fn stamped(mut self, at: DateTime<Utc>) -> Self {
        if let Some(vitals) = self.vitals.as_mut() {
            vitals.recorded_at = Some(at);
        }
        self
    }
}

/// One care episode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsultationRequest {
    pub id: ConsultationId,
    pub membership_id: MembershipId,
    pub person_id: PersonId,
    pub status: ConsultationStatus,
    pub chief_complaint: String,
    #[serde(default)]
    pub red_flags: RedFlagSelections,
    /// Derived from `red_flags`; always false for a stored record.
    #[serde(default)]
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_clinician_id: Option<ClinicianId>,
    #[serde(default)]
    pub clinical: ClinicalFields,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<ActorId>,
    /// Status the record was cancelled from, taken under the store's write lock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_from: Option<ConsultationStatus>,
}

impl ConsultationRequest {
    /// Builds a new Pending record from a payload that cleared the Triage Gate.
    ///
    /// A blocked triage has no payload, so a flagged intake can never reach this point.
    pub fn from_triage(payload: TriagePayload, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ConsultationId::new(),
            membership_id: payload.membership_id(),
            person_id: payload.person_id(),
            status: ConsultationStatus::Pending,
            chief_complaint: payload.chief_complaint().as_str().to_owned(),
            red_flags: RedFlagSelections::default(),
            blocked: false,
            assigned_clinician_id: None,
            clinical: ClinicalFields::default(),
            created_at,
            started_at: None,
            completed_at: None,
            reviewed_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancelled_from: None,
        }
    }

    pub fn is_assigned_to(&self, clinician_id: ClinicianId) -> bool {
        self.assigned_clinician_id == Some(clinician_id)
    }
}

// ============================================================================
// MUTATIONS
// ============================================================================

/// A change to a stored record, applied only from the statuses it names.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordMutation {
    Claim {
        clinician_id: ClinicianId,
        at: DateTime<Utc>,
    },
    WriteFields {
        fields: ClinicalFields,
        at: DateTime<Utc>,
    },
    Complete {
        fields: ClinicalFields,
        at: DateTime<Utc>,
    },
    Cancel {
        actor_id: ActorId,
        at: DateTime<Utc>,
    },
}

const FROM_PENDING: &[ConsultationStatus] = &[ConsultationStatus::Pending];
const FROM_IN_PROGRESS: &[ConsultationStatus] = &[ConsultationStatus::InProgress];
const FROM_OPEN: &[ConsultationStatus] =
    &[ConsultationStatus::Pending, ConsultationStatus::InProgress];

impl RecordMutation {
    /// Statuses the record must be in for the mutation to apply.
    pub fn expected_statuses(&self) -> &'static [ConsultationStatus] {
        match self {
            RecordMutation::Claim { .. } => FROM_PENDING,
            RecordMutation::WriteFields { .. } => FROM_OPEN,
            RecordMutation::Complete { .. } => FROM_IN_PROGRESS,
            RecordMutation::Cancel { .. } => FROM_OPEN,
        }
    }

    /// Verb used in error messages and logs.
    pub fn operation(&self) -> &'static str {
        match self {
            RecordMutation::Claim { .. } => "claim",
            RecordMutation::WriteFields { .. } => "edit clinical fields of",
            RecordMutation::Complete { .. } => "complete",
            RecordMutation::Cancel { .. } => "cancel",
        }
    }

    /// Applies the mutation in place. Callers must have checked the status first; stores do so
    /// under the same lock as the write.
    pub fn apply(self, record: &mut ConsultationRequest) {
        match self {
            RecordMutation::Claim { clinician_id, at } => {
                record.status = ConsultationStatus::InProgress;
                record.assigned_clinician_id = Some(clinician_id);
                record.started_at = Some(at);
            }
            RecordMutation::WriteFields { fields, at } => {
                record.clinical = fields.stamped(at);
            }
            RecordMutation::Complete { fields, at } => {
                record.clinical = fields.stamped(at);
                record.status = ConsultationStatus::Completed;
                record.completed_at = Some(at);
                record.reviewed_at = Some(at);
            }
            RecordMutation::Cancel { actor_id, at } => {
                record.cancelled_from = Some(record.status);
                record.status = ConsultationStatus::Cancelled;
                record.cancelled_at = Some(at);
                record.cancelled_by = Some(actor_id);
            }
        }
    }
}

/// Outcome of a conditional write.
#[derive(Clone, Debug, PartialEq)]
pub enum Guarded<T> {
    /// The guard held and the write happened.
    Applied(T),
    /// The record exists but its status was not in the expected set. Nothing was written.
    Conflict(ConsultationStatus),
    /// No record with that id.
    Missing,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::{evaluate, IntakeSubmission, TriageDecision};
    use chrono::NaiveDate;

    use ConsultationStatus::*;

    fn pending() -> ConsultationRequest {
        let submission = IntakeSubmission {
            membership_id: MembershipId::new(),
            person_id: PersonId::new(),
            chief_complaint: "ankle pain".into(),
            red_flags: RedFlagSelections::default(),
            none_apply_confirmed: true,
            location_acknowledged: true,
        };
        let dob = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        match evaluate(&submission, dob, today, 18).unwrap() {
            TriageDecision::Proceed(payload) => ConsultationRequest::from_triage(payload, Utc::now()),
            TriageDecision::Blocked(_) => panic!("clean intake should proceed"),
        }
    }

    #[test]
    fn only_listed_edges_are_legal() {
        let all = [Pending, InProgress, Completed, Cancelled];
        let legal = [
            (Pending, InProgress),
            (InProgress, Completed),
            (Pending, Cancelled),
            (InProgress, Cancelled),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
        assert!(Completed.is_terminal() && Cancelled.is_terminal());
    }

    #[test]
    fn every_mutation_follows_a_legal_edge() {
        let at = Utc::now();
        let mutations = [
            RecordMutation::Claim {
                clinician_id: ActorId::new(),
                at,
            },
            RecordMutation::Complete {
                fields: ClinicalFields::default(),
                at,
            },
            RecordMutation::Cancel {
                actor_id: ActorId::new(),
                at,
            },
        ];
        for mutation in mutations {
            for &from in mutation.expected_statuses() {
                let mut record = pending();
                record.status = from;
                mutation.clone().apply(&mut record);
                assert!(from.can_transition_to(record.status));
            }
        }
    }

    #[test]
    fn new_record_is_pending_and_unassigned() {
        let record = pending();
        assert_eq!(record.status, Pending);
        assert!(record.assigned_clinician_id.is_none());
        assert!(!record.blocked);
        assert!(record.red_flags.is_empty());
    }

    #[test]
    fn claim_sets_assignment_and_start_time() {
        let mut record = pending();
        let clinician = ActorId::new();
        let at = Utc::now();
        RecordMutation::Claim {
            clinician_id: clinician,
            at,
        }
        .apply(&mut record);
        assert_eq!(record.status, InProgress);
        assert!(record.is_assigned_to(clinician));
        assert_eq!(record.started_at, Some(at));
    }

    #[test]
    fn complete_sets_completed_and_reviewed_times() {
        let mut record = pending();
        record.status = InProgress;
        let at = Utc::now();
        let fields = ClinicalFields {
            diagnosis: "Ankle sprain".into(),
            clinical_summary: "S/O/A/P".into(),
            ..ClinicalFields::default()
        };
        RecordMutation::Complete { fields, at }.apply(&mut record);
        assert_eq!(record.status, Completed);
        assert_eq!(record.completed_at, Some(at));
        assert_eq!(record.reviewed_at, Some(at));
        assert_eq!(record.clinical.diagnosis, "Ankle sprain");
    }

    #[test]
    fn saving_vitals_replaces_snapshot_and_stamps_time() {
        let mut record = pending();
        let first = ClinicalFields {
            vitals: Some(Vitals {
                temperature_f: Some(99.1),
                heart_rate_bpm: Some(80),
                ..Vitals::default()
            }),
            ..ClinicalFields::default()
        };
        RecordMutation::WriteFields {
            fields: first,
            at: Utc::now(),
        }
        .apply(&mut record);

        let at = Utc::now();
        let second = ClinicalFields {
            vitals: Some(Vitals {
                temperature_f: Some(101.0),
                recorded_at: Some(DateTime::<Utc>::MIN_UTC),
                ..Vitals::default()
            }),
            ..ClinicalFields::default()
        };
        RecordMutation::WriteFields { fields: second, at }.apply(&mut record);

        let vitals = record.clinical.vitals.unwrap();
        assert_eq!(vitals.heart_rate_bpm, None);
        assert_eq!(vitals.temperature_f, Some(101.0));
        assert_eq!(vitals.recorded_at, Some(at));
    }

    #[test]
    fn vital_flags_use_clinical_thresholds() {
        let vitals = Vitals {
            temperature_f: Some(100.4),
            oxygen_saturation_pct: Some(94.9),
            heart_rate_bpm: Some(101),
            respiratory_rate: Some(21),
            systolic_mmhg: Some(120),
            diastolic_mmhg: Some(90),
            ..Vitals::default()
        };
        assert_eq!(
            vitals.flags(),
            vec![
                VitalFlag::Fever,
                VitalFlag::LowOxygenSaturation,
                VitalFlag::Tachycardia,
                VitalFlag::Tachypnoea,
                VitalFlag::Hypertension,
            ]
        );

        let normal = Vitals {
            temperature_f: Some(100.3),
            oxygen_saturation_pct: Some(95.0),
            heart_rate_bpm: Some(50),
            respiratory_rate: Some(20),
            systolic_mmhg: Some(139),
            diastolic_mmhg: Some(89),
            ..Vitals::default()
        };
        assert!(normal.flags().is_empty());
        assert_eq!(
            Vitals {
                heart_rate_bpm: Some(49),
                ..Vitals::default()
            }
            .flags(),
            vec![VitalFlag::Bradycardia]
        );
    }

    #[test]
    fn status_parses_common_spellings() {
        assert_eq!("in_progress".parse::<ConsultationStatus>().unwrap(), InProgress);
        assert_eq!("Canceled".parse::<ConsultationStatus>().unwrap(), Cancelled);
        assert!("open".parse::<ConsultationStatus>().is_err());
    }
}
