//! Read projections of one consultation.
//!
//! Both charts are built from the same stored record. The clinician chart is the record as-is;
//! the patient chart leaves out `internal_notes` and, until the consultation is Completed, the
//! working clinical fields.

use crate::addendum::Addendum;
use crate::consultation::{ConsultationRequest, ConsultationStatus, VitalFlag, Vitals};
use crate::types::{ClinicianId, ConsultationId, PersonId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClinicianChart {
    pub consultation: ConsultationRequest,
    pub vital_flags: Vec<VitalFlag>,
    pub addenda: Vec<Addendum>,
}

impl ClinicianChart {
    pub fn project(consultation: ConsultationRequest, addenda: Vec<Addendum>) -> Self {
        let vital_flags = consultation
            .clinical
            .vitals
            .as_ref()
            .map(Vitals::flags)
            .unwrap_or_default();
        Self {
            consultation,
            vital_flags,
            addenda,
        }
    }
}

/// Clinical content released to the patient once the consultation is complete.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatientVisitSummary {
    pub diagnosis: String,
    pub clinical_summary: String,
    pub treatment_plan: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vitals: Option<Vitals>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatientChart {
    pub id: ConsultationId,
    pub person_id: PersonId,
    pub status: ConsultationStatus,
    pub chief_complaint: String,
    pub assigned_clinician_id: Option<ClinicianId>,
    pub created_at: DateTime<Utc>,
    /// Present only for Completed consultations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<PatientVisitSummary>,
    pub addenda: Vec<Addendum>,
}

impl PatientChart {
    pub fn project(consultation: ConsultationRequest, addenda: Vec<Addendum>) -> Self {
        let summary = (consultation.status == ConsultationStatus::Completed).then(|| {
            let clinical = consultation.clinical.clone();
            PatientVisitSummary {
                diagnosis: clinical.diagnosis,
                clinical_summary: clinical.clinical_summary,
                treatment_plan: clinical.treatment_plan,
                vitals: clinical.vitals,
                completed_at: consultation.completed_at,
            }
        });
        Self {
            id: consultation.id,
            person_id: consultation.person_id,
            status: consultation.status,
            chief_complaint: consultation.chief_complaint,
            assigned_clinician_id: consultation.assigned_clinician_id,
            created_at: consultation.created_at,
            summary,
            addenda,
        }
    }
}
