//! Request and response bodies.
//!
//! Identifiers travel as canonical 32-character hex strings and timestamps as RFC 3339.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use telecare_core::{
    AddendumCategory, AuditView, ClinicalFields, ClinicianChart, ConsultationStatus,
    IntakeSubmission, MembershipId, NewAddendum, PatientChart, PersonId, QueueEntry, QueueFilter,
    RedFlag, RedFlagSelections, Session, Vitals,
};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuccessRes {
    pub success: bool,
}

// ============================================================================
// INTAKE
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct RedFlagRes {
    pub code: String,
    pub category: String,
    pub label: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RedFlagCatalogueRes {
    pub flags: Vec<RedFlagRes>,
    /// Shown when any flag is selected.
    pub guidance: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitConsultationReq {
    pub membership_id: String,
    pub person_id: String,
    pub chief_complaint: String,
    /// Red-flag codes from `GET /red-flags`.
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub none_apply_confirmed: bool,
    #[serde(default)]
    pub location_acknowledged: bool,
}

impl SubmitConsultationReq {
    pub fn into_submission(self) -> Result<IntakeSubmission, ApiError> {
        let mut red_flags = RedFlagSelections::default();
        for code in &self.red_flags {
            red_flags.insert(code.parse::<RedFlag>()?);
        }
        Ok(IntakeSubmission {
            membership_id: MembershipId::parse(&self.membership_id)?,
            person_id: PersonId::parse(&self.person_id)?,
            chief_complaint: self.chief_complaint,
            red_flags,
            none_apply_confirmed: self.none_apply_confirmed,
            location_acknowledged: self.location_acknowledged,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitConsultationRes {
    pub consultation_id: String,
}

// ============================================================================
// QUEUE
// ============================================================================

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct QueueParams {
    /// Comma-separated statuses; defaults to `pending,in_progress`.
    pub status: Option<String>,
    /// A clinician id, or `me` for the caller.
    pub assigned_to: Option<String>,
}

impl QueueParams {
    pub fn into_filter(self, session: &Session) -> Result<QueueFilter, ApiError> {
        let mut filter = match self.status.as_deref().map(str::trim) {
            Some(list) if !list.is_empty() => {
                let statuses = list
                    .split(',')
                    .map(str::parse::<ConsultationStatus>)
                    .collect::<Result<Vec<_>, _>>()?;
                QueueFilter::with_statuses(statuses)
            }
            _ => QueueFilter::default(),
        };
        match self.assigned_to.as_deref().map(str::trim) {
            Some("me") => filter = filter.assigned_to(session.actor_id()),
            Some(id) if !id.is_empty() => filter = filter.assigned_to(id.parse()?),
            _ => {}
        }
        Ok(filter)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueueEntryRes {
    pub id: String,
    pub membership_id: String,
    pub person_id: String,
    pub status: String,
    pub chief_complaint: String,
    pub assigned_clinician_id: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
}

impl From<QueueEntry> for QueueEntryRes {
    fn from(entry: QueueEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            membership_id: entry.membership_id.to_string(),
            person_id: entry.person_id.to_string(),
            status: entry.status.to_string(),
            chief_complaint: entry.chief_complaint,
            assigned_clinician_id: entry.assigned_clinician_id.map(|id| id.to_string()),
            created_at: entry.created_at.to_rfc3339(),
            started_at: entry.started_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListQueueRes {
    pub entries: Vec<QueueEntryRes>,
}

impl From<Vec<QueueEntry>> for ListQueueRes {
    fn from(entries: Vec<QueueEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(QueueEntryRes::from).collect(),
        }
    }
}

// ============================================================================
// CLINICAL WORK
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct VitalsReq {
    pub temperature_f: Option<f64>,
    pub heart_rate_bpm: Option<u16>,
    pub respiratory_rate: Option<u16>,
    pub systolic_mmhg: Option<u16>,
    pub diastolic_mmhg: Option<u16>,
    pub oxygen_saturation_pct: Option<f64>,
    pub weight_kg: Option<f64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ClinicalFieldsReq {
    pub diagnosis: String,
    pub clinical_summary: String,
    pub treatment_plan: String,
    pub internal_notes: String,
    pub vitals: Option<VitalsReq>,
}

impl From<ClinicalFieldsReq> for ClinicalFields {
    fn from(req: ClinicalFieldsReq) -> Self {
        ClinicalFields {
            diagnosis: req.diagnosis,
            clinical_summary: req.clinical_summary,
            treatment_plan: req.treatment_plan,
            internal_notes: req.internal_notes,
            vitals: req.vitals.map(|v| Vitals {
                temperature_f: v.temperature_f,
                heart_rate_bpm: v.heart_rate_bpm,
                respiratory_rate: v.respiratory_rate,
                systolic_mmhg: v.systolic_mmhg,
                diastolic_mmhg: v.diastolic_mmhg,
                oxygen_saturation_pct: v.oxygen_saturation_pct,
                weight_kg: v.weight_kg,
                recorded_at: None,
            }),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddAddendumReq {
    pub body: String,
    /// One of `general`, `correction`, `clarification`, `follow_up`.
    pub category: Option<String>,
    pub reason: Option<String>,
}

impl AddAddendumReq {
    pub fn into_new_addendum(self) -> Result<NewAddendum, ApiError> {
        let category = match self.category.as_deref() {
            Some(c) => c.parse::<AddendumCategory>()?,
            None => AddendumCategory::default(),
        };
        Ok(NewAddendum {
            body: self.body,
            category,
            reason: self.reason,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AddAddendumRes {
    pub addendum_id: String,
}

// ============================================================================
// READS
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct ClinicianChartRes {
    #[schema(value_type = Object)]
    pub chart: ClinicianChart,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PatientChartRes {
    #[schema(value_type = Object)]
    pub chart: PatientChart,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AuditParams {
    /// Capped at the server's configured read limit.
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditEventsRes {
    #[schema(value_type = Vec<Object>)]
    pub events: Vec<AuditView>,
}
