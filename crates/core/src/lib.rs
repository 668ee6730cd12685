//! # Telecare Core
//!
//! Consultation coordination for a telehealth service:
//! - **Triage Gate**: red-flag screening that blocks unsafe intakes before anything is created
//! - **Claim Coordinator**: exclusive, race-free assignment of a Pending request to one clinician
//! - **State machine and clinical record store**: Pending → InProgress → Completed, with
//!   cancellation from either open status and no writes once closed
//! - **Request Queue**: a live, refetch-on-change view of open requests
//! - **Addendum Log** and **Audit Trail**: append-only records that outlive the episode
//!
//! Records are persisted through the [`ConsultationStore`] seam, either in memory or as sharded
//! YAML files under the configured data directory.
//!
//! **No API concerns**: HTTP servers and command-line parsing belong in `api-rest` and `cli`.

pub mod addendum;
pub mod audit;
pub mod chart;
pub mod claim;
pub mod config;
pub mod constants;
pub mod consultation;
pub mod directory;
pub mod error;
pub mod lifecycle;
pub mod queue;
pub mod record;
pub mod service;
pub mod store;
pub mod triage;
pub mod types;

pub use addendum::{Addendum, AddendumAuthor, AddendumCategory, AddendumId, NewAddendum};
pub use audit::{AuditAction, AuditEvent, AuditSink, AuditView, ResourceType};
pub use chart::{ClinicianChart, PatientChart};
pub use config::{CoreConfig, StoreKind};
pub use consultation::{
    ClinicalFields, ConsultationRequest, ConsultationStatus, VitalFlag, Vitals,
};
pub use directory::{Directory, PersonRecord, StaticDirectory};
pub use error::{CoreError, CoreResult};
pub use queue::{QueueEntry, QueueFilter, QueueSubscription};
pub use service::ConsultationService;
pub use store::{ChangeEvent, ChangeKind, ConsultationStore, FileStore, MemoryStore};
pub use triage::{IntakeSubmission, RedFlag, RedFlagCategory, RedFlagSelections, TriageForm};
pub use types::{
    ActorId, ActorRole, ClinicianId, ConsultationId, MembershipId, NonEmptyText, PersonId,
    Session,
};

pub use telecare_uuid::{ShardableUuid, TimestampId};
