//! Addendum Log.
//!
//! Addenda are the only way to amend a Completed consultation. They are append-only: this module
//! exposes no edit or delete, and the stores refuse to overwrite an existing entry. Each entry
//! carries its authoring clinician so both chart projections can attribute it.

use crate::error::{CoreError, CoreResult};
use crate::consultation::Guarded;
use crate::store::ConsultationStore;
use crate::types::{ClinicianId, ConsultationId, NonEmptyText, Session};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use telecare_uuid::{TimestampId, TimestampIdGenerator};

pub type AddendumId = TimestampId;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddendumCategory {
    #[default]
    General,
    Correction,
    Clarification,
    FollowUp,
}

impl AddendumCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Correction => "correction",
            Self::Clarification => "clarification",
            Self::FollowUp => "follow_up",
        }
    }
}

impl fmt::Display for AddendumCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddendumCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(Self::General),
            "correction" => Ok(Self::Correction),
            "clarification" => Ok(Self::Clarification),
            "follow_up" | "follow-up" | "followup" => Ok(Self::FollowUp),
            other => Err(CoreError::Validation(format!(
                "unknown addendum category '{other}'"
            ))),
        }
    }
}

/// Authorship captured when the addendum is written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddendumAuthor {
    pub clinician_id: ClinicianId,
    pub display_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addendum {
    pub id: AddendumId,
    pub consultation_id: ConsultationId,
    pub author: AddendumAuthor,
    pub body: String,
    pub category: AddendumCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for a new addendum.
#[derive(Clone, Debug)]
pub struct NewAddendum {
    pub body: String,
    pub category: AddendumCategory,
    pub reason: Option<String>,
}

pub struct AddendumLog {
    store: Arc<dyn ConsultationStore>,
    ids: TimestampIdGenerator,
}

impl AddendumLog {
    pub fn new(store: Arc<dyn ConsultationStore>) -> Self {
        Self {
            store,
            ids: TimestampIdGenerator::new(),
        }
    }

    /// Appends an addendum to a Completed consultation.
    ///
    /// The author is always the session's clinician. The parent's status is checked by the store
    /// in the same step as the write.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Authorization`] if the caller is not a clinician
    /// - [`CoreError::Validation`] if the body is blank
    /// - [`CoreError::InvalidState`] if the consultation is not Completed
    /// - [`CoreError::NotFound`] if there is no such consultation
    pub async fn add(
        &self,
        session: &Session,
        consultation_id: ConsultationId,
        input: NewAddendum,
    ) -> CoreResult<Addendum> {
        session.require_clinician("adding an addendum")?;
        let body = NonEmptyText::required("addendum body", &input.body)?;
        let reason = input
            .reason
            .map(|r| r.trim().to_owned())
            .filter(|r| !r.is_empty());

        let id = self.ids.next_id();
        let addendum = Addendum {
            created_at: id.timestamp(),
            id,
            consultation_id,
            author: AddendumAuthor {
                clinician_id: session.actor_id(),
                display_name: session.display_name().to_string(),
            },
            body: body.into_string(),
            category: input.category,
            reason,
        };

        match self.store.insert_addendum(addendum).await? {
            Guarded::Applied(addendum) => {
                tracing::info!(
                    "addendum {} ({}) added to consultation {}",
                    addendum.id,
                    addendum.category,
                    consultation_id
                );
                Ok(addendum)
            }
            Guarded::Conflict(status) => {
                tracing::warn!(
                    "addendum rejected for consultation {consultation_id} in status {status}"
                );
                Err(CoreError::InvalidState {
                    consultation_id,
                    status,
                    operation: "add an addendum to",
                })
            }
            Guarded::Missing => Err(CoreError::NotFound(format!(
                "consultation {consultation_id}"
            ))),
        }
    }

    /// Addenda oldest first.
    pub async fn list(&self, consultation_id: ConsultationId) -> CoreResult<Vec<Addendum>> {
        self.store.addenda(consultation_id).await
    }
}
